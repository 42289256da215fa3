// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Host used by the CLI when no script runtime is attached

use async_trait::async_trait;
use spacey_ts_loader::{
    EvaluationScope, LoaderError, Namespace, Properties, Result, ScriptHost, StaticModule,
};

/// Imports every native module as an empty namespace and cannot run code.
///
/// Enough to resolve, transpile and link a program without executing it.
#[derive(Debug, Default)]
pub struct DetachedHost;

#[async_trait]
impl ScriptHost for DetachedHost {
    async fn import(&self, url: &str) -> Result<Namespace> {
        tracing::debug!("Detached import of {}", url);
        Ok(Namespace::default())
    }

    async fn evaluate(&self, module: &StaticModule, _scope: EvaluationScope) -> Result<Properties> {
        Err(LoaderError::evaluation(
            module.url(),
            "no script runtime attached",
        ))
    }
}
