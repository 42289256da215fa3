// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Host runtime integration
//!
//! The loader never executes JavaScript itself. A [`ScriptHost`] supplies the
//! execution primitive for transpiled modules and the native import used for
//! everything else (built-ins, packages, JSON, plain JavaScript).

use crate::error::Result;
use crate::imports::scan_static_imports;
use crate::module_record::{ImportMeta, StaticModule};
use crate::resolver::BUILTIN_MODULES;
use crate::session::LoaderSession;
use crate::value::{Namespace, Properties};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// The script runtime hosting the loader
#[async_trait]
pub trait ScriptHost: Send + Sync {
    /// Names the host provides as built-in modules
    fn builtin_modules(&self) -> Vec<String> {
        BUILTIN_MODULES.iter().map(|name| name.to_string()).collect()
    }

    /// Static import and re-export specifiers of transpiled code, in source order.
    ///
    /// Only consulted when the transpiler did not report dependencies itself.
    fn dependency_specifiers(&self, code: &str) -> Vec<String> {
        scan_static_imports(code)
    }

    /// Import a module natively and return its evaluated namespace
    async fn import(&self, url: &str) -> Result<Namespace>;

    /// Execute a linked static module and return its exports
    async fn evaluate(&self, module: &StaticModule, scope: EvaluationScope) -> Result<Properties>;
}

/// Everything a static module can see while it runs
pub struct EvaluationScope {
    /// Namespaces of the module's static imports, keyed by specifier
    pub imports: IndexMap<String, Namespace>,
    /// `import.meta` of the module
    pub import_meta: ImportMeta,
    /// Handle for `import()` expressions in the module body
    pub dynamic: DynamicImporter,
}

impl fmt::Debug for EvaluationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationScope")
            .field("imports", &self.imports.keys().collect::<Vec<_>>())
            .field("import_meta", &self.import_meta)
            .field("referrer", &self.dynamic.referrer)
            .finish()
    }
}

/// Dynamic `import()` bound to the importing module
#[derive(Clone)]
pub struct DynamicImporter {
    session: Arc<LoaderSession>,
    referrer: String,
}

impl DynamicImporter {
    pub(crate) fn new(session: Arc<LoaderSession>, referrer: impl Into<String>) -> Self {
        Self {
            session,
            referrer: referrer.into(),
        }
    }

    /// URL of the importing module
    pub fn referrer(&self) -> &str {
        &self.referrer
    }

    /// Resolve, link and evaluate `specifier` relative to the importing module.
    pub async fn import(&self, specifier: &str) -> Result<Namespace> {
        self.session
            .import_dynamically(specifier, &self.referrer)
            .await
    }
}
