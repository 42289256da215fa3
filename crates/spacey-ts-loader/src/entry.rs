// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Entry-point loading

use crate::error::{LoaderError, Result};
use crate::module_record::{ModuleRecord, StaticModule};
use crate::resolver::{Format, ResolvedModule};
use crate::session::LoaderSession;
use crate::value::Namespace;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error};
use url::Url;

/// A linked program, ready to run
#[derive(Debug)]
pub struct Instance {
    exports: Vec<String>,
    session: Arc<LoaderSession>,
    root: Arc<StaticModule>,
}

impl Instance {
    /// Exported names. Always empty: the entry module's exports are not surfaced.
    pub fn exports(&self) -> &[String] {
        &self.exports
    }

    /// The entry module
    pub fn root(&self) -> &Arc<StaticModule> {
        &self.root
    }

    /// The session the program was loaded into
    pub fn session(&self) -> &Arc<LoaderSession> {
        &self.session
    }

    /// Evaluate the program
    pub async fn execute(&self) -> Result<Namespace> {
        let record = ModuleRecord::Static(Arc::clone(&self.root));
        self.session.evaluate(&record).await
    }
}

impl LoaderSession {
    /// Transpile and link the program rooted at `entry` (a URL or a path).
    ///
    /// Relative paths are taken against the session's base URL.
    pub async fn instantiate(self: &Arc<Self>, entry: &str) -> Result<Instance> {
        let url = entry_url(entry, &self.base_url)?;
        debug!("Instantiating {}", url);

        let record = self
            .cached_or_create(&ResolvedModule::new(url.clone(), Format::Dynamic), true)
            .await?;
        let ModuleRecord::Static(root) = record else {
            return Err(LoaderError::InvalidEntry(url.to_string()));
        };

        self.link(&root).await?;

        Ok(Instance {
            exports: Vec::new(),
            session: Arc::clone(self),
            root,
        })
    }
}

/// Instantiate `entry`, terminating the process if it cannot be loaded.
pub async fn instantiate_or_exit(session: &Arc<LoaderSession>, entry: &str) -> Instance {
    match session.instantiate(entry).await {
        Ok(instance) => instance,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

fn entry_url(entry: &str, base: &Url) -> Result<Url> {
    // One-letter schemes are Windows drive letters, not URLs
    match Url::parse(entry) {
        Ok(url) if url.scheme().len() > 1 => return Ok(url),
        _ => {}
    }

    let path = Path::new(entry);
    if path.is_absolute() {
        return Url::from_file_path(path).map_err(|_| LoaderError::InvalidEntry(entry.to_string()));
    }
    base.join(entry)
        .map_err(|e| LoaderError::invalid_url(entry, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_url() {
        let base = Url::parse("file:///work/").unwrap();
        assert_eq!(
            entry_url("file:///app/main.ts", &base).unwrap().as_str(),
            "file:///app/main.ts"
        );
        assert_eq!(
            entry_url("/app/main.ts", &base).unwrap().as_str(),
            "file:///app/main.ts"
        );
    }

    #[test]
    fn test_relative_entry_uses_base_url() {
        let base = Url::parse("file:///app/").unwrap();
        assert_eq!(
            entry_url("src/main.ts", &base).unwrap().as_str(),
            "file:///app/src/main.ts"
        );
        assert_eq!(
            entry_url("./main.ts", &base).unwrap().as_str(),
            "file:///app/main.ts"
        );
        assert_eq!(
            entry_url("../lib/main.ts", &Url::parse("file:///app/bin/").unwrap())
                .unwrap()
                .as_str(),
            "file:///app/lib/main.ts"
        );
    }
}
