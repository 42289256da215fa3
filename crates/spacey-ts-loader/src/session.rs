// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Loader session
//!
//! A session owns everything one program run shares: the host, the resolver,
//! the transpiler with its root path and compiler options, and the module
//! cache. Sessions are independent; two sessions never share modules.

use crate::cache::ModuleCache;
use crate::error::{LoaderError, Result};
use crate::host::ScriptHost;
use crate::resolver::{FallbackResolver, ResolvedModule, SpecifierResolver};
use crate::transpiler::{Transpile, TranspilerAdapter};
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Shared state of one loader run
pub struct LoaderSession {
    pub(crate) host: Arc<dyn ScriptHost>,
    pub(crate) resolver: SpecifierResolver,
    pub(crate) transpiler: Option<TranspilerAdapter>,
    pub(crate) cache: ModuleCache,
    pub(crate) fallback: Option<Arc<dyn FallbackResolver>>,
    pub(crate) base_url: Url,
}

impl LoaderSession {
    /// Start building a session around `host`
    pub fn builder(host: Arc<dyn ScriptHost>) -> LoaderSessionBuilder {
        LoaderSessionBuilder::new(host)
    }

    /// Session with the oxc transpiler and default settings
    pub fn new(host: Arc<dyn ScriptHost>) -> Result<Arc<Self>> {
        Self::builder(host).build()
    }

    /// The host runtime
    pub fn host(&self) -> &Arc<dyn ScriptHost> {
        &self.host
    }

    /// The transpiler, if one is registered
    pub fn transpiler(&self) -> Option<&TranspilerAdapter> {
        self.transpiler.as_ref()
    }

    /// The module cache
    pub fn cache(&self) -> &ModuleCache {
        &self.cache
    }

    /// URL top-level specifiers resolve against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve hook.
    ///
    /// `parent_url` defaults to the session base URL, `default_resolver` to
    /// the session's fallback resolver.
    pub async fn resolve(
        &self,
        specifier: &str,
        parent_url: Option<&str>,
        default_resolver: Option<&dyn FallbackResolver>,
    ) -> Result<ResolvedModule> {
        let parent = match parent_url {
            Some(parent) => {
                Url::parse(parent).map_err(|e| LoaderError::invalid_url(parent, e))?
            }
            None => self.base_url.clone(),
        };
        let fallback = default_resolver.or(self.fallback.as_deref());
        self.resolver.resolve(specifier, &parent, fallback).await
    }
}

impl fmt::Debug for LoaderSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderSession")
            .field("base_url", &self.base_url.as_str())
            .field("transpiler", &self.transpiler)
            .field("modules", &self.cache.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`LoaderSession`]
pub struct LoaderSessionBuilder {
    host: Arc<dyn ScriptHost>,
    engine: Option<Arc<dyn Transpile>>,
    fallback: Option<Arc<dyn FallbackResolver>>,
    base_url: Option<Url>,
}

impl LoaderSessionBuilder {
    fn new(host: Arc<dyn ScriptHost>) -> Self {
        Self {
            host,
            engine: Some(Arc::new(crate::transpiler::OxcTranspiler::new())),
            fallback: None,
            base_url: None,
        }
    }

    /// Use `engine` instead of the oxc transpiler
    pub fn transpiler(mut self, engine: Arc<dyn Transpile>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Register no transpiler; TypeScript imports then fail
    pub fn without_transpiler(mut self) -> Self {
        self.engine = None;
        self
    }

    /// Resolver for bare specifiers
    pub fn fallback_resolver(mut self, resolver: Arc<dyn FallbackResolver>) -> Self {
        self.fallback = Some(resolver);
        self
    }

    /// URL top-level specifiers resolve against
    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Build the session
    pub fn build(self) -> Result<Arc<LoaderSession>> {
        let base_url = match self.base_url {
            Some(url) => url,
            None => current_dir_url()?,
        };

        Ok(Arc::new(LoaderSession {
            resolver: SpecifierResolver::with_builtins(self.host.builtin_modules()),
            host: self.host,
            transpiler: self.engine.map(TranspilerAdapter::new),
            cache: ModuleCache::new(),
            fallback: self.fallback,
            base_url,
        }))
    }
}

/// The current directory as a `file:` URL with a trailing slash
pub(crate) fn current_dir_url() -> Result<Url> {
    let cwd = std::env::current_dir().map_err(|e| LoaderError::host(e.to_string()))?;
    Url::from_directory_path(&cwd).map_err(|_| LoaderError::NotAFileUrl(cwd.display().to_string()))
}
