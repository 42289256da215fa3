// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Specifier resolution and format classification

use crate::error::{LoaderError, Result};
use crate::typescript::{TS_EXTENSIONS, is_typescript_extension};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;
use url::Url;

/// Node.js built-in module names
pub const BUILTIN_MODULES: &[&str] = &[
    "assert",
    "async_hooks",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "diagnostics_channel",
    "dns",
    "domain",
    "events",
    "fs",
    "http",
    "http2",
    "https",
    "inspector",
    "module",
    "net",
    "os",
    "path",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "repl",
    "stream",
    "string_decoder",
    "sys",
    "timers",
    "tls",
    "trace_events",
    "tty",
    "url",
    "util",
    "v8",
    "vm",
    "wasi",
    "worker_threads",
    "zlib",
];

/// How a resolved module gets loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Host built-in module
    Builtin,
    /// CommonJS module
    Commonjs,
    /// TypeScript source that goes through the transpiler
    Dynamic,
    /// JSON document
    Json,
    /// ES module handled by the host
    Module,
    /// WebAssembly module
    Wasm,
}

impl Format {
    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Builtin => "builtin",
            Format::Commonjs => "commonjs",
            Format::Dynamic => "dynamic",
            Format::Json => "json",
            Format::Module => "module",
            Format::Wasm => "wasm",
        }
    }

    /// Whether the loader transpiles modules of this format itself
    pub fn needs_transpile(&self) -> bool {
        matches!(self, Format::Dynamic)
    }
}

impl FromStr for Format {
    type Err = LoaderError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "builtin" => Ok(Format::Builtin),
            "commonjs" => Ok(Format::Commonjs),
            "dynamic" => Ok(Format::Dynamic),
            "json" => Ok(Format::Json),
            "module" => Ok(Format::Module),
            "wasm" => Ok(Format::Wasm),
            other => Err(LoaderError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of module resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedModule {
    /// Canonical URL (the cache key)
    pub url: String,
    /// How to load it
    pub format: Format,
}

impl ResolvedModule {
    /// Create a resolved module
    pub fn new(url: impl Into<String>, format: Format) -> Self {
        Self {
            url: url.into(),
            format,
        }
    }
}

/// The host's own resolver, consulted for bare package specifiers.
#[async_trait]
pub trait FallbackResolver: Send + Sync {
    /// Resolve `specifier` imported from `parent_url`
    async fn resolve(&self, specifier: &str, parent_url: &str) -> Result<ResolvedModule>;
}

/// Classifies specifiers into [`ResolvedModule`]s.
pub struct SpecifierResolver {
    /// Built-in module names
    builtins: Vec<String>,
}

impl SpecifierResolver {
    /// Create a resolver that knows the Node.js built-ins
    pub fn new() -> Self {
        Self::with_builtins(BUILTIN_MODULES.iter().copied())
    }

    /// Create a resolver with a host-specific built-in list
    pub fn with_builtins<I, S>(builtins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            builtins: builtins.into_iter().map(Into::into).collect(),
        }
    }

    /// Check if a module is a built-in
    pub fn is_builtin(&self, name: &str) -> bool {
        // Handle node: prefix
        let name = name.strip_prefix("node:").unwrap_or(name);
        self.builtins.iter().any(|builtin| builtin == name)
    }

    /// Resolve `specifier` as imported from `parent_url`.
    ///
    /// Never fails for lack of a matching file: anything the loader does not
    /// transpile is classified [`Format::Module`] and left to the host, which
    /// reports missing modules itself. Only a malformed parent URL or a
    /// failing `fallback` produce errors.
    pub async fn resolve(
        &self,
        specifier: &str,
        parent_url: &Url,
        fallback: Option<&dyn FallbackResolver>,
    ) -> Result<ResolvedModule> {
        if self.is_builtin(specifier) {
            return Ok(ResolvedModule::new(specifier, Format::Builtin));
        }

        if !is_path_specifier(specifier) && !specifier.starts_with("file:") {
            if let Some(fallback) = fallback {
                debug!("Delegating bare specifier '{}' to fallback resolver", specifier);
                return fallback.resolve(specifier, parent_url.as_str()).await;
            }
            return Ok(ResolvedModule::new(specifier, Format::Module));
        }

        let resolved = parent_url
            .join(specifier)
            .map_err(|e| LoaderError::invalid_url(specifier, e))?;
        let extension = url_extension(&resolved);

        // `./foo/` names a directory, never a sibling `foo.ts`
        if extension.is_none() && resolved.scheme() == "file" && !resolved.path().ends_with('/') {
            let target = resolved.clone();
            let found = tokio::task::spawn_blocking(move || probe_extensions(&target))
                .await
                .map_err(|e| LoaderError::host(e.to_string()))?;
            if let Some(found) = found {
                debug!("Probed '{}' -> {}", specifier, found);
                return Ok(ResolvedModule::new(found, Format::Dynamic));
            }
        }

        if extension.as_deref().is_some_and(is_typescript_extension) {
            return Ok(ResolvedModule::new(resolved, Format::Dynamic));
        }

        Ok(ResolvedModule::new(resolved, Format::Module))
    }
}

impl Default for SpecifierResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Relative or absolute filesystem path, as opposed to a package name
fn is_path_specifier(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier.starts_with('/')
        || specifier == "."
        || specifier == ".."
        || (cfg!(windows) && specifier.chars().nth(1) == Some(':'))
}

/// Extension of the URL's last path segment
fn url_extension(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.next_back()?;
    Path::new(segment)
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
}

/// Look for exactly one `<target>.<ts extension>` next to the target.
///
/// Zero or several candidates give `None`: the import is left to the host
/// resolver rather than guessing.
fn probe_extensions(target: &Url) -> Option<Url> {
    let path = target.to_file_path().ok()?;
    let candidates = probe_candidates(&path);

    match candidates.as_slice() {
        [single] => Url::from_file_path(single).ok(),
        [] => None,
        many => {
            debug!(
                "Extension probe for {} is ambiguous ({} candidates)",
                path.display(),
                many.len()
            );
            None
        }
    }
}

fn probe_candidates(path: &Path) -> Vec<PathBuf> {
    let (Some(dir), Some(stem)) = (path.parent(), path.file_name()) else {
        return Vec::new();
    };

    let pattern = format!(
        "{}/{}.*",
        glob::Pattern::escape(&dir.to_string_lossy()),
        glob::Pattern::escape(&stem.to_string_lossy())
    );

    let Ok(entries) = glob::glob(&pattern) else {
        return Vec::new();
    };

    entries
        .filter_map(|entry| entry.ok())
        .filter(|candidate| candidate.is_file())
        .filter(|candidate| {
            candidate
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| TS_EXTENSIONS.contains(&ext))
        })
        .filter(|candidate| candidate.file_stem() == Some(stem))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn parent_in(dir: &Path) -> Url {
        Url::from_file_path(dir.join("main.ts")).unwrap()
    }

    #[test]
    fn test_is_builtin() {
        let resolver = SpecifierResolver::new();
        assert!(resolver.is_builtin("fs"));
        assert!(resolver.is_builtin("path"));
        assert!(resolver.is_builtin("node:fs"));
        assert!(!resolver.is_builtin("lodash"));
    }

    #[test]
    fn test_format_names() {
        assert_eq!("dynamic".parse::<Format>().unwrap(), Format::Dynamic);
        assert_eq!(Format::Commonjs.to_string(), "commonjs");
        assert!(matches!(
            "addon".parse::<Format>(),
            Err(LoaderError::UnknownFormat(name)) if name == "addon"
        ));
        assert_eq!(
            serde_json::to_string(&ResolvedModule::new("fs", Format::Builtin)).unwrap(),
            r#"{"url":"fs","format":"builtin"}"#
        );
    }

    #[tokio::test]
    async fn test_classification_table() {
        let dir = tempdir().unwrap();
        let parent = parent_in(dir.path());
        let resolver = SpecifierResolver::new();

        let fs = resolver.resolve("fs", &parent, None).await.unwrap();
        assert_eq!(fs, ResolvedModule::new("fs", Format::Builtin));

        let local = resolver.resolve("./a.ts", &parent, None).await.unwrap();
        assert_eq!(local.format, Format::Dynamic);
        assert_eq!(local.url, Url::from_file_path(dir.path().join("a.ts")).unwrap().as_str());

        let package = resolver.resolve("lodash", &parent, None).await.unwrap();
        assert_eq!(package, ResolvedModule::new("lodash", Format::Module));

        let js = resolver.resolve("./util.js", &parent, None).await.unwrap();
        assert_eq!(js.format, Format::Module);
        assert!(js.url.ends_with("/util.js"));
    }

    #[tokio::test]
    async fn test_extension_probe_single_match() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("foo.ts"), "export {}").unwrap();
        std::fs::write(dir.path().join("foo.js"), "export {}").unwrap();
        std::fs::write(dir.path().join("foobar.ts"), "export {}").unwrap();

        let resolved = SpecifierResolver::new()
            .resolve("./foo", &parent_in(dir.path()), None)
            .await
            .unwrap();
        assert_eq!(resolved.format, Format::Dynamic);
        assert_eq!(
            resolved.url,
            Url::from_file_path(dir.path().join("foo.ts")).unwrap().as_str()
        );
    }

    #[tokio::test]
    async fn test_extension_probe_ambiguous_falls_through() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("foo.ts"), "export {}").unwrap();
        std::fs::write(dir.path().join("foo.tsx"), "export {}").unwrap();

        let resolved = SpecifierResolver::new()
            .resolve("./foo", &parent_in(dir.path()), None)
            .await
            .unwrap();
        assert_eq!(resolved.format, Format::Module);
        assert!(resolved.url.ends_with("/foo"));
    }

    #[tokio::test]
    async fn test_extension_probe_no_match_falls_through() {
        let dir = tempdir().unwrap();
        let resolved = SpecifierResolver::new()
            .resolve("../missing", &parent_in(&dir.path().join("sub")), None)
            .await
            .unwrap();
        assert_eq!(resolved.format, Format::Module);
        assert!(resolved.url.ends_with("/missing"));
    }

    #[tokio::test]
    async fn test_trailing_slash_skips_extension_probe() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("foo.ts"), "export {}").unwrap();
        std::fs::create_dir(dir.path().join("foo")).unwrap();

        let resolved = SpecifierResolver::new()
            .resolve("./foo/", &parent_in(dir.path()), None)
            .await
            .unwrap();
        assert_eq!(resolved.format, Format::Module);
        assert!(resolved.url.ends_with("/foo/"));
    }

    #[tokio::test]
    async fn test_file_url_specifier() {
        let dir = tempdir().unwrap();
        let target = Url::from_file_path(dir.path().join("lib.mts")).unwrap();
        let resolved = SpecifierResolver::new()
            .resolve(target.as_str(), &parent_in(dir.path()), None)
            .await
            .unwrap();
        assert_eq!(resolved, ResolvedModule::new(target, Format::Dynamic));
    }

    struct PackageResolver;

    #[async_trait]
    impl FallbackResolver for PackageResolver {
        async fn resolve(&self, specifier: &str, _parent_url: &str) -> Result<ResolvedModule> {
            Ok(ResolvedModule::new(
                format!("file:///node_modules/{}/index.js", specifier),
                Format::Commonjs,
            ))
        }
    }

    #[tokio::test]
    async fn test_bare_specifier_uses_fallback() {
        let dir = tempdir().unwrap();
        let resolver = SpecifierResolver::new();
        let resolved = resolver
            .resolve("lodash", &parent_in(dir.path()), Some(&PackageResolver))
            .await
            .unwrap();
        assert_eq!(resolved.format, Format::Commonjs);
        assert_eq!(resolved.url, "file:///node_modules/lodash/index.js");

        // Built-ins never reach the fallback
        let fs = resolver
            .resolve("node:fs", &parent_in(dir.path()), Some(&PackageResolver))
            .await
            .unwrap();
        assert_eq!(fs.format, Format::Builtin);
    }
}
