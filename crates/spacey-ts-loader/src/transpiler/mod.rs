// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! TypeScript transpilation
//!
//! [`TranspilerAdapter`] turns a module URL into a [`TranspiledUnit`]: it reads
//! the file, picks the session's compiler options and hands both to a
//! [`Transpile`] engine. [`OxcTranspiler`] is the default engine.

mod oxc;

pub use oxc::OxcTranspiler;

use crate::config::{CompilerOptions, ConfigResolver};
use crate::error::{LoaderError, Result};
use crate::module_record::module_path;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Severity of a transpiler diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Output cannot be trusted
    Error,
    /// Informational
    Warning,
}

/// A message produced while transpiling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Message text
    pub message: String,
    /// File the message refers to
    pub file: Option<PathBuf>,
    /// Severity
    pub severity: Severity,
}

impl Diagnostic {
    /// Create an error diagnostic
    pub fn error(message: impl Into<String>, file: Option<PathBuf>) -> Self {
        Self {
            message: message.into(),
            file,
            severity: Severity::Error,
        }
    }

    /// Returns true for error diagnostics
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        match &self.file {
            Some(file) => write!(f, "{}: {}: {}", file.display(), level, self.message),
            None => write!(f, "{}: {}", level, self.message),
        }
    }
}

/// Output of a transpilation engine
#[derive(Debug, Clone, Default)]
pub struct TranspileOutput {
    /// JavaScript text
    pub output_text: String,
    /// Collected diagnostics
    pub diagnostics: Vec<Diagnostic>,
    /// Static import and re-export specifiers of the output, when the engine
    /// knows them from its parse. `None` leaves them to the host's scanner.
    pub dependencies: Option<Vec<String>>,
}

/// A black-box TypeScript → JavaScript engine
pub trait Transpile: Send + Sync {
    /// Transpile `source`, read from `file_name`, with `options`
    fn transpile(&self, source: &str, file_name: &Path, options: &CompilerOptions)
    -> TranspileOutput;
}

/// JavaScript produced from one TypeScript module
#[derive(Debug, Clone)]
pub struct TranspiledUnit {
    /// Emitted JavaScript
    pub code: String,
    /// URL of the source module
    pub source_url: String,
    /// Diagnostics reported for the module
    pub diagnostics: Vec<Diagnostic>,
    /// Dependency specifiers reported by the engine
    pub dependencies: Option<Vec<String>>,
}

/// Reads TypeScript modules and runs them through an engine
pub struct TranspilerAdapter {
    engine: Arc<dyn Transpile>,
    config: ConfigResolver,
}

impl TranspilerAdapter {
    /// Create an adapter around `engine`
    pub fn new(engine: Arc<dyn Transpile>) -> Self {
        Self {
            engine,
            config: ConfigResolver::new(),
        }
    }

    /// Create an adapter around the oxc engine
    pub fn oxc() -> Self {
        Self::new(Arc::new(OxcTranspiler::new()))
    }

    /// Session config (root path and compiler options)
    pub fn config(&self) -> &ConfigResolver {
        &self.config
    }

    /// Transpile the module at `url`.
    ///
    /// The first call fixes the session root to the module's directory, and
    /// compiler options are looked up from there.
    pub async fn transpile(&self, url: &str) -> Result<TranspiledUnit> {
        let path = module_path(url)?;
        let dir = path.parent().unwrap_or(Path::new("/"));
        let root = self.config.set_root_path(dir);

        let source = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| LoaderError::Read {
                path: path.clone(),
                source,
            })?;

        let options = self.config.compiler_options(root).await.for_transpile();
        debug!("Transpiling {}", path.display());
        let output = self.engine.transpile(&source, &path, &options);

        for diagnostic in &output.diagnostics {
            warn!("{}", diagnostic);
        }

        if options.no_emit_on_error && output.diagnostics.iter().any(Diagnostic::is_error) {
            let diagnostics = output
                .diagnostics
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n");
            return Err(LoaderError::Transpile {
                url: url.to_string(),
                diagnostics,
            });
        }

        Ok(TranspiledUnit {
            code: output.output_text,
            source_url: url.to_string(),
            diagnostics: output.diagnostics,
            dependencies: output.dependencies,
        })
    }
}

impl fmt::Debug for TranspilerAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranspilerAdapter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;
    use url::Url;

    /// Passes source through and reports one error per `@error` marker.
    #[derive(Default)]
    struct FakeEngine {
        calls: AtomicUsize,
    }

    impl Transpile for FakeEngine {
        fn transpile(
            &self,
            source: &str,
            file_name: &Path,
            options: &CompilerOptions,
        ) -> TranspileOutput {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(options.allow_synthetic_default_imports);
            assert!(!options.strict);

            let diagnostics = source
                .matches("@error")
                .map(|_| Diagnostic::error("marked", Some(file_name.to_path_buf())))
                .collect();
            TranspileOutput {
                output_text: source.to_string(),
                diagnostics,
                dependencies: None,
            }
        }
    }

    fn file_url(path: &Path) -> String {
        Url::from_file_path(path).unwrap().to_string()
    }

    #[tokio::test]
    async fn test_transpile_reads_and_fixes_root() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("main.ts");
        std::fs::write(&file, "export const a = 1;").unwrap();

        let engine = Arc::new(FakeEngine::default());
        let adapter = TranspilerAdapter::new(engine.clone());
        let unit = adapter.transpile(&file_url(&file)).await.unwrap();

        assert_eq!(unit.code, "export const a = 1;");
        assert_eq!(unit.source_url, file_url(&file));
        assert!(unit.diagnostics.is_empty());
        assert_eq!(adapter.config().root_path(), dir.path());
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_diagnostics_are_not_fatal_by_default() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("broken.ts");
        std::fs::write(&file, "// @error\nexport const a = 1;").unwrap();

        let adapter = TranspilerAdapter::new(Arc::new(FakeEngine::default()));
        let unit = adapter.transpile(&file_url(&file)).await.unwrap();
        assert_eq!(unit.diagnostics.len(), 1);
        assert!(unit.diagnostics[0].to_string().contains("error: marked"));
    }

    #[tokio::test]
    async fn test_no_emit_on_error() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("tsconfig.json"),
            r#"{ "compilerOptions": { "noEmitOnError": true } }"#,
        )
        .unwrap();
        let file = dir.path().join("broken.ts");
        std::fs::write(&file, "// @error\n").unwrap();

        let adapter = TranspilerAdapter::new(Arc::new(FakeEngine::default()));
        let err = adapter.transpile(&file_url(&file)).await.unwrap_err();
        assert!(err.to_string().starts_with("Unable to compile TypeScript"));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempdir().unwrap();
        let adapter = TranspilerAdapter::new(Arc::new(FakeEngine::default()));
        let err = adapter
            .transpile(&file_url(&dir.path().join("missing.ts")))
            .await
            .unwrap_err();
        assert!(matches!(err, LoaderError::Read { .. }));
    }
}
