// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the module loader

use std::path::PathBuf;
use thiserror::Error;

/// Result type for loader operations
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Errors that can occur while resolving, transpiling, linking or evaluating modules
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Source file could not be read
    #[error("Cannot read '{}': {source}", path.display())]
    Read {
        /// File that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A specifier or parent could not be turned into a URL
    #[error("Invalid module URL '{url}': {reason}")]
    InvalidUrl {
        /// Offending input
        url: String,
        /// Reason for failure
        reason: String,
    },

    /// A module that must live on disk was given a non-`file:` URL
    #[error("Not a file URL: {0}")]
    NotAFileUrl(String),

    /// A module needs transpiling but the session has no transpiler
    #[error("No transpiler registered for '{0}'")]
    NoTranspiler(String),

    /// A format string the loader does not know
    #[error("Unknown module format '{0}'")]
    UnknownFormat(String),

    /// Transpilation produced error diagnostics and the project forbids emitting
    #[error("Unable to compile TypeScript:\n{diagnostics}")]
    Transpile {
        /// Module URL
        url: String,
        /// Formatted diagnostics
        diagnostics: String,
    },

    /// The host's native import failed
    #[error("Cannot import '{url}': {reason}")]
    Import {
        /// Module URL
        url: String,
        /// Reason for failure
        reason: String,
    },

    /// A fallback resolver rejected a specifier
    #[error("Error resolving module '{specifier}': {reason}")]
    Resolution {
        /// Module specifier
        specifier: String,
        /// Reason for failure
        reason: String,
    },

    /// Evaluation was requested before the module graph was linked
    #[error("Module '{0}' has not been linked")]
    NotLinked(String),

    /// Linking failed for a module
    #[error("Linking '{url}' failed: {reason}")]
    Link {
        /// Module URL
        url: String,
        /// Reason for failure
        reason: String,
    },

    /// Evaluation failed (or failed previously) for a module
    #[error("Evaluating '{url}' failed: {reason}")]
    Evaluation {
        /// Module URL
        url: String,
        /// Reason for failure
        reason: String,
    },

    /// A synthetic module tried to set an export it never declared
    #[error("ReferenceError: Export '{name}' is not defined in module '{url}'")]
    UnknownExport {
        /// Module URL
        url: String,
        /// Export name
        name: String,
    },

    /// The entry point resolved to something other than a static module
    #[error("Entry point '{0}' is not a TypeScript module")]
    InvalidEntry(String),

    /// Error raised by the host runtime
    #[error("{0}")]
    Host(String),
}

impl LoaderError {
    /// Create a host error
    pub fn host(msg: impl Into<String>) -> Self {
        Self::Host(msg.into())
    }

    /// Create a native import error
    pub fn import(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Import {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an evaluation error
    pub fn evaluation(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Evaluation {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_url(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transpile_error_message() {
        let err = LoaderError::Transpile {
            url: "file:///app/main.ts".to_string(),
            diagnostics: "main.ts: error: Unexpected token".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unable to compile TypeScript:\nmain.ts: error: Unexpected token"
        );
    }

    #[test]
    fn test_unknown_export_message() {
        let err = LoaderError::UnknownExport {
            url: "lodash".to_string(),
            name: "missing".to_string(),
        };
        assert!(err.to_string().starts_with("ReferenceError"));
    }
}
