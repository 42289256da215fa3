// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # spacey-ts-loader
//!
//! An ES module loader that lets a script host import TypeScript directly.
//!
//! TypeScript modules are transpiled on first import, linked into a module
//! graph with their dependencies and evaluated by the host. Everything else
//! (built-ins, packages, JSON, plain JavaScript) is imported natively by the
//! host and wrapped so TypeScript can bind to it.
//!
//! - Resolution: built-ins, bare specifiers, relative paths and extensionless
//!   imports probed for a single TypeScript file
//! - Transpilation with oxc, honoring the nearest `tsconfig.json`
//! - One record per canonical URL, shared by static and dynamic imports
//! - Import cycles and `import()` during evaluation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use spacey_ts_loader::{LoaderSession, instantiate_or_exit};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let session = LoaderSession::new(Arc::new(MyHost::default()))?;
//!     let program = instantiate_or_exit(&session, "src/main.ts").await;
//!     program.execute().await?;
//!     Ok(())
//! }
//! ```
//!
//! The host implements [`ScriptHost`]: a native `import` and an `evaluate`
//! primitive for transpiled modules.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod config;
pub mod entry;
pub mod error;
pub mod host;
pub mod imports;
pub mod linker;
pub mod module_record;
pub mod resolver;
pub mod session;
pub mod transpiler;
pub mod typescript;
pub mod value;

// Re-exports
pub use cache::ModuleCache;
pub use config::{CompilerOptions, ConfigResolver};
pub use entry::{Instance, instantiate_or_exit};
pub use error::{LoaderError, Result};
pub use host::{DynamicImporter, EvaluationScope, ScriptHost};
pub use module_record::{
    EvaluationStatus, ImportMeta, LinkingStatus, ModuleRecord, StaticModule, SyntheticModule,
};
pub use resolver::{FallbackResolver, Format, ResolvedModule, SpecifierResolver};
pub use session::{LoaderSession, LoaderSessionBuilder};
pub use transpiler::{OxcTranspiler, Transpile, TranspiledUnit, TranspilerAdapter};
pub use typescript::{TS_EXTENSIONS, is_typescript_file};
pub use value::{HostHandle, Namespace, Properties, Value};

/// Version of the loader
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
