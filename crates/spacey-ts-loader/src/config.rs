// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Compiler options from the project's `tsconfig.json`.
//!
//! Options are resolved once per loader session: the first lookup walks up
//! from its start directory to the nearest `tsconfig.json`, and every later
//! lookup returns that result no matter where it starts. A missing, unreadable
//! or malformed config never fails a load; it falls back to
//! [`CompilerOptions::default`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Name of the project configuration file.
pub const CONFIG_FILE_NAME: &str = "tsconfig.json";

/// Defines the `FromStr`/`Display`/serde glue for a case-insensitive tsconfig enum.
macro_rules! tsconfig_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $( $(#[$vmeta:meta])* $variant:ident => $canon:literal $(| $alias:literal)* ),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_lowercase().as_str() {
                    $( $canon $(| $alias)* => Ok($name::$variant), )+
                    other => Err(format!(
                        "unknown {} '{}'",
                        stringify!($name),
                        other
                    )),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let name = match self {
                    $( $name::$variant => $canon ),+
                };
                f.write_str(name)
            }
        }
    };
}

tsconfig_enum! {
    /// `compilerOptions.target`
    pub enum ScriptTarget {
        /// ES3
        Es3 => "es3",
        /// ES5
        Es5 => "es5",
        /// ES2015
        Es2015 => "es2015" | "es6",
        /// ES2016
        Es2016 => "es2016",
        /// ES2017
        Es2017 => "es2017",
        /// ES2018
        Es2018 => "es2018",
        /// ES2019
        Es2019 => "es2019",
        /// ES2020
        Es2020 => "es2020",
        /// ES2021
        Es2021 => "es2021",
        /// ES2022
        Es2022 => "es2022",
        /// ES2023
        Es2023 => "es2023",
        /// ES2024
        Es2024 => "es2024",
        /// Latest
        EsNext => "esnext",
    }
}

tsconfig_enum! {
    /// `compilerOptions.module`
    pub enum ModuleKind {
        /// No module system
        None => "none",
        /// CommonJS
        CommonJs => "commonjs",
        /// AMD
        Amd => "amd",
        /// UMD
        Umd => "umd",
        /// SystemJS
        System => "system",
        /// ES2015 modules
        Es2015 => "es2015" | "es6",
        /// ES2020 modules
        Es2020 => "es2020",
        /// ES2022 modules
        Es2022 => "es2022",
        /// Latest ES modules
        EsNext => "esnext",
        /// Node 16 hybrid
        Node16 => "node16",
        /// Node latest hybrid
        NodeNext => "nodenext",
        /// Preserve import/export syntax as written
        Preserve => "preserve",
    }
}

tsconfig_enum! {
    /// `compilerOptions.moduleResolution`
    pub enum ModuleResolution {
        /// Pre-1.6 resolution
        Classic => "classic",
        /// Node CommonJS resolution
        Node10 => "node10" | "node" | "nodejs",
        /// Node 16 resolution
        Node16 => "node16",
        /// Node latest resolution
        NodeNext => "nodenext",
        /// Bundler resolution
        Bundler => "bundler",
    }
}

tsconfig_enum! {
    /// `compilerOptions.jsx`
    pub enum JsxEmit {
        /// Keep JSX as written
        Preserve => "preserve",
        /// Classic `React.createElement` calls
        React => "react",
        /// Automatic runtime
        ReactJsx => "react-jsx",
        /// Automatic runtime, development build
        ReactJsxDev => "react-jsxdev",
        /// React Native (keeps JSX)
        ReactNative => "react-native",
    }
}

/// Normalized compiler options.
///
/// Fields the config file leaves out take the loader defaults, so a found
/// config only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompilerOptions {
    /// Output language level
    pub target: ScriptTarget,
    /// Output module system
    pub module: ModuleKind,
    /// Module resolution strategy
    pub module_resolution: Option<ModuleResolution>,
    /// JSX emit mode
    pub jsx: Option<JsxEmit>,
    /// Classic JSX factory (`React.createElement`)
    pub jsx_factory: Option<String>,
    /// Classic JSX fragment factory (`React.Fragment`)
    pub jsx_fragment_factory: Option<String>,
    /// Automatic JSX runtime import source
    pub jsx_import_source: Option<String>,
    /// Allow JavaScript sources
    pub allow_js: bool,
    /// Skip checking declaration files
    pub skip_lib_check: bool,
    /// Strict type checking family
    pub strict: bool,
    /// Allow default imports from modules without a default export
    pub allow_synthetic_default_imports: bool,
    /// Legacy (stage 2) decorators
    pub experimental_decorators: bool,
    /// Emit design-type metadata for decorators
    pub emit_decorator_metadata: bool,
    /// Keep every import not written as `import type`
    pub verbatim_module_syntax: bool,
    /// Refuse to emit output when diagnostics contain errors
    pub no_emit_on_error: bool,
    /// Base directory for non-relative module names
    pub base_url: Option<PathBuf>,
    /// Root of the input files
    pub root_dir: Option<PathBuf>,
    /// Options the loader does not interpret
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            target: ScriptTarget::EsNext,
            module: ModuleKind::EsNext,
            module_resolution: Some(ModuleResolution::Node10),
            jsx: None,
            jsx_factory: None,
            jsx_fragment_factory: None,
            jsx_import_source: None,
            allow_js: true,
            skip_lib_check: true,
            strict: false,
            allow_synthetic_default_imports: false,
            experimental_decorators: false,
            emit_decorator_metadata: false,
            verbatim_module_syntax: false,
            no_emit_on_error: false,
            base_url: None,
            root_dir: None,
            extra: BTreeMap::new(),
        }
    }
}

impl CompilerOptions {
    /// The options every module is transpiled with: the project's options with
    /// ES module output, latest target and permissive checking forced on.
    pub fn for_transpile(&self) -> Self {
        Self {
            target: ScriptTarget::EsNext,
            module: ModuleKind::EsNext,
            skip_lib_check: true,
            strict: false,
            allow_synthetic_default_imports: true,
            ..self.clone()
        }
    }

    /// Parse the `compilerOptions` of a tsconfig document.
    ///
    /// Relative `baseUrl` and `rootDir` are made absolute against `config_dir`.
    pub fn from_tsconfig(content: &str, config_dir: &Path) -> Result<Self, String> {
        let stripped = strip_json_comments(content);
        let raw: RawTsConfig = serde_json::from_str(&stripped).map_err(|e| e.to_string())?;

        let mut options = match raw.compiler_options {
            Some(value) => {
                serde_json::from_value::<CompilerOptions>(value).map_err(|e| e.to_string())?
            }
            None => CompilerOptions::default(),
        };

        options.base_url = options.base_url.map(|p| config_dir.join(p));
        options.root_dir = options.root_dir.map(|p| config_dir.join(p));

        Ok(options)
    }
}

/// Top-level shape of a tsconfig file; only `compilerOptions` is read.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTsConfig {
    #[serde(default)]
    compiler_options: Option<serde_json::Value>,
}

/// Find the nearest config file at or above `start`.
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

/// Load options starting the search at `start`, degrading to defaults.
pub fn load_compiler_options(start: &Path) -> CompilerOptions {
    let Some(config_path) = find_config_file(start) else {
        debug!("No {} above {}, using defaults", CONFIG_FILE_NAME, start.display());
        return CompilerOptions::default();
    };

    let content = match std::fs::read_to_string(&config_path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Cannot read {}: {}, using defaults", config_path.display(), e);
            return CompilerOptions::default();
        }
    };

    let config_dir = config_path.parent().unwrap_or(Path::new("."));
    match CompilerOptions::from_tsconfig(&content, config_dir) {
        Ok(options) => {
            debug!("Loaded compiler options from {}", config_path.display());
            options
        }
        Err(reason) => {
            warn!("Invalid {}: {}, using defaults", config_path.display(), reason);
            CompilerOptions::default()
        }
    }
}

/// Session-wide root path and compiler options, each fixed by its first use.
#[derive(Debug, Default)]
pub struct ConfigResolver {
    root_path: OnceLock<PathBuf>,
    options: OnceCell<Arc<CompilerOptions>>,
}

impl ConfigResolver {
    /// Create a resolver with nothing resolved yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the root path if none is set yet; returns the effective root.
    pub fn set_root_path(&self, path: &Path) -> &Path {
        self.root_path.get_or_init(|| path.to_path_buf())
    }

    /// The root path, or the current directory before any module was transpiled
    pub fn root_path(&self) -> PathBuf {
        match self.root_path.get() {
            Some(path) => path.clone(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Compiler options for the session. The first call decides them.
    ///
    /// The config walk and read run on the blocking pool.
    pub async fn compiler_options(&self, start: &Path) -> Arc<CompilerOptions> {
        let options = self
            .options
            .get_or_init(|| async {
                let start = start.to_path_buf();
                match tokio::task::spawn_blocking(move || load_compiler_options(&start)).await {
                    Ok(options) => Arc::new(options),
                    Err(e) => {
                        warn!("Config lookup failed: {}, using defaults", e);
                        Arc::new(CompilerOptions::default())
                    }
                }
            })
            .await;
        Arc::clone(options)
    }
}

/// Remove `//` and `/* */` comments and trailing commas so tsconfig files
/// parse as plain JSON. String contents are left untouched.
fn strip_json_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();
    let mut in_string = false;

    while let Some((offset, c)) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some((_, escaped)) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        let next = chars.peek().map(|&(_, next)| next);
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if next == Some('/') => {
                for (_, next) in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if next == Some('*') => {
                chars.next();
                let mut prev = '\0';
                for (_, next) in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            ',' => {
                // Drop the comma when only whitespace/comments precede a closer
                let rest = strip_json_comments_prefix(&input[offset + c.len_utf8()..]);
                if !(rest.starts_with('}') || rest.starts_with(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }

    out
}

/// Skip leading whitespace and comments.
fn strip_json_comments_prefix(s: &str) -> &str {
    let mut rest = s.trim_start();
    loop {
        if let Some(after) = rest.strip_prefix("//") {
            rest = after.split_once('\n').map_or("", |(_, tail)| tail).trim_start();
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map_or("", |(_, tail)| tail).trim_start();
        } else {
            return rest;
        }
    }
}
