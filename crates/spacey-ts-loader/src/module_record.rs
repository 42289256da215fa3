// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module records
//!
//! Two kinds of module live in the graph:
//! - [`StaticModule`]: transpiled TypeScript whose imports are bound at link
//!   time and which the host evaluates once.
//! - [`SyntheticModule`]: a fixed export list wrapped around a value the host
//!   already evaluated (built-ins, packages, JSON...).

use crate::error::{LoaderError, Result};
use crate::transpiler::TranspiledUnit;
use crate::value::{Namespace, Properties, Value};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use url::Url;

/// Linking progress of a static module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkingStatus {
    /// Imports not looked at yet
    Unlinked,
    /// Imports being resolved
    Linking,
    /// Every reachable import is bound
    Linked,
    /// Resolving an import failed
    Errored,
}

/// Evaluation progress of a module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationStatus {
    /// Fresh record
    Uninstantiated,
    /// Part of a graph being linked
    Instantiating,
    /// Linked, ready to evaluate
    Instantiated,
    /// Running
    Evaluating,
    /// Finished, namespace available
    Evaluated,
    /// Evaluation threw
    Errored,
}

/// `import.meta` object
#[derive(Debug, Clone, PartialEq)]
pub struct ImportMeta {
    /// The URL of the current module
    pub url: String,
    /// The directory of the current module
    pub dirname: String,
    /// The filename of the current module
    pub filename: String,
    /// Whether this is the entry module
    pub main: bool,
}

impl ImportMeta {
    /// Create import.meta for a module URL
    pub fn new(url: &str, main: bool) -> Self {
        let path = Url::parse(url).ok().and_then(|u| u.to_file_path().ok());
        let filename = path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let dirname = path
            .as_deref()
            .and_then(Path::parent)
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        Self {
            url: url.to_string(),
            dirname,
            filename,
            main,
        }
    }

    /// Convert to a host value
    pub fn to_value(&self) -> Value {
        Value::object([
            ("url", Value::from(self.url.as_str())),
            ("dirname", Value::from(self.dirname.as_str())),
            ("filename", Value::from(self.filename.as_str())),
            ("main", Value::from(self.main)),
        ])
    }
}

/// What a caller should do after asking a static module to start evaluating
pub(crate) enum EvaluationStep {
    /// Caller owns the evaluation
    Run,
    /// Already evaluated
    Done(Namespace),
    /// Evaluation in progress further up (cycle); use what exists so far
    InProgress(Namespace),
}

#[derive(Debug)]
struct StaticState {
    linking: LinkingStatus,
    status: EvaluationStatus,
    namespace: Option<Namespace>,
    error: Option<String>,
}

/// Transpiled TypeScript module
pub struct StaticModule {
    url: String,
    code: String,
    dependency_specifiers: Vec<String>,
    import_meta: ImportMeta,
    imports: OnceCell<IndexMap<String, ModuleRecord>>,
    state: Mutex<StaticState>,
}

impl StaticModule {
    /// Build a module from a transpiled unit and its declared dependencies
    pub fn new(unit: TranspiledUnit, dependency_specifiers: Vec<String>) -> Self {
        let import_meta = ImportMeta::new(&unit.source_url, false);
        Self {
            url: unit.source_url,
            code: unit.code,
            dependency_specifiers,
            import_meta,
            imports: OnceCell::new(),
            state: Mutex::new(StaticState {
                linking: LinkingStatus::Unlinked,
                status: EvaluationStatus::Uninstantiated,
                namespace: None,
                error: None,
            }),
        }
    }

    /// Mark this module as the program entry (`import.meta.main`)
    pub(crate) fn into_main(mut self) -> Self {
        self.import_meta.main = true;
        self
    }

    /// Module URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Transpiled JavaScript
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Specifiers of static imports and re-exports, in source order
    pub fn dependency_specifiers(&self) -> &[String] {
        &self.dependency_specifiers
    }

    /// `import.meta` for this module
    pub fn import_meta(&self) -> &ImportMeta {
        &self.import_meta
    }

    /// Bound imports (specifier → module), once linking resolved them
    pub fn imports(&self) -> Option<&IndexMap<String, ModuleRecord>> {
        self.imports.get()
    }

    pub(crate) fn import_table(&self) -> &OnceCell<IndexMap<String, ModuleRecord>> {
        &self.imports
    }

    /// Current linking status
    pub fn linking_status(&self) -> LinkingStatus {
        self.state.lock().linking
    }

    /// Current evaluation status
    pub fn status(&self) -> EvaluationStatus {
        self.state.lock().status
    }

    /// Exports, once evaluated
    pub fn namespace(&self) -> Option<Namespace> {
        self.state.lock().namespace.clone()
    }

    /// Error message of a failed link or evaluation
    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    pub(crate) fn begin_linking(&self) {
        let mut state = self.state.lock();
        if state.linking == LinkingStatus::Unlinked {
            state.linking = LinkingStatus::Linking;
            state.status = EvaluationStatus::Instantiating;
        }
    }

    pub(crate) fn finish_linking(&self) {
        let mut state = self.state.lock();
        if matches!(state.linking, LinkingStatus::Linking | LinkingStatus::Unlinked) {
            state.linking = LinkingStatus::Linked;
            if state.status == EvaluationStatus::Instantiating
                || state.status == EvaluationStatus::Uninstantiated
            {
                state.status = EvaluationStatus::Instantiated;
            }
        }
    }

    pub(crate) fn fail_linking(&self, error: &LoaderError) {
        let mut state = self.state.lock();
        state.linking = LinkingStatus::Errored;
        state.status = EvaluationStatus::Errored;
        state.error = Some(error.to_string());
    }

    pub(crate) fn begin_evaluation(&self) -> Result<EvaluationStep> {
        let mut state = self.state.lock();

        if state.linking != LinkingStatus::Linked {
            return match &state.error {
                Some(reason) => Err(LoaderError::Link {
                    url: self.url.clone(),
                    reason: reason.clone(),
                }),
                None => Err(LoaderError::NotLinked(self.url.clone())),
            };
        }

        match state.status {
            EvaluationStatus::Evaluated => Ok(EvaluationStep::Done(
                state.namespace.clone().unwrap_or_default(),
            )),
            EvaluationStatus::Evaluating => Ok(EvaluationStep::InProgress(
                state.namespace.clone().unwrap_or_default(),
            )),
            EvaluationStatus::Errored => Err(LoaderError::evaluation(
                &self.url,
                state.error.as_deref().unwrap_or("previous evaluation failed"),
            )),
            EvaluationStatus::Uninstantiated
            | EvaluationStatus::Instantiating
            | EvaluationStatus::Instantiated => {
                state.status = EvaluationStatus::Evaluating;
                Ok(EvaluationStep::Run)
            }
        }
    }

    pub(crate) fn finish_evaluation(&self, exports: Properties) -> Namespace {
        let namespace = Arc::new(exports);
        let mut state = self.state.lock();
        state.status = EvaluationStatus::Evaluated;
        state.namespace = Some(Arc::clone(&namespace));
        namespace
    }

    pub(crate) fn fail_evaluation(&self, error: &LoaderError) {
        let mut state = self.state.lock();
        state.status = EvaluationStatus::Errored;
        state.error = Some(error.to_string());
    }
}

impl fmt::Debug for StaticModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("StaticModule")
            .field("url", &self.url)
            .field("dependencies", &self.dependency_specifiers)
            .field("linking", &state.linking)
            .field("status", &state.status)
            .finish()
    }
}

/// Export slots handed to a synthetic module's evaluation steps
pub struct SyntheticExports<'a> {
    url: &'a str,
    slots: Properties,
}

impl SyntheticExports<'_> {
    /// Set a declared export. Undeclared names are a ReferenceError.
    pub fn set_export(&mut self, name: &str, value: Value) -> Result<()> {
        match self.slots.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(LoaderError::UnknownExport {
                url: self.url.to_string(),
                name: name.to_string(),
            }),
        }
    }
}

type EvaluationSteps = Box<dyn Fn(&mut SyntheticExports<'_>) -> Result<()> + Send + Sync>;

#[derive(Debug)]
struct SyntheticState {
    status: EvaluationStatus,
    namespace: Option<Namespace>,
}

/// Fixed-export wrapper around an already-evaluated host value
pub struct SyntheticModule {
    url: String,
    export_names: Vec<String>,
    steps: EvaluationSteps,
    state: Mutex<SyntheticState>,
}

impl SyntheticModule {
    /// Create a synthetic module whose `steps` fill `export_names` on evaluation
    pub fn new<F>(url: impl Into<String>, export_names: Vec<String>, steps: F) -> Self
    where
        F: Fn(&mut SyntheticExports<'_>) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            url: url.into(),
            export_names,
            steps: Box::new(steps),
            state: Mutex::new(SyntheticState {
                status: EvaluationStatus::Instantiated,
                namespace: None,
            }),
        }
    }

    /// Wrap a native import result.
    ///
    /// A truthy object `default` export is spread first, so its keys sit
    /// alongside the namespace's own keys; the namespace's own keys win.
    pub fn from_namespace(url: impl Into<String>, namespace: &Properties) -> Self {
        let flattened = flatten_default(namespace);
        let export_names: Vec<String> = flattened.keys().cloned().collect();

        Self::new(url, export_names, move |exports| {
            for (name, value) in &flattened {
                exports.set_export(name, value.clone())?;
            }
            Ok(())
        })
    }

    /// Module URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Declared export names
    pub fn export_names(&self) -> &[String] {
        &self.export_names
    }

    /// Current evaluation status
    pub fn status(&self) -> EvaluationStatus {
        self.state.lock().status
    }

    /// Exports, once evaluated
    pub fn namespace(&self) -> Option<Namespace> {
        self.state.lock().namespace.clone()
    }

    /// Run the evaluation steps once and return the namespace.
    pub fn evaluate(&self) -> Result<Namespace> {
        let mut state = self.state.lock();
        if let Some(namespace) = &state.namespace {
            return Ok(Arc::clone(namespace));
        }

        state.status = EvaluationStatus::Evaluating;
        let mut exports = SyntheticExports {
            url: &self.url,
            slots: self
                .export_names
                .iter()
                .map(|name| (name.clone(), Value::Undefined))
                .collect(),
        };

        match (self.steps)(&mut exports) {
            Ok(()) => {
                let namespace = Arc::new(exports.slots);
                state.status = EvaluationStatus::Evaluated;
                state.namespace = Some(Arc::clone(&namespace));
                Ok(namespace)
            }
            Err(e) => {
                state.status = EvaluationStatus::Errored;
                Err(e)
            }
        }
    }
}

impl fmt::Debug for SyntheticModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntheticModule")
            .field("url", &self.url)
            .field("export_names", &self.export_names)
            .field("status", &self.status())
            .finish()
    }
}

/// Spread a truthy object `default` export under the namespace's own keys.
pub fn flatten_default(namespace: &Properties) -> Properties {
    match namespace.get("default") {
        Some(default) if default.to_boolean() => {
            let mut flattened = default.as_object().cloned().unwrap_or_default();
            for (name, value) in namespace {
                flattened.insert(name.clone(), value.clone());
            }
            flattened
        }
        _ => namespace.clone(),
    }
}

/// A module in the graph
#[derive(Debug, Clone)]
pub enum ModuleRecord {
    /// Transpiled TypeScript
    Static(Arc<StaticModule>),
    /// Wrapped native value
    Synthetic(Arc<SyntheticModule>),
}

impl ModuleRecord {
    /// Module URL
    pub fn url(&self) -> &str {
        match self {
            ModuleRecord::Static(module) => module.url(),
            ModuleRecord::Synthetic(module) => module.url(),
        }
    }

    /// Exports, once evaluated
    pub fn namespace(&self) -> Option<Namespace> {
        match self {
            ModuleRecord::Static(module) => module.namespace(),
            ModuleRecord::Synthetic(module) => module.namespace(),
        }
    }

    /// Evaluation status
    pub fn status(&self) -> EvaluationStatus {
        match self {
            ModuleRecord::Static(module) => module.status(),
            ModuleRecord::Synthetic(module) => module.status(),
        }
    }

    /// The static module, if this is one
    pub fn as_static(&self) -> Option<&Arc<StaticModule>> {
        match self {
            ModuleRecord::Static(module) => Some(module),
            ModuleRecord::Synthetic(_) => None,
        }
    }

    /// Returns true if both records are the same module object
    pub fn ptr_eq(&self, other: &ModuleRecord) -> bool {
        match (self, other) {
            (ModuleRecord::Static(a), ModuleRecord::Static(b)) => Arc::ptr_eq(a, b),
            (ModuleRecord::Synthetic(a), ModuleRecord::Synthetic(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Filesystem path of a `file:` module URL
pub fn module_path(url: &str) -> Result<PathBuf> {
    let parsed = Url::parse(url).map_err(|e| LoaderError::invalid_url(url, e))?;
    parsed
        .to_file_path()
        .map_err(|_| LoaderError::NotAFileUrl(url.to_string()))
}
