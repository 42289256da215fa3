// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module linking and evaluation
//!
//! Linking walks the graph breadth-first. Each round resolves the declared
//! dependencies of every module on the frontier concurrently; the modules
//! those resolve to form the next frontier. Once no unlinked module is left,
//! every module visited is linked.
//!
//! Static and dynamic imports share one path, [`LoaderSession::linker`], so a
//! URL always maps to the same cache slot and the same record.

use crate::error::{LoaderError, Result};
use crate::host::{DynamicImporter, EvaluationScope};
use crate::module_record::{
    EvaluationStep, LinkingStatus, ModuleRecord, StaticModule, SyntheticModule,
};
use crate::resolver::{Format, ResolvedModule};
use crate::session::LoaderSession;
use crate::value::{Namespace, Properties};
use futures::future::{BoxFuture, FutureExt, try_join_all};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

impl LoaderSession {
    /// Record for a resolved module, created on first request.
    ///
    /// TypeScript is transpiled into a [`StaticModule`]; anything else is
    /// imported natively and wrapped in a [`SyntheticModule`]. Concurrent
    /// requests for one URL share a single creation.
    pub async fn link_module(&self, resolved: &ResolvedModule) -> Result<ModuleRecord> {
        self.cached_or_create(resolved, false).await
    }

    pub(crate) async fn cached_or_create(
        &self,
        resolved: &ResolvedModule,
        main: bool,
    ) -> Result<ModuleRecord> {
        let slot = self.cache.slot(&resolved.url);
        if let Some(record) = slot.get() {
            debug!("Cache hit for {}", resolved.url);
            return Ok(record.clone());
        }

        let record = slot
            .get_or_try_init(|| self.create_record(resolved, main))
            .await?;
        Ok(record.clone())
    }

    async fn create_record(&self, resolved: &ResolvedModule, main: bool) -> Result<ModuleRecord> {
        match resolved.format {
            Format::Dynamic => {
                let transpiler = self
                    .transpiler
                    .as_ref()
                    .ok_or_else(|| LoaderError::NoTranspiler(resolved.url.clone()))?;

                let mut unit = transpiler.transpile(&resolved.url).await?;
                let dependencies = match unit.dependencies.take() {
                    Some(dependencies) => dependencies,
                    None => self.host.dependency_specifiers(&unit.code),
                };
                debug!(
                    "Created static module {} ({} dependencies)",
                    resolved.url,
                    dependencies.len()
                );

                let module = StaticModule::new(unit, dependencies);
                let module = if main { module.into_main() } else { module };
                Ok(ModuleRecord::Static(Arc::new(module)))
            }
            Format::Builtin | Format::Commonjs | Format::Json | Format::Module | Format::Wasm => {
                let namespace = self.host.import(&resolved.url).await?;
                let module = SyntheticModule::from_namespace(&resolved.url, &namespace);
                debug!(
                    "Created synthetic module {} ({} exports)",
                    resolved.url,
                    module.export_names().len()
                );
                Ok(ModuleRecord::Synthetic(Arc::new(module)))
            }
        }
    }

    /// Resolve `specifier` against `referrer` and return its record
    pub async fn linker(&self, specifier: &str, referrer: &str) -> Result<ModuleRecord> {
        let resolved = self.resolve(specifier, Some(referrer), None).await?;
        debug!("Resolved '{}' from {} -> {}", specifier, referrer, resolved.url);
        self.link_module(&resolved).await
    }

    /// Link `root` and every static module reachable from it.
    pub async fn link(&self, root: &Arc<StaticModule>) -> Result<()> {
        match root.linking_status() {
            LinkingStatus::Linked => return Ok(()),
            LinkingStatus::Errored => return Err(link_error(root)),
            LinkingStatus::Unlinked | LinkingStatus::Linking => {}
        }

        let mut seen: HashSet<String> = HashSet::from([root.url().to_string()]);
        let mut frontier = vec![Arc::clone(root)];
        let mut visited = Vec::new();

        while !frontier.is_empty() {
            let round = try_join_all(frontier.iter().map(|module| self.link_imports(module))).await;
            let imports = match round {
                Ok(imports) => imports,
                Err(e) => {
                    root.fail_linking(&e);
                    return Err(e);
                }
            };

            let mut next = Vec::new();
            for record in imports.into_iter().flatten() {
                let ModuleRecord::Static(module) = record else {
                    continue;
                };
                match module.linking_status() {
                    LinkingStatus::Linked => {}
                    LinkingStatus::Errored => {
                        let e = link_error(&module);
                        root.fail_linking(&e);
                        return Err(e);
                    }
                    LinkingStatus::Unlinked | LinkingStatus::Linking => {
                        if seen.insert(module.url().to_string()) {
                            next.push(module);
                        }
                    }
                }
            }

            visited.append(&mut frontier);
            frontier = next;
        }

        for module in &visited {
            module.finish_linking();
        }
        debug!("Linked {} ({} modules)", root.url(), visited.len());
        Ok(())
    }

    /// Bind the declared imports of one module, resolving them concurrently.
    async fn link_imports(&self, module: &Arc<StaticModule>) -> Result<Vec<ModuleRecord>> {
        module.begin_linking();

        let imports = module
            .import_table()
            .get_or_try_init(|| async {
                let records = try_join_all(
                    module
                        .dependency_specifiers()
                        .iter()
                        .map(|specifier| self.linker(specifier, module.url())),
                )
                .await?;
                Ok::<_, LoaderError>(
                    module
                        .dependency_specifiers()
                        .iter()
                        .cloned()
                        .zip(records)
                        .collect::<IndexMap<_, _>>(),
                )
            })
            .await;

        match imports {
            Ok(imports) => Ok(imports.values().cloned().collect()),
            Err(e) => {
                module.fail_linking(&e);
                Err(e)
            }
        }
    }

    /// Evaluate a linked module and its dependencies; returns its namespace.
    pub fn evaluate<'a>(
        self: &'a Arc<Self>,
        record: &'a ModuleRecord,
    ) -> BoxFuture<'a, Result<Namespace>> {
        async move {
            match record {
                ModuleRecord::Synthetic(module) => module.evaluate(),
                ModuleRecord::Static(module) => self.evaluate_static(module).await,
            }
        }
        .boxed()
    }

    async fn evaluate_static(self: &Arc<Self>, module: &Arc<StaticModule>) -> Result<Namespace> {
        match module.begin_evaluation()? {
            EvaluationStep::Done(namespace) => return Ok(namespace),
            EvaluationStep::InProgress(namespace) => {
                debug!("{} is still evaluating, using its partial namespace", module.url());
                return Ok(namespace);
            }
            EvaluationStep::Run => {}
        }

        debug!("Evaluating {}", module.url());
        match self.run_module(module).await {
            Ok(exports) => Ok(module.finish_evaluation(exports)),
            Err(e) => {
                module.fail_evaluation(&e);
                Err(e)
            }
        }
    }

    async fn run_module(self: &Arc<Self>, module: &Arc<StaticModule>) -> Result<Properties> {
        let mut namespaces = IndexMap::new();
        if let Some(imports) = module.imports() {
            for (specifier, record) in imports {
                namespaces.insert(specifier.clone(), self.evaluate(record).await?);
            }
        }

        let scope = EvaluationScope {
            imports: namespaces,
            import_meta: module.import_meta().clone(),
            dynamic: DynamicImporter::new(Arc::clone(self), module.url()),
        };
        self.host.evaluate(module, scope).await
    }

    /// `import()` hook: resolve, link and evaluate before handing back the namespace.
    pub async fn import_dynamically(
        self: &Arc<Self>,
        specifier: &str,
        referrer: &str,
    ) -> Result<Namespace> {
        let record = self.linker(specifier, referrer).await?;
        if let ModuleRecord::Static(module) = &record {
            self.link(module).await?;
        }
        self.evaluate(&record).await
    }
}

fn link_error(module: &StaticModule) -> LoaderError {
    LoaderError::Link {
        url: module.url().to_string(),
        reason: module
            .error()
            .unwrap_or_else(|| "dependency failed to link".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ScriptHost;
    use crate::module_record::EvaluationStatus;
    use crate::value::Value;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tempfile::tempdir;
    use url::Url;

    /// Exports `name` = number of the module's imports; records evaluation order.
    #[derive(Default)]
    struct CountingHost {
        order: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ScriptHost for CountingHost {
        async fn import(&self, url: &str) -> Result<Namespace> {
            if url == "missing" {
                return Err(LoaderError::import(url, "Cannot find package"));
            }
            Ok(Arc::new(
                [("name".to_string(), Value::from(url))].into_iter().collect(),
            ))
        }

        async fn evaluate(
            &self,
            module: &StaticModule,
            scope: EvaluationScope,
        ) -> Result<Properties> {
            self.order.lock().push(module.url().to_string());
            if module.code().contains("throw") {
                return Err(LoaderError::host("boom"));
            }
            Ok([("imports".to_string(), Value::from(scope.imports.len() as f64))]
                .into_iter()
                .collect())
        }
    }

    fn session(host: Arc<CountingHost>, dir: &std::path::Path) -> Arc<LoaderSession> {
        LoaderSession::builder(host)
            .base_url(Url::from_directory_path(dir).unwrap())
            .build()
            .unwrap()
    }

    fn write(dir: &std::path::Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[tokio::test]
    async fn test_cycle_links_and_evaluates() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.ts", "import { b } from './b';\nexport const a = () => b;\n");
        write(dir.path(), "b.ts", "import { a } from './a';\nexport const b = () => a;\n");

        let host = Arc::new(CountingHost::default());
        let session = session(host.clone(), dir.path());

        let record = session.linker("./a.ts", session.base_url().as_str()).await.unwrap();
        let a = record.as_static().unwrap();
        session.link(a).await.unwrap();
        assert_eq!(a.linking_status(), LinkingStatus::Linked);

        let b = session.cache().get(&format!("{}b.ts", session.base_url())).unwrap();
        assert_eq!(b.as_static().unwrap().linking_status(), LinkingStatus::Linked);

        session.evaluate(&record).await.unwrap();
        assert_eq!(a.status(), EvaluationStatus::Evaluated);
        assert_eq!(b.status(), EvaluationStatus::Evaluated);

        // b runs first, seeing a's still-empty namespace
        let order = host.order.lock().clone();
        assert_eq!(order.len(), 2);
        assert!(order[0].ends_with("b.ts"));
    }

    #[tokio::test]
    async fn test_link_failure_marks_errored() {
        let dir = tempdir().unwrap();
        write(dir.path(), "main.ts", "import 'missing';\n");

        let session = session(Arc::new(CountingHost::default()), dir.path());
        let record = session.linker("./main.ts", session.base_url().as_str()).await.unwrap();
        let main = record.as_static().unwrap();

        let err = session.link(main).await.unwrap_err();
        assert!(matches!(err, LoaderError::Import { .. }));
        assert_eq!(main.linking_status(), LinkingStatus::Errored);
        assert!(matches!(session.link(main).await, Err(LoaderError::Link { .. })));
        assert!(matches!(
            session.evaluate(&record).await,
            Err(LoaderError::Link { .. })
        ));
    }

    #[tokio::test]
    async fn test_import_text_in_template_is_not_a_dependency() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "main.ts",
            "export const usage: string = `\nimport thing from 'missing'\n`;\n",
        );

        let session = session(Arc::new(CountingHost::default()), dir.path());
        let record = session.linker("./main.ts", session.base_url().as_str()).await.unwrap();
        let main = record.as_static().unwrap();
        assert!(main.dependency_specifiers().is_empty());

        session.link(main).await.unwrap();
        assert_eq!(main.linking_status(), LinkingStatus::Linked);
        assert!(!session.cache().contains("missing"));
    }

    #[tokio::test]
    async fn test_evaluation_error_is_sticky() {
        let dir = tempdir().unwrap();
        write(dir.path(), "bad.ts", "throw new Error('boom');\n");

        let host = Arc::new(CountingHost::default());
        let session = session(host.clone(), dir.path());
        let record = session.linker("./bad.ts", session.base_url().as_str()).await.unwrap();
        session.link(record.as_static().unwrap()).await.unwrap();

        assert!(matches!(session.evaluate(&record).await, Err(LoaderError::Host(_))));
        assert!(matches!(
            session.evaluate(&record).await,
            Err(LoaderError::Evaluation { .. })
        ));
        assert_eq!(host.order.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_evaluate_requires_link() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.ts", "export const a = 1;\n");

        let session = session(Arc::new(CountingHost::default()), dir.path());
        let record = session.linker("./a.ts", session.base_url().as_str()).await.unwrap();
        assert!(matches!(
            session.evaluate(&record).await,
            Err(LoaderError::NotLinked(_))
        ));
    }

    #[tokio::test]
    async fn test_import_dynamically_native() {
        let dir = tempdir().unwrap();
        let session = session(Arc::new(CountingHost::default()), dir.path());

        let namespace = session
            .import_dynamically("fs", session.base_url().as_str())
            .await
            .unwrap();
        assert_eq!(namespace.get("name"), Some(&Value::from("fs")));
    }
}
