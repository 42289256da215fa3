// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! oxc-based transpilation engine

use super::{Diagnostic, Transpile, TranspileOutput};
use crate::config::{CompilerOptions, JsxEmit};
use oxc_allocator::Allocator;
use oxc_ast::ast::{Program, Statement};
use oxc_codegen::Codegen;
use oxc_diagnostics::OxcDiagnostic;
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use oxc_transformer::{JsxRuntime, TransformOptions, Transformer};
use std::borrow::Cow;
use std::path::Path;

/// Strips types and lowers TypeScript-only syntax with oxc
#[derive(Debug, Default, Clone, Copy)]
pub struct OxcTranspiler;

impl OxcTranspiler {
    /// Create the engine
    pub fn new() -> Self {
        Self
    }
}

impl Transpile for OxcTranspiler {
    fn transpile(
        &self,
        source: &str,
        file_name: &Path,
        options: &CompilerOptions,
    ) -> TranspileOutput {
        let allocator = Allocator::default();
        let source_type = SourceType::from_path(file_name)
            .unwrap_or_else(|_| SourceType::ts())
            .with_module(true);

        let mut diagnostics = Vec::new();

        let parsed = Parser::new(&allocator, source, source_type).parse();
        collect(&mut diagnostics, parsed.errors, file_name);
        let mut program = parsed.program;

        if parsed.panicked {
            return TranspileOutput {
                output_text: String::new(),
                diagnostics,
                dependencies: Some(Vec::new()),
            };
        }

        let semantic = SemanticBuilder::new()
            .with_excess_capacity(2.0)
            .build(&program);
        collect(&mut diagnostics, semantic.errors, file_name);
        let scoping = semantic.semantic.into_scoping();

        let transform_options = transform_options(options);
        let transformed = Transformer::new(&allocator, file_name, &transform_options)
            .build_with_scoping(scoping, &mut program);
        collect(&mut diagnostics, transformed.errors, file_name);

        TranspileOutput {
            output_text: Codegen::new().build(&program).code,
            diagnostics,
            dependencies: Some(static_dependencies(&program)),
        }
    }
}

/// Specifiers of value imports and re-exports left after the transform, in
/// source order and without duplicates
fn static_dependencies(program: &Program) -> Vec<String> {
    let mut specifiers: Vec<String> = Vec::new();

    for statement in &program.body {
        let source = match statement {
            Statement::ImportDeclaration(decl) if !decl.import_kind.is_type() => {
                Some(&decl.source)
            }
            Statement::ExportAllDeclaration(decl) if !decl.export_kind.is_type() => {
                Some(&decl.source)
            }
            Statement::ExportNamedDeclaration(decl) if !decl.export_kind.is_type() => {
                decl.source.as_ref()
            }
            _ => None,
        };

        if let Some(source) = source {
            let specifier = source.value.as_str();
            if !specifiers.iter().any(|s| s == specifier) {
                specifiers.push(specifier.to_string());
            }
        }
    }

    specifiers
}

fn collect(diagnostics: &mut Vec<Diagnostic>, errors: Vec<OxcDiagnostic>, file_name: &Path) {
    diagnostics.extend(
        errors
            .into_iter()
            .map(|e| Diagnostic::error(e.to_string(), Some(file_name.to_path_buf()))),
    );
}

/// Map compiler options onto the oxc transformer
fn transform_options(options: &CompilerOptions) -> TransformOptions {
    let mut transform = TransformOptions::default();

    match options.jsx {
        Some(JsxEmit::Preserve | JsxEmit::ReactNative) => {
            transform.jsx.jsx_plugin = false;
        }
        Some(JsxEmit::React) => {
            transform.jsx.runtime = JsxRuntime::Classic;
            transform.jsx.pragma = options.jsx_factory.clone();
            transform.jsx.pragma_frag = options.jsx_fragment_factory.clone();
            if let Some(factory) = &options.jsx_factory {
                transform.typescript.jsx_pragma = Cow::Owned(factory.clone());
            }
            if let Some(fragment) = &options.jsx_fragment_factory {
                transform.typescript.jsx_pragma_frag = Cow::Owned(fragment.clone());
            }
        }
        Some(JsxEmit::ReactJsx) | None => {
            transform.jsx.runtime = JsxRuntime::Automatic;
            transform.jsx.import_source = options.jsx_import_source.clone();
        }
        Some(JsxEmit::ReactJsxDev) => {
            transform.jsx.runtime = JsxRuntime::Automatic;
            transform.jsx.development = true;
            transform.jsx.import_source = options.jsx_import_source.clone();
        }
    }

    transform.decorator.legacy = options.experimental_decorators;
    transform.decorator.emit_decorator_metadata = options.emit_decorator_metadata;
    transform.typescript.only_remove_type_imports = options.verbatim_module_syntax;

    transform
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transpile(source: &str, file: &str) -> TranspileOutput {
        OxcTranspiler::new().transpile(
            source,
            Path::new(file),
            &CompilerOptions::default().for_transpile(),
        )
    }

    #[test]
    fn test_strips_types() {
        let out = transpile(
            "interface Point { x: number }\nexport const origin: Point = { x: 0 };\n",
            "point.ts",
        );
        assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
        assert!(!out.output_text.contains("interface"));
        assert!(out.output_text.contains("export const origin = { x: 0 };"));
    }

    #[test]
    fn test_removes_type_only_imports() {
        let out = transpile(
            "import type { Shape } from './shape';\nimport { area } from './area';\nexport const a: Shape = area;\n",
            "main.ts",
        );
        assert!(!out.output_text.contains("./shape"));
        assert!(out.output_text.contains("./area"));
    }

    #[test]
    fn test_dependencies_come_from_the_parse() {
        let out = transpile(
            "import type { Shape } from './shape';\n\
             import { area } from './area';\n\
             import './side-effect';\n\
             export * from './all';\n\
             export { scale } from './area';\n\
             export const usage: string = `\n\
             import thing from 'not-a-dependency'\n\
             `;\n\
             const note = \"export * from 'nor-this'\";\n\
             export const a: Shape = area(note);\n",
            "main.ts",
        );
        assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
        assert_eq!(
            out.dependencies,
            Some(vec![
                "./area".to_string(),
                "./side-effect".to_string(),
                "./all".to_string(),
            ])
        );
    }

    #[test]
    fn test_syntax_error_is_a_diagnostic() {
        let out = transpile("export const = ;\n", "broken.ts");
        assert!(!out.diagnostics.is_empty());
        assert!(out.diagnostics.iter().all(Diagnostic::is_error));
        assert_eq!(
            out.diagnostics[0].file.as_deref(),
            Some(Path::new("broken.ts"))
        );
    }

    #[test]
    fn test_transform_options_mapping() {
        let options = CompilerOptions {
            jsx: Some(JsxEmit::React),
            jsx_factory: Some("h".to_string()),
            experimental_decorators: true,
            verbatim_module_syntax: true,
            ..CompilerOptions::default()
        };
        let transform = transform_options(&options);
        assert_eq!(transform.jsx.runtime, JsxRuntime::Classic);
        assert_eq!(transform.jsx.pragma.as_deref(), Some("h"));
        assert!(transform.decorator.legacy);
        assert!(transform.typescript.only_remove_type_imports);
    }
}
