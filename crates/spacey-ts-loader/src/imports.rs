// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Static dependency scanning for transpiled modules
//!
//! Finds the specifiers a module declares at link time:
//! - `import foo from 'module'`, `import { a, b as c } from 'module'`
//! - `import * as ns from 'module'`, `import 'module'`
//! - `export { a } from 'module'`, `export * from 'module'`, `export * as ns from 'module'`
//!
//! Dynamic `import()` calls are not dependencies; they are loaded when the
//! running module asks for them.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// `import <clause> from '<specifier>'` and side-effect `import '<specifier>'`
static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^[ \t]*import[ \t]*(?:[\w$*{}\s,]+?[ \t\n]from[ \t]*)?['"]([^'"\n]+)['"]"#,
    )
    .expect("import pattern is valid")
});

/// `export { ... } from '<specifier>'`, `export * from '<specifier>'`, `export * as ns from '<specifier>'`
static REEXPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^[ \t]*export[ \t]*(?:\*(?:\s+as\s+[\w$]+)?|\{[^}]*\})\s*from[ \t]*['"]([^'"\n]+)['"]"#,
    )
    .expect("re-export pattern is valid")
});

/// Dependency specifiers of `source`, in source order, without duplicates.
pub fn scan_static_imports(source: &str) -> Vec<String> {
    let mut found: Vec<(usize, &str)> = IMPORT_RE
        .captures_iter(source)
        .chain(REEXPORT_RE.captures_iter(source))
        .filter_map(|cap| cap.get(1))
        .map(|m| (m.start(), m.as_str()))
        .collect();
    found.sort_by_key(|(offset, _)| *offset);

    let mut seen = HashSet::new();
    found
        .into_iter()
        .filter(|(_, specifier)| seen.insert(*specifier))
        .map(|(_, specifier)| specifier.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_imports() {
        let source = r#"
            import foo from 'foo';
            import { bar, baz as qux } from "bar";
            import * as all from 'all';
            import 'side-effect';
            import def, { named } from './mixed.ts';
        "#;

        assert_eq!(
            scan_static_imports(source),
            vec!["foo", "bar", "all", "side-effect", "./mixed.ts"]
        );
    }

    #[test]
    fn test_multiline_named_imports() {
        let source = "import {\n  a,\n  b,\n} from './Actions/Action1';\nconsole.log(a, b);\n";
        assert_eq!(scan_static_imports(source), vec!["./Actions/Action1"]);
    }

    #[test]
    fn test_parse_reexports_in_order() {
        let source = r#"
            export * from 'reexport';
            import x from './x';
            export * as ns from 'namespace';
            export { foo, bar as baz } from './named';
            export { local };
            export default function() {}
        "#;

        assert_eq!(
            scan_static_imports(source),
            vec!["reexport", "./x", "namespace", "./named"]
        );
    }

    #[test]
    fn test_dynamic_imports_and_duplicates_skipped() {
        let source = r#"
            import { a } from './a';
            import { b } from './a';
            const { logMessage } = await import('./randomTask');
            const later = () => import("./lazy");
        "#;

        assert_eq!(scan_static_imports(source), vec!["./a"]);
    }
}
