// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! TypeScript file recognition.
//!
//! A module is routed through the transpiler when its resolved path carries
//! one of [`TS_EXTENSIONS`], or when an extensionless import matches exactly
//! one file with such an extension (see the resolver's extension probe).

use std::path::Path;

/// TypeScript file extensions, without the leading dot.
pub const TS_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts"];

/// Check if a file extension indicates a TypeScript file.
///
/// Returns `true` for `.ts`, `.tsx`, `.mts`, and `.cts` files.
pub fn is_typescript_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(is_typescript_extension)
}

/// Check a bare extension (no leading dot) against [`TS_EXTENSIONS`].
pub fn is_typescript_extension(ext: &str) -> bool {
    TS_EXTENSIONS.contains(&ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_typescript_file() {
        assert!(is_typescript_file(Path::new("file.ts")));
        assert!(is_typescript_file(Path::new("file.tsx")));
        assert!(is_typescript_file(Path::new("file.mts")));
        assert!(is_typescript_file(Path::new("file.cts")));
        assert!(!is_typescript_file(Path::new("file.js")));
        assert!(!is_typescript_file(Path::new("file.d")));
        assert!(!is_typescript_file(Path::new("file")));
    }
}
