//! Entry point resolution and shebang detection.

use path_clean::PathClean;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::resolver::SUPPORTED_EXTENSIONS;
use crate::runtime::Runtime;
use crate::{Error, Result};

static SHEBANG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#![^\n\r]*[\r\n]").expect("shebang pattern is valid"));

/// Resolve `entry` against `cwd` the way `require.resolve` would.
///
/// Tries the path as given, then with each supported extension appended,
/// then `index.<ext>` inside it.
pub fn resolve_entry(runtime: &dyn Runtime, cwd: &Path, entry: &Path) -> Result<PathBuf> {
    let base = cwd.join(entry).clean();

    if runtime.is_file(&base) {
        return Ok(base);
    }

    let base_str = base.to_string_lossy();
    let candidates = SUPPORTED_EXTENSIONS
        .iter()
        .map(|ext| PathBuf::from(format!("{base_str}{ext}")))
        .chain(
            SUPPORTED_EXTENSIONS
                .iter()
                .map(|ext| base.join(format!("index{ext}"))),
        );

    for candidate in candidates {
        if runtime.is_file(&candidate) {
            return Ok(candidate);
        }
    }

    Err(Error::EntryNotFound(base))
}

/// The entry's `#!` line including its line terminator.
pub fn extract_shebang(source: &str) -> Option<&str> {
    SHEBANG.find(source).map(|m| m.as_str())
}

/// Read the resolved entry and return its shebang, if any.
pub async fn read_shebang(runtime: &dyn Runtime, entry: &Path) -> Result<Option<String>> {
    let bytes = runtime.read_file(entry).await?;
    let source = String::from_utf8_lossy(&bytes);
    Ok(extract_shebang(&source).map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::NativeRuntime;
    use tempfile::TempDir;

    #[test]
    fn test_extract_shebang() {
        assert_eq!(
            extract_shebang("#!/usr/bin/env node\nconsole.log(1)"),
            Some("#!/usr/bin/env node\n")
        );
        assert_eq!(extract_shebang("#!/bin/node\r\nx"), Some("#!/bin/node\r"));
        assert_eq!(extract_shebang("console.log(1)\n#!/not/first"), None);
        // Without a line terminator the line is not treated as a shebang.
        assert_eq!(extract_shebang("#!/usr/bin/env node"), None);
    }

    #[test]
    fn test_resolve_entry_candidates() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::write(root.join("exact.js"), "").unwrap();
        std::fs::write(root.join("cli.ts"), "").unwrap();
        std::fs::create_dir(root.join("pkg")).unwrap();
        std::fs::write(root.join("pkg/index.mjs"), "").unwrap();

        let runtime = NativeRuntime::new();
        assert_eq!(
            resolve_entry(&runtime, root, Path::new("exact.js")).unwrap(),
            root.join("exact.js")
        );
        assert_eq!(
            resolve_entry(&runtime, root, Path::new("./cli")).unwrap(),
            root.join("cli.ts")
        );
        assert_eq!(
            resolve_entry(&runtime, root, Path::new("pkg")).unwrap(),
            root.join("pkg/index.mjs")
        );
        assert!(matches!(
            resolve_entry(&runtime, root, Path::new("missing")),
            Err(Error::EntryNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_read_shebang() {
        let temp = TempDir::new().unwrap();
        let entry = temp.path().join("bin.js");
        std::fs::write(&entry, "#!/usr/bin/env node\nrequire('./lib')\n").unwrap();

        let runtime = NativeRuntime::new();
        assert_eq!(
            read_shebang(&runtime, &entry).await.unwrap().as_deref(),
            Some("#!/usr/bin/env node\n")
        );
    }
}
