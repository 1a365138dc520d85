//! Build options and their defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Default name of the primary output file.
pub const DEFAULT_FILENAME: &str = "index.js";

/// What to do with a bare import whose package cannot be found in any
/// `node_modules` directory above the importing module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnresolvedPolicy {
    /// Leave the import as a runtime `require` and keep building.
    #[default]
    External,
    /// Hand the import back to the engine to bundle (the engine reports it).
    Inline,
    /// Abort the build.
    Error,
}

/// Build cache setting: `false`, `true`, or a cache directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CacheSetting {
    Enabled(bool),
    Directory(PathBuf),
}

impl Default for CacheSetting {
    fn default() -> Self {
        Self::Enabled(true)
    }
}

impl CacheSetting {
    /// Cache directory to use, or `None` when caching is disabled.
    pub fn directory(&self) -> Option<PathBuf> {
        match self {
            Self::Enabled(false) => None,
            Self::Enabled(true) => Some(default_cache_dir()),
            Self::Directory(dir) => Some(dir.clone()),
        }
    }
}

/// Default cache location shared by every build on this machine.
pub fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("nodepack-cache")
}

/// Options for a single bundling session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleOptions {
    /// Program entry point.
    #[serde(default)]
    pub entry: PathBuf,

    /// Specifiers that are always left as runtime requires.
    #[serde(default)]
    pub externals: Vec<String>,

    /// Name of the primary output file.
    #[serde(default = "default_filename")]
    pub filename: String,

    #[serde(default)]
    pub minify: bool,

    #[serde(default)]
    pub source_map: bool,

    #[serde(default)]
    pub watch: bool,

    /// Emit a V8 code cache next to the bundle and load through it.
    #[serde(default)]
    pub v8cache: bool,

    #[serde(default)]
    pub cache: CacheSetting,

    #[serde(default)]
    pub unresolved: UnresolvedPolicy,

    /// Working directory; defaults to the process working directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
}

fn default_filename() -> String {
    DEFAULT_FILENAME.to_string()
}

impl Default for BundleOptions {
    fn default() -> Self {
        Self {
            entry: PathBuf::new(),
            externals: Vec::new(),
            filename: default_filename(),
            minify: false,
            source_map: false,
            watch: false,
            v8cache: false,
            cache: CacheSetting::default(),
            unresolved: UnresolvedPolicy::default(),
            cwd: None,
        }
    }
}

impl BundleOptions {
    /// Create options for the given entry with every other field defaulted.
    pub fn new(entry: impl Into<PathBuf>) -> Self {
        Self {
            entry: entry.into(),
            ..Self::default()
        }
    }

    pub fn externals(mut self, externals: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.externals.extend(externals.into_iter().map(Into::into));
        self
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn minify(mut self, enabled: bool) -> Self {
        self.minify = enabled;
        self
    }

    pub fn source_map(mut self, enabled: bool) -> Self {
        self.source_map = enabled;
        self
    }

    pub fn watch(mut self, enabled: bool) -> Self {
        self.watch = enabled;
        self
    }

    pub fn v8cache(mut self, enabled: bool) -> Self {
        self.v8cache = enabled;
        self
    }

    pub fn cache(mut self, cache: CacheSetting) -> Self {
        self.cache = cache;
        self
    }

    pub fn unresolved(mut self, policy: UnresolvedPolicy) -> Self {
        self.unresolved = policy;
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Output names owned by the finalizer.
    ///
    /// Loaders must never emit auxiliary assets under these names.
    pub fn reserved_names(&self) -> Vec<String> {
        let mut names = vec![self.filename.clone()];
        if self.source_map {
            names.push(format!("{}.map", self.filename));
        }
        if self.v8cache {
            names.push(format!("{}.cache", self.filename));
            names.push(format!("{}.cache.js", self.filename));
        }
        names
    }

    /// Check structural consistency of the options.
    pub fn validate(&self) -> Result<()> {
        if self.entry.as_os_str().is_empty() {
            return Err(ConfigError::NoEntry);
        }

        if self.filename.is_empty() {
            return Err(ConfigError::InvalidFilename(
                self.filename.clone(),
                "filename must not be empty",
            ));
        }

        let is_plain_name = matches!(
            Path::new(&self.filename).components().next(),
            Some(std::path::Component::Normal(_))
        );
        if !is_plain_name || self.filename.contains(['/', '\\']) {
            return Err(ConfigError::InvalidFilename(
                self.filename.clone(),
                "filename must not contain path separators",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = BundleOptions::new("src/index.js");
        assert_eq!(options.filename, "index.js");
        assert!(!options.minify);
        assert!(!options.source_map);
        assert!(!options.watch);
        assert!(!options.v8cache);
        assert_eq!(options.cache, CacheSetting::Enabled(true));
        assert_eq!(options.unresolved, UnresolvedPolicy::External);
        assert!(options.externals.is_empty());
    }

    #[test]
    fn test_reserved_names() {
        let options = BundleOptions::new("a.js");
        assert_eq!(options.reserved_names(), vec!["index.js"]);

        let options = BundleOptions::new("a.js")
            .filename("out.js")
            .source_map(true)
            .v8cache(true);
        assert_eq!(
            options.reserved_names(),
            vec!["out.js", "out.js.map", "out.js.cache", "out.js.cache.js"]
        );
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            BundleOptions::default().validate(),
            Err(ConfigError::NoEntry)
        ));
        assert!(BundleOptions::new("a.js").filename("").validate().is_err());
        assert!(
            BundleOptions::new("a.js")
                .filename("dist/index.js")
                .validate()
                .is_err()
        );
        assert!(BundleOptions::new("a.js").filename("..").validate().is_err());
        assert!(BundleOptions::new("a.js").validate().is_ok());
    }

    #[test]
    fn test_cache_setting_serde() {
        let off: CacheSetting = serde_json::from_str("false").unwrap();
        assert_eq!(off, CacheSetting::Enabled(false));
        assert_eq!(off.directory(), None);

        let dir: CacheSetting = serde_json::from_str("\"/tmp/cache\"").unwrap();
        assert_eq!(dir.directory(), Some(PathBuf::from("/tmp/cache")));

        assert_eq!(
            CacheSetting::Enabled(true).directory(),
            Some(default_cache_dir())
        );
    }

    #[test]
    fn test_camel_case_fields() {
        let options: BundleOptions = serde_json::from_value(serde_json::json!({
            "entry": "src/cli.ts",
            "sourceMap": true,
            "unresolved": "error",
            "externals": ["aws-sdk"]
        }))
        .unwrap();

        assert!(options.source_map);
        assert_eq!(options.unresolved, UnresolvedPolicy::Error);
        assert_eq!(options.externals, vec!["aws-sdk"]);
        assert_eq!(options.filename, DEFAULT_FILENAME);

        let value = serde_json::to_value(&options).unwrap();
        assert!(value.get("sourceMap").is_some());
        assert!(value.get("cwd").is_none());
    }
}
