//! Persistent build cache settings handed to the engine.

use nodepack_config::CacheSetting;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Prefix of every cache name so caches of different tools never mix.
const CACHE_NAME_PREFIX: &str = "nodepack_";

/// Where and under which name the engine keeps its build cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheSettings {
    pub directory: PathBuf,
    /// Unique per entry, so two projects sharing a cache directory do not
    /// overwrite each other.
    pub name: String,
    /// Caches written by another nodepack version are invalid.
    pub version: &'static str,
}

impl CacheSettings {
    /// Settings for `entry`, or `None` when caching is disabled.
    pub fn for_entry(entry: &Path, setting: &CacheSetting) -> Option<Self> {
        let directory = setting.directory()?;
        Some(Self {
            directory,
            name: cache_name(entry),
            version: env!("CARGO_PKG_VERSION"),
        })
    }
}

/// `nodepack_` followed by the first 10 hex chars of the entry path's hash.
pub fn cache_name(entry: &Path) -> String {
    let hash = blake3::hash(entry.to_string_lossy().as_bytes());
    let hex = hash.to_hex();
    format!("{CACHE_NAME_PREFIX}{}", &hex[..10])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_name_is_stable_and_distinct() {
        let a = cache_name(Path::new("/app/src/index.js"));
        let b = cache_name(Path::new("/app/src/other.js"));

        assert_eq!(a, cache_name(Path::new("/app/src/index.js")));
        assert_ne!(a, b);
        assert!(a.starts_with("nodepack_"));
        assert_eq!(a.len(), "nodepack_".len() + 10);
    }

    #[test]
    fn test_disabled_cache() {
        let entry = Path::new("/app/index.js");
        assert!(CacheSettings::for_entry(entry, &CacheSetting::Enabled(false)).is_none());

        let settings =
            CacheSettings::for_entry(entry, &CacheSetting::Directory("/tmp/c".into())).unwrap();
        assert_eq!(settings.directory, PathBuf::from("/tmp/c"));
        assert_eq!(settings.version, env!("CARGO_PKG_VERSION"));
    }
}
