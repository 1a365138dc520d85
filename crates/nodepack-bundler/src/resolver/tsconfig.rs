//! `compilerOptions.paths` aliases from the nearest `tsconfig.json`.
//!
//! Matching is delegated to `oxc_resolver`, which reads the config (comments
//! included), follows `extends` chains and applies `baseUrl` and `paths`.
//! Package lookup in `node_modules` is switched off, so a hit always means an
//! alias or `baseUrl` mapping covered the specifier.

use oxc_resolver::{
    ResolveError, ResolveOptions, Resolver, TsconfigDiscovery, TsconfigOptions,
    TsconfigReferences,
};
use std::fmt;
use std::path::{Path, PathBuf};

use super::SUPPORTED_EXTENSIONS;
use crate::runtime::Runtime;

const TSCONFIG_FILE: &str = "tsconfig.json";

/// Maps a bare specifier to a project path, if an alias covers it.
pub trait PathAliasMatcher: Send + Sync + std::fmt::Debug {
    fn match_path(&self, specifier: &str) -> Option<PathBuf>;
}

/// Path aliases of one `tsconfig.json`.
pub struct TsconfigPaths {
    config_file: PathBuf,
    config_dir: PathBuf,
    resolver: Resolver,
}

impl fmt::Debug for TsconfigPaths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TsconfigPaths")
            .field("config_file", &self.config_file)
            .finish_non_exhaustive()
    }
}

impl TsconfigPaths {
    /// Find the nearest `tsconfig.json` at or above `cwd`.
    pub fn load(cwd: &Path, runtime: &dyn Runtime) -> Option<Self> {
        let Some(config_file) = cwd
            .ancestors()
            .map(|dir| dir.join(TSCONFIG_FILE))
            .find(|candidate| runtime.is_file(candidate))
        else {
            tracing::debug!("no {} found above {}", TSCONFIG_FILE, cwd.display());
            return None;
        };

        tracing::debug!("using path aliases from {}", config_file.display());
        Some(Self::from_config_file(config_file))
    }

    pub fn from_config_file(config_file: PathBuf) -> Self {
        let config_dir = config_file
            .parent()
            .map_or_else(|| PathBuf::from("/"), Path::to_path_buf);

        let resolver = Resolver::new(ResolveOptions {
            tsconfig: Some(TsconfigDiscovery::Manual(TsconfigOptions {
                config_file: config_file.clone(),
                references: TsconfigReferences::Auto,
            })),
            extensions: SUPPORTED_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
            modules: Vec::new(),
            ..ResolveOptions::default()
        });

        Self {
            config_file,
            config_dir,
            resolver,
        }
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }
}

impl PathAliasMatcher for TsconfigPaths {
    fn match_path(&self, specifier: &str) -> Option<PathBuf> {
        match self.resolver.resolve(&self.config_dir, specifier) {
            Ok(resolution) => Some(resolution.into_path_buf()),
            Err(ResolveError::NotFound(_)) => None,
            Err(e) => {
                // Broken configs only cost the aliases.
                tracing::debug!(
                    "path alias lookup for {} via {} failed: {}",
                    specifier,
                    self.config_file.display(),
                    e
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::NativeRuntime;
    use std::fs;
    use tempfile::TempDir;

    fn project(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (path, content) in files {
            let path = dir.path().join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        dir
    }

    fn real(dir: &TempDir, path: &str) -> PathBuf {
        dir.path().canonicalize().unwrap().join(path)
    }

    #[test]
    fn test_load_and_match() {
        let dir = project(&[
            (
                "tsconfig.json",
                r#"{
                    "compilerOptions": {
                        "baseUrl": "./src",
                        // aliases
                        "paths": { "@lib/*": ["lib/*"] }
                    }
                }"#,
            ),
            ("src/lib/math.ts", ""),
            ("src/lib/fmt/index.ts", ""),
            ("src/utils.js", ""),
            ("src/deep/.keep", ""),
            ("node_modules/lodash/index.js", ""),
        ]);

        let aliases = TsconfigPaths::load(&dir.path().join("src/deep"), &NativeRuntime::new())
            .expect("config found");
        assert_eq!(aliases.config_file(), dir.path().join("tsconfig.json"));

        assert_eq!(aliases.match_path("@lib/math"), Some(real(&dir, "src/lib/math.ts")));
        assert_eq!(
            aliases.match_path("@lib/fmt"),
            Some(real(&dir, "src/lib/fmt/index.ts"))
        );
        // baseUrl maps bare specifiers too.
        assert_eq!(aliases.match_path("utils"), Some(real(&dir, "src/utils.js")));
        // Installed packages are not aliases.
        assert_eq!(aliases.match_path("lodash"), None);
    }

    #[test]
    fn test_follows_extends() {
        let dir = project(&[
            (
                "tsconfig.base.json",
                r#"{ "compilerOptions": { "paths": { "@shared/*": ["packages/shared/*"] } } }"#,
            ),
            ("tsconfig.json", r#"{ "extends": "./tsconfig.base.json" }"#),
            ("packages/shared/log.ts", ""),
        ]);

        let aliases = TsconfigPaths::load(dir.path(), &NativeRuntime::new()).expect("config found");
        assert_eq!(
            aliases.match_path("@shared/log"),
            Some(real(&dir, "packages/shared/log.ts"))
        );
        assert_eq!(aliases.match_path("@shared/missing"), None);
    }

    #[test]
    fn test_missing_or_broken_config_matches_nothing() {
        let empty = project(&[("src/index.js", "")]);
        assert!(TsconfigPaths::load(&empty.path().join("src"), &NativeRuntime::new()).is_none());

        let broken = project(&[("tsconfig.json", "{ not json"), ("util.js", "")]);
        let aliases = TsconfigPaths::load(broken.path(), &NativeRuntime::new()).expect("config found");
        assert_eq!(aliases.match_path("util"), None);

        let plain = project(&[("tsconfig.json", r#"{"compilerOptions":{}}"#), ("util.js", "")]);
        let aliases = TsconfigPaths::load(plain.path(), &NativeRuntime::new()).expect("config found");
        assert_eq!(aliases.match_path("util"), None);
    }
}
