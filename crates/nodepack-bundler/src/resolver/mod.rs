//! Externalization decisions for imports found during graph traversal.
//!
//! The engine asks the [`ExternalsResolver`] once per unique
//! (importing directory, specifier) pair whether the import is bundled into
//! the output or left as a runtime `require`. This is only the subset of
//! Node's resolution algorithm needed to make that call safely; resolving an
//! inlined import to a file is the engine's job.
//!
//! Decision order, first match wins:
//!
//! 1. Specifier is in the explicit externals set → external.
//! 2. `./node_modules/x` and `../node_modules/x` are reclassified as the bare
//!    specifier `x`; any other relative specifier → inline.
//! 3. Absolute paths, drive-letter paths, Node built-ins and tsconfig path
//!    aliases → external.
//! 4. The package directory is looked up in every `node_modules` from the
//!    importing directory up to the root. Found → external. Not found → a
//!    warning, then the configured [`UnresolvedPolicy`].

mod tsconfig;

pub use tsconfig::{PathAliasMatcher, TsconfigPaths};

use dashmap::DashMap;
use nodepack_config::UnresolvedPolicy;
use regex::Regex;
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use crate::builtins::is_builtin;
use crate::runtime::Runtime;
use crate::{Error, Result};

/// Extensions tried when probing for source files.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[".js", ".json", ".node", ".mjs", ".ts", ".tsx"];

/// Scoped packages keep `@scope/name`, unscoped packages their first segment.
static PACKAGE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(@[^\\/]+[\\/])?[^\\/]+").expect("package name pattern is valid")
});

/// One import edge seen during traversal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImportRequest {
    /// Directory of the module containing the import.
    pub importing_directory: PathBuf,
    /// The string passed to `import`/`require`.
    pub specifier: String,
}

impl ImportRequest {
    pub fn new(importing_directory: impl Into<PathBuf>, specifier: impl Into<String>) -> Self {
        Self {
            importing_directory: importing_directory.into(),
            specifier: specifier.into(),
        }
    }
}

/// Whether an import is bundled or left to the runtime's module loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalDecision {
    Inline,
    /// Emit `require(<specifier>)` as-is.
    External(String),
}

impl ExternalDecision {
    pub fn is_external(&self) -> bool {
        matches!(self, ExternalDecision::External(_))
    }
}

/// Extract the package name from a bare specifier.
///
/// ```
/// use nodepack_bundler::resolver::package_name;
///
/// assert_eq!(package_name("@aws-sdk/client-s3/dist/index.js"), Some("@aws-sdk/client-s3"));
/// assert_eq!(package_name("lodash/fp"), Some("lodash"));
/// ```
pub fn package_name(specifier: &str) -> Option<&str> {
    PACKAGE_NAME.find(specifier).map(|m| m.as_str())
}

fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier == "."
        || specifier == ".."
}

fn is_drive_letter_path(specifier: &str) -> bool {
    let bytes = specifier.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}

/// Decides inline vs. external for every import the engine encounters.
///
/// Safe to share across concurrent lookups: the only mutable state is the
/// memo of finished `node_modules` walks.
#[derive(Debug)]
pub struct ExternalsResolver {
    externals: FxHashSet<String>,
    aliases: Option<Arc<dyn PathAliasMatcher>>,
    runtime: Arc<dyn Runtime>,
    policy: UnresolvedPolicy,
    /// (importing directory, package) → package directory found
    walks: DashMap<(PathBuf, String), bool>,
}

impl ExternalsResolver {
    pub fn new(runtime: Arc<dyn Runtime>) -> Self {
        Self {
            externals: FxHashSet::default(),
            aliases: None,
            runtime,
            policy: UnresolvedPolicy::default(),
            walks: DashMap::new(),
        }
    }

    /// Specifiers that are always external, matched exactly.
    pub fn with_externals(mut self, externals: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.externals.extend(externals.into_iter().map(Into::into));
        self
    }

    pub fn with_aliases(mut self, aliases: Arc<dyn PathAliasMatcher>) -> Self {
        self.aliases = Some(aliases);
        self
    }

    pub fn with_policy(mut self, policy: UnresolvedPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Classify one import.
    ///
    /// # Errors
    ///
    /// Filesystem failures other than "not found" while probing
    /// `node_modules` are returned as [`Error::Resolution`]. With
    /// [`UnresolvedPolicy::Error`], a package that exists nowhere is
    /// returned as [`Error::Unresolved`].
    pub async fn resolve(&self, request: &ImportRequest) -> Result<ExternalDecision> {
        let specifier = request.specifier.as_str();
        let external = || ExternalDecision::External(specifier.to_string());

        if self.externals.contains(specifier) {
            return Ok(external());
        }

        let mut bare = specifier;
        if is_relative(specifier) {
            match specifier
                .strip_prefix("./node_modules/")
                .or_else(|| specifier.strip_prefix("../node_modules/"))
            {
                Some(rest) => bare = rest,
                None => return Ok(ExternalDecision::Inline),
            }
        }

        if bare.starts_with('/')
            || is_drive_letter_path(bare)
            || is_builtin(bare)
            || self.matches_alias(bare)
        {
            return Ok(external());
        }

        if let Some(package) = package_name(bare) {
            if self
                .package_installed(&request.importing_directory, package)
                .await?
            {
                tracing::debug!(
                    "{} found in node_modules above {}, external",
                    package,
                    request.importing_directory.display()
                );
                return Ok(external());
            }
        }

        tracing::warn!(
            "Module directory \"{}\" attempted to require \"{}\" but it could not be resolved",
            request.importing_directory.display(),
            specifier
        );

        match self.policy {
            UnresolvedPolicy::External => Ok(external()),
            UnresolvedPolicy::Inline => Ok(ExternalDecision::Inline),
            UnresolvedPolicy::Error => Err(Error::Unresolved {
                specifier: specifier.to_string(),
                directory: request.importing_directory.clone(),
            }),
        }
    }

    fn matches_alias(&self, specifier: &str) -> bool {
        self.aliases
            .as_ref()
            .and_then(|aliases| aliases.match_path(specifier))
            .is_some()
    }

    /// Forget finished `node_modules` walks, so packages installed since the
    /// last compilation are seen.
    pub fn begin_cycle(&self) {
        self.walks.clear();
    }

    /// Walk from `directory` to the root looking for `node_modules/<package>`.
    async fn package_installed(&self, directory: &Path, package: &str) -> Result<bool> {
        let key = (directory.to_path_buf(), package.to_string());
        if let Some(found) = self.walks.get(&key) {
            return Ok(*found);
        }

        let mut found = false;
        for ancestor in directory.ancestors() {
            let candidate = ancestor.join("node_modules").join(package);
            if self.is_directory(&candidate).await? {
                found = true;
                break;
            }
        }

        self.walks.insert(key, found);
        Ok(found)
    }

    async fn is_directory(&self, path: &Path) -> Result<bool> {
        match self.runtime.metadata(path).await {
            Ok(metadata) => Ok(metadata.is_dir),
            Err(e) if e.is_not_found() => Ok(false),
            Err(source) => Err(Error::Resolution {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}
