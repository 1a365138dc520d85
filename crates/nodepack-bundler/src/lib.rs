//! # nodepack-bundler
//!
//! Decision-and-finalization core of a single-file Node.js bundler.
//!
//! The dependency-graph traversal itself is delegated to a [`BuildEngine`].
//! This crate decides, per import, whether a dependency is bundled or left as
//! a runtime `require` ([`ExternalsResolver`]), collects what the engine wrote
//! into an in-memory output tree ([`MemoryFs`]), post-processes the bundle
//! ([`Finalizer`]) and drives one-shot or watch-mode builds ([`Bundler`]).
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use nodepack_bundler::{BundleOptions, Bundler};
//! use std::sync::Arc;
//!
//! # async fn run(engine: Arc<dyn nodepack_bundler::BuildEngine>) -> nodepack_bundler::Result<()> {
//! let result = Bundler::new(BundleOptions::new("src/cli.ts").source_map(true), engine)
//!     .build()
//!     .await?;
//!
//! result.write_to("dist", "index.js")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! nodepack emits `tracing` events and never installs a subscriber. Enable the
//! `logging` feature for the [`logging::init_logging`] convenience helpers.

pub mod assets;
pub mod builtins;
pub mod cache;
pub mod engine;
pub mod entry;
pub mod finalize;
pub mod lifecycle;
pub mod memory_fs;
pub mod output;
pub mod resolver;
pub mod runtime;
pub mod sourcemap;
pub mod watcher;

#[cfg(feature = "logging")]
pub mod logging;

pub use assets::{AssetSnapshot, AssetState};
pub use cache::CacheSettings;
pub use engine::{BuildEngine, CompileContext, Diagnostic};
pub use finalize::{
    BytecodeCompiler, FinalizeOptions, Finalizer, Minifier, MinifyOptions, MinifyOutput,
    NodeBytecodeCompiler,
};
#[cfg(feature = "oxc")]
pub use finalize::OxcMinifier;
pub use lifecycle::{BundleOutput, Bundler, LifecycleError, WatchHandle};
pub use memory_fs::{MemoryFs, VirtualNode, flatten};
pub use output::{Asset, AssetMap, BuildResult};
pub use resolver::{ExternalDecision, ExternalsResolver, ImportRequest, TsconfigPaths};
pub use runtime::{NativeRuntime, Runtime, RuntimeError};
pub use sourcemap::SourceMap;
pub use watcher::{FileChange, FileWatcher};

pub use nodepack_config::{BundleOptions, CacheSetting, ConfigError, UnresolvedPolicy};

use std::path::PathBuf;

/// Error type for nodepack operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The engine reported compile errors.
    #[error("Compilation failed with {} error(s)", .0.len())]
    Compile(Vec<Diagnostic>),

    /// A filesystem check failed for a reason other than "not found".
    #[error("Failed to check {}: {source}", path.display())]
    Resolution {
        path: PathBuf,
        #[source]
        source: RuntimeError,
    },

    /// A bare import resolved nowhere and the unresolved policy is `error`.
    #[error("Cannot resolve '{specifier}' from {}", directory.display())]
    Unresolved { specifier: String, directory: PathBuf },

    #[error("Entry not found: {}", .0.display())]
    EntryNotFound(PathBuf),

    /// The engine finished without writing the primary output file.
    #[error("Engine produced no output file '{0}'")]
    MissingOutput(String),

    /// The engine wrote output the finalizer cannot read.
    #[error("Invalid engine output: {0}")]
    InvalidOutput(String),

    #[error("Bytecode cache generation failed: {0}")]
    Bytecode(String),

    #[error("Invalid output path: {0}")]
    InvalidOutputPath(String),

    #[error("Write failure: {0}")]
    WriteFailure(String),

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for nodepack operations.
pub type Result<T> = std::result::Result<T, Error>;

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::Compile(_) => "COMPILE_ERROR",
            Error::Resolution { .. } => "RESOLUTION_ERROR",
            Error::Unresolved { .. } => "UNRESOLVED_DEPENDENCY",
            Error::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            Error::MissingOutput(_) => "MISSING_OUTPUT",
            Error::InvalidOutput(_) => "INVALID_OUTPUT",
            Error::Bytecode(_) => "BYTECODE_ERROR",
            Error::InvalidOutputPath(_) => "INVALID_OUTPUT_PATH",
            Error::WriteFailure(_) => "WRITE_FAILURE",
            Error::Watch(_) => "WATCH_ERROR",
            Error::Lifecycle(_) => "LIFECYCLE_ERROR",
            Error::Config(_) => "INVALID_CONFIG",
            Error::Runtime(_) => "RUNTIME_ERROR",
            Error::Io(_) => "IO_ERROR",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            Error::Compile(diagnostics) => {
                if diagnostics.len() == 1 {
                    diagnostics[0]
                        .help
                        .as_ref()
                        .map(|h| Box::new(h.clone()) as Box<dyn std::fmt::Display>)
                } else {
                    Some(Box::new(
                        "Multiple compile errors occurred. See details below.".to_string(),
                    ))
                }
            }
            Error::Unresolved { specifier, .. } => Some(Box::new(format!(
                "Install '{}', list it in `externals`, or set `unresolved` to \"external\".",
                specifier
            ))),
            Error::EntryNotFound(path) => Some(Box::new(format!(
                "Tried '{}' as a file, with the extensions .js .json .node .mjs .ts .tsx, and as a directory index.",
                path.display()
            ))),
            Error::Bytecode(_) => Some(Box::new(
                "v8cache needs a `node` executable on PATH.".to_string(),
            )),
            Error::InvalidOutputPath(path) => Some(Box::new(format!(
                "The output path '{}' is invalid. Ensure it's within the output directory and doesn't contain '..' components.",
                path
            ))),
            Error::WriteFailure(msg) => Some(Box::new(format!(
                "Failed to write file. Check disk space and permissions.\nError: {}",
                msg
            ))),
            Error::Config(e) => Some(Box::new(format!(
                "Check your nodepack.config.json and NODEPACK_* environment variables.\nError: {}",
                e
            ))),
            _ => None,
        }
    }
}
