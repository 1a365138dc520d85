//! Configuration for the nodepack bundler.
//!
//! [`BundleOptions`] is the full option surface of a build. It can be built
//! programmatically or loaded in layers (defaults, `nodepack.config.json`,
//! `NODEPACK_*` environment variables) with [`BundleOptions::load`].

pub mod error;
pub mod loading;
pub mod options;

pub use error::{ConfigError, Result};
pub use loading::CONFIG_FILE_NAME;
pub use options::{BundleOptions, CacheSetting, DEFAULT_FILENAME, UnresolvedPolicy};
