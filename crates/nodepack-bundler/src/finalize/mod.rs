//! Output finalizer.
//!
//! Turns what the engine left in the output filesystem into a
//! [`BuildResult`]. Stages run in a fixed order:
//!
//! 1. flatten the output tree, drop the bundle and its map from the asset
//!    list, merge in assets registered directly in [`AssetState`]
//! 2. read the bundle (and its map, when requested)
//! 3. minify
//! 4. move the code into a V8 code cache sidecar behind a small loader
//! 5. restore the entry's shebang

mod bytecode;
mod minify;

pub use bytecode::{BytecodeCompiler, NodeBytecodeCompiler, bootstrap};
#[cfg(feature = "oxc")]
pub use minify::OxcMinifier;
pub use minify::{Minifier, MinifyOptions, MinifyOutput};

use std::sync::Arc;

use crate::assets::AssetState;
use crate::memory_fs::MemoryFs;
use crate::output::{Asset, BuildResult};
use crate::sourcemap::{self, SourceMap};
use crate::{Error, Result};

/// Per-build finalizer settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalizeOptions {
    pub filename: String,
    pub minify: bool,
    pub source_map: bool,
    pub v8cache: bool,
    /// Shebang line of the entry, terminator included.
    pub shebang: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Finalizer {
    options: FinalizeOptions,
    minifier: Option<Arc<dyn Minifier>>,
    bytecode: Arc<dyn BytecodeCompiler>,
}

impl Finalizer {
    pub fn new(options: FinalizeOptions) -> Self {
        Self {
            options,
            minifier: None,
            bytecode: Arc::new(NodeBytecodeCompiler::new()),
        }
    }

    pub fn with_minifier(mut self, minifier: Option<Arc<dyn Minifier>>) -> Self {
        self.minifier = minifier;
        self
    }

    pub fn with_bytecode_compiler(mut self, bytecode: Arc<dyn BytecodeCompiler>) -> Self {
        self.bytecode = bytecode;
        self
    }

    pub fn options(&self) -> &FinalizeOptions {
        &self.options
    }

    /// Assemble the build result from the engine's output.
    ///
    /// # Errors
    ///
    /// [`Error::MissingOutput`] when the bundle was never written,
    /// [`Error::InvalidOutput`] when it is not UTF-8 or its map is not valid
    /// JSON, and [`Error::Bytecode`] when code cache generation fails.
    pub async fn finalize(&self, output: &MemoryFs, assets: &AssetState) -> Result<BuildResult> {
        let filename = self.options.filename.as_str();
        let map_name = format!("{filename}.map");

        // Flatten & prune
        let snapshot = assets.snapshot();
        let mut files = output.flatten(&snapshot.permissions);
        let bundle = files.remove(filename);
        let bundle_map = files.remove(&map_name);
        for (name, source) in snapshot.assets {
            let permissions = snapshot.permissions.get(&name).copied();
            files
                .entry(name)
                .or_insert(Asset { source, permissions });
        }

        // Extract
        let bundle = bundle.ok_or_else(|| Error::MissingOutput(filename.to_string()))?;
        let mut code = String::from_utf8(bundle.source)
            .map_err(|e| Error::InvalidOutput(format!("{filename} is not UTF-8: {e}")))?;
        let mut map = if self.options.source_map {
            match bundle_map {
                Some(asset) => Some(sourcemap::parse(&asset.source).map_err(|e| {
                    Error::InvalidOutput(format!("{map_name} is not a valid source map: {e}"))
                })?),
                None => {
                    tracing::warn!("source maps requested but the engine wrote no {}", map_name);
                    None
                }
            }
        } else {
            None
        };

        if self.options.minify {
            self.minify(&mut code, &mut map);
        }

        if self.options.v8cache {
            let cache = self.bytecode.compile(&code).await?;
            files.insert(format!("{filename}.cache"), Asset::new(cache));
            files.insert(
                format!("{filename}.cache.js"),
                Asset::new(std::mem::replace(&mut code, bootstrap(filename))),
            );
            // The loader has no mappings of its own.
            if map.take().is_some() {
                tracing::debug!("dropping source map, bundle is a code cache loader");
            }
        }

        if let Some(shebang) = &self.options.shebang {
            code.insert_str(0, shebang);
            map = map.map(|map| sourcemap::offset_lines(&map, 1));
        }

        Ok(BuildResult {
            code,
            source_map: map,
            assets: files,
        })
    }

    fn minify(&self, code: &mut String, map: &mut Option<SourceMap>) {
        let Some(minifier) = &self.minifier else {
            tracing::warn!("minify requested but no minifier is configured; output left as-is");
            return;
        };

        let mut options = MinifyOptions::mangle_only(&self.options.filename);
        if self.options.source_map {
            options = options.with_source_map(map.as_ref());
        }

        let result = minifier.minify(code, &options);
        match result.code {
            Some(minified) => {
                tracing::debug!("minified {} -> {} bytes", code.len(), minified.len());
                *code = minified;
                *map = result.map;
            }
            None => tracing::debug!("minifier returned no code, keeping unminified output"),
        }
    }
}
