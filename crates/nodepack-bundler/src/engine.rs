//! The seam to the dependency-graph traversal and transform engine.
//!
//! nodepack never parses or transforms modules itself. A [`BuildEngine`]
//! walks the graph from the entry, consults the [`ExternalsResolver`] for
//! every import, registers auxiliary assets in [`AssetState`] and writes the
//! bundle (plus its map, when requested) into the [`MemoryFs`].

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::Result;
use crate::assets::AssetState;
use crate::cache::CacheSettings;
use crate::memory_fs::MemoryFs;
use crate::resolver::ExternalsResolver;

/// One compile error reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            file: None,
            line: None,
            column: None,
            help: None,
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_location(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line, self.column) {
            (Some(file), Some(line), Some(column)) => {
                write!(f, "{file}:{line}:{column}: {}", self.message)
            }
            (Some(file), _, _) => write!(f, "{file}: {}", self.message),
            _ => f.write_str(&self.message),
        }
    }
}

/// Everything the engine needs for one compilation.
///
/// The same context is reused across watch cycles; the output filesystem
/// and the asset state are reset between cycles by the lifecycle controller.
#[derive(Debug, Clone)]
pub struct CompileContext {
    /// Resolved, absolute entry file.
    pub entry: PathBuf,
    /// Primary output name; the bundle goes to `/<filename>`.
    pub filename: String,
    /// Whether `/<filename>.map` must be written too.
    pub source_map: bool,
    /// The entry's shebang line, which the engine must strip before parsing.
    pub shebang: Option<String>,
    pub cache: Option<CacheSettings>,
    /// Extensions to try when resolving inlined imports.
    pub extensions: &'static [&'static str],
    pub output: MemoryFs,
    pub assets: AssetState,
    pub resolver: Arc<ExternalsResolver>,
}

impl CompileContext {
    /// Path of the primary bundle inside [`CompileContext::output`].
    pub fn output_path(&self) -> String {
        format!("/{}", self.filename)
    }

    /// Path of the bundle's source map inside [`CompileContext::output`].
    pub fn map_path(&self) -> String {
        format!("/{}.map", self.filename)
    }
}

/// Dependency-graph traversal and transform engine.
#[async_trait]
pub trait BuildEngine: Send + Sync {
    /// Run one compilation into `ctx.output`.
    ///
    /// Compile errors are reported as [`crate::Error::Compile`] with every
    /// diagnostic collected; resolver errors are propagated as-is.
    async fn compile(&self, ctx: &CompileContext) -> Result<()>;

    /// Release engine resources after a one-shot build.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic::new("Unexpected token")
            .with_file("src/a.ts")
            .with_location(3, 14);
        assert_eq!(diag.to_string(), "src/a.ts:3:14: Unexpected token");

        assert_eq!(
            Diagnostic::new("oops").with_file("b.js").to_string(),
            "b.js: oops"
        );
        assert_eq!(Diagnostic::new("plain").to_string(), "plain");
    }
}
