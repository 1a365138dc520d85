//! Shared test utilities for nodepack-bundler integration tests.
//!
//! `ScriptedEngine` stands in for the graph traversal engine: it asks the
//! resolver about a fixed list of imports from the entry's directory and
//! writes a predictable bundle into the output filesystem.

#![allow(dead_code)]

use async_trait::async_trait;
use nodepack_bundler::{
    BuildEngine, BuildResult, BytecodeCompiler, CompileContext, Diagnostic, Error, ExternalDecision,
    ImportRequest, Minifier, MinifyOptions, MinifyOutput, Result,
};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Fake engine with scripted output.
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    /// Specifiers resolved from the entry's directory on every compile.
    pub imports: Vec<String>,
    /// Source map written next to the bundle when maps are requested.
    pub map: Option<String>,
    /// Auxiliary asset emitted through the asset state: (name, content, mode).
    pub asset: Option<(String, Vec<u8>, Option<u32>)>,
    /// Extra file written into the output tree, named per cycle.
    pub per_cycle_file: bool,
    pub fail_compile: AtomicBool,
    pub fail_close: bool,
    pub compiles: AtomicUsize,
    pub closes: AtomicUsize,
    pub decisions: Mutex<Vec<(String, ExternalDecision)>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_imports(mut self, imports: &[&str]) -> Self {
        self.imports = imports.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_map(mut self, mappings: &str) -> Self {
        self.map = Some(format!(
            r#"{{"version":3,"sources":["src/index.js"],"names":[],"mappings":"{mappings}"}}"#
        ));
        self
    }

    pub fn with_asset(mut self, name: &str, content: &[u8], mode: Option<u32>) -> Self {
        self.asset = Some((name.to_string(), content.to_vec(), mode));
        self
    }

    pub fn compile_count(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BuildEngine for ScriptedEngine {
    async fn compile(&self, ctx: &CompileContext) -> Result<()> {
        let cycle = self.compiles.fetch_add(1, Ordering::SeqCst) + 1;

        if self.fail_compile.load(Ordering::SeqCst) {
            return Err(Error::Compile(vec![
                Diagnostic::new(format!("Unexpected token in cycle {cycle}"))
                    .with_file("src/index.js")
                    .with_location(1, 1),
            ]));
        }

        let entry_dir = ctx.entry.parent().unwrap_or(Path::new("/"));
        let mut code = format!("// cycle {cycle}\n");
        for specifier in &self.imports {
            let decision = ctx
                .resolver
                .resolve(&ImportRequest::new(entry_dir, specifier.as_str()))
                .await?;
            match &decision {
                ExternalDecision::External(spec) => {
                    code.push_str(&format!("require(\"{spec}\");\n"));
                }
                ExternalDecision::Inline => {
                    code.push_str(&format!("/* inlined {specifier} */\n"));
                }
            }
            self.decisions.lock().push((specifier.clone(), decision));
        }
        code.push_str("module.exports = main;\n");

        ctx.output.write_file(&ctx.output_path(), code)?;
        if ctx.source_map {
            if let Some(map) = &self.map {
                ctx.output.write_file(&ctx.map_path(), map.as_str())?;
            }
        }
        if self.per_cycle_file {
            ctx.output
                .write_file(&format!("/stale-{cycle}.txt"), format!("cycle {cycle}"))?;
        }
        if let Some((name, content, mode)) = &self.asset {
            let name = ctx.assets.claim_name(name);
            ctx.assets.emit_asset(name.clone(), content.clone());
            if let Some(mode) = mode {
                ctx.assets.set_permissions(name, *mode);
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(Error::Io(std::io::Error::other("engine teardown failed")));
        }
        Ok(())
    }
}

/// Minifier that never produces code.
#[derive(Debug)]
pub struct DecliningMinifier;

impl Minifier for DecliningMinifier {
    fn minify(&self, _code: &str, _options: &MinifyOptions<'_>) -> MinifyOutput {
        MinifyOutput::declined()
    }
}

/// Minifier that strips comment lines and passes the input map through.
#[derive(Debug)]
pub struct StripCommentsMinifier;

impl Minifier for StripCommentsMinifier {
    fn minify(&self, code: &str, options: &MinifyOptions<'_>) -> MinifyOutput {
        let code = code
            .lines()
            .filter(|line| !line.starts_with("//") && !line.starts_with("/*"))
            .collect::<Vec<_>>()
            .join("");
        MinifyOutput {
            code: Some(code),
            map: options.input_map.cloned(),
        }
    }
}

/// Bytecode compiler returning a marker instead of a real V8 cache.
#[derive(Debug)]
pub struct MarkerBytecode;

#[async_trait]
impl BytecodeCompiler for MarkerBytecode {
    async fn compile(&self, code: &str) -> Result<Vec<u8>> {
        Ok(format!("v8:{}", code.len()).into_bytes())
    }
}

/// Project layout used by most tests:
///
/// ```text
/// src/index.js
/// src/util.js
/// node_modules/lodash/
/// node_modules/@scope/pkg/
/// ```
pub fn create_project(entry_source: &str) -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    let root = dir.path();
    std::fs::create_dir_all(root.join("src")).expect("create src");
    std::fs::write(root.join("src/index.js"), entry_source).expect("write entry");
    std::fs::write(root.join("src/util.js"), "module.exports = 1;\n").expect("write util");
    std::fs::create_dir_all(root.join("node_modules/lodash")).expect("create lodash");
    std::fs::create_dir_all(root.join("node_modules/@scope/pkg")).expect("create scoped pkg");
    dir
}

/// Forward every watch outcome into a channel.
pub fn channel_handler() -> (
    impl Fn(Result<BuildResult>) + Send + Sync + 'static,
    mpsc::UnboundedReceiver<Result<BuildResult>>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handler = move |outcome: Result<BuildResult>| {
        let _ = tx.send(outcome);
    };
    (handler, rx)
}

/// Receive the next watch outcome or fail the test after a few seconds.
pub async fn next_outcome(
    rx: &mut mpsc::UnboundedReceiver<Result<BuildResult>>,
) -> Result<BuildResult> {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("watch outcome within timeout")
        .expect("watch channel open")
}

/// Assert that no outcome arrives within a short window.
pub async fn assert_no_outcome(rx: &mut mpsc::UnboundedReceiver<Result<BuildResult>>) {
    let extra = tokio::time::timeout(Duration::from_millis(150), rx.recv()).await;
    assert!(extra.is_err(), "unexpected extra watch outcome");
}

pub fn shared(engine: ScriptedEngine) -> Arc<ScriptedEngine> {
    Arc::new(engine)
}
