//! V8 code cache generation and the loader that consumes it.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::{Error, Result};

/// Produces a V8 code cache snapshot for a script.
#[async_trait]
pub trait BytecodeCompiler: Send + Sync + std::fmt::Debug {
    /// Compile `code` as the body of a CommonJS module and return the
    /// cached data V8 accepts for it.
    async fn compile(&self, code: &str) -> Result<Vec<u8>>;
}

/// Reads the script from stdin and writes the cached data to stdout. The
/// source is wrapped exactly like the bootstrap wraps it so V8 accepts the
/// cache at load time.
const CACHE_SCRIPT: &str = r#"
const { Script } = require('vm'), { wrap } = require('module');
const chunks = [];
process.stdin.on('data', (chunk) => chunks.push(chunk));
process.stdin.on('end', () => {
  const source = Buffer.concat(chunks).toString();
  process.stdout.write(new Script(wrap(source)).createCachedData());
});
"#;

/// [`BytecodeCompiler`] that asks a `node` executable for the cache.
#[derive(Debug, Clone)]
pub struct NodeBytecodeCompiler {
    node: PathBuf,
}

impl Default for NodeBytecodeCompiler {
    fn default() -> Self {
        Self {
            node: PathBuf::from("node"),
        }
    }
}

impl NodeBytecodeCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific Node binary instead of `node` from `PATH`.
    pub fn with_node(node: impl Into<PathBuf>) -> Self {
        Self { node: node.into() }
    }
}

#[async_trait]
impl BytecodeCompiler for NodeBytecodeCompiler {
    async fn compile(&self, code: &str) -> Result<Vec<u8>> {
        let mut child = Command::new(&self.node)
            .arg("-e")
            .arg(CACHE_SCRIPT)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Bytecode(format!("failed to start {}: {}", self.node.display(), e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Bytecode("child stdin unavailable".to_string()))?;
        stdin.write_all(code.as_bytes()).await?;
        drop(stdin);

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(Error::Bytecode(format!(
                "{} exited with {}: {}",
                self.node.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        tracing::debug!("generated {} byte code cache", output.stdout.len());
        Ok(output.stdout)
    }
}

/// Replacement bundle that runs `<filename>.cache.js` through its cache.
pub fn bootstrap(filename: &str) -> String {
    format!(
        "const {{ readFileSync }} = require('fs'), {{ Script }} = require('vm'), {{ wrap }} = require('module');\n\
         const source = readFileSync(__dirname + '/{filename}.cache.js').toString(), cachedData = readFileSync(__dirname + '/{filename}.cache');\n\
         (new Script(wrap(source), {{ cachedData }}).runInThisContext())(exports, require, module, __filename, __dirname);\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_references_sidecars() {
        let code = bootstrap("out.js");
        assert!(code.starts_with("const { readFileSync } = require('fs')"));
        assert!(code.contains("__dirname + '/out.js.cache.js'"));
        assert!(code.contains("__dirname + '/out.js.cache')"));
        assert!(code.contains("runInThisContext())(exports, require, module, __filename, __dirname);\n"));
        assert_eq!(code.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_missing_node_binary() {
        let compiler = NodeBytecodeCompiler::with_node("/definitely/not/node");
        let err = compiler.compile("1").await.unwrap_err();
        assert!(matches!(err, Error::Bytecode(_)));
    }
}
