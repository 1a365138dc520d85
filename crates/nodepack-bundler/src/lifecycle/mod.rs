//! Build lifecycle: one-shot builds and watch sessions.

mod watch;

pub use watch::{LifecycleError, WatchHandle};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

use nodepack_config::BundleOptions;

use crate::assets::AssetState;
use crate::cache::CacheSettings;
use crate::engine::{BuildEngine, CompileContext};
use crate::entry::{read_shebang, resolve_entry};
use crate::finalize::{BytecodeCompiler, FinalizeOptions, Finalizer, Minifier, NodeBytecodeCompiler};
use crate::memory_fs::MemoryFs;
use crate::output::BuildResult;
use crate::resolver::{ExternalsResolver, SUPPORTED_EXTENSIONS, TsconfigPaths};
use crate::runtime::{NativeRuntime, Runtime};
use crate::watcher::{FileChange, FileWatcher};
use crate::Result;
use watch::WatchShared;

/// What [`Bundler::run`] produced, depending on `options.watch`.
#[derive(Debug)]
pub enum BundleOutput {
    Built(BuildResult),
    Watching(WatchHandle),
}

/// Build entry point.
///
/// Owns the options and the collaborators of one bundling session: the
/// engine, the filesystem runtime, the minifier and the bytecode compiler.
pub struct Bundler {
    options: BundleOptions,
    engine: Arc<dyn BuildEngine>,
    runtime: Arc<dyn Runtime>,
    minifier: Option<Arc<dyn Minifier>>,
    bytecode: Arc<dyn BytecodeCompiler>,
}

/// Everything prepared once per session and reused by every cycle.
struct Session {
    ctx: CompileContext,
    finalizer: Finalizer,
    cwd: PathBuf,
}

#[cfg(feature = "oxc")]
fn default_minifier() -> Option<Arc<dyn Minifier>> {
    Some(Arc::new(crate::finalize::OxcMinifier::new()))
}

#[cfg(not(feature = "oxc"))]
fn default_minifier() -> Option<Arc<dyn Minifier>> {
    None
}

impl Bundler {
    pub fn new(options: BundleOptions, engine: Arc<dyn BuildEngine>) -> Self {
        Self {
            options,
            engine,
            runtime: Arc::new(NativeRuntime::new()),
            minifier: default_minifier(),
            bytecode: Arc::new(NodeBytecodeCompiler::new()),
        }
    }

    /// Load options from `nodepack.config.json` (or `config_path`) and
    /// `NODEPACK_*` variables, with `cwd` as the working directory.
    pub fn from_config(
        cwd: &Path,
        config_path: Option<&Path>,
        engine: Arc<dyn BuildEngine>,
    ) -> Result<Self> {
        let mut options = BundleOptions::load(cwd, config_path)?;
        if options.cwd.is_none() {
            options.cwd = Some(cwd.to_path_buf());
        }
        Ok(Self::new(options, engine))
    }

    pub fn with_runtime(mut self, runtime: Arc<dyn Runtime>) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn with_minifier(mut self, minifier: Arc<dyn Minifier>) -> Self {
        self.minifier = Some(minifier);
        self
    }

    pub fn with_bytecode_compiler(mut self, bytecode: Arc<dyn BytecodeCompiler>) -> Self {
        self.bytecode = bytecode;
        self
    }

    pub fn options(&self) -> &BundleOptions {
        &self.options
    }

    /// One-shot build or watch session, as `options.watch` says.
    pub async fn run(self) -> Result<BundleOutput> {
        if self.options.watch {
            self.watch().await.map(BundleOutput::Watching)
        } else {
            self.build().await.map(BundleOutput::Built)
        }
    }

    /// Compile once, close the engine and finalize.
    ///
    /// # Errors
    ///
    /// Compile errors fail the build with [`crate::Error::Compile`]. An
    /// engine close error fails an otherwise successful build.
    pub async fn build(self) -> Result<BuildResult> {
        let session = self.prepare().await?;
        let started = Instant::now();

        let compiled = self.engine.compile(&session.ctx).await;
        let closed = self.engine.close().await;
        compiled?;
        closed?;

        let result = session
            .finalizer
            .finalize(&session.ctx.output, &session.ctx.assets)
            .await?;

        tracing::info!(
            "built {} ({} bytes, {} asset(s)) in {}ms",
            session.ctx.filename,
            result.code.len(),
            result.assets.len(),
            started.elapsed().as_millis()
        );
        Ok(result)
    }

    /// Start a watch session on the working directory.
    ///
    /// The first compilation starts immediately; every file change triggers
    /// another one until the returned handle is closed.
    pub async fn watch(self) -> Result<WatchHandle> {
        let session = self.prepare().await?;
        let (watcher, changes) = FileWatcher::for_project(session.cwd.clone())?;
        Ok(self.spawn_watch(session, changes, Some(watcher)))
    }

    /// Start a watch session driven by a caller-provided change stream.
    pub async fn watch_with(self, changes: mpsc::Receiver<FileChange>) -> Result<WatchHandle> {
        let session = self.prepare().await?;
        Ok(self.spawn_watch(session, changes, None))
    }

    fn spawn_watch(
        self,
        session: Session,
        changes: mpsc::Receiver<FileChange>,
        watcher: Option<FileWatcher>,
    ) -> WatchHandle {
        let shared = Arc::new(WatchShared::new());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(watch_loop(
            self.engine,
            session,
            Arc::clone(&shared),
            changes,
            shutdown_rx,
            watcher,
        ));

        WatchHandle::new(shared, shutdown_tx, task)
    }

    async fn prepare(&self) -> Result<Session> {
        self.options.validate()?;

        let cwd = match &self.options.cwd {
            Some(cwd) => cwd.clone(),
            None => self.runtime.get_cwd()?,
        };
        let entry = resolve_entry(self.runtime.as_ref(), &cwd, &self.options.entry)?;
        let shebang = read_shebang(self.runtime.as_ref(), &entry).await?;
        tracing::debug!("entry resolved to {}", entry.display());

        let mut resolver = ExternalsResolver::new(Arc::clone(&self.runtime))
            .with_externals(self.options.externals.iter().cloned())
            .with_policy(self.options.unresolved);
        if let Some(aliases) = TsconfigPaths::load(&cwd, self.runtime.as_ref()) {
            resolver = resolver.with_aliases(Arc::new(aliases));
        }

        let cache = CacheSettings::for_entry(&entry, &self.options.cache);

        let finalizer = Finalizer::new(FinalizeOptions {
            filename: self.options.filename.clone(),
            minify: self.options.minify,
            source_map: self.options.source_map,
            v8cache: self.options.v8cache,
            shebang: shebang.clone(),
        })
        .with_minifier(self.minifier.clone())
        .with_bytecode_compiler(Arc::clone(&self.bytecode));

        let ctx = CompileContext {
            entry,
            filename: self.options.filename.clone(),
            source_map: self.options.source_map,
            shebang,
            cache,
            extensions: SUPPORTED_EXTENSIONS,
            output: MemoryFs::new(),
            assets: AssetState::new(self.options.reserved_names()),
            resolver: Arc::new(resolver),
        };

        Ok(Session {
            ctx,
            finalizer,
            cwd,
        })
    }
}

async fn watch_loop(
    engine: Arc<dyn BuildEngine>,
    session: Session,
    shared: Arc<WatchShared>,
    mut changes: mpsc::Receiver<FileChange>,
    mut shutdown: oneshot::Receiver<()>,
    _watcher: Option<FileWatcher>,
) {
    run_cycle(engine.as_ref(), &session, &shared).await;

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            change = changes.recv() => {
                let Some(change) = change else { break };
                tracing::debug!("change detected: {}", change.path().display());

                // Coalesce a burst of changes into one cycle.
                while changes.try_recv().is_ok() {}

                shared.notify_rebuild();
                run_cycle(engine.as_ref(), &session, &shared).await;
            }
        }
    }

    if let Err(e) = engine.close().await {
        tracing::warn!("engine close failed after watch: {}", e);
    }
    tracing::debug!("watch loop stopped");
}

async fn run_cycle(engine: &dyn BuildEngine, session: &Session, shared: &WatchShared) {
    let started = Instant::now();
    session.ctx.assets.begin_cycle();
    session.ctx.resolver.begin_cycle();

    let outcome = match engine.compile(&session.ctx).await {
        Ok(()) => {
            session
                .finalizer
                .finalize(&session.ctx.output, &session.ctx.assets)
                .await
        }
        Err(e) => Err(e),
    };
    session.ctx.output.clear();

    match &outcome {
        Ok(_) => tracing::info!("rebuilt in {}ms", started.elapsed().as_millis()),
        Err(e) => tracing::warn!("build failed: {}", e),
    }
    shared.deliver(outcome);
}
