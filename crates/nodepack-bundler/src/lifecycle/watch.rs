//! Watch handle and its single-use registration slots.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::Result;
use crate::output::BuildResult;

/// Misuse of a [`WatchHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("Watcher handler already provided.")]
    HandlerAlreadySet,

    #[error("Rebuild handler already provided.")]
    RebuildHandlerAlreadySet,

    #[error("Watcher already closed.")]
    AlreadyClosed,
}

pub(crate) type ResultHandler = Arc<dyn Fn(Result<BuildResult>) + Send + Sync>;
pub(crate) type RebuildHandler = Arc<dyn Fn() + Send + Sync>;

/// Result handler slot. Until a handler is registered, the most recent
/// outcome is parked here.
enum ResultSlot {
    Unset { pending: Option<Result<BuildResult>> },
    Set(ResultHandler),
}

/// State shared between the handle and the watch loop.
pub(crate) struct WatchShared {
    results: Mutex<ResultSlot>,
    rebuild: Mutex<Option<RebuildHandler>>,
    /// Held for every result handler call, so outcomes arrive in cycle order.
    delivery: Mutex<()>,
}

impl WatchShared {
    pub(crate) fn new() -> Self {
        Self {
            results: Mutex::new(ResultSlot::Unset { pending: None }),
            rebuild: Mutex::new(None),
            delivery: Mutex::new(()),
        }
    }

    /// Hand one cycle's outcome to the result handler, or park it.
    pub(crate) fn deliver(&self, outcome: Result<BuildResult>) {
        let _delivering = self.delivery.lock();
        let mut slot = self.results.lock();
        let handler = match &mut *slot {
            ResultSlot::Set(handler) => Arc::clone(handler),
            ResultSlot::Unset { pending } => {
                if pending.is_some() {
                    tracing::debug!("no watch handler yet, replacing buffered outcome");
                }
                *pending = Some(outcome);
                return;
            }
        };
        drop(slot);

        handler(outcome);
    }

    pub(crate) fn notify_rebuild(&self) {
        let handler = self.rebuild.lock().clone();
        if let Some(handler) = handler {
            handler();
        }
    }

    fn set_handler(&self, handler: ResultHandler) -> Result<()> {
        // Checked before taking the delivery lock: a handler registering
        // again from inside a delivery must fail, not deadlock.
        if matches!(*self.results.lock(), ResultSlot::Set(_)) {
            return Err(LifecycleError::HandlerAlreadySet.into());
        }

        let _delivering = self.delivery.lock();
        let mut slot = self.results.lock();
        let pending = match &mut *slot {
            ResultSlot::Set(_) => return Err(LifecycleError::HandlerAlreadySet.into()),
            ResultSlot::Unset { pending } => pending.take(),
        };
        *slot = ResultSlot::Set(Arc::clone(&handler));
        drop(slot);

        if let Some(outcome) = pending {
            handler(outcome);
        }
        Ok(())
    }

    fn set_rebuild(&self, handler: RebuildHandler) -> Result<()> {
        let mut slot = self.rebuild.lock();
        if slot.is_some() {
            return Err(LifecycleError::RebuildHandlerAlreadySet.into());
        }
        *slot = Some(handler);
        Ok(())
    }
}

/// Control handle of a running watch session.
///
/// Dropping the handle stops the session like [`WatchHandle::close`].
pub struct WatchHandle {
    shared: Arc<WatchShared>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("closed", &self.shutdown.lock().is_none())
            .finish_non_exhaustive()
    }
}

impl WatchHandle {
    pub(crate) fn new(
        shared: Arc<WatchShared>,
        shutdown: oneshot::Sender<()>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            shared,
            shutdown: Mutex::new(Some(shutdown)),
            task: Mutex::new(Some(task)),
        }
    }

    /// Register the result handler.
    ///
    /// Receives every cycle's outcome, successful or not. If a cycle finished
    /// before registration, its outcome is delivered right away.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::HandlerAlreadySet`] on a second registration.
    pub fn handler<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(Result<BuildResult>) + Send + Sync + 'static,
    {
        self.shared.set_handler(Arc::new(handler))
    }

    /// Register a callback that runs when a change is detected, before the
    /// recompilation starts.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::RebuildHandlerAlreadySet`] on a second registration.
    pub fn rebuild<F>(&self, handler: F) -> Result<()>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared.set_rebuild(Arc::new(handler))
    }

    /// Stop watching. A cycle already in progress still completes.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::AlreadyClosed`] on a second call.
    pub fn close(&self) -> Result<()> {
        let sender = self
            .shutdown
            .lock()
            .take()
            .ok_or(LifecycleError::AlreadyClosed)?;
        // The loop may have ended on its own already.
        let _ = sender.send(());
        tracing::debug!("watch session closing");
        Ok(())
    }

    /// Wait for the watch loop to finish after [`WatchHandle::close`].
    pub async fn closed(&self) {
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!("watch loop ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        if let Some(sender) = self.shutdown.get_mut().take() {
            let _ = sender.send(());
        }
    }
}
