//! Job scheduling for the render queue.
//!
//! [`RenderQueue`] is the surface the editor uses: submit adapters, pump
//! status updates from its main loop, cancel, observe, shut down. One
//! background task polls every Running job's session; results cross back
//! into the main context through a bounded channel drained by
//! [`RenderQueue::pump`], which is also the only place `finalize` runs.

mod poller;
mod registry;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use renderq_config::QueueConfig;
use renderq_core::{Error, JobKind, JobSnapshot, Result, SessionAdapter, SessionId, StatusMessage};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::registry::Registry;

/// Callback driven by the polling loop while the host is shutting down with
/// jobs still pending. Receives the pending-job count.
pub type ShutdownObserver = Box<dyn Fn(usize) + Send + Sync>;

pub(crate) struct Inner {
    pub(crate) config: QueueConfig,
    pub(crate) registry: tokio::sync::Mutex<Registry>,
    pub(crate) status_tx: mpsc::Sender<StatusMessage>,
    status_rx: tokio::sync::Mutex<mpsc::Receiver<StatusMessage>>,
    poller: Mutex<Option<JoinHandle<()>>>,
    pub(crate) cancel: CancellationToken,
    pub(crate) draining: AtomicBool,
    pub(crate) shutdown_observer: Mutex<Option<ShutdownObserver>>,
}

/// Handle to the process-wide render queue. Cheap to clone; all clones share
/// one registry and one polling loop.
#[derive(Clone)]
pub struct RenderQueue {
    inner: Arc<Inner>,
}

impl RenderQueue {
    pub fn new(config: QueueConfig) -> Self {
        let (status_tx, status_rx) = mpsc::channel(config.status_channel_capacity);
        let registry = Registry::new(config.policy, config.grace_delay);
        Self {
            inner: Arc::new(Inner {
                config,
                registry: tokio::sync::Mutex::new(registry),
                status_tx,
                status_rx: tokio::sync::Mutex::new(status_rx),
                poller: Mutex::new(None),
                cancel: CancellationToken::new(),
                draining: AtomicBool::new(false),
                shutdown_observer: Mutex::new(None),
            }),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(QueueConfig::default())
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    /// Submit one unit of work. Creates the job Queued and starts it
    /// immediately when the policy allows; never blocks on the external
    /// process. The polling loop is started lazily on the first submission.
    pub async fn submit(&self, adapter: Box<dyn SessionAdapter>) -> Result<SessionId> {
        if self.inner.draining.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        self.ensure_poller();
        let uid = self.inner.registry.lock().await.submit(adapter).await;
        Ok(uid)
    }

    fn ensure_poller(&self) {
        let mut slot = self.inner.poller.lock().unwrap();
        if slot.is_none() {
            *slot = Some(tokio::spawn(poller::run(self.inner.clone())));
        }
    }

    /// Main-loop tick: drain the status channel, merge every message into
    /// the registry (completion runs `finalize` here, in the main context),
    /// then sweep expired terminal jobs. Returns the number of messages
    /// applied.
    pub async fn pump(&self) -> usize {
        let mut applied = 0;
        loop {
            let next = self.inner.status_rx.lock().await.try_recv();
            match next {
                Ok(msg) => {
                    self.inner.registry.lock().await.apply_status(msg).await;
                    applied += 1;
                }
                Err(_) => break,
            }
        }
        self.inner
            .registry
            .lock()
            .await
            .remove_expired(tokio::time::Instant::now())
            .await;
        applied
    }

    /// Cancel one job; Running jobs get a best-effort abort.
    pub async fn cancel(&self, uid: SessionId) -> Result<()> {
        self.inner.registry.lock().await.cancel(uid).await
    }

    pub async fn cancel_all(&self) {
        self.inner.registry.lock().await.cancel_all().await;
    }

    /// Ordered snapshot of every visible job, terminal ones included until
    /// their grace delay elapses.
    pub async fn snapshot(&self) -> Vec<JobSnapshot> {
        self.inner.registry.lock().await.snapshots()
    }

    /// Non-terminal job count per kind.
    pub async fn active_counts(&self) -> HashMap<JobKind, usize> {
        self.inner.registry.lock().await.active_counts()
    }

    /// Register the observer driven while shutting down with pending jobs.
    pub fn on_shutdown_progress(&self, observer: impl Fn(usize) + Send + Sync + 'static) {
        *self.inner.shutdown_observer.lock().unwrap() = Some(Box::new(observer));
    }

    /// Stop accepting submissions; running jobs keep polling so the
    /// shutdown-progress observer sees them drain.
    pub fn begin_shutdown(&self) {
        self.inner.draining.store(true, Ordering::SeqCst);
        info!("render queue draining for shutdown");
    }

    /// Final shutdown: abort every still-Running job so no external process
    /// is left orphaned, then stop the polling loop.
    pub async fn shutdown(&self) {
        self.begin_shutdown();
        self.inner.registry.lock().await.cancel_all().await;
        self.inner.cancel.cancel();
        let handle = self.inner.poller.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        info!("render queue shut down");
    }
}
