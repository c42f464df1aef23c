//! The background polling loop.
//!
//! One task for the whole queue, started lazily on first submission. Each
//! tick does only cheap, non-blocking status inspection; every message is
//! forwarded into the bounded status channel and applied later by the main
//! context's pump. One job's poll failure never takes the loop down, and
//! cross-thread mutation of main-context state never happens here.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::Inner;

pub(crate) async fn run(inner: Arc<Inner>) {
    let mut ticker = tokio::time::interval(inner.config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    debug!(interval = ?inner.config.poll_interval, "polling loop started");

    loop {
        tokio::select! {
            _ = inner.cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let messages = {
            let mut registry = inner.registry.lock().await;
            registry.poll_running()
        };
        for msg in messages {
            // The channel can stay full if the host stopped pumping, so the
            // send must also observe cancellation or shutdown would block
            // behind it. Receiver gone means the queue itself was dropped.
            tokio::select! {
                _ = inner.cancel.cancelled() => return,
                sent = inner.status_tx.send(msg) => {
                    if sent.is_err() {
                        return;
                    }
                }
            }
        }

        // Host shutdown with jobs still pending: keep the observer informed.
        if inner.draining.load(Ordering::SeqCst) {
            let pending = inner.registry.lock().await.pending_count();
            if pending > 0 {
                if let Some(observer) = inner.shutdown_observer.lock().unwrap().as_ref() {
                    observer(pending);
                }
            }
        }
    }

    debug!("polling loop stopped");
}
