//! The session-adapter trait.
//!
//! One implementation exists per job kind. An adapter owns everything needed
//! to drive one external render process: the session id, kind-specific
//! parameters, and the back-reference used to publish the finished result.

use async_trait::async_trait;

use crate::{JobKind, Result, SessionId, StatusMessage};

/// Per-kind start/poll/abort/finalize logic for one external render process.
///
/// An adapter is owned by exactly one job and destroyed with it.
#[async_trait]
pub trait SessionAdapter: Send + Sync {
    /// Session-correlation id shared with the external process.
    fn uid(&self) -> SessionId;

    /// The job kind this adapter implements.
    fn kind(&self) -> JobKind;

    /// One-line description shown in the queue UI.
    fn describe(&self) -> String;

    /// Launch the external process. Must return promptly; any waiting on
    /// process exit happens in a detached helper task.
    async fn start(&mut self) -> Result<()>;

    /// Non-blocking inspection of the session's status artifact.
    ///
    /// Returns `None` when no update is available, which includes the
    /// expected race of polling before the external process has written
    /// anything. Reports completion at most once.
    fn poll(&mut self) -> Option<StatusMessage>;

    /// Best-effort asynchronous cancellation request. Does not wait for the
    /// process to actually exit.
    async fn abort(&mut self);

    /// Convert the external artifact into an editor-visible result.
    ///
    /// Called exactly once, after completion is confirmed and before the job
    /// is marked Completed. Runs inside the single-threaded main context
    /// because it mutates shared editing state. Returns
    /// [`Error::TargetGone`](crate::Error::TargetGone) when the editor
    /// object to update no longer exists.
    fn finalize(&mut self) -> Result<()>;
}
