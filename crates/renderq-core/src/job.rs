//! Job kinds, statuses and status messages.

use std::time::Duration;

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::SessionId;

/// The kind of external render work a job delegates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum JobKind {
    /// Proxy media encode for smooth timeline playback.
    #[display("proxy render")]
    ProxyRender,
    /// Slow/fast motion re-render of a source clip.
    #[display("motion render")]
    MotionRender,
    /// Stabilization analysis producing a stabilize-data file.
    #[display("stabilize analysis")]
    StabilizeAnalysis,
    /// Motion-tracking analysis producing a tracking-data file.
    #[display("tracking analysis")]
    TrackingAnalysis,
    /// Container clip re-render.
    #[display("container render")]
    ContainerRender,
    /// Generated-media plugin render.
    #[display("plugin render")]
    PluginRender,
}

/// Lifecycle status of a job.
///
/// Transitions are `Queued -> Running -> Completed`, with `Cancelled`
/// reachable from both non-terminal states. Nothing leaves a terminal state;
/// removal from the registry is the only further event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum JobStatus {
    #[display("queued")]
    Queued,
    #[display("running")]
    Running,
    #[display("completed")]
    Completed,
    #[display("cancelled")]
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Cancelled)
    }
}

/// Sentinel progress value for cancelled jobs and jobs with no known
/// progress. Every other progress value lies in `[0, 1]`.
pub const PROGRESS_UNKNOWN: f32 = -1.0;

/// Clamp an externally reported fraction to `[0, 1]`.
///
/// External encoders may overshoot the nominal length slightly, so values
/// above 1 are expected and folded back rather than rejected.
pub fn clamp_progress(fraction: f32) -> f32 {
    if fraction.is_nan() {
        return 0.0;
    }
    fraction.clamp(0.0, 1.0)
}

/// Immutable status update produced by one adapter poll.
///
/// Consumed synchronously by the registry, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusMessage {
    pub uid: SessionId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub progress: f32,
    pub text: String,
    pub elapsed: Duration,
}

/// Read-only view of one job for the queue UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub uid: SessionId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub progress: f32,
    pub text: String,
    pub elapsed: Duration,
    pub submitted_at: DateTime<Utc>,
}
