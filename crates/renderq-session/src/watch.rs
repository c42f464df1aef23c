//! Unified session polling.
//!
//! Every adapter polls the same way: completion marker first, then the
//! status artifact. This helper holds that shared logic so each adapter only
//! contributes its launch arguments, phase weights and finalize step.

use std::time::Duration;

use renderq_core::{JobKind, JobStatus, StatusMessage};
use tracing::info;

use crate::progress::PhaseWeights;
use crate::session::SessionHandle;

pub struct SessionWatch {
    session: SessionHandle,
    phases: PhaseWeights,
    completion_seen: bool,
    last_elapsed: Duration,
}

impl SessionWatch {
    pub fn new(session: SessionHandle, phases: PhaseWeights) -> Self {
        Self {
            session,
            phases,
            completion_seen: false,
            last_elapsed: Duration::ZERO,
        }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// One non-blocking poll step.
    ///
    /// Completion is reported at most once; the session's temp folder is
    /// deleted as the completion message is produced.
    pub fn poll(&mut self, kind: JobKind) -> Option<StatusMessage> {
        if self.completion_seen {
            return None;
        }

        if self.session.completion_written() {
            self.completion_seen = true;
            let elapsed = self
                .session
                .read_status()
                .map(|artifact| artifact.elapsed())
                .unwrap_or(self.last_elapsed);
            self.session.cleanup();
            info!(uid = %self.session.uid(), kind = %kind, "render session completed");
            return Some(StatusMessage {
                uid: self.session.uid(),
                kind,
                status: JobStatus::Completed,
                progress: 1.0,
                text: "Completed".to_string(),
                elapsed,
            });
        }

        let artifact = self.session.read_status()?;
        let progress = self.phases.overall(artifact.step as usize, artifact.fraction());
        self.last_elapsed = artifact.elapsed();

        Some(StatusMessage {
            uid: self.session.uid(),
            kind,
            status: JobStatus::Running,
            progress,
            text: format!(
                "{} {}/{}",
                artifact.describe_step(),
                artifact.unit,
                artifact.total_units
            ),
            elapsed: self.last_elapsed,
        })
    }
}
