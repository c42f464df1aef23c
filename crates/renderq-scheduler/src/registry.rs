//! The queue registry: the ordered collection of active jobs.
//!
//! The registry is the only piece of mutable shared state in the system.
//! All mutation is serialized through one `tokio::sync::Mutex` held by the
//! queue handle; the methods here assume that lock is held.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use renderq_config::QueuePolicy;
use renderq_core::{
    Error, JobKind, JobSnapshot, JobStatus, PROGRESS_UNKNOWN, Result, SessionAdapter, SessionId,
    StatusMessage, clamp_progress,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// One tracked unit of externally delegated work. Owns its adapter
/// exclusively; both are destroyed together when the job is removed.
pub(crate) struct Job {
    pub uid: SessionId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub progress: f32,
    pub text: String,
    pub elapsed: Duration,
    pub submitted_at: DateTime<Utc>,
    /// Set when the job turns terminal; removal happens after this instant.
    pub expires_at: Option<Instant>,
    pub adapter: Box<dyn SessionAdapter>,
}

impl Job {
    fn new(adapter: Box<dyn SessionAdapter>) -> Self {
        Self {
            uid: adapter.uid(),
            kind: adapter.kind(),
            status: JobStatus::Queued,
            progress: 0.0,
            text: adapter.describe(),
            elapsed: Duration::ZERO,
            submitted_at: Utc::now(),
            expires_at: None,
            adapter,
        }
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            uid: self.uid,
            kind: self.kind,
            status: self.status,
            progress: self.progress,
            text: self.text.clone(),
            elapsed: self.elapsed,
            submitted_at: self.submitted_at,
        }
    }
}

pub(crate) struct Registry {
    policy: QueuePolicy,
    grace_delay: Duration,
    jobs: Vec<Job>,
}

impl Registry {
    pub fn new(policy: QueuePolicy, grace_delay: Duration) -> Self {
        Self {
            policy,
            grace_delay,
            jobs: Vec::new(),
        }
    }

    /// Append a job and start it if the policy allows. Never blocks on the
    /// external process itself; `start()` only spawns it.
    pub async fn submit(&mut self, adapter: Box<dyn SessionAdapter>) -> SessionId {
        let job = Job::new(adapter);
        let uid = job.uid;
        info!(uid = %uid, kind = %job.kind, "job submitted");
        self.jobs.push(job);

        if self.policy == QueuePolicy::Parallel || !self.has_running() {
            self.start_job(uid).await;
        }
        uid
    }

    fn has_running(&self) -> bool {
        self.jobs.iter().any(|j| j.status == JobStatus::Running)
    }

    fn expiry(&self) -> Instant {
        Instant::now() + self.grace_delay
    }

    /// Queued -> Running, or Queued -> Cancelled if the spawn itself fails.
    async fn start_job(&mut self, uid: SessionId) -> bool {
        let expires_at = self.expiry();
        let Some(job) = self.jobs.iter_mut().find(|j| j.uid == uid) else {
            return false;
        };
        match job.adapter.start().await {
            Ok(()) => {
                job.status = JobStatus::Running;
                info!(uid = %uid, kind = %job.kind, "job started");
                true
            }
            Err(e) => {
                warn!(uid = %uid, kind = %job.kind, error = %e, "job failed to start");
                job.status = JobStatus::Cancelled;
                job.progress = PROGRESS_UNKNOWN;
                job.text = format!("Failed to start: {}", e);
                job.expires_at = Some(expires_at);
                false
            }
        }
    }

    /// Start the oldest Queued job (FIFO), walking past any that fail to
    /// start.
    async fn start_next_queued(&mut self) {
        loop {
            let Some(uid) = self
                .jobs
                .iter()
                .find(|j| j.status == JobStatus::Queued)
                .map(|j| j.uid)
            else {
                return;
            };
            if self.start_job(uid).await {
                return;
            }
        }
    }

    /// Merge one status message into its job.
    ///
    /// Messages for unknown or already-terminal jobs are dropped, which
    /// makes re-applying a terminal status a no-op. Runs in the main
    /// context, so completion may run `finalize` here.
    pub async fn apply_status(&mut self, msg: StatusMessage) {
        let Some(idx) = self.jobs.iter().position(|j| j.uid == msg.uid) else {
            debug!(uid = %msg.uid, "status message for unknown job dropped");
            return;
        };
        if self.jobs[idx].status.is_terminal() {
            return;
        }

        let mut completed = false;
        {
            let job = &mut self.jobs[idx];
            match msg.status {
                JobStatus::Queued | JobStatus::Running => {
                    job.status = JobStatus::Running;
                    job.progress = clamp_progress(msg.progress);
                    job.text = msg.text;
                    job.elapsed = msg.elapsed;
                }
                JobStatus::Completed => {
                    match job.adapter.finalize() {
                        Ok(()) => {}
                        Err(Error::TargetGone) => {
                            debug!(uid = %job.uid, "completion target gone, no-op completion");
                        }
                        Err(e) => {
                            warn!(uid = %job.uid, error = %e, "finalize failed");
                        }
                    }
                    job.status = JobStatus::Completed;
                    job.progress = 1.0;
                    job.text = msg.text;
                    job.elapsed = msg.elapsed;
                    job.expires_at = Some(Instant::now() + self.grace_delay);
                    info!(uid = %job.uid, kind = %job.kind, "job completed");
                    completed = true;
                }
                JobStatus::Cancelled => {
                    // Adapters never emit this themselves; honor it anyway.
                    if job.status == JobStatus::Running {
                        job.adapter.abort().await;
                    }
                    job.status = JobStatus::Cancelled;
                    job.progress = PROGRESS_UNKNOWN;
                    job.text = msg.text;
                    job.expires_at = Some(Instant::now() + self.grace_delay);
                }
            }
        }

        if completed && self.policy == QueuePolicy::Sequential {
            self.start_next_queued().await;
        }
    }

    /// Cancel one job. Running jobs get a best-effort abort; the job turns
    /// Cancelled regardless of whether the process has actually exited.
    pub async fn cancel(&mut self, uid: SessionId) -> Result<()> {
        let expires_at = self.expiry();
        let Some(job) = self.jobs.iter_mut().find(|j| j.uid == uid) else {
            return Err(Error::UnknownJob(uid));
        };
        if job.status.is_terminal() {
            return Ok(());
        }
        if job.status == JobStatus::Running {
            job.adapter.abort().await;
        }
        job.status = JobStatus::Cancelled;
        job.progress = PROGRESS_UNKNOWN;
        job.text = "Cancelled".to_string();
        job.expires_at = Some(expires_at);
        info!(uid = %uid, kind = %job.kind, "job cancelled");
        Ok(())
    }

    pub async fn cancel_all(&mut self) {
        let uids: Vec<SessionId> = self
            .jobs
            .iter()
            .filter(|j| !j.status.is_terminal())
            .map(|j| j.uid)
            .collect();
        for uid in uids {
            let _ = self.cancel(uid).await;
        }
    }

    /// Sweep terminal jobs whose grace delay has elapsed, then start a
    /// Queued job if nothing is Running (covers cancellation freeing the
    /// serial slot).
    pub async fn remove_expired(&mut self, now: Instant) {
        self.jobs.retain(|j| match j.expires_at {
            Some(at) => now < at,
            None => true,
        });
        if !self.has_running() {
            self.start_next_queued().await;
        }
    }

    /// One polling pass over every Running job's adapter.
    pub fn poll_running(&mut self) -> Vec<StatusMessage> {
        self.jobs
            .iter_mut()
            .filter(|j| j.status == JobStatus::Running)
            .filter_map(|j| j.adapter.poll())
            .collect()
    }

    /// Ordered read-only view for the queue UI.
    pub fn snapshots(&self) -> Vec<JobSnapshot> {
        self.jobs.iter().map(Job::snapshot).collect()
    }

    /// Non-terminal job count per kind.
    pub fn active_counts(&self) -> HashMap<JobKind, usize> {
        let mut counts = HashMap::new();
        for job in self.jobs.iter().filter(|j| !j.status.is_terminal()) {
            *counts.entry(job.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Jobs not yet terminal, for the shutdown-progress observer.
    pub fn pending_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|j| !j.status.is_terminal())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use renderq_core::Error;

    use super::*;

    #[derive(Default)]
    struct StubState {
        started: AtomicBool,
        aborted: AtomicBool,
        finalized: AtomicUsize,
    }

    struct StubAdapter {
        uid: SessionId,
        kind: JobKind,
        state: Arc<StubState>,
        fail_start: bool,
        finalize_target_gone: bool,
    }

    impl StubAdapter {
        fn new(kind: JobKind) -> (Self, Arc<StubState>) {
            let state = Arc::new(StubState::default());
            (
                Self {
                    uid: SessionId::new(),
                    kind,
                    state: state.clone(),
                    fail_start: false,
                    finalize_target_gone: false,
                },
                state,
            )
        }

        fn failing_start(kind: JobKind) -> Self {
            let (mut stub, _) = Self::new(kind);
            stub.fail_start = true;
            stub
        }
    }

    #[async_trait]
    impl SessionAdapter for StubAdapter {
        fn uid(&self) -> SessionId {
            self.uid
        }

        fn kind(&self) -> JobKind {
            self.kind
        }

        fn describe(&self) -> String {
            format!("stub {}", self.kind)
        }

        async fn start(&mut self) -> Result<()> {
            if self.fail_start {
                return Err(Error::SpawnFailed("stub".to_string()));
            }
            self.state.started.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn poll(&mut self) -> Option<StatusMessage> {
            None
        }

        async fn abort(&mut self) {
            self.state.aborted.store(true, Ordering::SeqCst);
        }

        fn finalize(&mut self) -> Result<()> {
            if self.finalize_target_gone {
                return Err(Error::TargetGone);
            }
            self.state.finalized.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn completed_msg(uid: SessionId, kind: JobKind) -> StatusMessage {
        StatusMessage {
            uid,
            kind,
            status: JobStatus::Completed,
            progress: 1.0,
            text: "Completed".to_string(),
            elapsed: Duration::from_secs(9),
        }
    }

    fn running_msg(uid: SessionId, kind: JobKind, progress: f32) -> StatusMessage {
        StatusMessage {
            uid,
            kind,
            status: JobStatus::Running,
            progress,
            text: "encoding 42/100".to_string(),
            elapsed: Duration::from_secs(3),
        }
    }

    fn sequential() -> Registry {
        Registry::new(QueuePolicy::Sequential, Duration::from_millis(100))
    }

    #[tokio::test]
    async fn test_sequential_starts_only_first() {
        let mut registry = sequential();
        for _ in 0..3 {
            let (stub, _) = StubAdapter::new(JobKind::ProxyRender);
            registry.submit(Box::new(stub)).await;
        }

        let statuses: Vec<JobStatus> = registry.snapshots().iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![JobStatus::Running, JobStatus::Queued, JobStatus::Queued]
        );
    }

    #[tokio::test]
    async fn test_parallel_starts_everything() {
        let mut registry = Registry::new(QueuePolicy::Parallel, Duration::from_millis(100));
        for _ in 0..3 {
            let (stub, _) = StubAdapter::new(JobKind::MotionRender);
            registry.submit(Box::new(stub)).await;
        }

        assert!(
            registry
                .snapshots()
                .iter()
                .all(|s| s.status == JobStatus::Running)
        );
    }

    #[tokio::test]
    async fn test_completion_advances_fifo_queue() {
        let mut registry = sequential();
        let (a, a_state) = StubAdapter::new(JobKind::ProxyRender);
        let (b, b_state) = StubAdapter::new(JobKind::ProxyRender);
        let (c, _) = StubAdapter::new(JobKind::ProxyRender);
        let a_uid = registry.submit(Box::new(a)).await;
        registry.submit(Box::new(b)).await;
        registry.submit(Box::new(c)).await;

        registry
            .apply_status(completed_msg(a_uid, JobKind::ProxyRender))
            .await;

        let snapshots = registry.snapshots();
        assert_eq!(snapshots[0].status, JobStatus::Completed);
        assert_eq!(snapshots[0].progress, 1.0);
        assert_eq!(snapshots[1].status, JobStatus::Running);
        assert_eq!(snapshots[2].status, JobStatus::Queued);
        assert_eq!(a_state.finalized.load(Ordering::SeqCst), 1);
        assert!(b_state.started.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_running_update_merges_clamped_progress() {
        let mut registry = sequential();
        let (stub, _) = StubAdapter::new(JobKind::ProxyRender);
        let uid = registry.submit(Box::new(stub)).await;

        registry
            .apply_status(running_msg(uid, JobKind::ProxyRender, 1.07))
            .await;

        let snapshot = &registry.snapshots()[0];
        assert_eq!(snapshot.status, JobStatus::Running);
        assert_eq!(snapshot.progress, 1.0);
        assert_eq!(snapshot.text, "encoding 42/100");
        assert_eq!(snapshot.elapsed, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_cancel_running_aborts_and_marks_sentinel() {
        let mut registry = sequential();
        let (stub, state) = StubAdapter::new(JobKind::StabilizeAnalysis);
        let uid = registry.submit(Box::new(stub)).await;

        registry.cancel(uid).await.unwrap();

        let snapshot = &registry.snapshots()[0];
        assert_eq!(snapshot.status, JobStatus::Cancelled);
        assert_eq!(snapshot.progress, PROGRESS_UNKNOWN);
        assert!(state.aborted.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancel_queued_skips_abort() {
        let mut registry = sequential();
        let (first, _) = StubAdapter::new(JobKind::ProxyRender);
        let (queued, queued_state) = StubAdapter::new(JobKind::ProxyRender);
        registry.submit(Box::new(first)).await;
        let queued_uid = registry.submit(Box::new(queued)).await;

        registry.cancel(queued_uid).await.unwrap();

        assert_eq!(registry.snapshots()[1].status, JobStatus::Cancelled);
        assert!(!queued_state.aborted.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancel_unknown_job_errors() {
        let mut registry = sequential();
        let result = registry.cancel(SessionId::new()).await;
        assert!(matches!(result, Err(Error::UnknownJob(_))));
    }

    #[tokio::test]
    async fn test_terminal_status_reapply_is_noop() {
        let mut registry = sequential();
        let (stub, state) = StubAdapter::new(JobKind::ProxyRender);
        let uid = registry.submit(Box::new(stub)).await;

        registry
            .apply_status(completed_msg(uid, JobKind::ProxyRender))
            .await;
        registry
            .apply_status(completed_msg(uid, JobKind::ProxyRender))
            .await;
        registry
            .apply_status(running_msg(uid, JobKind::ProxyRender, 0.2))
            .await;

        let snapshot = &registry.snapshots()[0];
        assert_eq!(snapshot.status, JobStatus::Completed);
        assert_eq!(snapshot.progress, 1.0);
        assert_eq!(state.finalized.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_finalize_target_gone_still_completes() {
        let mut registry = sequential();
        let (mut stub, state) = StubAdapter::new(JobKind::PluginRender);
        stub.finalize_target_gone = true;
        let uid = registry.submit(Box::new(stub)).await;

        registry
            .apply_status(completed_msg(uid, JobKind::PluginRender))
            .await;

        assert_eq!(registry.snapshots()[0].status, JobStatus::Completed);
        assert_eq!(state.finalized.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_job_stays_visible_through_grace_delay() {
        let mut registry = sequential();
        let (stub, _) = StubAdapter::new(JobKind::ProxyRender);
        let uid = registry.submit(Box::new(stub)).await;
        registry
            .apply_status(completed_msg(uid, JobKind::ProxyRender))
            .await;

        tokio::time::advance(Duration::from_millis(50)).await;
        registry.remove_expired(Instant::now()).await;
        assert_eq!(registry.snapshots().len(), 1);

        tokio::time::advance(Duration::from_millis(60)).await;
        registry.remove_expired(Instant::now()).await;
        assert!(registry.snapshots().is_empty());
    }

    #[tokio::test]
    async fn test_sweep_backfills_serial_slot_after_cancel() {
        let mut registry = sequential();
        let (first, _) = StubAdapter::new(JobKind::ProxyRender);
        let (second, second_state) = StubAdapter::new(JobKind::ProxyRender);
        let first_uid = registry.submit(Box::new(first)).await;
        registry.submit(Box::new(second)).await;

        registry.cancel(first_uid).await.unwrap();
        assert_eq!(registry.snapshots()[1].status, JobStatus::Queued);

        registry.remove_expired(Instant::now()).await;
        assert_eq!(registry.snapshots()[1].status, JobStatus::Running);
        assert!(second_state.started.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_start_failure_walks_to_next_queued() {
        let mut registry = sequential();
        let (first, _) = StubAdapter::new(JobKind::ProxyRender);
        let (third, third_state) = StubAdapter::new(JobKind::ProxyRender);
        let first_uid = registry.submit(Box::new(first)).await;
        registry
            .submit(Box::new(StubAdapter::failing_start(JobKind::ProxyRender)))
            .await;
        registry.submit(Box::new(third)).await;

        registry
            .apply_status(completed_msg(first_uid, JobKind::ProxyRender))
            .await;

        let snapshots = registry.snapshots();
        assert_eq!(snapshots[1].status, JobStatus::Cancelled);
        assert!(snapshots[1].text.starts_with("Failed to start"));
        assert_eq!(snapshots[2].status, JobStatus::Running);
        assert!(third_state.started.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_start_job_expires_after_grace_delay() {
        let mut registry = sequential();
        registry
            .submit(Box::new(StubAdapter::failing_start(JobKind::ProxyRender)))
            .await;
        assert_eq!(registry.snapshots()[0].status, JobStatus::Cancelled);

        tokio::time::advance(Duration::from_millis(110)).await;
        registry.remove_expired(Instant::now()).await;
        assert!(registry.snapshots().is_empty());
    }

    #[tokio::test]
    async fn test_sequential_never_exceeds_one_running() {
        let mut registry = sequential();
        let mut uids = Vec::new();
        for _ in 0..4 {
            let (stub, _) = StubAdapter::new(JobKind::ProxyRender);
            uids.push(registry.submit(Box::new(stub)).await);
        }

        for uid in uids {
            let running = registry
                .snapshots()
                .iter()
                .filter(|s| s.status == JobStatus::Running)
                .count();
            assert!(running <= 1);
            registry
                .apply_status(completed_msg(uid, JobKind::ProxyRender))
                .await;
        }
    }

    #[tokio::test]
    async fn test_active_counts_by_kind() {
        let mut registry = Registry::new(QueuePolicy::Parallel, Duration::from_millis(100));
        let (proxy, _) = StubAdapter::new(JobKind::ProxyRender);
        let (motion_a, _) = StubAdapter::new(JobKind::MotionRender);
        let (motion_b, _) = StubAdapter::new(JobKind::MotionRender);
        let proxy_uid = registry.submit(Box::new(proxy)).await;
        registry.submit(Box::new(motion_a)).await;
        registry.submit(Box::new(motion_b)).await;

        registry
            .apply_status(completed_msg(proxy_uid, JobKind::ProxyRender))
            .await;

        let counts = registry.active_counts();
        assert_eq!(counts.get(&JobKind::ProxyRender), None);
        assert_eq!(counts.get(&JobKind::MotionRender), Some(&2));
    }

    #[tokio::test]
    async fn test_unknown_status_message_is_dropped() {
        let mut registry = sequential();
        registry
            .apply_status(running_msg(SessionId::new(), JobKind::ProxyRender, 0.5))
            .await;
        assert!(registry.snapshots().is_empty());
    }
}
