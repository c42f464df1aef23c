//! Motion-tracking analysis adapter.

use std::path::{Path, PathBuf};
use std::sync::Weak;

use async_trait::async_trait;
use renderq_core::{Error, JobKind, Result, SessionAdapter, SessionId, StatusMessage};

use crate::adapters::proxy::file_name;
use crate::launch::{ProcessSpec, RenderProcess};
use crate::progress::PhaseWeights;
use crate::session::SessionHandle;
use crate::watch::SessionWatch;

/// Receives the finished tracking-data file under its tracker label.
pub trait TrackingTarget: Send + Sync {
    fn tracking_data_ready(&self, label: &str, data: &Path);
}

#[derive(Debug, Clone)]
pub struct TrackingSpec {
    pub renderer: PathBuf,
    pub source: PathBuf,
    pub data_path: PathBuf,
    /// User-visible name for this tracked region.
    pub label: String,
    /// Tracker algorithm name handed to the external process.
    pub algorithm: String,
    /// Initial tracking rectangle in frame coordinates.
    pub rect_x: u32,
    pub rect_y: u32,
    pub rect_w: u32,
    pub rect_h: u32,
    pub range_in: u64,
    pub range_out: u64,
}

pub struct TrackingAdapter {
    uid: SessionId,
    spec: TrackingSpec,
    watch: SessionWatch,
    process: Option<RenderProcess>,
    target: Weak<dyn TrackingTarget>,
}

impl TrackingAdapter {
    pub fn new(sessions_root: &Path, spec: TrackingSpec, target: Weak<dyn TrackingTarget>) -> Self {
        let uid = SessionId::new();
        let session = SessionHandle::new(sessions_root, uid);
        Self {
            uid,
            spec,
            // Tracking dominates; writing the data file is a short tail.
            watch: SessionWatch::new(session, PhaseWeights::new(&[0.8, 0.2])),
            process: None,
            target,
        }
    }
}

#[async_trait]
impl SessionAdapter for TrackingAdapter {
    fn uid(&self) -> SessionId {
        self.uid
    }

    fn kind(&self) -> JobKind {
        JobKind::TrackingAnalysis
    }

    fn describe(&self) -> String {
        format!("Track '{}' in {}", self.spec.label, file_name(&self.spec.source))
    }

    async fn start(&mut self) -> Result<()> {
        self.watch.session().ensure_folder()?;
        let spec = ProcessSpec::new(&self.spec.renderer)
            .arg("session_id", self.uid)
            .arg("parent_folder", self.watch.session().folder().display())
            .arg("write_file", self.spec.data_path.display())
            .arg("range_in", self.spec.range_in)
            .arg("range_out", self.spec.range_out)
            .arg("algorithm", &self.spec.algorithm)
            .arg("rect_x", self.spec.rect_x)
            .arg("rect_y", self.spec.rect_y)
            .arg("rect_w", self.spec.rect_w)
            .arg("rect_h", self.spec.rect_h);
        self.process = Some(RenderProcess::spawn(&spec, self.uid)?);
        Ok(())
    }

    fn poll(&mut self) -> Option<StatusMessage> {
        self.watch.poll(JobKind::TrackingAnalysis)
    }

    async fn abort(&mut self) {
        if let Some(process) = self.process.as_mut() {
            process.request_kill();
        }
    }

    fn finalize(&mut self) -> Result<()> {
        let target = self.target.upgrade().ok_or(Error::TargetGone)?;
        target.tracking_data_ready(&self.spec.label, &self.spec.data_path);
        Ok(())
    }
}
