//! Stabilization analysis adapter.
//!
//! Two phases: motion analysis over the frame range, then serialization of
//! the stabilize-data file. Analysis dominates the cost.

use std::path::{Path, PathBuf};
use std::sync::Weak;

use async_trait::async_trait;
use renderq_core::{Error, JobKind, Result, SessionAdapter, SessionId, StatusMessage};

use crate::adapters::proxy::file_name;
use crate::launch::{ProcessSpec, RenderProcess};
use crate::progress::PhaseWeights;
use crate::session::SessionHandle;
use crate::watch::SessionWatch;

/// Receives the finished stabilize-data file.
pub trait StabilizeTarget: Send + Sync {
    fn stabilize_data_ready(&self, data: &Path);
}

#[derive(Debug, Clone)]
pub struct StabilizeSpec {
    pub renderer: PathBuf,
    pub source: PathBuf,
    /// Where the analyzer writes the stabilize-data file.
    pub data_path: PathBuf,
    /// Analyzer sensitivity, 1..=10.
    pub shakiness: u32,
    pub range_in: u64,
    pub range_out: u64,
}

pub struct StabilizeAdapter {
    uid: SessionId,
    spec: StabilizeSpec,
    watch: SessionWatch,
    process: Option<RenderProcess>,
    target: Weak<dyn StabilizeTarget>,
}

impl StabilizeAdapter {
    pub fn new(
        sessions_root: &Path,
        spec: StabilizeSpec,
        target: Weak<dyn StabilizeTarget>,
    ) -> Self {
        let uid = SessionId::new();
        let session = SessionHandle::new(sessions_root, uid);
        Self {
            uid,
            spec,
            watch: SessionWatch::new(session, PhaseWeights::new(&[0.9, 0.1])),
            process: None,
            target,
        }
    }
}

#[async_trait]
impl SessionAdapter for StabilizeAdapter {
    fn uid(&self) -> SessionId {
        self.uid
    }

    fn kind(&self) -> JobKind {
        JobKind::StabilizeAnalysis
    }

    fn describe(&self) -> String {
        format!("Stabilize {}", file_name(&self.spec.source))
    }

    async fn start(&mut self) -> Result<()> {
        self.watch.session().ensure_folder()?;
        let spec = ProcessSpec::new(&self.spec.renderer)
            .arg("session_id", self.uid)
            .arg("parent_folder", self.watch.session().folder().display())
            .arg("write_file", self.spec.data_path.display())
            .arg("range_in", self.spec.range_in)
            .arg("range_out", self.spec.range_out)
            .arg("shakiness", self.spec.shakiness);
        self.process = Some(RenderProcess::spawn(&spec, self.uid)?);
        Ok(())
    }

    fn poll(&mut self) -> Option<StatusMessage> {
        self.watch.poll(JobKind::StabilizeAnalysis)
    }

    async fn abort(&mut self) {
        if let Some(process) = self.process.as_mut() {
            process.request_kill();
        }
    }

    fn finalize(&mut self) -> Result<()> {
        let target = self.target.upgrade().ok_or(Error::TargetGone)?;
        target.stabilize_data_ready(&self.spec.data_path);
        Ok(())
    }
}
