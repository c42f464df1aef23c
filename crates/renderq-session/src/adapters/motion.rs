//! Slow/fast motion render adapter.

use std::path::{Path, PathBuf};
use std::sync::Weak;

use async_trait::async_trait;
use renderq_core::{Error, JobKind, Result, SessionAdapter, SessionId, StatusMessage};

use crate::adapters::proxy::file_name;
use crate::launch::{ProcessSpec, RenderProcess};
use crate::progress::PhaseWeights;
use crate::session::SessionHandle;
use crate::watch::SessionWatch;

/// Receives the rendered motion clip for insertion into the timeline.
pub trait MotionTarget: Send + Sync {
    fn motion_clip_ready(&self, clip: &Path, speed: f64);
}

#[derive(Debug, Clone)]
pub struct MotionSpec {
    pub renderer: PathBuf,
    pub source: PathBuf,
    pub write_file: PathBuf,
    pub profile_desc: String,
    /// Playback speed factor; 0.5 renders half speed, 2.0 double speed.
    pub speed: f64,
    pub range_in: u64,
    pub range_out: u64,
}

pub struct MotionRenderAdapter {
    uid: SessionId,
    spec: MotionSpec,
    watch: SessionWatch,
    process: Option<RenderProcess>,
    target: Weak<dyn MotionTarget>,
}

impl MotionRenderAdapter {
    pub fn new(sessions_root: &Path, spec: MotionSpec, target: Weak<dyn MotionTarget>) -> Self {
        let uid = SessionId::new();
        let session = SessionHandle::new(sessions_root, uid);
        Self {
            uid,
            spec,
            watch: SessionWatch::new(session, PhaseWeights::single()),
            process: None,
            target,
        }
    }
}

#[async_trait]
impl SessionAdapter for MotionRenderAdapter {
    fn uid(&self) -> SessionId {
        self.uid
    }

    fn kind(&self) -> JobKind {
        JobKind::MotionRender
    }

    fn describe(&self) -> String {
        format!("Motion {}x {}", self.spec.speed, file_name(&self.spec.source))
    }

    async fn start(&mut self) -> Result<()> {
        self.watch.session().ensure_folder()?;
        let spec = ProcessSpec::new(&self.spec.renderer)
            .arg("session_id", self.uid)
            .arg("parent_folder", self.watch.session().folder().display())
            .arg("write_file", self.spec.write_file.display())
            .arg("range_in", self.spec.range_in)
            .arg("range_out", self.spec.range_out)
            .arg("profile_desc", &self.spec.profile_desc)
            .arg("speed", self.spec.speed);
        self.process = Some(RenderProcess::spawn(&spec, self.uid)?);
        Ok(())
    }

    fn poll(&mut self) -> Option<StatusMessage> {
        self.watch.poll(JobKind::MotionRender)
    }

    async fn abort(&mut self) {
        if let Some(process) = self.process.as_mut() {
            process.request_kill();
        }
    }

    fn finalize(&mut self) -> Result<()> {
        let target = self.target.upgrade().ok_or(Error::TargetGone)?;
        target.motion_clip_ready(&self.spec.write_file, self.spec.speed);
        Ok(())
    }
}
