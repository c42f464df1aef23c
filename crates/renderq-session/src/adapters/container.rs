//! Container and generated-media plugin render adapter.
//!
//! Both variants speak the same two-phase protocol (frame generation, then
//! encode), so one adapter covers them; the variant only selects the job
//! kind and the script argument handed to the external process.

use std::path::{Path, PathBuf};
use std::sync::Weak;

use async_trait::async_trait;
use renderq_core::{Error, JobKind, Result, SessionAdapter, SessionId, StatusMessage};

use crate::adapters::proxy::file_name;
use crate::launch::{ProcessSpec, RenderProcess};
use crate::progress::PhaseWeights;
use crate::session::SessionHandle;
use crate::watch::SessionWatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerVariant {
    /// Re-render of a container clip's program.
    Container,
    /// Generated-media plugin render.
    Plugin,
}

/// Receives the rendered media file.
pub trait ContainerTarget: Send + Sync {
    fn media_ready(&self, media: &Path);
}

#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub renderer: PathBuf,
    /// Program or plugin script the renderer executes per frame.
    pub script: PathBuf,
    pub write_file: PathBuf,
    pub profile_desc: String,
    pub variant: ContainerVariant,
    pub range_in: u64,
    pub range_out: u64,
}

pub struct ContainerRenderAdapter {
    uid: SessionId,
    spec: ContainerSpec,
    watch: SessionWatch,
    process: Option<RenderProcess>,
    target: Weak<dyn ContainerTarget>,
}

impl ContainerRenderAdapter {
    pub fn new(
        sessions_root: &Path,
        spec: ContainerSpec,
        target: Weak<dyn ContainerTarget>,
    ) -> Self {
        let uid = SessionId::new();
        let session = SessionHandle::new(sessions_root, uid);
        Self {
            uid,
            spec,
            watch: SessionWatch::new(session, PhaseWeights::new(&[0.7, 0.3])),
            process: None,
            target,
        }
    }
}

#[async_trait]
impl SessionAdapter for ContainerRenderAdapter {
    fn uid(&self) -> SessionId {
        self.uid
    }

    fn kind(&self) -> JobKind {
        match self.spec.variant {
            ContainerVariant::Container => JobKind::ContainerRender,
            ContainerVariant::Plugin => JobKind::PluginRender,
        }
    }

    fn describe(&self) -> String {
        match self.spec.variant {
            ContainerVariant::Container => {
                format!("Container render {}", file_name(&self.spec.script))
            }
            ContainerVariant::Plugin => format!("Plugin render {}", file_name(&self.spec.script)),
        }
    }

    async fn start(&mut self) -> Result<()> {
        self.watch.session().ensure_folder()?;
        let spec = ProcessSpec::new(&self.spec.renderer)
            .arg("session_id", self.uid)
            .arg("parent_folder", self.watch.session().folder().display())
            .arg("script", self.spec.script.display())
            .arg("write_file", self.spec.write_file.display())
            .arg("range_in", self.spec.range_in)
            .arg("range_out", self.spec.range_out)
            .arg("profile_desc", &self.spec.profile_desc);
        self.process = Some(RenderProcess::spawn(&spec, self.uid)?);
        Ok(())
    }

    fn poll(&mut self) -> Option<StatusMessage> {
        let kind = self.kind();
        self.watch.poll(kind)
    }

    async fn abort(&mut self) {
        if let Some(process) = self.process.as_mut() {
            process.request_kill();
        }
    }

    fn finalize(&mut self) -> Result<()> {
        let target = self.target.upgrade().ok_or(Error::TargetGone)?;
        target.media_ready(&self.spec.write_file);
        Ok(())
    }
}
