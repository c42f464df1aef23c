//! Proxy render adapter.

use std::path::{Path, PathBuf};
use std::sync::Weak;

use async_trait::async_trait;
use renderq_core::{Error, JobKind, Result, SessionAdapter, SessionId, StatusMessage};

use crate::launch::{ProcessSpec, RenderProcess};
use crate::progress::PhaseWeights;
use crate::session::SessionHandle;
use crate::watch::SessionWatch;

/// The media item a finished proxy is attached to.
///
/// Held weakly: the user may delete the media item while the encode is
/// still running, in which case finalize becomes a no-op completion.
pub trait ProxyTarget: Send + Sync {
    fn attach_proxy(&self, source: &Path, proxy: &Path);
}

/// Parameters for one proxy encode.
#[derive(Debug, Clone)]
pub struct ProxySpec {
    /// Path to the external proxy encoder program.
    pub renderer: PathBuf,
    /// Source media file.
    pub source: PathBuf,
    /// Where the encoder writes the proxy file.
    pub proxy_path: PathBuf,
    /// Encoding profile description, e.g. "proxy 960x540 25fps".
    pub profile_desc: String,
    pub range_in: u64,
    pub range_out: u64,
}

pub struct ProxyRenderAdapter {
    uid: SessionId,
    spec: ProxySpec,
    watch: SessionWatch,
    process: Option<RenderProcess>,
    target: Weak<dyn ProxyTarget>,
}

impl ProxyRenderAdapter {
    pub fn new(sessions_root: &Path, spec: ProxySpec, target: Weak<dyn ProxyTarget>) -> Self {
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
impl SessionAdapter for ProxyRenderAdapter {
    fn uid(&self) -> SessionId {
        self.uid
    }

    fn kind(&self) -> JobKind {
        JobKind::ProxyRender
    }

    fn describe(&self) -> String {
        format!("Proxy for {}", file_name(&self.spec.source))
    }

    async fn start(&mut self) -> Result<()> {
        self.watch.session().ensure_folder()?;
        let spec = ProcessSpec::new(&self.spec.renderer)
            .arg("session_id", self.uid)
            .arg("parent_folder", self.watch.session().folder().display())
            .arg("write_file", self.spec.proxy_path.display())
            .arg("range_in", self.spec.range_in)
            .arg("range_out", self.spec.range_out)
            .arg("profile_desc", &self.spec.profile_desc);
        self.process = Some(RenderProcess::spawn(&spec, self.uid)?);
        Ok(())
    }

    fn poll(&mut self) -> Option<StatusMessage> {
        self.watch.poll(JobKind::ProxyRender)
    }

    async fn abort(&mut self) {
        if let Some(process) = self.process.as_mut() {
            process.request_kill();
        }
    }

    fn finalize(&mut self) -> Result<()> {
        let target = self.target.upgrade().ok_or(Error::TargetGone)?;
        target.attach_proxy(&self.spec.source, &self.spec.proxy_path);
        Ok(())
    }
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
