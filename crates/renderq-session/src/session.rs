//! Session folder layout.

use std::fs;
use std::path::{Path, PathBuf};

use renderq_core::{Result, SessionId};
use tracing::{debug, trace};

use crate::status::StatusArtifact;

/// Name of the status artifact inside a session folder.
pub const STATUS_FILE: &str = "status.json";

/// Name of the completion marker inside a session folder.
pub const COMPLETION_MARKER: &str = "render_complete";

/// Paths of one session's temp folder.
///
/// The external process writes its status artifact and completion marker
/// here, keyed by the session id it was handed at launch.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    uid: SessionId,
    folder: PathBuf,
}

impl SessionHandle {
    pub fn new(root: &Path, uid: SessionId) -> Self {
        Self {
            uid,
            folder: root.join(format!("session-{}", uid)),
        }
    }

    pub fn uid(&self) -> SessionId {
        self.uid
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn status_path(&self) -> PathBuf {
        self.folder.join(STATUS_FILE)
    }

    pub fn completion_marker(&self) -> PathBuf {
        self.folder.join(COMPLETION_MARKER)
    }

    /// Create the session folder before launching the external process.
    pub fn ensure_folder(&self) -> Result<()> {
        fs::create_dir_all(&self.folder)?;
        Ok(())
    }

    pub fn completion_written(&self) -> bool {
        self.completion_marker().exists()
    }

    /// Read the current status artifact.
    ///
    /// A missing file means the process has not written yet; a malformed
    /// file means we raced a partial overwrite. Both are expected transient
    /// states and yield `None`.
    pub fn read_status(&self) -> Option<StatusArtifact> {
        let bytes = fs::read(self.status_path()).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                trace!(uid = %self.uid, error = %e, "partial status artifact, skipping tick");
                None
            }
        }
    }

    /// Delete the session's temp folder. Called once completion has been
    /// consumed; failure only costs disk space, so it is logged and ignored.
    pub fn cleanup(&self) {
        if let Err(e) = fs::remove_dir_all(&self.folder) {
            if self.folder.exists() {
                debug!(uid = %self.uid, error = %e, "failed to remove session folder");
            }
        }
    }
}
