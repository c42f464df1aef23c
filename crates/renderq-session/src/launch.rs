//! External render-process launching.

use std::path::PathBuf;
use std::process::Stdio;

use renderq_core::{Error, Result, SessionId};
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Invocation of one external render program. Parameters are passed as
/// positional `key:value` tokens, e.g. `session_id:<uid>`.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    program: PathBuf,
    args: Vec<(String, String)>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.args.push((key.into(), value.to_string()));
        self
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }

    /// The argument tokens in `key:value` form.
    pub fn tokens(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|(key, value)| format!("{}:{}", key, value))
            .collect()
    }
}

/// A launched external render process.
///
/// Completion is signalled through the session folder, never through the
/// exit code; the exit code is only logged. A detached helper task blocks on
/// `wait()` so the child is reaped without stalling the caller, and the same
/// task services best-effort kill requests.
pub struct RenderProcess {
    uid: SessionId,
    kill_tx: Option<oneshot::Sender<()>>,
}

impl RenderProcess {
    pub fn spawn(spec: &ProcessSpec, uid: SessionId) -> Result<Self> {
        let mut child = Command::new(spec.program())
            .args(spec.tokens())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                Error::SpawnFailed(format!("{}: {}", spec.program().display(), e))
            })?;

        let (kill_tx, kill_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => match status {
                    Ok(status) => {
                        debug!(uid = %uid, code = ?status.code(), "render process exited");
                    }
                    Err(e) => {
                        warn!(uid = %uid, error = %e, "failed waiting on render process");
                    }
                },
                _ = kill_rx => {
                    if let Err(e) = child.start_kill() {
                        warn!(uid = %uid, error = %e, "failed to kill render process");
                    }
                    let _ = child.wait().await;
                    debug!(uid = %uid, "render process killed");
                }
            }
        });

        Ok(Self {
            uid,
            kill_tx: Some(kill_tx),
        })
    }

    pub fn uid(&self) -> SessionId {
        self.uid
    }

    /// Request termination. Fire-and-forget; the helper task performs the
    /// kill and the final wait.
    pub fn request_kill(&mut self) {
        if let Some(tx) = self.kill_tx.take() {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_key_value_pairs() {
        let uid = SessionId::new();
        let spec = ProcessSpec::new("/usr/bin/proxyrender")
            .arg("session_id", uid)
            .arg("range_in", 25)
            .arg("profile_desc", "HD 1080p 25fps");

        let tokens = spec.tokens();
        assert_eq!(tokens[0], format!("session_id:{}", uid));
        assert_eq!(tokens[1], "range_in:25");
        assert_eq!(tokens[2], "profile_desc:HD 1080p 25fps");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_and_kill() {
        let uid = SessionId::new();
        let mut process = RenderProcess::spawn(&ProcessSpec::new("sleep"), uid).unwrap();
        process.request_kill();
        // Second request is a no-op.
        process.request_kill();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_missing_program_fails() {
        let uid = SessionId::new();
        let result = RenderProcess::spawn(&ProcessSpec::new("/nonexistent/renderer"), uid);
        assert!(matches!(result, Err(Error::SpawnFailed(_))));
    }
}
