//! Session-file protocol and render adapters.
//!
//! Every job kind delegates its work to an external render process. The
//! process is told its session id and a session folder; it periodically
//! overwrites a status artifact there and writes a completion marker when
//! done. This crate owns that protocol end to end:
//! - session folder layout and artifact parsing
//! - launching the external process with `key:value` argument tokens
//! - the unified [`SessionWatch`] poller shared by all adapters
//! - one [`SessionAdapter`](renderq_core::SessionAdapter) implementation
//!   per job kind

pub mod adapters;
pub mod launch;
pub mod progress;
pub mod session;
pub mod status;
pub mod watch;

pub use launch::{ProcessSpec, RenderProcess};
pub use progress::PhaseWeights;
pub use session::SessionHandle;
pub use status::StatusArtifact;
pub use watch::SessionWatch;
