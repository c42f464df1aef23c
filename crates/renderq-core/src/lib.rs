//! Core domain types for the renderq job queue.
//!
//! This crate contains:
//! - Session identifiers
//! - Job kinds, statuses and progress rules
//! - Status messages produced by adapter polls
//! - The `SessionAdapter` trait implemented once per job kind

pub mod adapter;
pub mod error;
pub mod id;
pub mod job;

pub use adapter::SessionAdapter;
pub use error::{Error, Result};
pub use id::SessionId;
pub use job::{JobKind, JobSnapshot, JobStatus, PROGRESS_UNKNOWN, StatusMessage, clamp_progress};
