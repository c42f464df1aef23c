//! Configuration for the render queue.
//!
//! The host editor ships a small KDL document selecting the execution
//! policy, poll cadence and session folder root. Everything has a default,
//! so an absent or partial document still yields a usable config.

pub mod error;
pub mod queue;

pub use error::{ConfigError, ConfigResult};
pub use queue::{QueueConfig, QueuePolicy, parse_queue_config};
