//! Queue configuration parsing.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use kdl::{KdlDocument, KdlNode};
use serde::{Deserialize, Serialize};

use crate::{ConfigError, ConfigResult};

/// Execution policy for the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueuePolicy {
    /// Every submission starts immediately.
    Parallel,
    /// At most one job is Running at a time; Queued jobs start in FIFO
    /// submission order.
    Sequential,
}

impl FromStr for QueuePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s {
            "parallel" => Ok(QueuePolicy::Parallel),
            "sequential" => Ok(QueuePolicy::Sequential),
            other => Err(ConfigError::InvalidValue {
                field: "policy".to_string(),
                message: format!("unknown policy: {}", other),
            }),
        }
    }
}

/// Queue-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Execution policy evaluated at submission and at every
    /// completion/cancellation.
    pub policy: QueuePolicy,
    /// Fixed interval between polling-loop ticks.
    pub poll_interval: Duration,
    /// How long a terminal job stays visible before removal.
    pub grace_delay: Duration,
    /// Root folder under which per-session temp folders are created.
    pub sessions_root: PathBuf,
    /// Capacity of the bounded channel from the polling loop to the main
    /// context.
    pub status_channel_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            policy: QueuePolicy::Sequential,
            poll_interval: Duration::from_millis(500),
            grace_delay: Duration::from_secs(2),
            sessions_root: std::env::temp_dir().join("renderq-sessions"),
            status_channel_capacity: 64,
        }
    }
}

/// Parse a queue configuration from KDL text.
///
/// Fields absent from the document keep their defaults.
pub fn parse_queue_config(kdl: &str) -> ConfigResult<QueueConfig> {
    let doc: KdlDocument = kdl.parse()?;
    let mut config = QueueConfig::default();

    let Some(queue_node) = doc.nodes().iter().find(|n| n.name().value() == "render-queue")
    else {
        return Ok(config);
    };

    if let Some(children) = queue_node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "policy" => {
                    let value = get_first_string_arg(child)
                        .ok_or_else(|| ConfigError::MissingField("policy".to_string()))?;
                    config.policy = value.parse()?;
                }
                "poll-interval-ms" => {
                    config.poll_interval =
                        Duration::from_millis(get_u64_arg(child, "poll-interval-ms")?);
                }
                "grace-delay-ms" => {
                    config.grace_delay =
                        Duration::from_millis(get_u64_arg(child, "grace-delay-ms")?);
                }
                "sessions-root" => {
                    let value = get_first_string_arg(child)
                        .ok_or_else(|| ConfigError::MissingField("sessions-root".to_string()))?;
                    config.sessions_root = PathBuf::from(value);
                }
                "status-channel-capacity" => {
                    let capacity = get_u64_arg(child, "status-channel-capacity")?;
                    if capacity == 0 {
                        return Err(ConfigError::InvalidValue {
                            field: "status-channel-capacity".to_string(),
                            message: "must be at least 1".to_string(),
                        });
                    }
                    config.status_channel_capacity = capacity as usize;
                }
                _ => {} // Ignore unknown nodes
            }
        }
    }

    Ok(config)
}

// Helper functions for extracting values from KDL nodes

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_u64_arg(node: &KdlNode, field: &str) -> ConfigResult<u64> {
    let value = node
        .entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_integer())
        .ok_or_else(|| ConfigError::MissingField(field.to_string()))?;

    u64::try_from(value).map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        message: format!("expected a non-negative integer, got {}", value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = parse_queue_config("").unwrap();
        assert_eq!(config.policy, QueuePolicy::Sequential);
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.grace_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_parse_full_document() {
        let kdl = r#"
            render-queue {
                policy "parallel"
                poll-interval-ms 250
                grace-delay-ms 4000
                sessions-root "/var/tmp/render-sessions"
                status-channel-capacity 128
            }
        "#;

        let config = parse_queue_config(kdl).unwrap();
        assert_eq!(config.policy, QueuePolicy::Parallel);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.grace_delay, Duration::from_millis(4000));
        assert_eq!(
            config.sessions_root,
            PathBuf::from("/var/tmp/render-sessions")
        );
        assert_eq!(config.status_channel_capacity, 128);
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let kdl = r#"
            render-queue {
                policy "round-robin"
            }
        "#;

        let result = parse_queue_config(kdl);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue { .. }
        ));
    }

    #[test]
    fn test_negative_interval_rejected() {
        let kdl = r#"
            render-queue {
                poll-interval-ms -5
            }
        "#;

        let result = parse_queue_config(kdl);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue { .. }
        ));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let kdl = r#"
            render-queue {
                status-channel-capacity 0
            }
        "#;

        let result = parse_queue_config(kdl);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue { .. }
        ));
    }
}
