//! The status artifact written by external render processes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Snapshot of render progress, overwritten in place by the external
/// process. `step` is the zero-based phase index for multi-phase renders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusArtifact {
    pub step: u32,
    #[serde(default)]
    pub step_name: String,
    pub unit: u64,
    pub total_units: u64,
    pub elapsed_secs: f64,
}

impl StatusArtifact {
    /// Fraction of the current phase completed.
    pub fn fraction(&self) -> f32 {
        if self.total_units == 0 {
            return 0.0;
        }
        self.unit as f32 / self.total_units as f32
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_secs_f64(self.elapsed_secs.max(0.0))
    }

    pub fn describe_step(&self) -> String {
        if self.step_name.is_empty() {
            format!("step {}", self.step + 1)
        } else {
            self.step_name.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_guards_zero_total() {
        let artifact = StatusArtifact {
            step: 0,
            step_name: String::new(),
            unit: 10,
            total_units: 0,
            elapsed_secs: 1.0,
        };
        assert_eq!(artifact.fraction(), 0.0);
    }

    #[test]
    fn test_elapsed_guards_negative() {
        let artifact = StatusArtifact {
            step: 0,
            step_name: String::new(),
            unit: 0,
            total_units: 100,
            elapsed_secs: -3.0,
        };
        assert_eq!(artifact.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_describe_step_falls_back_to_index() {
        let artifact = StatusArtifact {
            step: 1,
            step_name: String::new(),
            unit: 5,
            total_units: 10,
            elapsed_secs: 0.0,
        };
        assert_eq!(artifact.describe_step(), "step 2");
    }
}
