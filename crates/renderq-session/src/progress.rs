//! Multi-phase progress mapping.

use renderq_core::clamp_progress;

/// Combines a phase index and an intra-phase fraction into one overall
/// `[0, 1]` value, weighted by each phase's declared relative cost.
#[derive(Debug, Clone)]
pub struct PhaseWeights {
    weights: Vec<f32>,
}

impl PhaseWeights {
    /// A single-phase render.
    pub fn single() -> Self {
        Self {
            weights: vec![1.0],
        }
    }

    /// Build from relative phase costs. The costs are normalized, so
    /// `&[0.9, 0.1]` and `&[9.0, 1.0]` are equivalent.
    pub fn new(costs: &[f32]) -> Self {
        let positive: Vec<f32> = costs.iter().copied().filter(|c| *c > 0.0).collect();
        if positive.is_empty() {
            return Self::single();
        }
        let total: f32 = positive.iter().sum();
        Self {
            weights: positive.iter().map(|c| c / total).collect(),
        }
    }

    pub fn phase_count(&self) -> usize {
        self.weights.len()
    }

    /// Overall progress for `fraction` of the way through `phase`.
    pub fn overall(&self, phase: usize, fraction: f32) -> f32 {
        let phase = phase.min(self.weights.len() - 1);
        let done: f32 = self.weights[..phase].iter().sum();
        clamp_progress(done + self.weights[phase] * clamp_progress(fraction))
    }
}
