//! Effort selection for the deferred compression pass.
//!
//! Small inputs get many optimization iterations, large ones few, so the
//! wall-clock cost of a single pass stays bounded.

use zdefer_config::{log_shim_warn, EffortConfig, EffortStepConfig};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EffortError {
    #[error("iteration counts must be positive")]
    NonPositive,
    #[error("step thresholds must be strictly increasing")]
    Unordered,
    #[error("iterations must not grow with input size")]
    Increasing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffortStep {
    /// Exclusive upper bound on input length
    pub below: usize,
    pub iterations: i32,
}

/// Step function from input length to iteration count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffortPolicy {
    steps: Vec<EffortStep>,
    fallback: i32,
}

impl Default for EffortPolicy {
    fn default() -> Self {
        Self {
            steps: vec![
                EffortStep {
                    below: 8 << 10,
                    iterations: 1000,
                },
                EffortStep {
                    below: 64 << 10,
                    iterations: 100,
                },
            ],
            fallback: 15,
        }
    }
}

impl EffortPolicy {
    pub fn new(steps: Vec<EffortStep>, fallback: i32) -> Result<Self, EffortError> {
        if fallback <= 0 || steps.iter().any(|s| s.iterations <= 0) {
            return Err(EffortError::NonPositive);
        }
        for pair in steps.windows(2) {
            if pair[1].below <= pair[0].below {
                return Err(EffortError::Unordered);
            }
            if pair[1].iterations > pair[0].iterations {
                return Err(EffortError::Increasing);
            }
        }
        if steps.last().is_some_and(|s| s.iterations < fallback) {
            return Err(EffortError::Increasing);
        }
        Ok(Self { steps, fallback })
    }

    /// Build from configuration, keeping the default table when the
    /// configured one is unusable.
    pub fn from_config(config: &EffortConfig) -> Self {
        let steps = config
            .steps
            .iter()
            .map(|&EffortStepConfig { below, iterations }| EffortStep { below, iterations })
            .collect();
        Self::new(steps, config.fallback_iterations).unwrap_or_else(|err| {
            let error = err.to_string();
            log_shim_warn!("invalid effort table, using defaults", error = error.as_str());
            Self::default()
        })
    }

    pub fn iterations_for(&self, input_len: usize) -> i32 {
        self.steps
            .iter()
            .find(|step| input_len < step.below)
            .map_or(self.fallback, |step| step.iterations)
    }
}
