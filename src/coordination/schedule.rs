//! Randomized pause between cycles

use crate::config::TransferConfig;

use rand::Rng;
use std::time::Duration;

/// Uniform delay in `[min, max]` seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelaySchedule {
    min_secs: f64,
    max_secs: f64,
}

impl DelaySchedule {
    /// Bounds are clamped to be non-negative and ordered
    pub fn new(min_secs: f64, max_secs: f64) -> Self {
        let min_secs = min_secs.max(0.0);
        Self {
            min_secs,
            max_secs: max_secs.max(min_secs),
        }
    }

    pub fn next_delay(&self) -> Duration {
        self.delay_with(&mut rand::thread_rng())
    }

    pub fn delay_with<R: Rng>(&self, rng: &mut R) -> Duration {
        Duration::from_secs_f64(rng.gen_range(self.min_secs..=self.max_secs))
    }
}

impl From<&TransferConfig> for DelaySchedule {
    fn from(config: &TransferConfig) -> Self {
        Self::new(config.min_delay_secs, config.max_delay_secs)
    }
}
