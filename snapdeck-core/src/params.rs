use serde::{Deserialize, Serialize};

use crate::SchedulingError;

/// FSRS-4.5 default weights.
///
/// - `w0..w3`: initial stability per rating
/// - `w4, w5`: initial difficulty and its rating slope
/// - `w6, w7`: difficulty step and mean-reversion weight
/// - `w8..w10`: recall stability growth
/// - `w11..w14`: post-lapse stability
/// - `w15, w16`: hard penalty and easy bonus
pub const DEFAULT_WEIGHTS: [f64; 17] = [
    0.4872, 1.4003, 3.7145, 13.8206, // initial stability
    5.1618, 1.2298, // initial difficulty
    0.8975, 0.031, // difficulty update
    1.6474, 0.1367, 1.0461, // recall stability
    2.1072, 0.0793, 0.3246, 1.587, // forget stability
    0.2272, 2.8755, // hard penalty, easy bonus
];

pub const DEFAULT_RETENTION: f64 = 0.9;
pub const DEFAULT_MAXIMUM_INTERVAL: u32 = 36_500;

/// Same-day step lengths, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearningSteps {
    /// After `Again` in any short-step phase.
    pub again: i64,
    /// After `Hard` on a new card.
    pub new_hard: i64,
    /// After `Good` on a new card.
    pub new_good: i64,
    /// After `Hard` while learning or relearning.
    pub hard: i64,
    /// After a lapse in `Review`.
    pub relearn: i64,
}

impl Default for LearningSteps {
    fn default() -> Self {
        Self {
            again: 1,
            new_hard: 5,
            new_good: 10,
            hard: 10,
            relearn: 10,
        }
    }
}

/// Tunable constants for [`crate::Scheduler`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerParams {
    pub w: [f64; 17],
    /// Target probability of recall at the due date.
    pub request_retention: f64,
    /// Upper bound on any interval, in days.
    pub maximum_interval: u32,
    pub enable_fuzz: bool,
    /// Mixed into every fuzz seed; lets tests and replays pin the randomness.
    pub fuzz_seed: Option<u64>,
    pub steps: LearningSteps,
}

impl Default for SchedulerParams {
    fn default() -> Self {
        Self {
            w: DEFAULT_WEIGHTS,
            request_retention: DEFAULT_RETENTION,
            maximum_interval: DEFAULT_MAXIMUM_INTERVAL,
            enable_fuzz: true,
            fuzz_seed: None,
            steps: LearningSteps::default(),
        }
    }
}

impl SchedulerParams {
    pub fn with_retention(mut self, retention: f64) -> Self {
        self.request_retention = retention;
        self
    }

    pub fn with_maximum_interval(mut self, days: u32) -> Self {
        self.maximum_interval = days;
        self
    }

    pub fn with_fuzz(mut self, enabled: bool) -> Self {
        self.enable_fuzz = enabled;
        self
    }

    pub fn with_fuzz_seed(mut self, seed: u64) -> Self {
        self.fuzz_seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), SchedulingError> {
        if !(self.request_retention > 0.0 && self.request_retention < 1.0) {
            return Err(SchedulingError::InvalidParams(format!(
                "request_retention must be in (0, 1), got {}",
                self.request_retention
            )));
        }
        if self.maximum_interval == 0 {
            return Err(SchedulingError::InvalidParams(
                "maximum_interval must be at least 1 day".to_string(),
            ));
        }
        if self.w.iter().any(|w| !w.is_finite()) {
            return Err(SchedulingError::InvalidParams(
                "weights must be finite".to_string(),
            ));
        }
        let steps = self.steps;
        if [steps.again, steps.new_hard, steps.new_good, steps.hard, steps.relearn]
            .iter()
            .any(|m| *m < 0 || *m >= 24 * 60)
        {
            return Err(SchedulingError::InvalidParams(
                "learning steps must be between 0 minutes and one day".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(SchedulerParams::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_retention() {
        let params = SchedulerParams::default().with_retention(1.0);
        assert!(params.validate().is_err());
        let params = SchedulerParams::default().with_retention(0.0);
        assert!(params.validate().is_err());
    }

    #[test]
    fn rejects_zero_maximum_interval() {
        let params = SchedulerParams::default().with_maximum_interval(0);
        assert!(params.validate().is_err());
    }
}
