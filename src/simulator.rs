//! Randomised collector outcomes used to exercise client resilience.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

/// What the collector does with a request that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeDecision {
    /// Store the record and answer `200 OK`.
    Accept,
    /// Answer `500` with a simulated internal error.
    Error,
    /// Never answer.
    Hang,
}

/// Source of uniform values in `[0, 1)`.
pub trait RandomSource: Send + Sync {
    fn next_unit(&self) -> f64;
}

/// [`RandomSource`] backed by a `StdRng`.
pub struct StdRandomSource {
    rng: Mutex<StdRng>,
}

impl StdRandomSource {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reproducible sequence for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for StdRandomSource {
    fn next_unit(&self) -> f64 {
        self.rng.lock().gen::<f64>()
    }
}

/// Decides the fate of each accepted request.
pub trait OutcomePolicy: Send + Sync {
    fn decide(&self) -> OutcomeDecision;
}

/// Always returns the same decision.
#[derive(Debug, Clone, Copy)]
pub struct FixedOutcome(pub OutcomeDecision);

impl OutcomePolicy for FixedOutcome {
    fn decide(&self) -> OutcomeDecision {
        self.0
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum SimulatorConfigError {
    #[error("{name} must be within [0, 1], got {value}")]
    RatioOutOfRange { name: &'static str, value: f64 },
    #[error("success and error ratios add up to {0}, which exceeds 1")]
    RatiosExceedOne(f64),
}

/// Probability split between the three outcomes; hangs take the remainder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatorConfig {
    pub success_ratio: f64,
    pub error_ratio: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            success_ratio: 0.6,
            error_ratio: 0.2,
        }
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<(), SimulatorConfigError> {
        for (name, value) in [
            ("success ratio", self.success_ratio),
            ("error ratio", self.error_ratio),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SimulatorConfigError::RatioOutOfRange { name, value });
            }
        }
        let total = self.success_ratio + self.error_ratio;
        if total > 1.0 {
            return Err(SimulatorConfigError::RatiosExceedOne(total));
        }
        Ok(())
    }

    pub fn hang_ratio(&self) -> f64 {
        1.0 - self.success_ratio - self.error_ratio
    }
}

/// Draws one value per request and maps it onto an [`OutcomeDecision`].
pub struct FailureSimulator<R = StdRandomSource> {
    config: SimulatorConfig,
    source: R,
}

impl FailureSimulator<StdRandomSource> {
    pub fn with_entropy(config: SimulatorConfig) -> Result<Self, SimulatorConfigError> {
        Self::new(config, StdRandomSource::from_entropy())
    }

    pub fn with_seed(config: SimulatorConfig, seed: u64) -> Result<Self, SimulatorConfigError> {
        Self::new(config, StdRandomSource::seeded(seed))
    }
}

impl<R: RandomSource> FailureSimulator<R> {
    pub fn new(config: SimulatorConfig, source: R) -> Result<Self, SimulatorConfigError> {
        config.validate()?;
        Ok(Self { config, source })
    }

    /// Maps a draw `r` in `[0, 1)` onto an outcome.
    pub fn classify(&self, r: f64) -> OutcomeDecision {
        if r < self.config.success_ratio {
            OutcomeDecision::Accept
        } else if r < self.config.success_ratio + self.config.error_ratio {
            OutcomeDecision::Error
        } else {
            OutcomeDecision::Hang
        }
    }
}

impl<R: RandomSource> OutcomePolicy for FailureSimulator<R> {
    fn decide(&self) -> OutcomeDecision {
        self.classify(self.source.next_unit())
    }
}
