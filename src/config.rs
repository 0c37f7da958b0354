use crate::EngineError;
use serde::{Deserialize, Serialize};

/// Round budget used by the original PageRank driver.
pub const DEFAULT_MAX_ROUNDS: usize = 52;

/// Convergence tolerance used by the original PageRank driver.
pub const DEFAULT_THRESHOLD: f64 = 1.5;

/// Parameters consumed by the round coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum absolute state change for an actor to count as stabilized.
    pub threshold: f64,

    /// Hard upper bound on executed rounds.
    pub max_rounds: usize,
}

impl EngineConfig {
    /// Creates a validated configuration.
    ///
    /// # Arguments
    /// * `threshold` - Convergence tolerance (finite, non-negative).
    /// * `max_rounds` - Round budget (at least one).
    ///
    /// # Errors
    /// Returns an error if either parameter is out of range.
    pub fn new(threshold: f64, max_rounds: usize) -> Result<Self, EngineError> {
        let config = Self {
            threshold,
            max_rounds,
        };
        config.validate()?;
        Ok(config)
    }

    /// Re-checks a configuration that may have been deserialized directly.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "threshold must be finite and non-negative, got {}",
                self.threshold
            )));
        }
        if self.max_rounds == 0 {
            return Err(EngineError::InvalidConfig(
                "max_rounds must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(EngineConfig::new(0.0, 1).is_ok());
        assert!(EngineConfig::default().validate().is_ok());
        assert!(matches!(
            EngineConfig::new(-0.1, 10),
            Err(EngineError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::new(f64::NAN, 10),
            Err(EngineError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::new(0.5, 0),
            Err(EngineError::InvalidConfig(_))
        ));
    }
}
