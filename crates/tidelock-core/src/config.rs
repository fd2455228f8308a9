//! Ledger configuration.
//!
//! [`EscrowConfig`] carries the protocol parameters of one ledger instance.
//! Missing JSON fields fall back to the defaults in [`crate::constants`].

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_INTERVAL, DEFAULT_MAX_TIME, DEFAULT_PENALTY_FLOOR, MAX_CATCH_UP_STEPS, PRECISION,
};
use crate::error::ConfigError;

/// How a lock's slope is derived from its principal.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DecayCurve {
    /// `slope = principal / (end - start)`: full principal at start, zero at end.
    #[default]
    LockSpan,
    /// `slope = principal / max_time`: power scales with the remaining time.
    MaxTime,
}

/// Configuration for a ledger instance.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct EscrowConfig {
    /// Width of the interval lock ends are aligned to, in seconds.
    pub interval: u64,
    /// Longest allowed lock, in seconds.
    pub max_time: u64,
    /// Minimum cancellation penalty rate, 1e18 fixed point. Zero disables the floor.
    pub penalty_floor: u128,
    pub decay_curve: DecayCurve,
    /// Interval boundaries a single checkpoint may cross.
    pub max_catch_up_steps: u32,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            max_time: DEFAULT_MAX_TIME,
            penalty_floor: DEFAULT_PENALTY_FLOOR,
            decay_curve: DecayCurve::LockSpan,
            max_catch_up_steps: MAX_CATCH_UP_STEPS,
        }
    }
}

impl EscrowConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.max_time < self.interval {
            return Err(ConfigError::MaxTimeBelowInterval {
                max_time: self.max_time,
                interval: self.interval,
            });
        }
        if self.penalty_floor > PRECISION {
            return Err(ConfigError::PenaltyFloorTooHigh(self.penalty_floor));
        }
        if self.max_catch_up_steps == 0 {
            return Err(ConfigError::ZeroCatchUpSteps);
        }
        Ok(())
    }
}
