//! Duration boost: the longer the lock, the larger the multiplier.
//!
//! `effective = raw * max_boost * duration / (max_time * PRECISION)`, so a
//! lock of the ledger's full `max_time` is worth `max_boost` times its raw
//! deposit. Only newly created locks must meet `min_duration`.

use serde::{Deserialize, Serialize};
use tidelock_core::constants::{DEFAULT_DURATION_MAX_BOOST, DEFAULT_MIN_BOOST_DURATION, PRECISION};
use tidelock_core::error::{BoostError, ConfigError, EscrowError};
use tidelock_core::math::ratio;
use tidelock_core::traits::{BoostAction, BoostContext, BoostStrategy};
use tidelock_core::types::{AccountId, EffectiveLock};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct DurationBoostConfig {
    /// Shortest lock accepted on creation, in seconds.
    pub min_duration: u64,
    /// Multiplier at `max_time`, 1e18 fixed point.
    pub max_boost: u128,
}

impl Default for DurationBoostConfig {
    fn default() -> Self {
        Self {
            min_duration: DEFAULT_MIN_BOOST_DURATION,
            max_boost: DEFAULT_DURATION_MAX_BOOST,
        }
    }
}

impl DurationBoostConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_boost == 0 {
            return Err(ConfigError::ZeroMaxBoost);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DurationBoost {
    config: DurationBoostConfig,
}

impl DurationBoost {
    pub fn new(config: DurationBoostConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DurationBoostConfig {
        &self.config
    }
}

impl BoostStrategy for DurationBoost {
    fn compute_effective_lock(
        &self,
        ctx: &BoostContext,
        _account: &AccountId,
        raw_principal: u128,
        duration: u64,
    ) -> Result<EffectiveLock, EscrowError> {
        if ctx.action == BoostAction::Create && duration < self.config.min_duration {
            return Err(BoostError::DurationTooShort {
                duration,
                min: self.config.min_duration,
            }
            .into());
        }
        let principal = ratio(
            &[raw_principal, self.config.max_boost, u128::from(duration)],
            &[u128::from(ctx.max_time), PRECISION],
        )?;
        if principal == 0 {
            return Err(BoostError::ZeroEffectiveAmount.into());
        }
        Ok(EffectiveLock {
            principal,
            duration,
        })
    }
}
