//! Liquidity-share boost: LP deposits are valued at their share of the pool
//! reserve plus a bonus that shrinks as more of the LP supply is locked.
//!
//! ```text
//! token       = lp * reserve / lp_total
//! circulating = lp_total - locked_total
//! bonus       = token * max_boost * circulating / lp_total^2
//! effective   = min(token + bonus, token * cap_numerator / cap_denominator)
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tidelock_core::constants::{
    DEFAULT_LIQUIDITY_MAX_BOOST, DEFAULT_LIQUIDITY_MIN_AMOUNT, LIQUIDITY_CAP_DENOMINATOR,
    LIQUIDITY_CAP_NUMERATOR,
};
use tidelock_core::error::{BoostError, ConfigError, EscrowError, MathError};
use tidelock_core::math::ratio;
use tidelock_core::traits::{BoostContext, BoostStrategy, LiquidityPool};
use tidelock_core::types::{AccountId, EffectiveLock};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LiquidityBoostConfig {
    /// Bonus scale, in LP base units.
    pub max_boost: u128,
    /// Smallest LP deposit accepted.
    pub min_amount: u128,
    pub cap_numerator: u128,
    pub cap_denominator: u128,
}

impl Default for LiquidityBoostConfig {
    fn default() -> Self {
        Self {
            max_boost: DEFAULT_LIQUIDITY_MAX_BOOST,
            min_amount: DEFAULT_LIQUIDITY_MIN_AMOUNT,
            cap_numerator: LIQUIDITY_CAP_NUMERATOR,
            cap_denominator: LIQUIDITY_CAP_DENOMINATOR,
        }
    }
}

impl LiquidityBoostConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cap_denominator == 0 {
            return Err(ConfigError::ZeroCapDenominator);
        }
        if self.max_boost == 0 {
            return Err(ConfigError::ZeroMaxBoost);
        }
        Ok(())
    }
}

pub struct LiquidityShareBoost {
    config: LiquidityBoostConfig,
    pool: Arc<dyn LiquidityPool>,
}

impl LiquidityShareBoost {
    pub fn new(config: LiquidityBoostConfig, pool: Arc<dyn LiquidityPool>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &LiquidityBoostConfig {
        &self.config
    }

    /// Reserve-token value of `lp` LP tokens.
    pub fn underlying(&self, lp: u128) -> Result<u128, EscrowError> {
        let lp_total = self.pool.total_supply();
        if lp_total == 0 {
            return Err(BoostError::EmptyPool.into());
        }
        Ok(ratio(&[lp, self.pool.reserve()], &[lp_total])?)
    }
}

impl BoostStrategy for LiquidityShareBoost {
    fn compute_effective_lock(
        &self,
        ctx: &BoostContext,
        _account: &AccountId,
        raw_principal: u128,
        duration: u64,
    ) -> Result<EffectiveLock, EscrowError> {
        if raw_principal < self.config.min_amount {
            return Err(BoostError::AmountTooSmall {
                amount: raw_principal,
                min: self.config.min_amount,
            }
            .into());
        }
        let token = self.underlying(raw_principal)?;
        let lp_total = self.pool.total_supply();
        let circulating = lp_total.saturating_sub(ctx.locked_total);
        let bonus = ratio(
            &[token, self.config.max_boost, circulating],
            &[lp_total, lp_total],
        )?;
        let cap = ratio(
            &[token, self.config.cap_numerator],
            &[self.config.cap_denominator],
        )?;
        let boosted = token
            .checked_add(bonus)
            .ok_or(MathError::ArithmeticOverflow)?;
        let principal = boosted.min(cap);
        if principal == 0 {
            return Err(BoostError::ZeroEffectiveAmount.into());
        }
        Ok(EffectiveLock {
            principal,
            duration,
        })
    }
}
