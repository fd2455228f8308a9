//! # tidelock-boost
//! Delegates that turn a raw deposit into a boosted ledger lock.
//!
//! - [`delegate`]: raw custody and the per-account boost record
//! - [`duration`]: multiplier proportional to lock duration
//! - [`liquidity`]: LP deposits valued against a pool
//! - [`pool`]: an in-memory [`LiquidityPool`](tidelock_core::traits::LiquidityPool)

pub mod delegate;
pub mod duration;
pub mod liquidity;
pub mod pool;

pub use delegate::{BoostRecord, Deposit, VotingEscrowDelegate};
pub use duration::{DurationBoost, DurationBoostConfig};
pub use liquidity::{LiquidityBoostConfig, LiquidityShareBoost};
pub use pool::MemoryPool;
