//! Trait interfaces between the Tidelock crates.
//!
//! - [`Custody`]: token balances and transfers (an in-memory vault in tests)
//! - [`MigrationTarget`]: a ledger that can receive migrated locks (tidelock-ledger implements)
//! - [`BoostStrategy`]: raw deposit to effective lock (tidelock-boost implements)
//! - [`LiquidityPool`]: pool figures consumed by the liquidity-share boost

use serde::{Deserialize, Serialize};

use crate::error::{CustodyError, EscrowError};
use crate::types::{AccountId, BlockContext, EffectiveLock, MigratedLock};

/// Fungible token custody.
///
/// Methods take `&self` so that one token can be shared by several ledgers
/// and delegates behind an `Arc`.
pub trait Custody: Send + Sync {
    /// Current balance of `who`.
    fn balance_of(&self, who: &AccountId) -> u128;

    /// Move `amount` from `from` to `to`. Either the whole amount moves or nothing does.
    fn transfer(&self, from: &AccountId, to: &AccountId, amount: u128) -> Result<(), CustodyError>;
}

/// A ledger that accepts locks migrated out of another ledger.
pub trait MigrationTarget: Send + Sync {
    /// Account that receives the principal of migrated `Held` locks.
    fn custody_account(&self) -> AccountId;

    /// Interval width the destination aligns lock ends to.
    fn interval(&self) -> u64;

    /// Create the destination lock. `source` is the migrating ledger's custody account.
    fn accept_migration(
        &self,
        source: &AccountId,
        ctx: BlockContext,
        lock: MigratedLock,
    ) -> Result<(), EscrowError>;

    /// Whether `account` still holds a live lock here, following further migrations.
    fn has_live_lock(&self, account: &AccountId) -> bool;
}

/// Which delegate operation a boost is computed for.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoostAction {
    Create,
    IncreaseAmount,
}

/// Inputs a strategy may consult besides the deposit itself.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoostContext {
    pub action: BoostAction,
    pub now: u64,
    /// The ledger's maximum lock duration.
    pub max_time: u64,
    /// Raw principal the delegate currently holds across all accounts.
    pub locked_total: u128,
}

/// Transforms a raw deposit into the amount and duration forwarded to the ledger.
pub trait BoostStrategy: Send + Sync {
    fn compute_effective_lock(
        &self,
        ctx: &BoostContext,
        account: &AccountId,
        raw_principal: u128,
        duration: u64,
    ) -> Result<EffectiveLock, EscrowError>;
}

/// Read-only view of a two-sided liquidity pool.
pub trait LiquidityPool: Send + Sync {
    /// Outstanding LP token supply.
    fn total_supply(&self) -> u128;

    /// Pool reserve of the token the ledger escrows.
    fn reserve(&self) -> u128;
}
