//! Core ledger types: accounts, execution context, points, and locks.
//!
//! Amounts are `u128` base units. Point bias and slope are signed so that
//! checkpoint deltas (`new − old`) can be applied directly; stored values are
//! always floored at zero.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 20-byte account identifier.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AccountId(pub [u8; 20]);

impl AccountId {
    /// The zero account.
    pub const ZERO: Self = Self([0u8; 20]);
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Execution environment of a single call: wall-clock time and block height.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct BlockContext {
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    /// Block number.
    pub block: u64,
}

impl BlockContext {
    pub fn new(timestamp: u64, block: u64) -> Self {
        Self { timestamp, block }
    }
}

/// A checkpoint of a linearly decaying value.
///
/// At `t >= timestamp` the value is `max(0, bias - slope * (t - timestamp))`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Point {
    pub bias: i128,
    pub slope: i128,
    pub timestamp: u64,
    pub block: u64,
}

impl Point {
    /// A zero-valued point stamped with the given context.
    pub fn zero(ctx: BlockContext) -> Self {
        Self {
            bias: 0,
            slope: 0,
            timestamp: ctx.timestamp,
            block: ctx.block,
        }
    }

    /// Decayed value at `t`. Times before the checkpoint read the bias.
    pub fn value_at(&self, t: u64) -> u128 {
        let dt = t.saturating_sub(self.timestamp) as i128;
        let value = self.bias.saturating_sub(self.slope.saturating_mul(dt));
        value.max(0) as u128
    }
}

/// Lifecycle state of an account's lock.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum LockStatus {
    #[default]
    None,
    Active,
    Withdrawn,
    Cancelled,
    Migrated,
}

/// Who holds the tokens backing a lock's principal.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum LockCustody {
    /// The ledger holds the principal.
    #[default]
    Held,
    /// A boost delegate holds the raw deposit; the principal is the boosted amount.
    Delegated(AccountId),
}

/// An account's lock record.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Lock {
    pub owner: AccountId,
    pub principal: u128,
    pub start: u64,
    pub end: u64,
    pub status: LockStatus,
    pub custody: LockCustody,
    /// Penalty rate (1e18 fixed point) applied when the lock was cancelled.
    pub penalty_rate: Option<u128>,
}

impl Lock {
    /// A fresh active lock.
    pub fn active(owner: AccountId, principal: u128, start: u64, end: u64, custody: LockCustody) -> Self {
        Self {
            owner,
            principal,
            start,
            end,
            status: LockStatus::Active,
            custody,
            penalty_rate: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == LockStatus::Active
    }

    /// Whether the lock has passed its end time.
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.end
    }

    pub fn balance(&self) -> LockedBalance {
        LockedBalance {
            amount: self.principal,
            start: self.start,
            end: self.end,
        }
    }
}

/// Public view of a lock: `{amount, start, end}`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct LockedBalance {
    pub amount: u128,
    pub start: u64,
    pub end: u64,
}

/// Output of a boost strategy: what a delegate forwards into the ledger.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct EffectiveLock {
    pub principal: u128,
    pub duration: u64,
}

/// A lock handed from one ledger to another.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct MigratedLock {
    pub account: AccountId,
    pub amount: u128,
    /// Start realigned to the destination interval.
    pub start: u64,
    /// End realigned to the destination interval.
    pub end: u64,
    /// Voting power on the source ledger at the migration instant.
    pub voting_power: u128,
    pub custody: LockCustody,
}
