//! Migration bridge between ledgers.
//!
//! A source ledger hands each active lock to a destination through
//! [`MigrationTarget`]. Lock timing is realigned to the destination's
//! interval; the destination keeps the principal and the voting power the
//! lock had at the migration instant.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tidelock_core::error::{EscrowError, MathError};
use tidelock_core::math::{align_down, align_up};
use tidelock_core::traits::MigrationTarget;
use tidelock_core::types::{AccountId, BlockContext, MigratedLock};

use crate::escrow::VotingEscrow;

/// Map a lock's `(start, end)` onto the destination interval.
///
/// The start moves to the first destination boundary a full interval after
/// it; the end moves down to a boundary. If that leaves nothing, the end is
/// pushed out one interval.
pub fn realign(start: u64, end: u64, interval: u64) -> Result<(u64, u64), MathError> {
    let shifted = start
        .checked_add(interval)
        .ok_or(MathError::ArithmeticOverflow)?;
    let new_start = align_up(shifted, interval)?;
    let mut new_end = align_down(end, interval);
    if new_start >= new_end {
        new_end = new_end
            .checked_add(interval)
            .ok_or(MathError::ArithmeticOverflow)?;
    }
    Ok((new_start, new_end))
}

/// A ledger reachable from other ledgers.
///
/// The ledger's id and interval never change, so they are copied out and
/// answered without taking the lock.
#[derive(Clone)]
pub struct SharedEscrow {
    id: AccountId,
    interval: u64,
    inner: Arc<RwLock<VotingEscrow>>,
}

impl SharedEscrow {
    pub fn new(escrow: VotingEscrow) -> Self {
        Self {
            id: escrow.id(),
            interval: escrow.interval(),
            inner: Arc::new(RwLock::new(escrow)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, VotingEscrow> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, VotingEscrow> {
        self.inner.write()
    }
}

impl MigrationTarget for SharedEscrow {
    fn custody_account(&self) -> AccountId {
        self.id
    }

    fn interval(&self) -> u64 {
        self.interval
    }

    fn accept_migration(
        &self,
        source: &AccountId,
        ctx: BlockContext,
        lock: MigratedLock,
    ) -> Result<(), EscrowError> {
        self.write().accept_migration(source, ctx, lock)
    }

    fn has_live_lock(&self, account: &AccountId) -> bool {
        self.read().has_live_lock(account)
    }
}
