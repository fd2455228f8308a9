//! Lock registry and lifecycle state machine.
//!
//! Every mutation runs in four steps: validate the request, prepare a
//! history plan, move tokens through [`Custody`], then commit. Only the last
//! step touches ledger state and it cannot fail, so an error anywhere leaves
//! the ledger exactly as it was.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tidelock_core::config::{DecayCurve, EscrowConfig};
use tidelock_core::constants::PRECISION;
use tidelock_core::error::{CustodyError, EscrowError, HistoryError, LockError, MathError};
use tidelock_core::math::{align_down, align_up, mul_div, to_signed};
use tidelock_core::traits::{Custody, MigrationTarget};
use tidelock_core::types::{
    AccountId, BlockContext, Lock, LockCustody, LockStatus, LockedBalance, MigratedLock,
};
use tracing::{info, warn};

use crate::history::{AccountChange, CatchUp, CheckpointPlan, PointHistory};
use crate::migration::realign;

/// A single vote-escrow ledger.
pub struct VotingEscrow {
    id: AccountId,
    owner: AccountId,
    config: EscrowConfig,
    token: Arc<dyn Custody>,
    history: PointHistory,
    locks: HashMap<AccountId, Lock>,
    migrated: HashSet<AccountId>,
    delegates: HashSet<AccountId>,
    migration_sources: HashSet<AccountId>,
    migrator: Option<Arc<dyn MigrationTarget>>,
    /// Penalty rates of cancelled delegated locks, keyed by (delegate, account).
    /// Outlives the lock record so a later lock cannot erase it.
    delegated_penalties: HashMap<(AccountId, AccountId), u128>,
    locked_supply: u128,
    penalty_reserve: u128,
}

impl VotingEscrow {
    /// Create a ledger.
    ///
    /// `id` is the ledger's own account in `token`: held principal and the
    /// penalty reserve sit there. `owner` may change the ledger's settings.
    pub fn new(
        config: EscrowConfig,
        token: Arc<dyn Custody>,
        id: AccountId,
        owner: AccountId,
        ctx: BlockContext,
    ) -> Result<Self, EscrowError> {
        config.validate()?;
        let history = PointHistory::new(config.interval, config.max_catch_up_steps, ctx);
        info!(%id, %owner, interval = config.interval, max_time = config.max_time, "escrow: created");
        Ok(Self {
            id,
            owner,
            config,
            token,
            history,
            locks: HashMap::new(),
            migrated: HashSet::new(),
            delegates: HashSet::new(),
            migration_sources: HashSet::new(),
            migrator: None,
            delegated_penalties: HashMap::new(),
            locked_supply: 0,
            penalty_reserve: 0,
        })
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn owner(&self) -> AccountId {
        self.owner
    }

    pub fn config(&self) -> &EscrowConfig {
        &self.config
    }

    pub fn history(&self) -> &PointHistory {
        &self.history
    }

    pub fn interval(&self) -> u64 {
        self.config.interval
    }

    pub fn max_time(&self) -> u64 {
        self.config.max_time
    }

    // --- admin ---

    fn ensure_owner(&self, caller: &AccountId) -> Result<(), LockError> {
        if *caller != self.owner {
            return Err(LockError::Unauthorized(*caller));
        }
        Ok(())
    }

    /// Set the one-time migration destination.
    pub fn set_migrator(
        &mut self,
        caller: &AccountId,
        target: Arc<dyn MigrationTarget>,
    ) -> Result<(), EscrowError> {
        self.ensure_owner(caller)?;
        if self.migrator.is_some() {
            return Err(LockError::MigratorAlreadySet.into());
        }
        if target.custody_account() == self.id {
            return Err(LockError::SelfMigration(self.id).into());
        }
        info!(escrow = %self.id, "escrow: migrator set");
        self.migrator = Some(target);
        Ok(())
    }

    pub fn set_delegate(
        &mut self,
        caller: &AccountId,
        delegate: AccountId,
        enabled: bool,
    ) -> Result<(), EscrowError> {
        self.ensure_owner(caller)?;
        if enabled {
            self.delegates.insert(delegate);
        } else {
            self.delegates.remove(&delegate);
        }
        info!(escrow = %self.id, %delegate, enabled, "escrow: delegate updated");
        Ok(())
    }

    /// Allow (or stop allowing) the ledger whose custody account is `source`
    /// to migrate locks into this one.
    pub fn set_migration_source(
        &mut self,
        caller: &AccountId,
        source: AccountId,
        enabled: bool,
    ) -> Result<(), EscrowError> {
        self.ensure_owner(caller)?;
        if enabled {
            self.migration_sources.insert(source);
        } else {
            self.migration_sources.remove(&source);
        }
        info!(escrow = %self.id, %source, enabled, "escrow: migration source updated");
        Ok(())
    }

    pub fn is_delegate(&self, delegate: &AccountId) -> bool {
        self.delegates.contains(delegate)
    }

    /// Release the forfeited principal collected from cancellations to `to`.
    pub fn claim_penalties(&mut self, caller: &AccountId, to: &AccountId) -> Result<u128, EscrowError> {
        self.ensure_owner(caller)?;
        let amount = self.penalty_reserve;
        if amount > 0 {
            self.token.transfer(&self.id, to, amount)?;
            self.penalty_reserve = 0;
        }
        info!(escrow = %self.id, %to, amount, "escrow: penalties claimed");
        Ok(amount)
    }

    // --- lifecycle ---

    pub fn create_lock(
        &mut self,
        ctx: BlockContext,
        account: AccountId,
        amount: u128,
        duration: u64,
    ) -> Result<(), EscrowError> {
        let lock = self.validate_new_lock(ctx, account, amount, duration, LockCustody::Held)?;
        let plan = self.plan(ctx, self.change_for(&lock, 0, ctx.timestamp)?)?;
        self.token.transfer(&account, &self.id, amount)?;
        self.open(plan, lock);
        Ok(())
    }

    /// Open a lock whose principal is held by `delegate`. No tokens move.
    pub fn create_lock_for(
        &mut self,
        ctx: BlockContext,
        delegate: AccountId,
        account: AccountId,
        amount: u128,
        duration: u64,
    ) -> Result<(), EscrowError> {
        self.ensure_delegate(&delegate)?;
        let custody = LockCustody::Delegated(delegate);
        let lock = self.validate_new_lock(ctx, account, amount, duration, custody)?;
        let plan = self.plan(ctx, self.change_for(&lock, 0, ctx.timestamp)?)?;
        self.delegated_penalties.remove(&(delegate, account));
        self.open(plan, lock);
        Ok(())
    }

    pub fn increase_amount(
        &mut self,
        ctx: BlockContext,
        account: AccountId,
        amount: u128,
    ) -> Result<(), EscrowError> {
        let lock = self.topped_up(ctx, account, amount, LockCustody::Held)?;
        let plan = self.plan(ctx, self.change_for(&lock, lock.end, ctx.timestamp)?)?;
        self.token.transfer(&account, &self.id, amount)?;
        self.apply_top_up(plan, lock, amount);
        Ok(())
    }

    pub fn increase_amount_for(
        &mut self,
        ctx: BlockContext,
        delegate: AccountId,
        account: AccountId,
        amount: u128,
    ) -> Result<(), EscrowError> {
        self.ensure_delegate(&delegate)?;
        let lock = self.topped_up(ctx, account, amount, LockCustody::Delegated(delegate))?;
        let plan = self.plan(ctx, self.change_for(&lock, lock.end, ctx.timestamp)?)?;
        self.apply_top_up(plan, lock, amount);
        Ok(())
    }

    pub fn increase_unlock_time(
        &mut self,
        ctx: BlockContext,
        account: AccountId,
        duration: u64,
    ) -> Result<(), EscrowError> {
        let now = ctx.timestamp;
        let current = self.active_lock(&account)?;
        if current.is_expired(now) {
            return Err(LockError::LockExpired {
                end: current.end,
                now,
            }
            .into());
        }
        let end = self.lock_end(now, duration)?;
        if end <= current.end {
            return Err(LockError::UnlockTimeTooEarly {
                current: current.end,
                requested: end,
            }
            .into());
        }
        let old_end = current.end;
        let mut lock = current.clone();
        lock.end = end;
        let plan = self.plan(ctx, self.change_for(&lock, old_end, now)?)?;
        self.commit(plan);
        info!(%account, old_end, end, "escrow: unlock time increased");
        self.locks.insert(account, lock);
        Ok(())
    }

    /// Close an expired lock, or acknowledge a cancelled or migrated one.
    ///
    /// Returns the principal released to the account. Delegated locks and
    /// already-settled locks release nothing.
    pub fn withdraw(&mut self, ctx: BlockContext, account: AccountId) -> Result<u128, EscrowError> {
        let lock = self
            .locks
            .get(&account)
            .ok_or(LockError::LockNotFound(account))?;
        match lock.status {
            LockStatus::Active => {
                if !lock.is_expired(ctx.timestamp) {
                    return Err(LockError::LockNotExpired {
                        end: lock.end,
                        now: ctx.timestamp,
                    }
                    .into());
                }
                let mut lock = lock.clone();
                let plan = self.plan(ctx, AccountChange::zeroed(account, lock.end))?;
                let released = match lock.custody {
                    LockCustody::Held => {
                        self.token.transfer(&self.id, &account, lock.principal)?;
                        lock.principal
                    }
                    LockCustody::Delegated(_) => 0,
                };
                self.commit(plan);
                self.locked_supply = self.locked_supply.saturating_sub(lock.principal);
                lock.status = LockStatus::Withdrawn;
                info!(%account, released, "escrow: withdrawn");
                self.locks.insert(account, lock);
                Ok(released)
            }
            LockStatus::Cancelled | LockStatus::Migrated => {
                let previous = lock.status;
                if let Some(lock) = self.locks.get_mut(&account) {
                    lock.status = LockStatus::Withdrawn;
                }
                info!(%account, ?previous, "escrow: settled lock withdrawn");
                Ok(0)
            }
            LockStatus::None | LockStatus::Withdrawn => Err(LockError::LockNotFound(account).into()),
        }
    }

    /// Exit a lock early.
    ///
    /// The penalty rate is the unexpired share of the lock, floored at the
    /// configured minimum. Returns the refund paid to the account.
    pub fn cancel(&mut self, ctx: BlockContext, account: AccountId) -> Result<u128, EscrowError> {
        let now = ctx.timestamp;
        let mut lock = self.active_lock(&account)?.clone();
        if lock.is_expired(now) {
            return Err(LockError::LockExpired { end: lock.end, now }.into());
        }
        let rate = self.penalty_rate(&lock, now)?;
        let refund = mul_div(lock.principal, PRECISION - rate, PRECISION)?;
        let forfeited = lock.principal - refund;

        let plan = self.plan(ctx, AccountChange::zeroed(account, lock.end))?;
        let held = lock.custody == LockCustody::Held;
        if held {
            self.token.transfer(&self.id, &account, refund)?;
        }
        self.commit(plan);
        match lock.custody {
            LockCustody::Held => {
                self.penalty_reserve = self.penalty_reserve.saturating_add(forfeited);
            }
            LockCustody::Delegated(delegate) => {
                self.delegated_penalties.insert((delegate, account), rate);
            }
        }
        self.locked_supply = self.locked_supply.saturating_sub(lock.principal);
        lock.status = LockStatus::Cancelled;
        lock.penalty_rate = Some(rate);
        info!(%account, rate, refund, forfeited, "escrow: lock cancelled");
        self.locks.insert(account, lock);
        Ok(if held { refund } else { 0 })
    }

    /// Move an active lock to the migration destination.
    pub fn migrate(&mut self, ctx: BlockContext, account: AccountId) -> Result<(), EscrowError> {
        let now = ctx.timestamp;
        let target = self.migrator.clone().ok_or(LockError::MigratorNotSet)?;
        let mut lock = self.active_lock(&account)?.clone();
        if lock.is_expired(now) {
            return Err(LockError::LockExpired { end: lock.end, now }.into());
        }
        let (start, end) = realign(lock.start, lock.end, target.interval())?;
        let handoff = MigratedLock {
            account,
            amount: lock.principal,
            start,
            end,
            voting_power: self.history.balance_of(&account, now),
            custody: lock.custody,
        };
        let plan = self.plan(ctx, AccountChange::zeroed(account, lock.end))?;

        let held = lock.custody == LockCustody::Held;
        if held {
            let have = self.token.balance_of(&self.id);
            if have < lock.principal {
                return Err(CustodyError::InsufficientBalance {
                    account: self.id,
                    have,
                    need: lock.principal,
                }
                .into());
            }
        }
        target.accept_migration(&self.id, ctx, handoff)?;
        if held {
            self.token
                .transfer(&self.id, &target.custody_account(), lock.principal)?;
        }

        self.commit(plan);
        self.locked_supply = self.locked_supply.saturating_sub(lock.principal);
        self.migrated.insert(account);
        lock.status = LockStatus::Migrated;
        info!(%account, amount = lock.principal, start, end, "escrow: lock migrated");
        self.locks.insert(account, lock);
        Ok(())
    }

    /// Receive a lock migrated from an authorised source ledger.
    ///
    /// The new lock's slope is chosen so that its voting power at `ctx`
    /// matches the source's, whatever the decay curve.
    pub fn accept_migration(
        &mut self,
        source: &AccountId,
        ctx: BlockContext,
        incoming: MigratedLock,
    ) -> Result<(), EscrowError> {
        let now = ctx.timestamp;
        let account = incoming.account;
        if !self.migration_sources.contains(source) {
            return Err(LockError::UnknownMigrationSource(*source).into());
        }
        self.ensure_no_lock(&account)?;
        if incoming.amount == 0 {
            return Err(LockError::ZeroAmount.into());
        }
        if incoming.end <= now {
            return Err(LockError::LockExpired {
                end: incoming.end,
                now,
            }
            .into());
        }
        let remaining = incoming.end - now;
        let slope = to_signed(incoming.voting_power)? / i128::from(remaining);
        let change = AccountChange {
            account,
            old_end: 0,
            new_bias: slope
                .checked_mul(i128::from(remaining))
                .ok_or(MathError::ArithmeticOverflow)?,
            new_slope: slope,
            new_end: incoming.end,
        };
        let plan = self.plan(ctx, change)?;
        if let LockCustody::Delegated(delegate) = incoming.custody {
            self.delegated_penalties.remove(&(delegate, account));
        }
        let lock = Lock::active(
            account,
            incoming.amount,
            incoming.start,
            incoming.end,
            incoming.custody,
        );
        info!(%source, %account, amount = incoming.amount, "escrow: migration accepted");
        self.open(plan, lock);
        Ok(())
    }

    /// Advance the global history towards `ctx` within the step bound.
    pub fn checkpoint(&mut self, ctx: BlockContext) -> Result<CatchUp, EscrowError> {
        let outcome = self.history.checkpoint(ctx)?;
        if let CatchUp::Pending { through } = outcome {
            warn!(escrow = %self.id, through, now = ctx.timestamp, "escrow: catch-up pending");
        }
        Ok(outcome)
    }

    // --- reads ---

    pub fn balance_of(&self, account: &AccountId, t: u64) -> u128 {
        self.history.balance_of(account, t)
    }

    pub fn balance_of_at(&self, account: &AccountId, block: u64) -> u128 {
        self.history.balance_of_at(account, block)
    }

    pub fn total_supply(&self, t: u64) -> u128 {
        self.history.total_supply(t)
    }

    pub fn total_supply_at(&self, block: u64) -> u128 {
        self.history.total_supply_at(block)
    }

    pub fn lock(&self, account: &AccountId) -> Option<&Lock> {
        self.locks.get(account)
    }

    /// `{amount, start, end}` of the account's active lock; zeros otherwise.
    pub fn locked(&self, account: &AccountId) -> LockedBalance {
        match self.locks.get(account) {
            Some(lock) if lock.is_active() => lock.balance(),
            _ => LockedBalance::default(),
        }
    }

    pub fn unlock_time(&self, account: &AccountId) -> u64 {
        self.locked(account).end
    }

    pub fn last_user_slope(&self, account: &AccountId) -> i128 {
        self.history
            .last_user_point(account)
            .map_or(0, |p| p.slope)
    }

    pub fn lock_status(&self, account: &AccountId) -> LockStatus {
        self.locks.get(account).map_or(LockStatus::None, |l| l.status)
    }

    /// Whether the account holds an unsettled lock here or, after a
    /// migration, on the destination ledger.
    pub fn has_live_lock(&self, account: &AccountId) -> bool {
        if self.locks.get(account).is_some_and(Lock::is_active) {
            return true;
        }
        self.migrated.contains(account)
            && self
                .migrator
                .as_ref()
                .is_some_and(|target| target.has_live_lock(account))
    }

    /// Ledger id of the migration destination, once set.
    pub fn migrator(&self) -> Option<AccountId> {
        self.migrator.as_ref().map(|target| target.custody_account())
    }

    /// Penalty rate of `account`'s cancelled lock held by `delegate`, until
    /// that delegate opens a new lock for the account.
    pub fn delegated_penalty_rate(&self, delegate: &AccountId, account: &AccountId) -> Option<u128> {
        self.delegated_penalties.get(&(*delegate, *account)).copied()
    }

    /// Whether the account's lock was migrated out of this ledger.
    pub fn is_migrated(&self, account: &AccountId) -> bool {
        self.migrated.contains(account)
    }

    /// Principal of all active locks.
    pub fn locked_supply(&self) -> u128 {
        self.locked_supply
    }

    pub fn penalty_reserve(&self) -> u128 {
        self.penalty_reserve
    }

    // --- internals ---

    fn ensure_delegate(&self, delegate: &AccountId) -> Result<(), LockError> {
        if !self.delegates.contains(delegate) {
            return Err(LockError::UnauthorizedDelegate(*delegate));
        }
        Ok(())
    }

    fn ensure_no_lock(&self, account: &AccountId) -> Result<(), LockError> {
        if self.migrated.contains(account) {
            return Err(LockError::LockMigrated(*account));
        }
        if self.locks.get(account).is_some_and(Lock::is_active) {
            return Err(LockError::ExistingLock(*account));
        }
        Ok(())
    }

    fn active_lock(&self, account: &AccountId) -> Result<&Lock, LockError> {
        match self.locks.get(account) {
            Some(lock) if lock.is_active() => Ok(lock),
            _ if self.migrated.contains(account) => Err(LockError::LockMigrated(*account)),
            _ => Err(LockError::LockNotFound(*account)),
        }
    }

    fn validate_new_lock(
        &self,
        ctx: BlockContext,
        account: AccountId,
        amount: u128,
        duration: u64,
        custody: LockCustody,
    ) -> Result<Lock, EscrowError> {
        if amount == 0 {
            return Err(LockError::ZeroAmount.into());
        }
        self.ensure_no_lock(&account)?;
        if duration < self.config.interval {
            return Err(LockError::DurationTooShort {
                duration,
                min: self.config.interval,
            }
            .into());
        }
        let end = self.lock_end(ctx.timestamp, duration)?;
        Ok(Lock::active(account, amount, ctx.timestamp, end, custody))
    }

    fn topped_up(
        &self,
        ctx: BlockContext,
        account: AccountId,
        amount: u128,
        custody: LockCustody,
    ) -> Result<Lock, EscrowError> {
        if amount == 0 {
            return Err(LockError::ZeroAmount.into());
        }
        let current = self.active_lock(&account)?;
        if current.is_expired(ctx.timestamp) {
            return Err(LockError::LockExpired {
                end: current.end,
                now: ctx.timestamp,
            }
            .into());
        }
        if current.custody != custody {
            return Err(LockError::CustodyMismatch(account).into());
        }
        let mut lock = current.clone();
        lock.principal = lock
            .principal
            .checked_add(amount)
            .ok_or(MathError::ArithmeticOverflow)?;
        Ok(lock)
    }

    /// Aligned end for a lock of `duration` starting now, capped at `max_time`.
    fn lock_end(&self, now: u64, duration: u64) -> Result<u64, EscrowError> {
        let max_time = self.config.max_time;
        if duration > max_time {
            return Err(LockError::DurationTooLong {
                duration,
                max: max_time,
            }
            .into());
        }
        let interval = self.config.interval;
        let target = now.checked_add(duration).ok_or(MathError::ArithmeticOverflow)?;
        let end = align_up(target, interval)?;
        let cap = align_down(now.saturating_add(max_time), interval);
        Ok(end.min(cap))
    }

    fn change_for(&self, lock: &Lock, old_end: u64, now: u64) -> Result<AccountChange, EscrowError> {
        let principal = to_signed(lock.principal)?;
        let span = match self.config.decay_curve {
            DecayCurve::LockSpan => lock.end - lock.start.min(now),
            DecayCurve::MaxTime => self.config.max_time,
        };
        let slope = principal / i128::from(span);
        let bias = slope
            .checked_mul(i128::from(lock.end - now))
            .ok_or(MathError::ArithmeticOverflow)?;
        Ok(AccountChange {
            account: lock.owner,
            old_end,
            new_bias: bias,
            new_slope: slope,
            new_end: lock.end,
        })
    }

    fn penalty_rate(&self, lock: &Lock, now: u64) -> Result<u128, EscrowError> {
        let span = lock.end - lock.start.min(now);
        let unexpired = mul_div(PRECISION, u128::from(lock.end - now), u128::from(span))?;
        Ok(unexpired.max(self.config.penalty_floor).min(PRECISION))
    }

    fn plan(&self, ctx: BlockContext, change: AccountChange) -> Result<CheckpointPlan, EscrowError> {
        let plan = self.history.prepare(ctx, Some(change))?;
        if !plan.is_complete() {
            return Err(HistoryError::CatchUpRequired {
                last_checkpoint: self.history.last_point().timestamp,
                now: ctx.timestamp,
            }
            .into());
        }
        Ok(plan)
    }

    fn commit(&mut self, plan: CheckpointPlan) {
        let _ = self.history.commit(plan);
    }

    fn open(&mut self, plan: CheckpointPlan, lock: Lock) {
        self.commit(plan);
        self.locked_supply = self.locked_supply.saturating_add(lock.principal);
        info!(
            account = %lock.owner,
            amount = lock.principal,
            start = lock.start,
            end = lock.end,
            custody = ?lock.custody,
            "escrow: lock created"
        );
        self.locks.insert(lock.owner, lock);
    }

    fn apply_top_up(&mut self, plan: CheckpointPlan, lock: Lock, amount: u128) {
        self.commit(plan);
        self.locked_supply = self.locked_supply.saturating_add(amount);
        info!(account = %lock.owner, amount, principal = lock.principal, "escrow: amount increased");
        self.locks.insert(lock.owner, lock);
    }
}
