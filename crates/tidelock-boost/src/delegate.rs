//! Boost delegate: custodies raw deposits and opens boosted locks on a
//! ledger on the depositor's behalf.
//!
//! The ledger only ever sees the effective amount; the raw tokens stay with
//! the delegate until the ledger lock is gone. A cancelled lock forfeits the
//! same share of the raw deposit that the ledger's penalty rate names.
//!
//! Each deposit remembers the ledger its lock lives on and the delegate the
//! ledger names as custodian. Settlement is only read from that ledger, and
//! the tracked ledger moves to the destination when the lock migrates.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tidelock_core::constants::PRECISION;
use tidelock_core::error::{BoostError, CustodyError, EscrowError, LockError, MathError};
use tidelock_core::math::mul_div;
use tidelock_core::traits::{BoostAction, BoostContext, BoostStrategy, Custody};
use tidelock_core::types::{AccountId, BlockContext, EffectiveLock, LockCustody, LockStatus};
use tidelock_ledger::VotingEscrow;
use tracing::info;

/// One account's raw principal and where its ledger lock lives.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deposit {
    pub raw: u128,
    /// Ledger holding the lock.
    pub ledger: AccountId,
    /// Delegate named in the ledger lock's custody.
    pub custodian: AccountId,
}

/// Raw principal the delegate holds, per account and in total.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct BoostRecord {
    deposits: HashMap<AccountId, Deposit>,
    locked_total: u128,
    forfeited: u128,
}

impl BoostRecord {
    pub fn deposit(&self, account: &AccountId) -> Option<&Deposit> {
        self.deposits.get(account)
    }

    pub fn locked(&self, account: &AccountId) -> u128 {
        self.deposits.get(account).map_or(0, |d| d.raw)
    }

    pub fn locked_total(&self) -> u128 {
        self.locked_total
    }

    pub fn forfeited(&self) -> u128 {
        self.forfeited
    }

    fn open(&mut self, account: AccountId, deposit: Deposit) -> Result<(), MathError> {
        self.locked_total = self
            .locked_total
            .checked_add(deposit.raw)
            .ok_or(MathError::ArithmeticOverflow)?;
        self.deposits.insert(account, deposit);
        Ok(())
    }

    fn top_up(&mut self, account: &AccountId, raw: u128) -> Result<(), MathError> {
        let Some(deposit) = self.deposits.get_mut(account) else {
            return Ok(());
        };
        let total = self
            .locked_total
            .checked_add(raw)
            .ok_or(MathError::ArithmeticOverflow)?;
        deposit.raw = deposit.raw.checked_add(raw).ok_or(MathError::ArithmeticOverflow)?;
        self.locked_total = total;
        Ok(())
    }

    fn take(&mut self, account: &AccountId) -> Option<Deposit> {
        let deposit = self.deposits.remove(account)?;
        self.locked_total = self.locked_total.saturating_sub(deposit.raw);
        Some(deposit)
    }
}

pub struct VotingEscrowDelegate<S: BoostStrategy> {
    id: AccountId,
    owner: AccountId,
    strategy: S,
    raw: Arc<dyn Custody>,
    record: BoostRecord,
    successor: Option<AccountId>,
    deadline: Option<u64>,
}

impl<S: BoostStrategy> VotingEscrowDelegate<S> {
    /// Create a delegate. `id` is its account both in `raw` and as an
    /// authorised delegate on the ledger.
    pub fn new(id: AccountId, owner: AccountId, strategy: S, raw: Arc<dyn Custody>) -> Self {
        Self {
            id,
            owner,
            strategy,
            raw,
            record: BoostRecord::default(),
            successor: None,
            deadline: None,
        }
    }

    /// Refuse new locks from `deadline` on.
    pub fn with_deadline(mut self, deadline: u64) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn record(&self) -> &BoostRecord {
        &self.record
    }

    pub fn locked(&self, account: &AccountId) -> u128 {
        self.record.locked(account)
    }

    pub fn locked_total(&self) -> u128 {
        self.record.locked_total()
    }

    pub fn forfeited(&self) -> u128 {
        self.record.forfeited()
    }

    pub fn successor(&self) -> Option<AccountId> {
        self.successor
    }

    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }

    /// Deposit `raw` and open a boosted lock for `account`.
    pub fn create_lock(
        &mut self,
        escrow: &mut VotingEscrow,
        ctx: BlockContext,
        account: AccountId,
        raw: u128,
        duration: u64,
    ) -> Result<EffectiveLock, EscrowError> {
        let now = ctx.timestamp;
        if let Some(deadline) = self.deadline.filter(|d| now >= *d) {
            return Err(BoostError::DelegateExpired { deadline, now }.into());
        }
        if raw == 0 {
            return Err(LockError::ZeroAmount.into());
        }
        if self.record.deposits.contains_key(&account) {
            return Err(BoostError::UnsettledDeposit(account).into());
        }
        let boost_ctx = self.boost_context(BoostAction::Create, now, escrow);
        let effective = self
            .strategy
            .compute_effective_lock(&boost_ctx, &account, raw, duration)?;
        self.ensure_funds(&account, raw)?;

        escrow.create_lock_for(ctx, self.id, account, effective.principal, effective.duration)?;
        self.raw.transfer(&account, &self.id, raw)?;
        let deposit = Deposit {
            raw,
            ledger: escrow.id(),
            custodian: self.id,
        };
        self.record.open(account, deposit)?;
        info!(
            delegate = %self.id,
            %account,
            raw,
            effective = effective.principal,
            duration = effective.duration,
            "delegate: lock created"
        );
        Ok(effective)
    }

    /// Add `raw` to an existing boosted lock, valued over its remaining time.
    pub fn increase_amount(
        &mut self,
        escrow: &mut VotingEscrow,
        ctx: BlockContext,
        account: AccountId,
        raw: u128,
    ) -> Result<EffectiveLock, EscrowError> {
        let now = ctx.timestamp;
        if raw == 0 {
            return Err(LockError::ZeroAmount.into());
        }
        let deposit = *self
            .record
            .deposit(&account)
            .ok_or(BoostError::NothingLocked(account))?;
        ensure_ledger(&deposit, escrow)?;
        if deposit.custodian != self.id {
            return Err(LockError::CustodyMismatch(account).into());
        }
        let lock = escrow.locked(&account);
        if escrow.lock_status(&account) != LockStatus::Active {
            return Err(LockError::LockNotFound(account).into());
        }
        if now >= lock.end {
            return Err(LockError::LockExpired { end: lock.end, now }.into());
        }
        let boost_ctx = self.boost_context(BoostAction::IncreaseAmount, now, escrow);
        let effective =
            self.strategy
                .compute_effective_lock(&boost_ctx, &account, raw, lock.end - now)?;
        self.ensure_funds(&account, raw)?;

        escrow.increase_amount_for(ctx, self.id, account, effective.principal)?;
        self.raw.transfer(&account, &self.id, raw)?;
        self.record.top_up(&account, raw)?;
        info!(delegate = %self.id, %account, raw, effective = effective.principal, "delegate: amount increased");
        Ok(effective)
    }

    /// Return the raw deposit once the ledger lock is settled.
    ///
    /// `escrow` must be the ledger the deposit is tracked on. A cancelled
    /// lock releases only the share its penalty rate leaves.
    pub fn withdraw(&mut self, escrow: &VotingEscrow, account: AccountId) -> Result<u128, EscrowError> {
        let deposit = *self
            .record
            .deposit(&account)
            .ok_or(BoostError::NothingLocked(account))?;
        ensure_ledger(&deposit, escrow)?;
        if carried_away(&deposit, escrow, &account) {
            return Err(LockError::LockMigrated(account).into());
        }
        if escrow.has_live_lock(&account) {
            return Err(BoostError::ExistingLockFound(account).into());
        }
        let rate = escrow
            .delegated_penalty_rate(&deposit.custodian, &account)
            .unwrap_or(0);
        let raw = deposit.raw;
        let released = mul_div(raw, PRECISION - rate, PRECISION)?;
        let forfeited = raw - released;

        self.raw.transfer(&self.id, &account, released)?;
        self.record.take(&account);
        self.record.forfeited = self.record.forfeited.saturating_add(forfeited);
        info!(delegate = %self.id, %account, released, forfeited, "delegate: withdrawn");
        Ok(released)
    }

    /// Send forfeited raw principal to `to`.
    pub fn claim_forfeited(&mut self, caller: &AccountId, to: &AccountId) -> Result<u128, EscrowError> {
        self.ensure_owner(caller)?;
        let amount = self.record.forfeited;
        if amount > 0 {
            self.raw.transfer(&self.id, to, amount)?;
            self.record.forfeited = 0;
        }
        Ok(amount)
    }

    /// Name the delegate that will take over custody of migrated locks.
    pub fn pre_migrate(&mut self, caller: &AccountId, successor: AccountId) -> Result<(), EscrowError> {
        self.ensure_owner(caller)?;
        if self.successor.is_some() {
            return Err(BoostError::SuccessorAlreadySet.into());
        }
        info!(delegate = %self.id, %successor, "delegate: successor set");
        self.successor = Some(successor);
        Ok(())
    }

    /// Track `account`'s deposit on the ledger its lock migrated to.
    /// Returns the destination ledger id.
    pub fn follow_migration(&mut self, source: &VotingEscrow, account: AccountId) -> Result<AccountId, EscrowError> {
        let deposit = *self
            .record
            .deposit(&account)
            .ok_or(BoostError::NothingLocked(account))?;
        let dest = migration_destination(&deposit, source, &account)?;
        if let Some(tracked) = self.record.deposits.get_mut(&account) {
            tracked.ledger = dest;
        }
        info!(delegate = %self.id, %account, from = %source.id(), to = %dest, "delegate: migration followed");
        Ok(dest)
    }

    /// Take over `account`'s raw deposit from `predecessor` after its
    /// ledger lock was migrated out of `escrow`. The deposit is then
    /// tracked on the destination ledger.
    pub fn pull_custody<P: BoostStrategy>(
        &mut self,
        predecessor: &mut VotingEscrowDelegate<P>,
        escrow: &VotingEscrow,
        account: AccountId,
    ) -> Result<u128, EscrowError> {
        if predecessor.successor != Some(self.id) {
            return Err(BoostError::NotSuccessor(predecessor.id).into());
        }
        let deposit = *predecessor
            .record
            .deposit(&account)
            .ok_or(BoostError::NothingLocked(account))?;
        let dest = migration_destination(&deposit, escrow, &account)?;
        if self.record.deposits.contains_key(&account) {
            return Err(BoostError::UnsettledDeposit(account).into());
        }
        let moved = Deposit {
            ledger: dest,
            ..deposit
        };
        predecessor.raw.transfer(&predecessor.id, &self.id, deposit.raw)?;
        predecessor.record.take(&account);
        self.record.open(account, moved)?;
        info!(from = %predecessor.id, to = %self.id, %account, raw = deposit.raw, "delegate: custody pulled");
        Ok(deposit.raw)
    }

    fn boost_context(&self, action: BoostAction, now: u64, escrow: &VotingEscrow) -> BoostContext {
        BoostContext {
            action,
            now,
            max_time: escrow.max_time(),
            locked_total: self.record.locked_total,
        }
    }

    fn ensure_funds(&self, account: &AccountId, raw: u128) -> Result<(), CustodyError> {
        let have = self.raw.balance_of(account);
        if have < raw {
            return Err(CustodyError::InsufficientBalance {
                account: *account,
                have,
                need: raw,
            });
        }
        Ok(())
    }

    fn ensure_owner(&self, caller: &AccountId) -> Result<(), LockError> {
        if *caller != self.owner {
            return Err(LockError::Unauthorized(*caller));
        }
        Ok(())
    }
}

fn ensure_ledger(deposit: &Deposit, escrow: &VotingEscrow) -> Result<(), BoostError> {
    if escrow.id() != deposit.ledger {
        return Err(BoostError::WrongLedger {
            expected: deposit.ledger,
            got: escrow.id(),
        });
    }
    Ok(())
}

/// Whether the deposit's own lock left `escrow` through a migration.
fn carried_away(deposit: &Deposit, escrow: &VotingEscrow, account: &AccountId) -> bool {
    escrow.is_migrated(account)
        && escrow
            .lock(account)
            .is_some_and(|lock| lock.custody == LockCustody::Delegated(deposit.custodian))
}

fn migration_destination(
    deposit: &Deposit,
    source: &VotingEscrow,
    account: &AccountId,
) -> Result<AccountId, EscrowError> {
    ensure_ledger(deposit, source)?;
    if !carried_away(deposit, source, account) {
        return Err(BoostError::NotMigrated(*account).into());
    }
    source.migrator().ok_or_else(|| LockError::MigratorNotSet.into())
}
