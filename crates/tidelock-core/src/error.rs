//! Error types for the Tidelock ledger and its delegates.
use thiserror::Error;

use crate::types::AccountId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("amount must be non-zero")] ZeroAmount,
    #[error("duration too short: {duration} < {min}")] DurationTooShort { duration: u64, min: u64 },
    #[error("duration too long: {duration} > {max}")] DurationTooLong { duration: u64, max: u64 },
    #[error("existing lock found for {0}")] ExistingLock(AccountId),
    #[error("lock not found for {0}")] LockNotFound(AccountId),
    #[error("lock expired at {end} (now {now})")] LockExpired { end: u64, now: u64 },
    #[error("lock not expired until {end} (now {now})")] LockNotExpired { end: u64, now: u64 },
    #[error("unlock time too early: {requested} <= {current}")] UnlockTimeTooEarly { current: u64, requested: u64 },
    #[error("lock migrated for {0}")] LockMigrated(AccountId),
    #[error("migrator not set")] MigratorNotSet,
    #[error("migrator already set")] MigratorAlreadySet,
    #[error("ledger {0} cannot migrate into itself")] SelfMigration(AccountId),
    #[error("unauthorized caller: {0}")] Unauthorized(AccountId),
    #[error("unauthorized delegate: {0}")] UnauthorizedDelegate(AccountId),
    #[error("lock custody does not match caller for {0}")] CustodyMismatch(AccountId),
    #[error("unknown migration source: {0}")] UnknownMigrationSource(AccountId),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    #[error("catch-up required: history at {last_checkpoint}, now {now}")] CatchUpRequired { last_checkpoint: u64, now: u64 },
    #[error("timestamp went backwards: {now} < {last}")] NonMonotonicTime { last: u64, now: u64 },
    #[error("block went backwards: {now} < {last}")] NonMonotonicBlock { last: u64, now: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CustodyError {
    #[error("insufficient balance for {account}: have {have}, need {need}")] InsufficientBalance { account: AccountId, have: u128, need: u128 },
    #[error("balance overflow for {0}")] BalanceOverflow(AccountId),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoostError {
    #[error("duration too short: {duration} < {min}")] DurationTooShort { duration: u64, min: u64 },
    #[error("amount too small: {amount} < {min}")] AmountTooSmall { amount: u128, min: u128 },
    #[error("liquidity pool is empty")] EmptyPool,
    #[error("existing lock found for {0}")] ExistingLockFound(AccountId),
    #[error("nothing locked for {0}")] NothingLocked(AccountId),
    #[error("settle the previous deposit of {0} first")] UnsettledDeposit(AccountId),
    #[error("delegate closed at {deadline} (now {now})")] DelegateExpired { deadline: u64, now: u64 },
    #[error("successor already set")] SuccessorAlreadySet,
    #[error("not the successor of {0}")] NotSuccessor(AccountId),
    #[error("lock of {0} has not been migrated")] NotMigrated(AccountId),
    #[error("effective amount is zero")] ZeroEffectiveAmount,
    #[error("deposit is tracked on ledger {expected}, not {got}")] WrongLedger { expected: AccountId, got: AccountId },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("interval must be non-zero")] ZeroInterval,
    #[error("max time {max_time} below interval {interval}")] MaxTimeBelowInterval { max_time: u64, interval: u64 },
    #[error("penalty floor {0} exceeds precision")] PenaltyFloorTooHigh(u128),
    #[error("catch-up step bound must be non-zero")] ZeroCatchUpSteps,
    #[error("cap denominator must be non-zero")] ZeroCapDenominator,
    #[error("max boost must be non-zero")] ZeroMaxBoost,
    #[error("invalid config: {0}")] Parse(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MathError {
    #[error("arithmetic overflow")] ArithmeticOverflow,
    #[error("division by zero")] DivisionByZero,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EscrowError {
    #[error(transparent)] Lock(#[from] LockError),
    #[error(transparent)] History(#[from] HistoryError),
    #[error(transparent)] Custody(#[from] CustodyError),
    #[error(transparent)] Boost(#[from] BoostError),
    #[error(transparent)] Config(#[from] ConfigError),
    #[error(transparent)] Math(#[from] MathError),
}
