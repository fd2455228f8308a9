//! End-to-end scenarios across the ledger, delegates, and migrations.
//!
//! Each test builds its own ledgers on a fresh in-memory vault and drives
//! them with a [`Clock`] that mines one block per hour.

use std::sync::Arc;

use tidelock_boost::{
    DurationBoost, DurationBoostConfig, LiquidityBoostConfig, LiquidityShareBoost, MemoryPool,
    VotingEscrowDelegate,
};
use tidelock_core::config::EscrowConfig;
use tidelock_core::constants::{DAY, HOUR, PRECISION, UNIT, WEEK};
use tidelock_core::error::{BoostError, EscrowError, HistoryError, LockError};
use tidelock_core::math::mul_div;
use tidelock_core::traits::Custody;
use tidelock_core::types::{LockCustody, LockStatus};
use tidelock_ledger::{CatchUp, SharedEscrow};
use tidelock_tests::helpers::{account, escrow, funded_vault, init_test_logging, Clock, OWNER};

/// Per-second slope flooring drifts values by at most the lock span.
const TOLERANCE: u128 = 100_000_000;

fn assert_close(actual: u128, expected: u128) {
    assert!(
        actual.abs_diff(expected) <= TOLERANCE,
        "{actual} not within {TOLERANCE} of {expected}"
    );
}

fn boosted_config() -> EscrowConfig {
    EscrowConfig {
        max_time: 730 * DAY,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Ledger lifecycle
// ---------------------------------------------------------------------------

#[test]
fn two_accounts_decay_and_withdraw() {
    init_test_logging();
    let alice = account(0xA1);
    let bob = account(0xB0);
    let ledger_id = account(0xEE);
    let vault = funded_vault(&[(alice, 1_000 * UNIT), (bob, 500 * UNIT)]);
    let mut clock = Clock::default();
    let mut ve = escrow(EscrowConfig::default(), vault.clone(), ledger_id, &clock);
    let t0 = clock.timestamp();

    ve.create_lock(clock.now(), alice, 1_000 * UNIT, 300 * DAY).unwrap();
    ve.create_lock(clock.now(), bob, 500 * UNIT, 600 * DAY).unwrap();
    assert_close(ve.balance_of(&alice, t0), 1_000 * UNIT);
    assert_close(ve.balance_of(&bob, t0), 500 * UNIT);
    assert_eq!(ve.total_supply(t0), ve.balance_of(&alice, t0) + ve.balance_of(&bob, t0));
    assert_eq!(ve.locked_supply(), 1_500 * UNIT);

    let mid = clock.advance(150 * DAY);
    assert_eq!(ve.checkpoint(mid).unwrap(), CatchUp::Complete);
    let (a, b) = (ve.balance_of(&alice, mid.timestamp), ve.balance_of(&bob, mid.timestamp));
    assert_close(a, 500 * UNIT);
    assert_close(b, 375 * UNIT);
    assert_eq!(ve.total_supply(mid.timestamp), a + b);

    let alice_end = clock.advance(150 * DAY);
    assert_eq!(ve.balance_of(&alice, alice_end.timestamp), 0);
    assert_close(ve.balance_of(&bob, alice_end.timestamp), 250 * UNIT);
    assert_eq!(ve.withdraw(alice_end, alice).unwrap(), 1_000 * UNIT);
    assert_eq!(vault.balance_of(&alice), 1_000 * UNIT);
    assert_eq!(
        ve.total_supply(alice_end.timestamp),
        ve.balance_of(&bob, alice_end.timestamp)
    );

    let bob_end = clock.advance(300 * DAY);
    assert_eq!(ve.total_supply(bob_end.timestamp), 0);
    assert_eq!(ve.withdraw(bob_end, bob).unwrap(), 500 * UNIT);
    assert_eq!(vault.balance_of(&ledger_id), 0);
    assert_eq!(ve.locked_supply(), 0);
}

#[test]
fn historical_block_queries_match_call_times() {
    init_test_logging();
    let alice = account(0xA1);
    let bob = account(0xB0);
    let vault = funded_vault(&[(alice, 5_000 * UNIT), (bob, 5_000 * UNIT)]);
    let mut clock = Clock::default();
    let mut ve = escrow(EscrowConfig::default(), vault, account(0xEE), &clock);

    let mut calls = Vec::new();
    ve.create_lock(clock.now(), alice, 1_000 * UNIT, 360 * DAY).unwrap();
    calls.push(clock.now());
    ve.create_lock(clock.advance(30 * DAY), bob, 2_000 * UNIT, 90 * DAY).unwrap();
    calls.push(clock.now());
    ve.increase_amount(clock.advance(27 * DAY), alice, 500 * UNIT).unwrap();
    calls.push(clock.now());
    ve.increase_unlock_time(clock.advance(33 * DAY), alice, 600 * DAY).unwrap();
    calls.push(clock.now());
    ve.cancel(clock.advance(9 * DAY), alice).unwrap();
    calls.push(clock.now());
    ve.checkpoint(clock.advance(60 * DAY)).unwrap();
    calls.push(clock.now());

    for ctx in calls {
        for who in [alice, bob] {
            assert_eq!(
                ve.balance_of_at(&who, ctx.block),
                ve.balance_of(&who, ctx.timestamp),
                "account {who} at block {}",
                ctx.block
            );
        }
        assert_eq!(ve.total_supply_at(ctx.block), ve.total_supply(ctx.timestamp));
    }
    assert_eq!(ve.total_supply_at(0), 0);
}

#[test]
fn cancellation_penalty_example() {
    init_test_logging();
    let alice = account(0xA1);
    let ledger_id = account(0xEE);
    let vault = funded_vault(&[(alice, 1_000 * UNIT)]);
    let mut clock = Clock::default();
    let mut ve = escrow(EscrowConfig::default(), vault.clone(), ledger_id, &clock);

    ve.create_lock(clock.now(), alice, 1_000 * UNIT, 300 * DAY).unwrap();
    let refund = ve.cancel(clock.advance(270 * DAY), alice).unwrap();
    assert_eq!(refund, 500 * UNIT);
    assert_eq!(vault.balance_of(&alice), 500 * UNIT);
    assert_eq!(ve.penalty_reserve(), 500 * UNIT);
    assert_eq!(ve.total_supply(clock.timestamp()), 0);

    let collector = account(0xC0);
    assert_eq!(ve.claim_penalties(&OWNER, &collector).unwrap(), 500 * UNIT);
    assert_eq!(vault.balance_of(&collector), 500 * UNIT);
    assert_eq!(vault.balance_of(&ledger_id), 0);
}

#[test]
fn long_idle_ledger_needs_catch_up() {
    init_test_logging();
    let alice = account(0xA1);
    let vault = funded_vault(&[(alice, UNIT)]);
    let mut clock = Clock::default();
    let config = EscrowConfig {
        max_catch_up_steps: 10,
        ..Default::default()
    };
    let mut ve = escrow(config, vault, account(0xEE), &clock);
    let genesis = clock.timestamp();

    let later = clock.advance(60 * DAY);
    let err = ve.create_lock(later, alice, UNIT, WEEK).unwrap_err();
    assert_eq!(
        err,
        EscrowError::History(HistoryError::CatchUpRequired {
            last_checkpoint: genesis,
            now: later.timestamp
        })
    );
    assert_eq!(
        ve.checkpoint(later).unwrap(),
        CatchUp::Pending {
            through: genesis + 30 * DAY
        }
    );
    assert_eq!(ve.checkpoint(later).unwrap(), CatchUp::Complete);
    ve.create_lock(later, alice, UNIT, WEEK).unwrap();
    assert_eq!(ve.lock_status(&alice), LockStatus::Active);
}

// ---------------------------------------------------------------------------
// Boost delegates
// ---------------------------------------------------------------------------

#[test]
fn duration_boost_triples_minimum_lock() {
    init_test_logging();
    let alice = account(0xA1);
    let delegate_id = account(0xDE);
    let vault = funded_vault(&[(alice, 1_000 * UNIT)]);
    let mut clock = Clock::default();
    let mut ve = escrow(boosted_config(), vault.clone(), account(0xEE), &clock);
    ve.set_delegate(&OWNER, delegate_id, true).unwrap();
    let strategy = DurationBoost::new(DurationBoostConfig::default()).unwrap();
    let mut delegate = VotingEscrowDelegate::new(delegate_id, OWNER, strategy, vault.clone());

    let effective = delegate
        .create_lock(&mut ve, clock.now(), alice, 1_000 * UNIT, 219 * DAY)
        .unwrap();
    assert_eq!(effective.principal, 3_000 * UNIT);
    assert_close(ve.balance_of(&alice, clock.timestamp()), 3_000 * UNIT);
    assert_eq!(ve.lock(&alice).unwrap().custody, LockCustody::Delegated(delegate_id));
    assert_eq!(vault.balance_of(&delegate_id), 1_000 * UNIT);
    assert_eq!(delegate.locked(&alice), 1_000 * UNIT);

    // the boosted amount decays over the lock like any other
    let later = clock.advance(HOUR);
    let span = u128::from(219 * DAY);
    let balance = ve.balance_of(&alice, later.timestamp);
    assert_close(balance, 3_000 * UNIT * (span - u128::from(HOUR)) / span);
    assert_eq!(ve.total_supply(later.timestamp), balance);
}

#[test]
fn liquidity_boost_lifecycle() {
    init_test_logging();
    let alice = account(0xA1);
    let bob = account(0xB0);
    let delegate_id = account(0xDE);
    let token = funded_vault(&[]);
    let lp = funded_vault(&[(alice, 10 * UNIT), (bob, 10 * UNIT)]);
    let pool = Arc::new(MemoryPool::new(1_000 * UNIT, 2_000 * UNIT));
    let mut clock = Clock::default();
    let mut ve = escrow(EscrowConfig::default(), token.clone(), account(0xEE), &clock);
    ve.set_delegate(&OWNER, delegate_id, true).unwrap();
    let strategy = LiquidityShareBoost::new(LiquidityBoostConfig::default(), pool).unwrap();
    let mut delegate = VotingEscrowDelegate::new(delegate_id, OWNER, strategy, lp.clone());

    let first = delegate
        .create_lock(&mut ve, clock.now(), alice, 10 * UNIT, 90 * DAY)
        .unwrap();
    assert_eq!(first.principal, 40 * UNIT);
    // bob's bonus sees alice's LP as no longer circulating
    let second = delegate
        .create_lock(&mut ve, clock.now(), bob, 10 * UNIT, 90 * DAY)
        .unwrap();
    assert_eq!(second.principal, 398 * UNIT / 10);
    assert_eq!(delegate.locked_total(), 20 * UNIT);
    assert_eq!(ve.locked_supply(), 40 * UNIT + 398 * UNIT / 10);
    assert_eq!(token.total_supply(), 0);

    let end = clock.advance(90 * DAY);
    assert_eq!(
        delegate.withdraw(&ve, alice),
        Err(BoostError::ExistingLockFound(alice).into())
    );
    assert_eq!(ve.withdraw(end, alice).unwrap(), 0);
    assert_eq!(delegate.withdraw(&ve, alice).unwrap(), 10 * UNIT);
    assert_eq!(lp.balance_of(&alice), 10 * UNIT);
    assert_eq!(delegate.locked_total(), 10 * UNIT);
}

// ---------------------------------------------------------------------------
// Migration
// ---------------------------------------------------------------------------

fn weekly_config() -> EscrowConfig {
    EscrowConfig {
        interval: WEEK,
        max_time: 104 * WEEK,
        ..Default::default()
    }
}

#[test]
fn chained_migration_preserves_value() {
    init_test_logging();
    let alice = account(0xA1);
    let (a_id, b_id, c_id) = (account(0x1A), account(0x1B), account(0x1C));
    let vault = funded_vault(&[(alice, 1_000 * UNIT)]);
    let mut clock = Clock::default();

    let mut a = escrow(EscrowConfig::default(), vault.clone(), a_id, &clock);
    let b = SharedEscrow::new(escrow(weekly_config(), vault.clone(), b_id, &clock));
    let c = SharedEscrow::new(escrow(EscrowConfig::default(), vault.clone(), c_id, &clock));
    b.write().set_migration_source(&OWNER, a_id, true).unwrap();
    c.write().set_migration_source(&OWNER, b_id, true).unwrap();
    a.set_migrator(&OWNER, Arc::new(b.clone())).unwrap();
    b.write().set_migrator(&OWNER, Arc::new(c.clone())).unwrap();

    a.create_lock(clock.now(), alice, 1_000 * UNIT, 360 * DAY).unwrap();

    let first = clock.advance(30 * DAY);
    let power = a.balance_of(&alice, first.timestamp);
    a.migrate(first, alice).unwrap();
    let on_b = b.read().balance_of(&alice, first.timestamp);
    assert!(on_b <= power && power - on_b < UNIT);
    assert_eq!(vault.balance_of(&b_id), 1_000 * UNIT);

    let second = clock.advance(30 * DAY);
    let power = b.read().balance_of(&alice, second.timestamp);
    b.write().migrate(second, alice).unwrap();
    let on_c = c.read().balance_of(&alice, second.timestamp);
    assert!(on_c <= power && power - on_c < UNIT);
    assert_eq!(c.read().locked(&alice).amount, 1_000 * UNIT);
    assert_eq!(vault.balance_of(&c_id), 1_000 * UNIT);

    // liveness follows both hops
    assert!(a.has_live_lock(&alice));
    let end = c.read().unlock_time(&alice);
    let done = clock.advance_to(end);
    assert_eq!(c.write().withdraw(done, alice).unwrap(), 1_000 * UNIT);
    assert!(!a.has_live_lock(&alice));
    assert_eq!(vault.balance_of(&alice), 1_000 * UNIT);
}

#[test]
fn delegated_lock_migrates_with_successor_custody() {
    init_test_logging();
    let alice = account(0xA1);
    let (source_id, dest_id) = (account(0x51), account(0xD5));
    let (old_delegate, new_delegate) = (account(0xD1), account(0xD2));
    let vault = funded_vault(&[(alice, 1_000 * UNIT)]);
    let mut clock = Clock::default();

    let mut source = escrow(boosted_config(), vault.clone(), source_id, &clock);
    let dest = SharedEscrow::new(escrow(weekly_config(), vault.clone(), dest_id, &clock));
    dest.write().set_migration_source(&OWNER, source_id, true).unwrap();
    source.set_migrator(&OWNER, Arc::new(dest.clone())).unwrap();
    source.set_delegate(&OWNER, old_delegate, true).unwrap();

    let boost = || DurationBoost::new(DurationBoostConfig::default()).unwrap();
    let mut predecessor = VotingEscrowDelegate::new(old_delegate, OWNER, boost(), vault.clone());
    let mut successor = VotingEscrowDelegate::new(new_delegate, OWNER, boost(), vault.clone());

    predecessor
        .create_lock(&mut source, clock.now(), alice, 1_000 * UNIT, 219 * DAY)
        .unwrap();
    assert_eq!(
        successor.pull_custody(&mut predecessor, &source, alice),
        Err(BoostError::NotSuccessor(old_delegate).into())
    );
    predecessor.pre_migrate(&OWNER, new_delegate).unwrap();
    assert_eq!(
        successor.pull_custody(&mut predecessor, &source, alice),
        Err(BoostError::NotMigrated(alice).into())
    );

    let moved = clock.advance(30 * DAY);
    let power = source.balance_of(&alice, moved.timestamp);
    source.migrate(moved, alice).unwrap();
    assert_eq!(source.lock_status(&alice), LockStatus::Migrated);
    let on_dest = dest.read().balance_of(&alice, moved.timestamp);
    assert!(power - on_dest < UNIT);
    assert_eq!(dest.read().locked(&alice).amount, 3_000 * UNIT);
    // delegated principal is virtual: no tokens cross ledgers
    assert_eq!(vault.balance_of(&dest_id), 0);

    // the lock left the source, so nothing settles there
    assert_eq!(
        predecessor.withdraw(&source, alice),
        Err(LockError::LockMigrated(alice).into())
    );
    assert_eq!(
        successor.pull_custody(&mut predecessor, &dest.read(), alice),
        Err(BoostError::WrongLedger {
            expected: source_id,
            got: dest_id
        }
        .into())
    );

    assert_eq!(successor.pull_custody(&mut predecessor, &source, alice).unwrap(), 1_000 * UNIT);
    assert_eq!(predecessor.locked_total(), 0);
    assert_eq!(vault.balance_of(&new_delegate), 1_000 * UNIT);
    let tracked = *successor.record().deposit(&alice).unwrap();
    assert_eq!((tracked.ledger, tracked.custodian), (dest_id, old_delegate));
    assert_eq!(
        successor.withdraw(&source, alice),
        Err(BoostError::WrongLedger {
            expected: dest_id,
            got: source_id
        }
        .into())
    );

    let end = dest.read().unlock_time(&alice);
    let done = clock.advance_to(end);
    assert_eq!(dest.write().withdraw(done, alice).unwrap(), 0);
    let released = successor.withdraw(&dest.read(), alice).unwrap();
    assert_eq!(released, 1_000 * UNIT);
    assert_eq!(vault.balance_of(&alice), 1_000 * UNIT);
}

#[test]
fn delegate_follows_its_migrated_lock() {
    init_test_logging();
    let alice = account(0xA1);
    let (source_id, dest_id) = (account(0x51), account(0xD5));
    let delegate_id = account(0xDE);
    let vault = funded_vault(&[(alice, 1_000 * UNIT)]);
    let mut clock = Clock::default();

    let mut source = escrow(boosted_config(), vault.clone(), source_id, &clock);
    let dest = SharedEscrow::new(escrow(weekly_config(), vault.clone(), dest_id, &clock));
    dest.write().set_migration_source(&OWNER, source_id, true).unwrap();
    source.set_delegate(&OWNER, delegate_id, true).unwrap();
    let strategy = DurationBoost::new(DurationBoostConfig::default()).unwrap();
    let mut delegate = VotingEscrowDelegate::new(delegate_id, OWNER, strategy, vault.clone());

    delegate
        .create_lock(&mut source, clock.now(), alice, 1_000 * UNIT, 219 * DAY)
        .unwrap();
    source.set_migrator(&OWNER, Arc::new(dest.clone())).unwrap();
    assert_eq!(source.migrator(), Some(dest_id));
    source.migrate(clock.advance(30 * DAY), alice).unwrap();

    assert_eq!(
        delegate.withdraw(&source, alice),
        Err(LockError::LockMigrated(alice).into())
    );
    assert_eq!(delegate.follow_migration(&source, alice).unwrap(), dest_id);
    assert_eq!(
        delegate.withdraw(&dest.read(), alice),
        Err(BoostError::ExistingLockFound(alice).into())
    );

    // a cancellation on the destination still reaches the raw deposit
    dest.write().cancel(clock.advance(3 * DAY), alice).unwrap();
    let rate = dest.read().lock(&alice).unwrap().penalty_rate.unwrap();
    let released = delegate.withdraw(&dest.read(), alice).unwrap();
    assert_eq!(released, mul_div(1_000 * UNIT, PRECISION - rate, PRECISION).unwrap());
    assert_eq!(delegate.forfeited(), 1_000 * UNIT - released);
    assert_eq!(vault.balance_of(&alice), released);
}
