//! Criterion benchmarks for the ledger's hot paths.
//!
//! Covers: checkpoint planning, time- and block-keyed reads.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tidelock_core::config::EscrowConfig;
use tidelock_core::constants::{DAY, UNIT};
use tidelock_core::custody::MemoryVault;
use tidelock_core::types::{AccountId, BlockContext};
use tidelock_ledger::history::AccountChange;
use tidelock_ledger::VotingEscrow;

const ESCROW: AccountId = AccountId([0xEE; 20]);
const ACCOUNTS: u64 = 500;

fn account(i: u64) -> AccountId {
    let mut bytes = [0u8; 20];
    bytes[..8].copy_from_slice(&i.to_be_bytes());
    AccountId(bytes)
}

/// A ledger with one lock per account, opened an hour apart.
fn populated() -> (VotingEscrow, BlockContext) {
    let vault = Arc::new(MemoryVault::new());
    let mut rng = StdRng::seed_from_u64(7);
    let mut escrow = VotingEscrow::new(
        EscrowConfig::default(),
        vault.clone(),
        ESCROW,
        ESCROW,
        BlockContext::new(0, 0),
    )
    .expect("escrow");
    let mut ctx = BlockContext::new(0, 0);
    for i in 0..ACCOUNTS {
        let who = account(i);
        let amount = rng.gen_range(1..1_000) * UNIT;
        let duration = rng.gen_range(30..700) * DAY;
        vault.mint(&who, amount).expect("mint");
        escrow.create_lock(ctx, who, amount, duration).expect("lock");
        ctx = BlockContext::new(ctx.timestamp + 3_600, ctx.block + 1);
    }
    (escrow, ctx)
}

fn bench_prepare_checkpoint(c: &mut Criterion) {
    let (escrow, ctx) = populated();
    let later = BlockContext::new(ctx.timestamp + 90 * DAY, ctx.block + 2_160);
    let change = AccountChange {
        account: account(ACCOUNTS + 1),
        old_end: 0,
        new_bias: 1_000_000,
        new_slope: 1,
        new_end: later.timestamp + 1_000_000,
    };

    c.bench_function("prepare_checkpoint_30_intervals", |b| {
        b.iter(|| escrow.history().prepare(black_box(later), Some(black_box(change))))
    });
}

fn bench_balance_of(c: &mut Criterion) {
    let (escrow, ctx) = populated();
    let who = account(ACCOUNTS / 2);

    c.bench_function("balance_of", |b| {
        b.iter(|| escrow.balance_of(black_box(&who), black_box(ctx.timestamp)))
    });
}

fn bench_total_supply(c: &mut Criterion) {
    let (escrow, ctx) = populated();
    let far = ctx.timestamp + 365 * DAY;

    c.bench_function("total_supply_one_year_ahead", |b| {
        b.iter(|| escrow.total_supply(black_box(far)))
    });
}

fn bench_total_supply_at(c: &mut Criterion) {
    let (escrow, ctx) = populated();
    let block = ctx.block / 2;

    c.bench_function("total_supply_at_block", |b| {
        b.iter(|| escrow.total_supply_at(black_box(block)))
    });
}

criterion_group!(
    benches,
    bench_prepare_checkpoint,
    bench_balance_of,
    bench_total_supply,
    bench_total_supply_at,
);
criterion_main!(benches);
