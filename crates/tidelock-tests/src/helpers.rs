//! Shared helpers for scenario and property tests.

use std::sync::Arc;

use tidelock_core::config::EscrowConfig;
use tidelock_core::constants::{HOUR, WEEK};
use tidelock_core::custody::MemoryVault;
use tidelock_core::types::{AccountId, BlockContext};
use tidelock_ledger::VotingEscrow;

/// Genesis timestamp used by every scenario; a multiple of both one week and three days.
pub const GENESIS_TIME: u64 = 2_802 * WEEK;

/// Genesis block height used by every scenario.
pub const GENESIS_BLOCK: u64 = 10_000;

/// Owner of every ledger and delegate built here.
pub const OWNER: AccountId = AccountId([0x0A; 20]);

/// Account id from a seed byte.
pub fn account(seed: u8) -> AccountId {
    AccountId([seed; 20])
}

/// Install a test-writer subscriber once. Honours `RUST_LOG`.
pub fn init_test_logging() {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_test_writer())
        .try_init();
}

/// Wall clock and block height that move together, one block per hour.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    ctx: BlockContext,
}

impl Default for Clock {
    fn default() -> Self {
        Self {
            ctx: BlockContext::new(GENESIS_TIME, GENESIS_BLOCK),
        }
    }
}

impl Clock {
    pub fn now(&self) -> BlockContext {
        self.ctx
    }

    pub fn timestamp(&self) -> u64 {
        self.ctx.timestamp
    }

    pub fn block(&self) -> u64 {
        self.ctx.block
    }

    /// Move forward by `seconds`, mining one block per started hour.
    pub fn advance(&mut self, seconds: u64) -> BlockContext {
        self.ctx.timestamp += seconds;
        self.ctx.block += seconds.div_ceil(HOUR);
        self.ctx
    }

    /// Move forward to `timestamp` (no-op if already there).
    pub fn advance_to(&mut self, timestamp: u64) -> BlockContext {
        let seconds = timestamp.saturating_sub(self.ctx.timestamp);
        self.advance(seconds)
    }
}

/// A token vault with `accounts` funded.
pub fn funded_vault(accounts: &[(AccountId, u128)]) -> Arc<MemoryVault> {
    let vault = Arc::new(MemoryVault::new());
    for (who, amount) in accounts {
        vault.mint(who, *amount).expect("mint");
    }
    vault
}

/// A ledger owned by [`OWNER`] with its genesis at the clock's current time.
pub fn escrow(config: EscrowConfig, vault: Arc<MemoryVault>, id: AccountId, clock: &Clock) -> VotingEscrow {
    VotingEscrow::new(config, vault, id, OWNER, clock.now()).expect("escrow")
}
