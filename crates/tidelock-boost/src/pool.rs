//! In-memory liquidity pool.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tidelock_core::traits::LiquidityPool;

/// Pool figures the liquidity-share boost reads.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolState {
    /// Outstanding LP tokens.
    pub total_supply: u128,
    /// Reserve of the escrowed token.
    pub reserve: u128,
}

/// A pool whose figures are set directly.
#[derive(Debug, Default)]
pub struct MemoryPool {
    state: RwLock<PoolState>,
}

impl MemoryPool {
    pub fn new(total_supply: u128, reserve: u128) -> Self {
        Self {
            state: RwLock::new(PoolState {
                total_supply,
                reserve,
            }),
        }
    }

    pub fn set(&self, state: PoolState) {
        *self.state.write() = state;
    }

    pub fn state(&self) -> PoolState {
        *self.state.read()
    }
}

impl LiquidityPool for MemoryPool {
    fn total_supply(&self) -> u128 {
        self.state.read().total_supply
    }

    fn reserve(&self) -> u128 {
        self.state.read().reserve
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_back_state() {
        let pool = MemoryPool::new(10, 20);
        assert_eq!(pool.total_supply(), 10);
        assert_eq!(pool.reserve(), 20);
        pool.set(PoolState {
            total_supply: 1,
            reserve: 2,
        });
        assert_eq!(pool.state(), PoolState { total_supply: 1, reserve: 2 });
    }
}
