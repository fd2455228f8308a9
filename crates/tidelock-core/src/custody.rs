//! In-memory token custody.
//!
//! [`MemoryVault`] is the reference [`Custody`] implementation: a single
//! balance table behind a `parking_lot::RwLock`, shared by every ledger and
//! delegate that handles the same token.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::trace;

use crate::error::CustodyError;
use crate::traits::Custody;
use crate::types::AccountId;

#[derive(Debug, Default)]
pub struct MemoryVault {
    balances: RwLock<HashMap<AccountId, u128>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` to `who` out of thin air.
    pub fn mint(&self, who: &AccountId, amount: u128) -> Result<(), CustodyError> {
        let mut balances = self.balances.write();
        let entry = balances.entry(*who).or_insert(0);
        *entry = entry
            .checked_add(amount)
            .ok_or(CustodyError::BalanceOverflow(*who))?;
        Ok(())
    }

    /// Sum of all balances.
    pub fn total_supply(&self) -> u128 {
        self.balances
            .read()
            .values()
            .fold(0u128, |acc, v| acc.saturating_add(*v))
    }
}

impl Custody for MemoryVault {
    fn balance_of(&self, who: &AccountId) -> u128 {
        self.balances.read().get(who).copied().unwrap_or(0)
    }

    fn transfer(&self, from: &AccountId, to: &AccountId, amount: u128) -> Result<(), CustodyError> {
        let mut balances = self.balances.write();
        let have = balances.get(from).copied().unwrap_or(0);
        if have < amount {
            return Err(CustodyError::InsufficientBalance {
                account: *from,
                have,
                need: amount,
            });
        }
        if from == to || amount == 0 {
            return Ok(());
        }
        let to_balance = balances.get(to).copied().unwrap_or(0);
        let credited = to_balance
            .checked_add(amount)
            .ok_or(CustodyError::BalanceOverflow(*to))?;
        balances.insert(*from, have - amount);
        balances.insert(*to, credited);
        trace!(%from, %to, amount, "custody transfer");
        Ok(())
    }
}
