//! Common-pool ledger. Every governance action and every transfer between the
//! pool and a client's private resources goes through here.

use contracts::{ClientId, Resources};
use serde::Serialize;

use crate::state::GameState;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        requested: Resources,
        available: Resources,
    },
    #[error("invalid amount {0}")]
    InvalidAmount(Resources),
    #[error("unknown client {0}")]
    UnknownClient(ClientId),
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryDirection {
    Withdrawal,
    Deposit,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LedgerEntry {
    pub sequence: u64,
    pub direction: EntryDirection,
    pub amount: Resources,
    pub memo: String,
    pub balance_after: Resources,
}

/// Shared resource account. The balance never goes negative: a withdrawal
/// either debits the full amount or leaves the account untouched.
#[derive(Debug, Clone, Serialize)]
pub struct CommonPool {
    balance: Resources,
    entries: Vec<LedgerEntry>,
}

impl CommonPool {
    pub fn new(balance: Resources) -> Self {
        Self {
            balance: balance.max(0),
            entries: Vec::new(),
        }
    }

    pub fn balance(&self) -> Resources {
        self.balance
    }

    pub fn can_cover(&self, amount: Resources) -> bool {
        self.balance >= amount
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Debit `amount` in full, or fail without touching the balance.
    pub fn withdraw(&mut self, amount: Resources, memo: &str) -> Result<Resources, LedgerError> {
        if amount < 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        if self.balance < amount {
            return Err(LedgerError::InsufficientFunds {
                requested: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        self.record(EntryDirection::Withdrawal, amount, memo);
        Ok(amount)
    }

    pub fn deposit(&mut self, amount: Resources, memo: &str) -> Result<(), LedgerError> {
        if amount < 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        self.balance += amount;
        self.record(EntryDirection::Deposit, amount, memo);
        Ok(())
    }

    fn record(&mut self, direction: EntryDirection, amount: Resources, memo: &str) {
        if amount == 0 {
            return;
        }
        self.entries.push(LedgerEntry {
            sequence: self.entries.len() as u64 + 1,
            direction,
            amount,
            memo: memo.to_string(),
            balance_after: self.balance,
        });
    }
}

impl GameState {
    /// Move `amount` from the common pool into a client's private resources.
    pub fn pay_from_common_pool(
        &mut self,
        client: &ClientId,
        amount: Resources,
        memo: &str,
    ) -> Result<Resources, LedgerError> {
        if !self.client_infos.contains_key(client) {
            return Err(LedgerError::UnknownClient(client.clone()));
        }
        let paid = self.common_pool.withdraw(amount, memo)?;
        if let Some(info) = self.client_infos.get_mut(client) {
            info.resources += paid;
        }
        Ok(paid)
    }

    /// Move `amount` from a client's private resources into the common pool.
    pub fn collect_into_common_pool(
        &mut self,
        client: &ClientId,
        amount: Resources,
        memo: &str,
    ) -> Result<Resources, LedgerError> {
        if amount < 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let info = self
            .client_infos
            .get_mut(client)
            .ok_or_else(|| LedgerError::UnknownClient(client.clone()))?;
        if info.resources < amount {
            return Err(LedgerError::InsufficientFunds {
                requested: amount,
                available: info.resources,
            });
        }
        info.resources -= amount;
        self.common_pool.deposit(amount, memo)?;
        Ok(amount)
    }
}
