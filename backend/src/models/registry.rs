//! Account registry
//!
//! Owned map of every account in the simulation. Built once at startup and
//! shared between the orchestrator and all processors through an `Arc`;
//! the map itself is never mutated afterwards, only the balances inside the
//! accounts (each under its own lock).

use crate::models::account::Account;
use crate::models::transaction::{FailureReason, Transaction};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Registry of accounts keyed by account ID
///
/// Iteration order is ascending by ID, so balance snapshots come out in a
/// stable order every cycle.
#[derive(Debug, Default)]
pub struct AccountRegistry {
    accounts: BTreeMap<String, Arc<Account>>,
}

impl AccountRegistry {
    /// Build a registry from a list of accounts
    ///
    /// A later account with a duplicate ID replaces the earlier one;
    /// configuration validation rejects duplicates before this point.
    pub fn new(accounts: impl IntoIterator<Item = Account>) -> Self {
        let accounts = accounts
            .into_iter()
            .map(|account| (account.id().to_string(), Arc::new(account)))
            .collect();
        Self { accounts }
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Account>> {
        self.accounts.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.accounts.contains_key(id)
    }

    /// All account IDs in ascending order
    pub fn ids(&self) -> Vec<String> {
        self.accounts.keys().cloned().collect()
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Arc<Account>> {
        self.accounts.values()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Bank that owns `id`
    pub fn bank_of(&self, id: &str) -> Option<&str> {
        self.accounts.get(id).map(|account| account.bank_name())
    }

    /// Distinct bank names, ascending
    pub fn banks(&self) -> BTreeSet<String> {
        self.accounts
            .values()
            .map(|account| account.bank_name().to_string())
            .collect()
    }

    /// Transfer between two registered accounts
    ///
    /// Marks `tx` failed with `MissingTargetAccount` when `target_id` is not
    /// registered; otherwise defers to [`Account::transfer`]. Returns `false`
    /// only when the source itself is unknown, leaving `tx` untouched.
    pub fn transfer(&self, source_id: &str, target_id: &str, tx: &mut Transaction) -> bool {
        let Some(source) = self.accounts.get(source_id) else {
            return false;
        };
        match self.accounts.get(target_id) {
            Some(target) => source.transfer(tx.amount(), target, tx),
            None => tx.fail(FailureReason::MissingTargetAccount),
        }
        true
    }

    /// (account ID, balance) pairs in ID order
    pub fn snapshot_balances(&self) -> Vec<(String, i64)> {
        self.accounts
            .iter()
            .map(|(id, account)| (id.clone(), account.balance()))
            .collect()
    }

    /// Sum of all balances (each read under its own lock)
    pub fn total_balance(&self) -> i64 {
        self.accounts.values().map(|account| account.balance()).sum()
    }

    /// Reset every balance to zero
    pub fn reset_all(&self) {
        for account in self.accounts.values() {
            account.reset_balance();
        }
    }
}
