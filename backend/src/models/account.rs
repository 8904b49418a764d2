//! Account model
//!
//! Represents a customer account held at one bank.
//! Each account has:
//! - Unique ID (also the lock-ordering key)
//! - Bank name (decides which bank queue its transactions are routed to)
//! - Balance (i64) guarded by the account's own mutex
//!
//! # Critical Invariants
//!
//! 1. Every read and write of `balance` happens under the account's lock,
//!    and the lock is held for the whole operation.
//! 2. Withdrawals and transfer debits never take the balance below zero.
//!    Credits that would overflow `i64` are refused, leaving both balances
//!    unchanged.
//! 3. Transfers acquire both account locks in ascending ID order, so two
//!    transfers running in opposite directions cannot deadlock.

use crate::models::transaction::{FailureReason, Transaction};
use parking_lot::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur during account operations
#[derive(Debug, Error, PartialEq)]
pub enum AccountError {
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: i64, available: i64 },

    #[error("Balance overflow: {balance} + {amount}")]
    Overflow { balance: i64, amount: i64 },
}

/// A bank account with a per-account lock
///
/// The lock is per account rather than per bank: a transfer touches a target
/// that may belong to another bank and so to another processor's workers.
///
/// # Example
/// ```
/// use bank_sim_core::{Account, Transaction, TransactionStatus, TransactionType};
///
/// let account = Account::new("Account_1".to_string(), "OTP".to_string());
/// account.deposit(1000).unwrap();
///
/// let mut tx = Transaction::new("Account_1".to_string(), 400, TransactionType::Withdrawal).unwrap();
/// account.withdraw(&mut tx);
/// assert_eq!(account.balance(), 600);
/// assert_eq!(tx.status(), TransactionStatus::Completed);
/// ```
#[derive(Debug)]
pub struct Account {
    id: String,
    bank_name: String,
    balance: Mutex<i64>,
}

impl Account {
    /// Create an account with a zero balance
    pub fn new(id: String, bank_name: String) -> Self {
        Self::with_balance(id, bank_name, 0)
    }

    /// Create an account with an opening balance
    pub fn with_balance(id: String, bank_name: String, balance: i64) -> Self {
        Self {
            id,
            bank_name,
            balance: Mutex::new(balance),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn bank_name(&self) -> &str {
        &self.bank_name
    }

    /// Current balance
    pub fn balance(&self) -> i64 {
        *self.balance.lock()
    }

    /// Add `amount` to the balance
    ///
    /// Balance is unchanged on overflow.
    pub fn deposit(&self, amount: i64) -> Result<(), AccountError> {
        let mut balance = self.balance.lock();
        credit_locked(&mut balance, amount)?;
        debug!(account = %self.id, amount, balance = *balance, "Deposited");
        Ok(())
    }

    /// Subtract `amount` if the balance covers it
    ///
    /// Balance is unchanged on error.
    pub fn try_debit(&self, amount: i64) -> Result<(), AccountError> {
        let mut balance = self.balance.lock();
        debit_locked(&mut balance, amount)
    }

    /// Withdraw the transaction's amount, recording the outcome on `tx`
    ///
    /// Sets `Completed` when the balance covers the amount, `Failed` with
    /// `InsufficientFunds` otherwise. A transaction that already failed stays
    /// failed even if the debit goes through.
    pub fn withdraw(&self, tx: &mut Transaction) {
        let mut balance = self.balance.lock();
        match debit_locked(&mut balance, tx.amount()) {
            Ok(()) => {
                mark_completed(tx);
                debug!(account = %self.id, amount = tx.amount(), balance = *balance, "Withdrawal successful");
            }
            Err(err) => {
                warn!(account = %self.id, tx_id = %tx.id(), %err, "FAILED withdrawal");
                tx.fail(failure_for(&err));
            }
        }
    }

    /// Move `amount` from this account to `target`, recording the outcome on `tx`
    ///
    /// Both locks are taken before either balance changes, in ascending ID
    /// order. When `target` is this same account only the balance check runs
    /// and the balance is left as it was.
    pub fn transfer(&self, amount: i64, target: &Account, tx: &mut Transaction) {
        if std::ptr::eq(self, target) || self.id == target.id {
            let balance = self.balance.lock();
            if *balance >= amount {
                mark_completed(tx);
            } else {
                tx.fail(FailureReason::InsufficientFunds);
            }
            return;
        }

        let (mut source_balance, mut target_balance) = lock_pair(self, target);
        let mut credited = *target_balance;
        let applied = credit_locked(&mut credited, amount)
            .and_then(|()| debit_locked(&mut source_balance, amount));
        match applied {
            Ok(()) => {
                *target_balance = credited;
                mark_completed(tx);
                debug!(
                    from = %self.id,
                    to = %target.id,
                    amount,
                    "Transfer successful"
                );
            }
            Err(err) => {
                warn!(from = %self.id, to = %target.id, tx_id = %tx.id(), %err, "FAILED transfer");
                tx.fail(failure_for(&err));
            }
        }
    }

    /// Set the balance back to zero
    pub fn reset_balance(&self) {
        *self.balance.lock() = 0;
    }

    /// Read the balance and zero it under a single lock
    pub fn take_balance(&self) -> i64 {
        std::mem::take(&mut *self.balance.lock())
    }
}

fn credit_locked(balance: &mut i64, amount: i64) -> Result<(), AccountError> {
    *balance = balance.checked_add(amount).ok_or(AccountError::Overflow {
        balance: *balance,
        amount,
    })?;
    Ok(())
}

fn debit_locked(balance: &mut i64, amount: i64) -> Result<(), AccountError> {
    if *balance < amount {
        return Err(AccountError::InsufficientFunds {
            required: amount,
            available: *balance,
        });
    }
    *balance = balance.checked_sub(amount).ok_or(AccountError::Overflow {
        balance: *balance,
        amount,
    })?;
    Ok(())
}

fn failure_for(err: &AccountError) -> FailureReason {
    match err {
        AccountError::InsufficientFunds { .. } => FailureReason::InsufficientFunds,
        AccountError::Overflow { .. } => FailureReason::BalanceOverflow,
    }
}

/// Pending becomes Completed; Completed and Failed are left alone.
fn mark_completed(tx: &mut Transaction) {
    if !tx.status().is_terminal() {
        // Only fails for non-pending transactions, which the guard excludes.
        let _ = tx.complete();
    }
}

/// Lock two distinct accounts in ascending ID order.
///
/// Returns the guards as (source, target) regardless of acquisition order.
fn lock_pair<'a>(
    source: &'a Account,
    target: &'a Account,
) -> (MutexGuard<'a, i64>, MutexGuard<'a, i64>) {
    if source.id < target.id {
        let s = source.balance.lock();
        let t = target.balance.lock();
        (s, t)
    } else {
        let t = target.balance.lock();
        let s = source.balance.lock();
        (s, t)
    }
}
