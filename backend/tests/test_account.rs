//! Tests for Account and AccountRegistry
//!
//! CRITICAL: balances never go negative through withdrawals or transfers,
//! and concurrent access never loses an update.

use bank_sim_core::{
    Account, AccountError, AccountRegistry, FailureReason, Transaction, TransactionStatus,
    TransactionType,
};
use std::sync::Arc;
use std::thread;

fn withdrawal(account: &str, amount: i64) -> Transaction {
    Transaction::new(account.to_string(), amount, TransactionType::Withdrawal).unwrap()
}

fn transfer(from: &str, to: &str, amount: i64) -> Transaction {
    Transaction::transfer(from.to_string(), to.to_string(), amount)
}

#[test]
fn test_withdraw_within_balance() {
    let account = Account::with_balance("Account_1".to_string(), "OTP".to_string(), 1000);
    let mut tx = withdrawal("Account_1", 400);

    account.withdraw(&mut tx);

    assert_eq!(account.balance(), 600);
    assert_eq!(tx.status(), TransactionStatus::Completed);
}

#[test]
fn test_withdraw_over_balance_fails() {
    let account = Account::with_balance("Account_1".to_string(), "OTP".to_string(), 1000);
    let mut tx = withdrawal("Account_1", 1500);

    account.withdraw(&mut tx);

    assert_eq!(account.balance(), 1000);
    assert_eq!(tx.status(), TransactionStatus::Failed);
    assert_eq!(tx.failure_reason(), Some(&FailureReason::InsufficientFunds));
}

#[test]
fn test_withdraw_exact_balance() {
    let account = Account::with_balance("Account_3".to_string(), "OTP".to_string(), 501);
    let mut tx = withdrawal("Account_3", 501);

    account.withdraw(&mut tx);

    assert_eq!(account.balance(), 0);
    assert!(tx.is_completed());
}

#[test]
fn test_try_debit_error_details() {
    let account = Account::with_balance("Account_1".to_string(), "OTP".to_string(), 30);
    assert_eq!(
        account.try_debit(50),
        Err(AccountError::InsufficientFunds {
            required: 50,
            available: 30
        })
    );
    assert_eq!(account.balance(), 30);
}

#[test]
fn test_transfer_moves_funds() {
    let a = Account::with_balance("A".to_string(), "OTP".to_string(), 1000);
    let b = Account::with_balance("B".to_string(), "KH".to_string(), 500);
    let mut tx = transfer("A", "B", 300);

    a.transfer(300, &b, &mut tx);

    assert_eq!(a.balance(), 700);
    assert_eq!(b.balance(), 800);
    assert!(tx.is_completed());
}

#[test]
fn test_transfer_insufficient_changes_nothing() {
    let a = Account::with_balance("A".to_string(), "OTP".to_string(), 100);
    let b = Account::with_balance("B".to_string(), "KH".to_string(), 500);
    let mut tx = transfer("A", "B", 300);

    a.transfer(300, &b, &mut tx);

    assert_eq!(a.balance(), 100);
    assert_eq!(b.balance(), 500);
    assert_eq!(tx.failure_reason(), Some(&FailureReason::InsufficientFunds));
}

#[test]
fn test_self_transfer_is_balance_neutral() {
    let a = Account::with_balance("A".to_string(), "OTP".to_string(), 200);
    let mut tx = transfer("A", "A", 150);

    a.transfer(150, &a, &mut tx);

    assert_eq!(a.balance(), 200);
    assert!(tx.is_completed());
}

#[test]
fn test_concurrent_deposits_sum_exactly() {
    let account = Arc::new(Account::new("Account_1".to_string(), "OTP".to_string()));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let account = Arc::clone(&account);
            thread::spawn(move || {
                for _ in 0..1000 {
                    account.deposit(7).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(account.balance(), 8 * 1000 * 7);
}

#[test]
fn test_concurrent_withdrawals_never_overdraw() {
    let account = Arc::new(Account::with_balance(
        "Account_1".to_string(),
        "OTP".to_string(),
        1000,
    ));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let account = Arc::clone(&account);
            thread::spawn(move || {
                let mut completed = 0;
                for _ in 0..50 {
                    let mut tx = withdrawal("Account_1", 30);
                    account.withdraw(&mut tx);
                    if tx.is_completed() {
                        completed += 1;
                    }
                }
                completed
            })
        })
        .collect();
    let completed: i64 = handles.into_iter().map(|h| h.join().unwrap()).sum();

    // 1000 / 30 = 33 withdrawals fit
    assert_eq!(completed, 33);
    assert_eq!(account.balance(), 1000 - 33 * 30);
}

#[test]
fn test_opposite_transfers_terminate_and_conserve() {
    let registry = Arc::new(AccountRegistry::new(vec![
        Account::with_balance("A".to_string(), "OTP".to_string(), 10_000),
        Account::with_balance("B".to_string(), "KH".to_string(), 10_000),
    ]));

    let forward = {
        let registry = Arc::clone(&registry);
        thread::spawn(move || {
            for _ in 0..2000 {
                let mut tx = transfer("A", "B", 3);
                registry.transfer("A", "B", &mut tx);
            }
        })
    };
    let backward = {
        let registry = Arc::clone(&registry);
        thread::spawn(move || {
            for _ in 0..2000 {
                let mut tx = transfer("B", "A", 5);
                registry.transfer("B", "A", &mut tx);
            }
        })
    };
    forward.join().unwrap();
    backward.join().unwrap();

    assert_eq!(registry.total_balance(), 20_000);
    assert_eq!(registry.get("A").unwrap().balance(), 10_000 - 6000 + 10_000);
}

#[test]
fn test_registry_missing_target() {
    let registry = AccountRegistry::new(vec![Account::with_balance(
        "A".to_string(),
        "OTP".to_string(),
        500,
    )]);
    let mut tx = transfer("A", "Nowhere", 100);

    assert!(registry.transfer("A", "Nowhere", &mut tx));
    assert_eq!(tx.failure_reason(), Some(&FailureReason::MissingTargetAccount));
    assert_eq!(registry.get("A").unwrap().balance(), 500);
}

#[test]
fn test_registry_unknown_source_untouched() {
    let registry = AccountRegistry::new(vec![Account::new("A".to_string(), "OTP".to_string())]);
    let mut tx = transfer("Ghost", "A", 100);

    assert!(!registry.transfer("Ghost", "A", &mut tx));
    assert_eq!(tx.status(), TransactionStatus::Pending);
}

#[test]
fn test_registry_snapshot_and_reset() {
    let registry = AccountRegistry::new(vec![
        Account::with_balance("Account_2".to_string(), "KH".to_string(), 1000),
        Account::with_balance("Account_1".to_string(), "OTP".to_string(), 700),
    ]);

    assert_eq!(
        registry.snapshot_balances(),
        vec![
            ("Account_1".to_string(), 700),
            ("Account_2".to_string(), 1000)
        ]
    );
    assert_eq!(registry.bank_of("Account_2"), Some("KH"));
    assert_eq!(registry.banks().len(), 2);

    registry.reset_all();
    assert_eq!(registry.total_balance(), 0);
}
