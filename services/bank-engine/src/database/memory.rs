use super::{LedgerStore, LedgerTx};
use crate::errors::{BankError, Result};
use crate::models::{Account, Movement, MovementKind, NewAccount, NewUser, User};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: BTreeMap<String, User>,
    accounts: BTreeMap<i64, Account>,
    movements: Vec<Movement>,
    last_account_id: i64,
    last_movement_id: i64,
}

/// In-process ledger for local runs and tests.
///
/// Transactions are serialised: a `MemoryTx` holds the table lock for its
/// whole lifetime and works on a copy that replaces the tables on commit.
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    movement_fault: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            tables: Arc::new(Mutex::new(Tables::default())),
            movement_fault: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make the `nth` movement insert from now on fail (1 = the next one).
    /// Used to exercise rollback paths.
    pub fn fail_movement_insert(&self, nth: usize) {
        self.movement_fault.store(nth, Ordering::SeqCst);
    }

    /// Number of stored movements across all accounts
    pub async fn movement_count(&self) -> usize {
        self.tables.lock().await.movements.len()
    }

    /// Number of stored accounts across all users
    pub async fn account_count(&self) -> usize {
        self.tables.lock().await.accounts.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();

        Ok(Box::new(MemoryTx {
            guard,
            working,
            movement_fault: self.movement_fault.clone(),
        }))
    }

    async fn insert_user(&self, user: &NewUser) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        if tables.users.contains_key(&user.id) {
            return Ok(false);
        }

        tables.users.insert(
            user.id.clone(),
            User {
                id: user.id.clone(),
                name: user.name.clone(),
                password_hash: user.password_hash.clone(),
                created_at: Utc::now(),
            },
        );
        Ok(true)
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self.tables.lock().await.users.get(user_id).cloned())
    }

    async fn find_account(&self, account_id: i64) -> Result<Option<Account>> {
        Ok(self.tables.lock().await.accounts.get(&account_id).cloned())
    }

    async fn list_accounts(&self, owner_id: &str) -> Result<Vec<Account>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .accounts
            .values()
            .filter(|account| account.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn list_movements(&self, account_id: i64) -> Result<Vec<Movement>> {
        let tables = self.tables.lock().await;
        let mut movements: Vec<Movement> = tables
            .movements
            .iter()
            .filter(|movement| movement.account_id == account_id)
            .cloned()
            .collect();

        movements.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(movements)
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
    movement_fault: Arc<AtomicUsize>,
}

impl MemoryTx {
    fn trip_movement_fault(&self) -> bool {
        let previous = self
            .movement_fault
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .unwrap_or_else(|n| n);
        previous == 1
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn lock_account(&mut self, account_id: i64) -> Result<Option<Account>> {
        Ok(self.working.accounts.get(&account_id).cloned())
    }

    async fn insert_account(&mut self, account: &NewAccount) -> Result<Account> {
        if !self.working.users.contains_key(&account.owner_id) {
            return Err(BankError::UserNotFound(account.owner_id.clone()));
        }

        self.working.last_account_id += 1;
        let created = Account {
            id: self.working.last_account_id,
            owner_id: account.owner_id.clone(),
            kind: account.kind.clone(),
            balance: account.balance,
            term_months: account.term_months,
            created_at: Utc::now(),
        };

        self.working.accounts.insert(created.id, created.clone());
        Ok(created)
    }

    async fn adjust_balance(&mut self, account_id: i64, delta: Decimal) -> Result<Decimal> {
        let account = self
            .working
            .accounts
            .get_mut(&account_id)
            .ok_or(BankError::AccountNotFound(account_id))?;

        let updated = account.balance.checked_add(delta).ok_or_else(|| {
            BankError::Validation(format!("balance of account {} is out of range", account_id))
        })?;
        if updated < Decimal::ZERO {
            return Err(BankError::Internal(format!(
                "balance of account {} would become negative",
                account_id
            )));
        }

        account.balance = updated;
        Ok(updated)
    }

    async fn insert_movement(
        &mut self,
        account_id: i64,
        kind: &MovementKind,
        amount: Decimal,
    ) -> Result<Movement> {
        if self.trip_movement_fault() {
            warn!("Injected movement insert failure for account {}", account_id);
            return Err(BankError::Internal("movement insert failed".to_string()));
        }

        if !self.working.accounts.contains_key(&account_id) {
            return Err(BankError::AccountNotFound(account_id));
        }

        self.working.last_movement_id += 1;
        let movement = Movement {
            id: self.working.last_movement_id,
            account_id,
            kind: kind.clone(),
            amount,
            created_at: Utc::now(),
        };

        self.working.movements.push(movement.clone());
        Ok(movement)
    }

    async fn delete_account(&mut self, account_id: i64) -> Result<()> {
        if self.working.accounts.remove(&account_id).is_none() {
            return Err(BankError::AccountNotFound(account_id));
        }

        self.working
            .movements
            .retain(|movement| movement.account_id != account_id);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTx {
            mut guard, working, ..
        } = *self;
        *guard = working;
        debug!("Committed in-memory ledger transaction");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccountKind;
    use rust_decimal_macros::dec;

    async fn store_with_user() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_user(&NewUser {
                id: "ana".to_string(),
                name: "Ana".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();
        store
    }

    fn savings() -> NewAccount {
        NewAccount {
            owner_id: "ana".to_string(),
            kind: AccountKind::Savings,
            balance: Decimal::ZERO,
            term_months: None,
        }
    }

    #[tokio::test]
    async fn test_uncommitted_transaction_is_discarded() {
        let store = store_with_user().await;

        let mut tx = store.begin().await.unwrap();
        tx.insert_account(&savings()).await.unwrap();
        drop(tx);

        assert_eq!(store.account_count().await, 0);
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let store = store_with_user().await;

        let mut tx = store.begin().await.unwrap();
        let account = tx.insert_account(&savings()).await.unwrap();
        tx.adjust_balance(account.id, dec!(40)).await.unwrap();
        tx.insert_movement(account.id, &MovementKind::Deposit, dec!(40))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let stored = store.find_account(account.id).await.unwrap().unwrap();
        assert_eq!(stored.balance, dec!(40));
        assert_eq!(store.list_movements(account.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_balance_cannot_go_negative() {
        let store = store_with_user().await;

        let mut tx = store.begin().await.unwrap();
        let account = tx.insert_account(&savings()).await.unwrap();
        let result = tx.adjust_balance(account.id, dec!(-1)).await;

        assert!(matches!(result, Err(BankError::Internal(_))));
    }

    #[tokio::test]
    async fn test_balance_overflow_is_rejected() {
        let store = store_with_user().await;

        let mut tx = store.begin().await.unwrap();
        let account = tx.insert_account(&savings()).await.unwrap();
        tx.adjust_balance(account.id, Decimal::MAX).await.unwrap();
        let result = tx.adjust_balance(account.id, dec!(1)).await;

        assert!(matches!(result, Err(BankError::Validation(_))));
    }

    #[tokio::test]
    async fn test_injected_fault_hits_requested_insert() {
        let store = store_with_user().await;
        store.fail_movement_insert(2);

        let mut tx = store.begin().await.unwrap();
        let account = tx.insert_account(&savings()).await.unwrap();
        assert!(tx
            .insert_movement(account.id, &MovementKind::Deposit, dec!(1))
            .await
            .is_ok());
        assert!(tx
            .insert_movement(account.id, &MovementKind::Deposit, dec!(1))
            .await
            .is_err());
        assert!(tx
            .insert_movement(account.id, &MovementKind::Deposit, dec!(1))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_user_is_rejected() {
        let store = store_with_user().await;
        let inserted = store
            .insert_user(&NewUser {
                id: "ana".to_string(),
                name: "Other".to_string(),
                password_hash: "other".to_string(),
            })
            .await
            .unwrap();

        assert!(!inserted);
        assert_eq!(store.find_user("ana").await.unwrap().unwrap().name, "Ana");
    }
}
