//! Ledger persistence.
//!
//! Services talk to storage through [`LedgerStore`] for single-statement
//! reads and inserts, and through [`LedgerTx`] for anything that touches a
//! balance. A `LedgerTx` is a unit of work: nothing it writes is visible until
//! [`LedgerTx::commit`] succeeds, and dropping it without committing discards
//! every write.

pub mod memory;
pub mod postgres;

use crate::errors::Result;
use crate::models::{Account, Movement, MovementKind, NewAccount, NewUser, User};
use async_trait::async_trait;
use rust_decimal::Decimal;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a new unit of work
    async fn begin(&self) -> Result<Box<dyn LedgerTx>>;

    /// Insert a user. Returns `false` when the id is already taken.
    async fn insert_user(&self, user: &NewUser) -> Result<bool>;

    async fn find_user(&self, user_id: &str) -> Result<Option<User>>;

    async fn find_account(&self, account_id: i64) -> Result<Option<Account>>;

    /// Accounts owned by a user, oldest first
    async fn list_accounts(&self, owner_id: &str) -> Result<Vec<Account>>;

    /// Movements of an account, newest first
    async fn list_movements(&self, account_id: i64) -> Result<Vec<Movement>>;

    async fn health_check(&self) -> Result<()>;
}

#[async_trait]
pub trait LedgerTx: Send {
    /// Read an account and hold its row lock until the transaction ends
    async fn lock_account(&mut self, account_id: i64) -> Result<Option<Account>>;

    async fn insert_account(&mut self, account: &NewAccount) -> Result<Account>;

    /// Add `delta` to the balance and return the new balance
    async fn adjust_balance(&mut self, account_id: i64, delta: Decimal) -> Result<Decimal>;

    async fn insert_movement(
        &mut self,
        account_id: i64,
        kind: &MovementKind,
        amount: Decimal,
    ) -> Result<Movement>;

    /// Delete an account together with its movements
    async fn delete_account(&mut self, account_id: i64) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
}
