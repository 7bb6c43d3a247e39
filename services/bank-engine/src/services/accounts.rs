use super::{credited_balance, outcome, positive_amount, require_text};
use crate::database::LedgerStore;
use crate::errors::{BankError, Result};
use crate::metrics;
use crate::models::{
    Account, AccountKind, BalanceResponse, CreateAccountRequest, MovementKind, NewAccount,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

pub struct AccountService {
    store: Arc<dyn LedgerStore>,
}

impl AccountService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        AccountService { store }
    }

    /// Accounts owned by a user; empty when the user has none
    pub async fn list_accounts(&self, user_id: &str) -> Result<Vec<Account>> {
        let user_id = require_text("userId", user_id)?;
        self.store.list_accounts(user_id).await
    }

    /// Open an account. CDT accounts are funded from a source account in the
    /// same transaction; every other kind starts at zero.
    pub async fn create_account(&self, request: CreateAccountRequest) -> Result<Account> {
        let operation = if AccountKind::from(request.kind.clone()).is_cdt() {
            "open_cdt"
        } else {
            "create_account"
        };

        let result = self.try_create_account(request).await;
        metrics::record_ledger_operation(operation, outcome(&result));
        result
    }

    async fn try_create_account(&self, request: CreateAccountRequest) -> Result<Account> {
        request.validate()?;

        let owner_id = require_text("userId", &request.user_id)?.to_string();
        let kind = AccountKind::from(require_text("kind", &request.kind)?.to_string());

        if self.store.find_user(&owner_id).await?.is_none() {
            return Err(BankError::UserNotFound(owner_id));
        }

        if kind.is_cdt() {
            let amount = request
                .amount
                .ok_or_else(|| BankError::Validation("amount is required for a CDT".to_string()))?;
            let source_account_id = request.source_account_id.ok_or_else(|| {
                BankError::Validation("sourceAccountId is required for a CDT".to_string())
            })?;
            let term_months = request.term_months.ok_or_else(|| {
                BankError::Validation("termMonths is required for a CDT".to_string())
            })?;

            return self
                .open_cdt(
                    owner_id,
                    positive_amount("amount", amount)?,
                    source_account_id,
                    term_months,
                )
                .await;
        }

        let mut tx = self.store.begin().await?;
        let account = tx
            .insert_account(&NewAccount {
                owner_id,
                kind,
                balance: Decimal::ZERO,
                term_months: None,
            })
            .await?;
        tx.commit().await?;

        info!(
            "Created {} account {} for user {}",
            account.kind, account.id, account.owner_id
        );
        Ok(account)
    }

    async fn open_cdt(
        &self,
        owner_id: String,
        amount: Decimal,
        source_account_id: i64,
        term_months: u32,
    ) -> Result<Account> {
        let mut tx = self.store.begin().await?;

        let source = tx
            .lock_account(source_account_id)
            .await?
            .ok_or(BankError::AccountNotFound(source_account_id))?;

        if source.balance < amount {
            warn!(
                "CDT of {} rejected, account {} holds {}",
                amount, source.id, source.balance
            );
            return Err(BankError::InsufficientFunds {
                required: amount.to_string(),
                available: source.balance.to_string(),
            });
        }

        tx.adjust_balance(source.id, -amount).await?;
        let cdt = tx
            .insert_account(&NewAccount {
                owner_id,
                kind: AccountKind::Cdt,
                balance: amount,
                term_months: Some(term_months),
            })
            .await?;
        tx.insert_movement(source.id, &MovementKind::CdtInvestment, -amount)
            .await?;
        tx.insert_movement(cdt.id, &MovementKind::CdtOpened, amount)
            .await?;
        tx.commit().await?;

        info!(
            "Opened CDT {} with {} from account {} for {} months",
            cdt.id, amount, source.id, term_months
        );
        Ok(cdt)
    }

    /// Delete an account. A positive balance must go to `transfer_to` first.
    pub async fn delete_account(&self, account_id: i64, transfer_to: Option<i64>) -> Result<()> {
        let result = self.try_delete_account(account_id, transfer_to).await;
        metrics::record_ledger_operation("delete_account", outcome(&result));
        result
    }

    async fn try_delete_account(&self, account_id: i64, transfer_to: Option<i64>) -> Result<()> {
        let mut tx = self.store.begin().await?;

        // lock rows in id order
        if let Some(destination) = transfer_to.filter(|destination| *destination < account_id) {
            tx.lock_account(destination).await?;
        }

        let account = tx
            .lock_account(account_id)
            .await?
            .ok_or(BankError::AccountNotFound(account_id))?;

        if account.balance > Decimal::ZERO {
            let destination = transfer_to.ok_or_else(|| {
                warn!(
                    "Delete of account {} rejected, balance {} has no destination",
                    account_id, account.balance
                );
                BankError::Validation(
                    "balance must be transferred first: specify a destination account".to_string(),
                )
            })?;

            if destination == account_id {
                return Err(BankError::Validation(
                    "cannot transfer the balance to the account being deleted".to_string(),
                ));
            }

            let target = tx
                .lock_account(destination)
                .await?
                .ok_or(BankError::AccountNotFound(destination))?;
            credited_balance(target.balance, account.balance)?;

            tx.adjust_balance(destination, account.balance).await?;
            tx.insert_movement(destination, &MovementKind::ClosingTransfer, account.balance)
                .await?;

            info!(
                "Moved {} from account {} to account {} before deletion",
                account.balance, account_id, destination
            );
        }

        tx.delete_account(account_id).await?;
        tx.commit().await?;

        info!("Deleted account {}", account_id);
        Ok(())
    }

    pub async fn get_balance(&self, account_id: i64) -> Result<BalanceResponse> {
        let account = self
            .store
            .find_account(account_id)
            .await?
            .ok_or(BankError::AccountNotFound(account_id))?;

        Ok(BalanceResponse {
            kind: account.kind,
            balance: account.balance,
        })
    }
}
