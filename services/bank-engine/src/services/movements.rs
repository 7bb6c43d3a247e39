use super::{credited_balance, outcome, positive_amount};
use crate::database::LedgerStore;
use crate::errors::{BankError, Result};
use crate::metrics;
use crate::models::{Movement, MovementKind, MovementRequest};
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

pub struct MovementService {
    store: Arc<dyn LedgerStore>,
}

impl MovementService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        MovementService { store }
    }

    /// Record a movement and apply it to the balance.
    ///
    /// Withdrawals debit and are rejected when the balance does not cover
    /// them; every other kind credits. The balance is read under the row lock
    /// of the same transaction that writes it.
    pub async fn record_movement(&self, request: MovementRequest) -> Result<Movement> {
        let kind = MovementKind::from(request.kind.clone());
        let operation = if kind.is_withdrawal() { "withdrawal" } else { "credit" };

        let result = self.try_record_movement(request, kind).await;
        metrics::record_ledger_operation(operation, outcome(&result));
        result
    }

    async fn try_record_movement(
        &self,
        request: MovementRequest,
        kind: MovementKind,
    ) -> Result<Movement> {
        request.validate()?;
        if request.kind.trim().is_empty() {
            return Err(BankError::Validation("kind is required".to_string()));
        }
        let amount = positive_amount("amount", request.amount)?;

        let mut tx = self.store.begin().await?;
        let account = tx
            .lock_account(request.account_id)
            .await?
            .ok_or(BankError::AccountNotFound(request.account_id))?;

        let signed_amount = if kind.is_withdrawal() {
            if account.balance < amount {
                warn!(
                    "Withdrawal of {} rejected, account {} holds {}",
                    amount, account.id, account.balance
                );
                return Err(BankError::InsufficientFunds {
                    required: amount.to_string(),
                    available: account.balance.to_string(),
                });
            }
            -amount
        } else {
            credited_balance(account.balance, amount)?;
            amount
        };

        let movement = tx.insert_movement(account.id, &kind, signed_amount).await?;
        let balance = tx.adjust_balance(account.id, signed_amount).await?;
        tx.commit().await?;

        info!(
            "Recorded {} of {} on account {} (balance {})",
            kind, signed_amount, account.id, balance
        );
        Ok(movement)
    }

    /// Movements of an account, newest first. Unknown accounts have none.
    pub async fn history(&self, account_id: i64) -> Result<Vec<Movement>> {
        self.store.list_movements(account_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::models::{AccountKind, NewAccount};
    use crate::services::test_support::store_with_user;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    async fn open_account(store: &Arc<MemoryStore>) -> i64 {
        let mut tx = store.begin().await.unwrap();
        let account = tx
            .insert_account(&NewAccount {
                owner_id: "ana".to_string(),
                kind: AccountKind::Savings,
                balance: Decimal::ZERO,
                term_months: None,
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();
        account.id
    }

    fn request(account_id: i64, kind: &str, amount: Decimal) -> MovementRequest {
        MovementRequest {
            account_id,
            kind: kind.to_string(),
            amount,
        }
    }

    #[tokio::test]
    async fn test_deposit_then_withdraw() {
        let store = store_with_user().await;
        let service = MovementService::new(store.clone());
        let account_id = open_account(&store).await;

        let deposit = service
            .record_movement(request(account_id, "Deposit", dec!(100)))
            .await
            .unwrap();
        assert_eq!(deposit.amount, dec!(100));

        let withdrawal = service
            .record_movement(request(account_id, "Withdrawal", dec!(40)))
            .await
            .unwrap();
        assert_eq!(withdrawal.amount, dec!(-40));
        assert_eq!(withdrawal.kind, MovementKind::Withdrawal);

        let account = store.find_account(account_id).await.unwrap().unwrap();
        assert_eq!(account.balance, dec!(60));
    }

    #[tokio::test]
    async fn test_overdraft_is_rejected_without_mutation() {
        let store = store_with_user().await;
        let service = MovementService::new(store.clone());
        let account_id = open_account(&store).await;
        service
            .record_movement(request(account_id, "Deposit", dec!(50)))
            .await
            .unwrap();

        let result = service
            .record_movement(request(account_id, "Withdrawal", dec!(50.01)))
            .await;

        assert!(matches!(result, Err(BankError::InsufficientFunds { .. })));
        let account = store.find_account(account_id).await.unwrap().unwrap();
        assert_eq!(account.balance, dec!(50));
        assert_eq!(service.history(account_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_withdrawing_whole_balance_is_allowed() {
        let store = store_with_user().await;
        let service = MovementService::new(store.clone());
        let account_id = open_account(&store).await;
        service
            .record_movement(request(account_id, "Deposit", dec!(20)))
            .await
            .unwrap();

        service
            .record_movement(request(account_id, "withdrawal", dec!(20)))
            .await
            .unwrap();

        let account = store.find_account(account_id).await.unwrap().unwrap();
        assert_eq!(account.balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_free_form_kind_credits() {
        let store = store_with_user().await;
        let service = MovementService::new(store.clone());
        let account_id = open_account(&store).await;

        let movement = service
            .record_movement(request(account_id, "Salary", dec!(1200)))
            .await
            .unwrap();

        assert_eq!(movement.kind, MovementKind::Other("Salary".to_string()));
        assert_eq!(movement.amount, dec!(1200));
    }

    #[tokio::test]
    async fn test_non_positive_amounts_are_rejected() {
        let store = store_with_user().await;
        let service = MovementService::new(store.clone());
        let account_id = open_account(&store).await;

        for amount in [dec!(0), dec!(-10)] {
            let result = service
                .record_movement(request(account_id, "Deposit", amount))
                .await;
            assert!(matches!(result, Err(BankError::Validation(_))));
        }
    }

    #[tokio::test]
    async fn test_movement_on_missing_account() {
        let store = store_with_user().await;
        let service = MovementService::new(store);

        let result = service
            .record_movement(request(77, "Deposit", dec!(5)))
            .await;
        assert!(matches!(result, Err(BankError::AccountNotFound(77))));
    }

    #[tokio::test]
    async fn test_deposits_past_storable_balance_are_rejected() {
        let store = store_with_user().await;
        let service = MovementService::new(store.clone());
        let account_id = open_account(&store).await;
        let near_limit = dec!(9000000000000000);

        service
            .record_movement(request(account_id, "Deposit", near_limit))
            .await
            .unwrap();
        let result = service
            .record_movement(request(account_id, "Deposit", near_limit))
            .await;
        assert!(matches!(result, Err(BankError::Validation(_))));

        let result = service
            .record_movement(request(account_id, "Deposit", Decimal::MAX))
            .await;
        assert!(matches!(result, Err(BankError::Validation(_))));

        let account = store.find_account(account_id).await.unwrap().unwrap();
        assert_eq!(account.balance, near_limit);
        assert_eq!(service.history(account_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_withdrawals_cannot_both_pass_funds_check() {
        let store = store_with_user().await;
        let service = MovementService::new(store.clone());
        let account_id = open_account(&store).await;
        service
            .record_movement(request(account_id, "Deposit", dec!(100)))
            .await
            .unwrap();

        let (first, second) = tokio::join!(
            service.record_movement(request(account_id, "Withdrawal", dec!(60))),
            service.record_movement(request(account_id, "Withdrawal", dec!(60))),
        );

        let results = [first, second];
        assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|result| matches!(result, Err(BankError::InsufficientFunds { .. })))
                .count(),
            1
        );

        let account = store.find_account(account_id).await.unwrap().unwrap();
        assert_eq!(account.balance, dec!(40));
        assert_eq!(service.history(account_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_history_is_newest_first() {
        let store = store_with_user().await;
        let service = MovementService::new(store.clone());
        let account_id = open_account(&store).await;

        for amount in [dec!(1), dec!(2), dec!(3)] {
            service
                .record_movement(request(account_id, "Deposit", amount))
                .await
                .unwrap();
        }

        let amounts: Vec<Decimal> = service
            .history(account_id)
            .await
            .unwrap()
            .into_iter()
            .map(|movement| movement.amount)
            .collect();
        assert_eq!(amounts, vec![dec!(3), dec!(2), dec!(1)]);
    }

    #[tokio::test]
    async fn test_history_empty_for_account_without_movements() {
        let store = store_with_user().await;
        let service = MovementService::new(store.clone());
        let account_id = open_account(&store).await;

        assert!(service.history(account_id).await.unwrap().is_empty());
        assert!(service.history(9_999).await.unwrap().is_empty());
    }
}
