pub mod accounts;
pub mod auth;
pub mod movements;
pub mod simulation;

use crate::database::LedgerStore;
use crate::errors::{BankError, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;

pub use accounts::AccountService;
pub use auth::AuthService;
pub use movements::MovementService;
pub use simulation::simulate_compound_interest;

/// Every service wired to one shared store handle
#[derive(Clone)]
pub struct BankServices {
    pub auth: Arc<AuthService>,
    pub accounts: Arc<AccountService>,
    pub movements: Arc<MovementService>,
}

impl BankServices {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        BankServices {
            auth: Arc::new(AuthService::new(store.clone())),
            accounts: Arc::new(AccountService::new(store.clone())),
            movements: Arc::new(MovementService::new(store)),
        }
    }
}

/// Trimmed value of a required text field
pub(crate) fn require_text<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(BankError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed)
}

/// Largest amount or balance a `NUMERIC(18, 2)` column holds,
/// 9_999_999_999_999_999.99
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xA763_FFFF, 0x0DE0_B6B3, 0, false, 2);

/// Round a money amount to cents and require it to be positive and storable
pub(crate) fn positive_amount(field: &str, amount: Decimal) -> Result<Decimal> {
    let rounded = round_money(amount);
    if rounded <= Decimal::ZERO {
        return Err(BankError::Validation(format!(
            "{} must be greater than zero",
            field
        )));
    }
    if rounded > MAX_AMOUNT {
        return Err(BankError::Validation(format!(
            "{} cannot exceed {}",
            field, MAX_AMOUNT
        )));
    }
    Ok(rounded)
}

/// Balance after crediting `amount`, rejected when it would not fit
pub(crate) fn credited_balance(balance: Decimal, amount: Decimal) -> Result<Decimal> {
    balance
        .checked_add(amount)
        .filter(|updated| *updated <= MAX_AMOUNT)
        .ok_or_else(|| {
            BankError::Validation(format!("balance cannot exceed {}", MAX_AMOUNT))
        })
}

pub(crate) fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Metric label for an operation result
pub(crate) fn outcome<T>(result: &Result<T>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(
            BankError::Validation(_)
            | BankError::UserNotFound(_)
            | BankError::AccountNotFound(_)
            | BankError::Unauthorized
            | BankError::UnknownLogin(_)
            | BankError::UserAlreadyExists(_)
            | BankError::InsufficientFunds { .. },
        ) => "rejected",
        Err(_) => "error",
    }
}
