use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account kind. Known kinds are matched case-insensitively; anything else
/// is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AccountKind {
    Savings,
    Checking,
    Cdt,
    Other(String),
}

impl AccountKind {
    pub fn as_str(&self) -> &str {
        match self {
            AccountKind::Savings => "SAVINGS",
            AccountKind::Checking => "CHECKING",
            AccountKind::Cdt => "CDT",
            AccountKind::Other(kind) => kind,
        }
    }

    pub fn is_cdt(&self) -> bool {
        matches!(self, AccountKind::Cdt)
    }
}

impl From<String> for AccountKind {
    fn from(value: String) -> Self {
        let trimmed = value.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "SAVINGS" => AccountKind::Savings,
            "CHECKING" => AccountKind::Checking,
            "CDT" => AccountKind::Cdt,
            _ => AccountKind::Other(trimmed.to_string()),
        }
    }
}

impl From<AccountKind> for String {
    fn from(kind: AccountKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Movement kind. Client-recorded withdrawals debit; every other kind a
/// client records credits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MovementKind {
    Deposit,
    Withdrawal,
    CdtInvestment,
    CdtOpened,
    ClosingTransfer,
    Other(String),
}

impl MovementKind {
    pub fn as_str(&self) -> &str {
        match self {
            MovementKind::Deposit => "Deposit",
            MovementKind::Withdrawal => "Withdrawal",
            MovementKind::CdtInvestment => "CDT investment",
            MovementKind::CdtOpened => "CDT opened",
            MovementKind::ClosingTransfer => "Closing transfer",
            MovementKind::Other(kind) => kind,
        }
    }

    pub fn is_withdrawal(&self) -> bool {
        matches!(self, MovementKind::Withdrawal)
    }
}

impl From<String> for MovementKind {
    fn from(value: String) -> Self {
        let trimmed = value.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "deposit" => MovementKind::Deposit,
            "withdrawal" => MovementKind::Withdrawal,
            "cdt investment" => MovementKind::CdtInvestment,
            "cdt opened" => MovementKind::CdtOpened,
            "closing transfer" => MovementKind::ClosingTransfer,
            _ => MovementKind::Other(trimmed.to_string()),
        }
    }
}

impl From<MovementKind> for String {
    fn from(kind: MovementKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registered user. The password hash never leaves the service.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub name: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Public view of a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        UserProfile {
            id: user.id,
            name: user.name,
        }
    }
}

/// Bank account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: i64,
    pub owner_id: String,
    pub kind: AccountKind,
    pub balance: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term_months: Option<u32>,
    pub created_at: DateTime<Utc>,
}

/// Ledger entry; positive amounts credit, negative amounts debit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movement {
    pub id: i64,
    pub account_id: i64,
    pub kind: MovementKind,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for users
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: String,
    pub name: String,
    pub password_hash: String,
}

/// Insert payload for accounts
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub owner_id: String,
    pub kind: AccountKind,
    pub balance: Decimal,
    pub term_months: Option<u32>,
}

/// Registration request
#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 64))]
    pub id: String,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// Login request
#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 64))]
    pub id: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// Account creation request. CDT accounts also need the amount, the source
/// account and the term.
#[derive(Debug, Deserialize, Serialize, validator::Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    #[validate(length(min = 1, max = 64))]
    pub user_id: String,
    #[validate(length(min = 1, max = 32))]
    pub kind: String,
    pub amount: Option<Decimal>,
    pub source_account_id: Option<i64>,
    #[validate(range(min = 1, max = 600))]
    pub term_months: Option<u32>,
}

/// Movement request
#[derive(Debug, Deserialize, Serialize, validator::Validate)]
#[serde(rename_all = "camelCase")]
pub struct MovementRequest {
    pub account_id: i64,
    #[validate(length(min = 1, max = 64))]
    pub kind: String,
    pub amount: Decimal,
}

/// Balance lookup response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub kind: AccountKind,
    pub balance: Decimal,
}

/// Compound interest simulation request
#[derive(Debug, Deserialize, Serialize, validator::Validate)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRequest {
    pub amount: Decimal,
    pub annual_rate: Decimal,
    #[validate(range(max = 100))]
    pub years: u32,
    #[validate(range(min = 1, max = 365))]
    pub periods_per_year: u32,
}

/// Projected balance at the end of a year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyProjection {
    pub year: u32,
    pub amount: Decimal,
}

/// Compound interest simulation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub initial: Decimal,
    #[serde(rename = "final")]
    pub final_amount: Decimal,
    #[serde(rename = "interest")]
    pub interest_earned: Decimal,
    pub series: Vec<YearlyProjection>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_kind_parsing() {
        assert_eq!(AccountKind::from("savings".to_string()), AccountKind::Savings);
        assert_eq!(AccountKind::from(" CDT ".to_string()), AccountKind::Cdt);
        assert_eq!(
            AccountKind::from("Payroll".to_string()),
            AccountKind::Other("Payroll".to_string())
        );
        assert_eq!(AccountKind::Other("Payroll".into()).as_str(), "Payroll");
    }

    #[test]
    fn test_movement_kind_direction() {
        assert!(MovementKind::from("withdrawal".to_string()).is_withdrawal());
        assert!(!MovementKind::Deposit.is_withdrawal());
        assert!(!MovementKind::from("Salary".to_string()).is_withdrawal());
    }

    #[test]
    fn test_kinds_serialize_as_labels() {
        let json = serde_json::to_value(MovementKind::CdtOpened).unwrap();
        assert_eq!(json, serde_json::json!("CDT opened"));

        let kind: AccountKind = serde_json::from_value(serde_json::json!("cdt")).unwrap();
        assert_eq!(kind, AccountKind::Cdt);
    }
}
