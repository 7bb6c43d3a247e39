use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BankError>;

#[derive(Error, Debug)]
pub enum BankError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Account not found: {0}")]
    AccountNotFound(i64),

    #[error("Invalid credentials")]
    Unauthorized,

    /// Login with an id nobody registered
    #[error("User not found: {0}")]
    UnknownLogin(String),

    #[error("User already exists: {0}")]
    UserAlreadyExists(String),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: String, available: String },

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for BankError {
    fn from(err: validator::ValidationErrors) -> Self {
        BankError::Validation(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for BankError {
    fn from(err: argon2::password_hash::Error) -> Self {
        BankError::PasswordHash(err.to_string())
    }
}

impl ResponseError for BankError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();

        // Store and hashing failures are logged in full but not echoed to clients.
        let error_message = match self {
            BankError::Database(_)
            | BankError::Migration(_)
            | BankError::PasswordHash(_)
            | BankError::Internal(_) => {
                tracing::error!("Request failed: {}", self);
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        HttpResponse::build(status_code).json(json!({
            "error": {
                "code": status_code.as_u16(),
                "message": error_message,
                "type": self.error_type()
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            BankError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BankError::Migration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BankError::Validation(_) => StatusCode::BAD_REQUEST,
            BankError::UserNotFound(_) => StatusCode::NOT_FOUND,
            BankError::AccountNotFound(_) => StatusCode::NOT_FOUND,
            BankError::Unauthorized => StatusCode::UNAUTHORIZED,
            BankError::UnknownLogin(_) => StatusCode::UNAUTHORIZED,
            BankError::UserAlreadyExists(_) => StatusCode::CONFLICT,
            BankError::InsufficientFunds { .. } => StatusCode::BAD_REQUEST,
            BankError::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BankError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl BankError {
    pub fn error_type(&self) -> &str {
        match self {
            BankError::Database(_) => "database_error",
            BankError::Migration(_) => "database_error",
            BankError::Validation(_) => "validation_error",
            BankError::UserNotFound(_) => "not_found",
            BankError::AccountNotFound(_) => "not_found",
            BankError::Unauthorized => "unauthorized",
            BankError::UnknownLogin(_) => "unauthorized",
            BankError::UserAlreadyExists(_) => "duplicate_error",
            BankError::InsufficientFunds { .. } => "insufficient_funds",
            BankError::PasswordHash(_) => "internal_error",
            BankError::Internal(_) => "internal_error",
        }
    }
}
