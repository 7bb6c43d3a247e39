use super::{outcome, require_text};
use crate::database::LedgerStore;
use crate::errors::{BankError, Result};
use crate::metrics;
use crate::models::{LoginRequest, NewUser, RegisterRequest, UserProfile};
use crate::security::{hash_password, verify_password};
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

pub struct AuthService {
    store: Arc<dyn LedgerStore>,
}

impl AuthService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        AuthService { store }
    }

    /// Register a new user with a hashed password
    pub async fn register(&self, request: RegisterRequest) -> Result<UserProfile> {
        let result = self.try_register(request).await;
        metrics::record_auth_attempt("register", outcome(&result));
        result
    }

    async fn try_register(&self, request: RegisterRequest) -> Result<UserProfile> {
        request.validate()?;

        let user_id = require_text("id", &request.id)?.to_string();
        let name = require_text("name", &request.name)?.to_string();
        require_text("password", &request.password)?;

        let password = request.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| BankError::Internal(format!("hashing task failed: {}", e)))??;

        let inserted = self
            .store
            .insert_user(&NewUser {
                id: user_id.clone(),
                name: name.clone(),
                password_hash,
            })
            .await?;

        if !inserted {
            warn!("Registration rejected, user {} already exists", user_id);
            return Err(BankError::UserAlreadyExists(user_id));
        }

        info!("Registered user {}", user_id);
        Ok(UserProfile { id: user_id, name })
    }

    /// Check credentials. No session is issued; callers keep the identity.
    pub async fn login(&self, request: LoginRequest) -> Result<UserProfile> {
        let result = self.try_login(request).await;
        metrics::record_auth_attempt("login", outcome(&result));
        result
    }

    async fn try_login(&self, request: LoginRequest) -> Result<UserProfile> {
        request.validate()?;

        let user_id = require_text("id", &request.id)?;
        require_text("password", &request.password)?;

        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| BankError::UserNotFound(user_id.to_string()))?;

        let password = request.password;
        let stored_hash = user.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
            .await
            .map_err(|e| BankError::Internal(format!("hashing task failed: {}", e)))??;

        if !matches {
            warn!("Failed login for user {}", user.id);
            return Err(BankError::Unauthorized);
        }

        info!("User {} logged in", user.id);
        Ok(UserProfile::from(user))
    }

    pub async fn get_user(&self, user_id: &str) -> Result<UserProfile> {
        let user_id = require_text("id", user_id)?;

        self.store
            .find_user(user_id)
            .await?
            .map(UserProfile::from)
            .ok_or_else(|| BankError::UserNotFound(user_id.to_string()))
    }
}
