use crate::errors::BankError;
use crate::metrics;
use crate::models::{
    CreateAccountRequest, LoginRequest, MovementRequest, RegisterRequest, SimulationRequest,
};
use crate::services::{
    simulate_compound_interest, AccountService, AuthService, BankServices, MovementService,
};
use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Health check endpoint
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "bank-engine",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339()
    }))
}

/// Register a user
pub async fn register(
    service: web::Data<Arc<AuthService>>,
    request: web::Json<RegisterRequest>,
) -> Result<HttpResponse, BankError> {
    let profile = service.register(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Registration successful",
        "id": profile.id
    })))
}

/// Check credentials. Unknown ids and wrong passwords are both 401.
pub async fn login(
    service: web::Data<Arc<AuthService>>,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse, BankError> {
    let profile = service
        .login(request.into_inner())
        .await
        .map_err(|e| match e {
            BankError::UserNotFound(id) => BankError::UnknownLogin(id),
            other => other,
        })?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Welcome",
        "id": profile.id,
        "name": profile.name
    })))
}

/// Get a user's public profile
pub async fn get_user(
    service: web::Data<Arc<AuthService>>,
    user_id: web::Path<String>,
) -> Result<HttpResponse, BankError> {
    let profile = service.get_user(&user_id).await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// List a user's accounts
pub async fn list_accounts(
    service: web::Data<Arc<AccountService>>,
    user_id: web::Path<String>,
) -> Result<HttpResponse, BankError> {
    let accounts = service.list_accounts(&user_id).await?;
    Ok(HttpResponse::Ok().json(accounts))
}

/// Open an account or a CDT
pub async fn create_account(
    service: web::Data<Arc<AccountService>>,
    request: web::Json<CreateAccountRequest>,
) -> Result<HttpResponse, BankError> {
    let account = service.create_account(request.into_inner()).await?;
    let message = if account.kind.is_cdt() {
        "CDT opened"
    } else {
        "Account created"
    };

    Ok(HttpResponse::Ok().json(json!({
        "message": message,
        "accountId": account.id,
        "account": account
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAccountQuery {
    transfer_to: Option<String>,
}

impl DeleteAccountQuery {
    /// Destination account id; a blank value means none was given
    fn destination(&self) -> Result<Option<i64>, BankError> {
        match self.transfer_to.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse::<i64>()
                .map(Some)
                .map_err(|_| BankError::Validation(format!("invalid transferTo: {}", raw))),
        }
    }
}

/// Delete an account, moving any balance to `transferTo`
pub async fn delete_account(
    service: web::Data<Arc<AccountService>>,
    account_id: web::Path<i64>,
    query: web::Query<DeleteAccountQuery>,
) -> Result<HttpResponse, BankError> {
    service
        .delete_account(*account_id, query.destination()?)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Account deleted"
    })))
}

/// Record a deposit, withdrawal or other movement
pub async fn record_movement(
    service: web::Data<Arc<MovementService>>,
    request: web::Json<MovementRequest>,
) -> Result<HttpResponse, BankError> {
    let movement = service.record_movement(request.into_inner()).await?;
    let message = if movement.kind.is_withdrawal() {
        "Withdrawal completed"
    } else {
        "Movement recorded"
    };

    Ok(HttpResponse::Ok().json(json!({
        "message": message,
        "movement": movement
    })))
}

/// Movement history, newest first
pub async fn movement_history(
    service: web::Data<Arc<MovementService>>,
    account_id: web::Path<i64>,
) -> Result<HttpResponse, BankError> {
    let movements = service.history(*account_id).await?;
    Ok(HttpResponse::Ok().json(movements))
}

/// Current balance and kind of an account
pub async fn get_balance(
    service: web::Data<Arc<AccountService>>,
    account_id: web::Path<i64>,
) -> Result<HttpResponse, BankError> {
    let balance = service.get_balance(*account_id).await?;
    Ok(HttpResponse::Ok().json(balance))
}

/// Compound interest projection
pub async fn simulate_investment(
    request: web::Json<SimulationRequest>,
) -> Result<HttpResponse, BankError> {
    let result = simulate_compound_interest(&request)?;
    Ok(HttpResponse::Ok().json(result))
}

/// Prometheus metrics endpoint
pub async fn metrics_endpoint() -> Result<HttpResponse, BankError> {
    let body = metrics::metrics_handler()
        .map_err(|e| BankError::Internal(format!("failed to gather metrics: {}", e)))?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(body))
}

/// Share the services and map extractor failures onto the error type
pub fn configure_app(cfg: &mut web::ServiceConfig, services: &BankServices) {
    cfg.app_data(web::Data::new(services.auth.clone()))
        .app_data(web::Data::new(services.accounts.clone()))
        .app_data(web::Data::new(services.movements.clone()))
        .app_data(web::JsonConfig::default().error_handler(|err, _req| {
            BankError::Validation(err.to_string()).into()
        }))
        .app_data(web::PathConfig::default().error_handler(|err, _req| {
            BankError::Validation(err.to_string()).into()
        }))
        .app_data(web::QueryConfig::default().error_handler(|err, _req| {
            BankError::Validation(err.to_string()).into()
        }))
        .configure(configure_routes);
}

/// Configure routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/user/{id}", web::get().to(get_user))
            .route("/accounts", web::post().to(create_account))
            .route("/accounts/{user_id}", web::get().to(list_accounts))
            .route("/accounts/{account_id}", web::delete().to(delete_account))
            .route("/movements", web::post().to(record_movement))
            .route("/movements/{account_id}", web::get().to(movement_history))
            .route("/balance/{account_id}", web::get().to(get_balance))
            .route("/simulate-investment", web::post().to(simulate_investment)),
    )
    .route("/metrics", web::get().to(metrics_endpoint))
    .route("/health", web::get().to(health_check));
}
