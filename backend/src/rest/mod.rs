//! HTTP surface: application state, bearer-token extraction, and the
//! top-level router wiring the route groups under `/api`.

pub mod advice_apis;
pub mod auth_apis;
pub mod gamification_apis;
pub mod transaction_apis;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderValue, Method},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

use crate::domain::models::User;
use crate::domain::{
    AdviceService, AuthService, GamificationService, TokenService, TransactionService,
};
use crate::error::AppError;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth_service: AuthService,
    pub transaction_service: TransactionService,
    pub gamification_service: GamificationService,
    pub advice_service: AdviceService,
    pub token_service: TokenService,
}

/// Extracts and validates the `Authorization: Bearer` token, loading the
/// account behind it. Deactivated accounts are rejected here, before any
/// handler runs.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Unauthorized("Authentication token is required.".to_string())
            })?;
        let token = header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Unauthorized("Authentication token is required.".to_string())
        })?;

        let user_id = state.token_service.verify(token)?;
        let user = state
            .auth_service
            .get_user(&user_id)
            .await
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;
        if !user.is_active {
            return Err(AppError::Unauthorized(
                "This account has been deactivated.".to_string(),
            ));
        }
        Ok(AuthUser(user))
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Assemble the full application router with CORS for the configured
/// frontend origin.
pub fn app_router(state: AppState, frontend_origin: &str) -> Result<Router, AppError> {
    let origin = frontend_origin
        .parse::<HeaderValue>()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid frontend origin: {e}")))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    Ok(Router::new()
        .route("/api/health", get(health))
        .nest("/api/auth", auth_apis::router())
        .nest("/api/transactions", transaction_apis::router())
        .nest("/api/gamification", gamification_apis::router())
        .nest("/api/ai-advice", advice_apis::router())
        .layer(cors)
        .with_state(state))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use super::*;
    use crate::domain::advice_service::TextGenerator;
    use crate::domain::email_service::{EmailConfig, OtpMailer};
    use crate::domain::otp::MemoryOtpStore;
    use crate::storage::{
        DbConnection, GamificationRepository, TransactionRepository, UserRepository,
    };

    struct CannedGenerator;

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, AppError> {
            Ok("canned advice".to_string())
        }
    }

    /// Fully wired state over an in-memory database and stub collaborators.
    pub async fn test_state() -> (AppState, Arc<MemoryOtpStore>) {
        let db = DbConnection::init_test().await.expect("test db");
        let otp_store = Arc::new(MemoryOtpStore::new());
        let token_service =
            TokenService::new("0123456789abcdef0123456789abcdef", 3600).expect("tokens");
        let gamification_service = GamificationService::new(
            GamificationRepository::new(db.clone()),
            TransactionRepository::new(db.clone()),
        );
        let state = AppState {
            auth_service: AuthService::new(
                UserRepository::new(db.clone()),
                otp_store.clone(),
                OtpMailer::new(EmailConfig::default()).expect("mailer"),
                token_service.clone(),
            ),
            transaction_service: TransactionService::new(
                TransactionRepository::new(db.clone()),
                gamification_service.clone(),
            ),
            gamification_service,
            advice_service: AdviceService::new(
                TransactionRepository::new(db),
                Arc::new(CannedGenerator),
            ),
            token_service,
        };
        (state, otp_store)
    }

    /// Register a user and return (user_id, bearer token).
    pub async fn register_test_user(state: &AppState, email: &str) -> (String, String) {
        let registered = state
            .auth_service
            .register("Test User", email, "secret1")
            .await
            .expect("register");
        (registered.user.id, registered.token)
    }
}
