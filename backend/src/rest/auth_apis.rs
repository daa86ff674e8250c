use axum::{
    extract::State,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use shared::{
    AuthResponse, ChangePasswordRequest, LoginRequest, LoginResponse, MessageResponse,
    RegisterRequest, ResendOtpRequest, UpdateProfileRequest, UserInfo, VerifyOtpRequest,
};
use tracing::info;

use crate::domain::models::{User, UserValidationError};
use crate::error::AppError;
use crate::rest::{AppState, AuthUser};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/verify-otp", post(verify_otp))
        .route("/resend-otp", post(resend_otp))
        .route("/me", get(me))
        .route("/update-profile", put(update_profile))
        .route("/change-password", put(change_password))
        .route("/logout", post(logout))
}

fn user_info(user: &User) -> UserInfo {
    UserInfo {
        id: user.id.clone(),
        name: user.name.clone(),
        email: user.email.clone(),
        created_at: Some(user.created_at.to_rfc3339()),
        last_login: user.last_login.map(|d| d.to_rfc3339()),
    }
}

async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    info!("POST /api/auth/register");
    if let Some(confirm) = &request.confirm_password {
        if confirm != &request.password {
            return Err(AppError::InvalidInput(
                UserValidationError::PasswordMismatch.to_string(),
            ));
        }
    }

    let registered = state
        .auth_service
        .register(&request.name, &request.email, &request.password)
        .await?;
    Ok(Json(AuthResponse {
        message: "Registration successful!".to_string(),
        token: registered.token,
        user: user_info(&registered.user),
    }))
}

async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    info!("POST /api/auth/login");
    let outcome = state
        .auth_service
        .login(&request.email, &request.password, Utc::now())
        .await?;
    Ok(Json(LoginResponse {
        message: outcome.message,
        requires_otp: true,
        email: outcome.email,
    }))
}

async fn verify_otp(
    State(state): State<AppState>,
    Json(request): Json<VerifyOtpRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    info!("POST /api/auth/verify-otp");
    let verified = state
        .auth_service
        .verify_otp(&request.email, &request.otp, Utc::now())
        .await?;
    Ok(Json(AuthResponse {
        message: "Login successful!".to_string(),
        token: verified.token,
        user: user_info(&verified.user),
    }))
}

async fn resend_otp(
    State(state): State<AppState>,
    Json(request): Json<ResendOtpRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    info!("POST /api/auth/resend-otp");
    let outcome = state.auth_service.resend_otp(&request.email, Utc::now()).await?;
    Ok(Json(MessageResponse {
        message: outcome.message,
    }))
}

async fn me(AuthUser(user): AuthUser) -> Json<UserInfo> {
    info!("GET /api/auth/me");
    Json(user_info(&user))
}

async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<UserInfo>, AppError> {
    info!("PUT /api/auth/update-profile");
    let name = request.name.unwrap_or_else(|| user.name.clone());
    let email = request.email.unwrap_or_else(|| user.email.clone());
    let updated = state
        .auth_service
        .update_profile(&user.id, &name, &email)
        .await?;
    Ok(Json(user_info(&updated)))
}

async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    info!("PUT /api/auth/change-password");
    state
        .auth_service
        .change_password(&user.id, &request.current_password, &request.new_password)
        .await?;
    Ok(Json(MessageResponse {
        message: "Password changed successfully.".to_string(),
    }))
}

/// Sessions are stateless bearer tokens; logout is client-side discard.
async fn logout(AuthUser(user): AuthUser) -> Json<MessageResponse> {
    info!(user_id = %user.id, "POST /api/auth/logout");
    Json(MessageResponse {
        message: "Logged out successfully.".to_string(),
    })
}
