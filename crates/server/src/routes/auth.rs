//! Signup, login and logout.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::post,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::services::AuthService;
use crate::state::AppState;

/// Build the auth router (nested under `/auth`).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

/// Signup request.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    pub master_key: String,
}

/// Login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Response for a successful signup or login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub username: String,
}

/// Create an account and log it in.
///
/// POST /auth/signup
async fn signup(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<SignupRequest>,
) -> Result<Json<AuthResponse>> {
    if !state.config().master_key_matches(&request.master_key) {
        tracing::warn!("signup rejected: invalid master key");
        return Err(AppError::Forbidden("Invalid master key".to_string()));
    }

    let user = AuthService::new(state.pool())
        .register(&request.username, &request.password)
        .await?;

    start_session(&session, &user).await
}

/// Log in with username and password.
///
/// POST /auth/login
async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let user = AuthService::new(state.pool())
        .login(&request.username, &request.password)
        .await?;

    tracing::info!(user_id = %user.id, "user logged in");
    start_session(&session, &user).await
}

/// Log out.
///
/// POST /auth/logout
async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    clear_sentry_user();

    Ok(StatusCode::NO_CONTENT)
}

async fn start_session(session: &Session, user: &User) -> Result<Json<AuthResponse>> {
    set_current_user(session, &CurrentUser::from(user))
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    set_sentry_user(&user.id, &user.username);

    Ok(Json(AuthResponse {
        username: user.username.clone(),
    }))
}
