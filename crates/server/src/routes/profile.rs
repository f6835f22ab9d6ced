//! Profile and password management.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::{ProfileUpdate, User};
use crate::services::AuthService;
use crate::state::AppState;

/// Build the profile router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route("/profile/change-password", post(change_password))
}

/// Profile as shown to its owner.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub username: String,
    pub display_name: Option<String>,
    pub dietary_preferences: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for ProfileResponse {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            display_name: user.display_name,
            dietary_preferences: user.dietary_preferences,
            created_at: user.created_at,
        }
    }
}

/// Password change request.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// GET /profile
async fn get_profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<ProfileResponse>> {
    let user = AuthService::new(state.pool()).get_user(user.id).await?;
    Ok(Json(user.into()))
}

/// PUT /profile
async fn update_profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ProfileResponse>> {
    let user = AuthService::new(state.pool())
        .update_profile(user.id, &update)
        .await?;
    Ok(Json(user.into()))
}

/// POST /profile/change-password
async fn change_password(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<StatusCode> {
    AuthService::new(state.pool())
        .change_password(user.id, &request.current_password, &request.new_password)
        .await?;

    tracing::info!(user_id = %user.id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}
