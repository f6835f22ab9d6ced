//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Server-side failures are
//! captured to Sentry before the response is built; clients only ever see a
//! JSON body of the form `{"error": "..."}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::claude::ClaudeError;
use crate::db::RepositoryError;
use crate::services::{AuthError, ChatError, ExtractionError, ShoppingListError};

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Claude API operation failed.
    #[error("Claude error: {0}")]
    Claude(#[from] ClaudeError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Chat operation failed.
    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),

    /// Extraction failed.
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Shopping list operation failed.
    #[error("Shopping list error: {0}")]
    ShoppingList(#[from] ShoppingListError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User may not perform this action.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with existing data.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) | Self::Conflict(_) => {
                StatusCode::CONFLICT
            }
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Claude(_) => StatusCode::BAD_GATEWAY,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::UserNotFound => StatusCode::NOT_FOUND,
                AuthError::IncorrectPassword
                | AuthError::InvalidUsername(_)
                | AuthError::WeakPassword(_) => StatusCode::BAD_REQUEST,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Chat(err) => match err {
                ChatError::SessionNotFound => StatusCode::NOT_FOUND,
                ChatError::EmptyMessage | ChatError::EmptyTranscript => StatusCode::BAD_REQUEST,
                ChatError::Claude(_) => StatusCode::BAD_GATEWAY,
                ChatError::Database(_) | ChatError::TooManyToolIterations => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Extraction(err) => match err {
                ExtractionError::UnsupportedImageType(_)
                | ExtractionError::ImageTooLarge
                | ExtractionError::EmptyImage => StatusCode::BAD_REQUEST,
                ExtractionError::Claude(_) | ExtractionError::Parse(_) => StatusCode::BAD_GATEWAY,
                ExtractionError::Prompt(_) | ExtractionError::Repository(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::ShoppingList(err) => match err {
                ShoppingListError::ItemNotFound => StatusCode::NOT_FOUND,
                ShoppingListError::EmptyName => StatusCode::BAD_REQUEST,
                ShoppingListError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message shown to the client. Never contains internal details.
    fn public_message(&self) -> String {
        let status = self.status();
        if status == StatusCode::BAD_GATEWAY {
            return "The assistant service failed. Please try again.".to_string();
        }
        if status.is_server_error() {
            return "Internal server error".to_string();
        }

        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::Conflict(msg)) => msg.clone(),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid credentials".to_string(),
                AuthError::IncorrectPassword => "Current password is incorrect".to_string(),
                AuthError::UserAlreadyExists => "Username already taken".to_string(),
                AuthError::UserNotFound => "User not found".to_string(),
                AuthError::InvalidUsername(msg) | AuthError::WeakPassword(msg) => capitalize(msg),
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    "Authentication error".to_string()
                }
            },
            Self::Chat(err) => match err {
                ChatError::SessionNotFound => "Chat session not found".to_string(),
                other => capitalize(&other.to_string()),
            },
            Self::Extraction(err) => capitalize(&err.to_string()),
            Self::ShoppingList(err) => match err {
                ShoppingListError::ItemNotFound => "Shopping list item not found".to_string(),
                other => capitalize(&other.to_string()),
            },
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg)
            | Self::Internal(msg) => msg.clone(),
            Self::Database(_) | Self::Claude(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

/// Upper-case the first letter of a service error message.
fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the logged-in user.
pub fn set_sentry_user(user_id: &impl ToString, username: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            username: Some(username.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_of(err: AppError) -> (StatusCode, String) {
        (err.status(), err.public_message())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("Recipe not found".to_string());
        assert_eq!(err.to_string(), "Not found: Recipe not found");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::Conflict("test".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::NotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Internal("boom".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_auth_errors() {
        assert_eq!(
            body_of(AuthError::InvalidCredentials.into()),
            (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
        );
        assert_eq!(
            body_of(AuthError::UserAlreadyExists.into()),
            (StatusCode::CONFLICT, "Username already taken".to_string())
        );
        assert_eq!(
            body_of(AuthError::IncorrectPassword.into()),
            (
                StatusCode::BAD_REQUEST,
                "Current password is incorrect".to_string()
            )
        );
        assert_eq!(
            body_of(AuthError::WeakPassword("password must be at least 4 characters".to_string()).into()),
            (
                StatusCode::BAD_REQUEST,
                "Password must be at least 4 characters".to_string()
            )
        );
    }

    #[test]
    fn test_shopping_list_errors() {
        assert_eq!(
            body_of(ShoppingListError::ItemNotFound.into()),
            (
                StatusCode::NOT_FOUND,
                "Shopping list item not found".to_string()
            )
        );
        assert_eq!(
            body_of(ShoppingListError::EmptyName.into()),
            (StatusCode::BAD_REQUEST, "Item name cannot be empty".to_string())
        );
    }

    #[test]
    fn test_upstream_errors_are_bad_gateway() {
        let err: AppError = ExtractionError::Parse("expected value".to_string()).into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert!(!err.public_message().contains("expected value"));

        let err: AppError = ChatError::Claude(ClaudeError::RateLimited(30)).into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_internal_details_hidden() {
        let err: AppError =
            RepositoryError::DataCorruption("bad ingredients json".to_string()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn test_image_errors_are_bad_request() {
        let err: AppError = ExtractionError::UnsupportedImageType("text/plain".to_string()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "Unsupported image type: text/plain");
    }
}
