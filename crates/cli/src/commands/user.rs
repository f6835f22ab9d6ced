//! User management commands.
//!
//! # Usage
//!
//! ```bash
//! larder user create -u alice -p 'correct horse'
//! ```
//!
//! Accounts created here skip the signup master key. Username and password
//! rules are the same as for signup.
//!
//! # Environment Variables
//!
//! - `LARDER_DATABASE_URL` - `PostgreSQL` connection string
//! - `LARDER_NEW_USER_PASSWORD` - Password, when not passed with `-p`

use larder_core::UserId;
use larder_server::services::{AuthError, AuthService};
use thiserror::Error;

use super::{DATABASE_URL_VAR, database_url};

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum UserError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Registration was rejected.
    #[error("{0}")]
    Auth(#[from] AuthError),
}

/// Create a new user.
///
/// # Returns
///
/// The ID of the created user.
///
/// # Errors
///
/// Returns `UserError::Auth` if the username is taken or the credentials
/// fail validation.
pub async fn create_user(username: &str, password: &str) -> Result<UserId, UserError> {
    let database_url = database_url().ok_or(UserError::MissingEnvVar(DATABASE_URL_VAR))?;

    tracing::info!("Connecting to database...");
    let pool = larder_server::db::create_pool(&database_url).await?;

    let user = AuthService::new(&pool).register(username, password).await?;

    tracing::info!(
        "User created successfully! ID: {}, Username: {}",
        user.id,
        user.username
    );

    Ok(user.id)
}
