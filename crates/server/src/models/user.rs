//! User domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use larder_core::UserId;

/// A Larder account.
///
/// The password hash is never part of this type; it is only read by the
/// auth service when verifying credentials.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Login name, unique across all users.
    pub username: String,
    /// Optional name used by the assistant.
    pub display_name: Option<String>,
    /// Free-form dietary preferences (allergies, diets, dislikes).
    pub dietary_preferences: Option<serde_json::Value>,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Partial profile update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub dietary_preferences: Option<serde_json::Value>,
}
