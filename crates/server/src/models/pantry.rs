//! Pantry (household ingredient) domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use larder_core::{PantryItemId, UserId};

/// An ingredient the household already has.
#[derive(Debug, Clone, Serialize)]
pub struct PantryItem {
    pub id: PantryItemId,
    #[serde(skip)]
    pub user_id: UserId,
    pub name: String,
    pub quantity: Option<String>,
    pub unit: Option<String>,
    pub category: Option<String>,
    pub added_at: DateTime<Utc>,
}

/// A pantry item to insert.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPantryItem {
    pub name: String,
    #[serde(default)]
    pub quantity: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Partial pantry item update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PantryItemUpdate {
    pub name: Option<String>,
    pub quantity: Option<String>,
    pub unit: Option<String>,
    pub category: Option<String>,
}
