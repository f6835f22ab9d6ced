//! Shopping list domain type.

use chrono::{DateTime, Utc};
use serde::Serialize;

use larder_core::{ShoppingItem, ShoppingListId, UserId};

/// A user's single shopping list.
#[derive(Debug, Clone, Serialize)]
pub struct ShoppingList {
    pub id: ShoppingListId,
    #[serde(skip)]
    pub user_id: UserId,
    pub items: Vec<ShoppingItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
