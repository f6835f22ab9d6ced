//! Shopping list service.
//!
//! Every mutation goes through [`ShoppingListRepository::modify`], so the
//! read, the in-memory change and the write happen under one row lock.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use larder_core::{
    RawItem, ShoppingItem, UserId, finalize_shopping_items, shopping::optional_text,
};

use crate::db::{PantryRepository, RepositoryError, ShoppingListRepository};
use crate::models::ShoppingList;

/// Errors that can occur during shopping list operations.
#[derive(Debug, Error)]
pub enum ShoppingListError {
    /// No item with the given ID is on the list.
    #[error("shopping list item not found")]
    ItemNotFound,

    /// An item name was blank.
    #[error("item name cannot be empty")]
    EmptyName,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// A manually entered item.
#[derive(Debug, Clone, Deserialize)]
pub struct NewShoppingItem {
    pub name: String,
    #[serde(default)]
    pub quantity: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Partial item update.
///
/// Absent fields are left unchanged. Text fields are trimmed and a blank
/// value clears the field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShoppingItemPatch {
    pub name: Option<String>,
    pub quantity: Option<String>,
    pub unit: Option<String>,
    pub category: Option<String>,
    pub checked: Option<bool>,
}

impl ShoppingItemPatch {
    /// Apply this patch to `item`.
    ///
    /// # Errors
    ///
    /// Returns `ShoppingListError::EmptyName` if the patch blanks the name.
    pub fn apply(&self, item: &mut ShoppingItem) -> Result<(), ShoppingListError> {
        if let Some(name) = &self.name {
            item.name = optional_text(Some(name)).ok_or(ShoppingListError::EmptyName)?;
        }
        if let Some(quantity) = &self.quantity {
            item.quantity = optional_text(Some(quantity));
        }
        if let Some(unit) = &self.unit {
            item.unit = optional_text(Some(unit));
        }
        if let Some(category) = &self.category {
            item.category = optional_text(Some(category));
        }
        if let Some(checked) = self.checked {
            item.checked = checked;
        }

        Ok(())
    }
}

/// Result of consolidating candidates into the list.
#[derive(Debug, Clone, Serialize)]
pub struct FinalizedList {
    /// The list after consolidation.
    pub shopping_list: Vec<ShoppingItem>,
    /// Display names dropped because they are already in the pantry.
    pub excluded_as_in_pantry: Vec<String>,
}

/// Result of finishing a shopping trip.
#[derive(Debug, Clone, Serialize)]
pub struct FinishedTrip {
    /// Number of checked items added to the pantry.
    pub added_to_pantry: usize,
    /// Number of items removed from the list.
    pub cleared_items: usize,
    /// Names of the items added to the pantry.
    pub pantry_items: Vec<String>,
}

/// Shopping list service.
pub struct ShoppingListService<'a> {
    lists: ShoppingListRepository<'a>,
    pantry: PantryRepository<'a>,
}

impl<'a> ShoppingListService<'a> {
    /// Create a new shopping list service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            lists: ShoppingListRepository::new(pool),
            pantry: PantryRepository::new(pool),
        }
    }

    /// Get the user's list, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns `ShoppingListError::Repository` if the database operation fails.
    pub async fn get(&self, user_id: UserId) -> Result<ShoppingList, ShoppingListError> {
        Ok(self.lists.get_or_create(user_id).await?)
    }

    /// Append a manually entered item without consolidation.
    ///
    /// # Errors
    ///
    /// Returns `ShoppingListError::EmptyName` if the name is blank.
    #[instrument(skip(self, item), fields(user_id = %user_id))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        item: &NewShoppingItem,
    ) -> Result<ShoppingList, ShoppingListError> {
        let item = ShoppingItem::new(
            &item.name,
            item.quantity.as_deref(),
            item.unit.as_deref(),
            item.category.as_deref(),
        )
        .ok_or(ShoppingListError::EmptyName)?;

        let (list, ()) = self
            .lists
            .modify(user_id, |mut items| {
                items.push(item);
                Ok::<_, ShoppingListError>((items, ()))
            })
            .await?;

        Ok(list)
    }

    /// Update one item in place.
    ///
    /// # Errors
    ///
    /// Returns `ShoppingListError::ItemNotFound` if no item has `item_id`.
    /// Returns `ShoppingListError::EmptyName` if the patch blanks the name.
    #[instrument(skip(self, patch), fields(user_id = %user_id))]
    pub async fn update_item(
        &self,
        user_id: UserId,
        item_id: &str,
        patch: &ShoppingItemPatch,
    ) -> Result<ShoppingList, ShoppingListError> {
        let (list, ()) = self
            .lists
            .modify(user_id, |mut items| {
                let item = items
                    .iter_mut()
                    .find(|item| item.id == item_id)
                    .ok_or(ShoppingListError::ItemNotFound)?;
                patch.apply(item)?;
                Ok::<_, ShoppingListError>((items, ()))
            })
            .await?;

        Ok(list)
    }

    /// Remove one item.
    ///
    /// # Errors
    ///
    /// Returns `ShoppingListError::ItemNotFound` if no item has `item_id`.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn remove_item(
        &self,
        user_id: UserId,
        item_id: &str,
    ) -> Result<ShoppingList, ShoppingListError> {
        let (list, ()) = self
            .lists
            .modify(user_id, |mut items| {
                let before = items.len();
                items.retain(|item| item.id != item_id);
                if items.len() == before {
                    return Err(ShoppingListError::ItemNotFound);
                }
                Ok::<_, ShoppingListError>((items, ()))
            })
            .await?;

        Ok(list)
    }

    /// Merge `candidates` into the list, skipping anything in the pantry.
    ///
    /// # Errors
    ///
    /// Returns `ShoppingListError::Repository` if the database operation fails.
    #[instrument(skip(self, candidates), fields(user_id = %user_id, candidates = candidates.len()))]
    pub async fn finalize(
        &self,
        user_id: UserId,
        candidates: &[RawItem],
    ) -> Result<FinalizedList, ShoppingListError> {
        let pantry_names = self.pantry.names(user_id).await?;

        let (list, excluded) = self
            .lists
            .modify(user_id, |items| {
                let existing: Vec<RawItem> = items.iter().map(RawItem::from).collect();
                let outcome = finalize_shopping_items(&existing, &pantry_names, candidates);
                Ok::<_, ShoppingListError>((outcome.items, outcome.excluded))
            })
            .await?;

        tracing::debug!(
            items = list.items.len(),
            excluded = excluded.len(),
            "shopping list finalized"
        );

        Ok(FinalizedList {
            shopping_list: list.items,
            excluded_as_in_pantry: excluded,
        })
    }

    /// Move checked items into the pantry and clear the list.
    ///
    /// # Errors
    ///
    /// Returns `ShoppingListError::Repository` if the database operation fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn finish(&self, user_id: UserId) -> Result<FinishedTrip, ShoppingListError> {
        let finished = self.lists.finish(user_id).await?;

        tracing::info!(
            added = finished.added_to_pantry.len(),
            cleared = finished.cleared_items.len(),
            "shopping trip finished"
        );

        Ok(FinishedTrip {
            added_to_pantry: finished.added_to_pantry.len(),
            cleared_items: finished.cleared_items.len(),
            pantry_items: finished.added_to_pantry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> ShoppingItem {
        ShoppingItem::new("Milk", Some("2"), Some("cartons"), Some("dairy")).expect("item")
    }

    #[test]
    fn test_patch_trims_and_clears() {
        let mut milk = item();
        let patch = ShoppingItemPatch {
            name: Some("  Oat milk ".to_string()),
            quantity: Some("   ".to_string()),
            checked: Some(true),
            ..ShoppingItemPatch::default()
        };

        patch.apply(&mut milk).expect("apply");

        assert_eq!(milk.name, "Oat milk");
        assert_eq!(milk.quantity, None);
        assert_eq!(milk.unit.as_deref(), Some("cartons"));
        assert_eq!(milk.category.as_deref(), Some("dairy"));
        assert!(milk.checked);
    }

    #[test]
    fn test_patch_rejects_blank_name() {
        let mut milk = item();
        let patch = ShoppingItemPatch {
            name: Some(" ".to_string()),
            ..ShoppingItemPatch::default()
        };

        assert!(matches!(
            patch.apply(&mut milk),
            Err(ShoppingListError::EmptyName)
        ));
        assert_eq!(milk.name, "Milk");
    }

    #[test]
    fn test_empty_patch_changes_nothing() {
        let mut milk = item();
        let before = milk.clone();
        ShoppingItemPatch::default()
            .apply(&mut milk)
            .expect("apply");
        assert_eq!(milk, before);
    }

    #[test]
    fn test_patch_deserializes_partial_body() {
        let patch: ShoppingItemPatch =
            serde_json::from_str(r#"{"checked": true}"#).expect("deserialize");
        assert_eq!(patch.checked, Some(true));
        assert!(patch.name.is_none());
    }

    #[test]
    fn test_finalized_list_serialization() {
        let finalized = FinalizedList {
            shopping_list: vec![item()],
            excluded_as_in_pantry: vec!["Eggs".to_string()],
        };
        let json = serde_json::to_value(&finalized).expect("serialize");
        assert_eq!(json["excluded_as_in_pantry"][0], "Eggs");
        assert_eq!(json["shopping_list"][0]["name"], "Milk");
    }
}
