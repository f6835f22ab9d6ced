//! Shopping list repository for database operations.
//!
//! Each user has exactly one list row, created on first access. Every change
//! replaces the whole `items` value inside a transaction that holds the row
//! lock, so concurrent requests for the same user are serialized.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use larder_core::{PantryItemId, ShoppingItem, ShoppingListId, UserId};

use super::RepositoryError;
use crate::models::ShoppingList;

/// Internal row type for `PostgreSQL` shopping list queries.
#[derive(Debug, sqlx::FromRow)]
struct ShoppingListRow {
    id: Uuid,
    user_id: Uuid,
    items: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ShoppingListRow> for ShoppingList {
    type Error = RepositoryError;

    fn try_from(row: ShoppingListRow) -> Result<Self, Self::Error> {
        let items: Vec<ShoppingItem> = serde_json::from_value(row.items).map_err(|e| {
            RepositoryError::DataCorruption(format!(
                "invalid items in shopping list {}: {e}",
                row.id
            ))
        })?;

        Ok(Self {
            id: ShoppingListId::new(row.id),
            user_id: UserId::new(row.user_id),
            items,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn items_json(items: &[ShoppingItem]) -> Result<serde_json::Value, RepositoryError> {
    serde_json::to_value(items)
        .map_err(|e| RepositoryError::DataCorruption(format!("unserializable items: {e}")))
}

/// Result of clearing a list into the pantry.
#[derive(Debug, Clone)]
pub struct FinishedList {
    /// Names of checked items that were added to the pantry.
    pub added_to_pantry: Vec<String>,
    /// Every item that was on the list.
    pub cleared_items: Vec<ShoppingItem>,
}

/// Repository for shopping list database operations.
pub struct ShoppingListRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ShoppingListRepository<'a> {
    /// Create a new shopping list repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the user's list, creating an empty one if needed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if stored items are invalid.
    pub async fn get_or_create(&self, user_id: UserId) -> Result<ShoppingList, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        ensure_list(&mut conn, user_id).await?;

        let row = sqlx::query_as::<_, ShoppingListRow>(
            r"
            SELECT id, user_id, items, created_at, updated_at
            FROM larder.shopping_list
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;

        row.try_into()
    }

    /// Replace the user's items with the result of `f`.
    ///
    /// `f` receives the current items and returns the new items together with
    /// a value handed back to the caller. If `f` fails nothing is written.
    ///
    /// # Errors
    ///
    /// Returns the error from `f`, or a `RepositoryError` converted into `E`.
    pub async fn modify<T, E, F>(&self, user_id: UserId, f: F) -> Result<(ShoppingList, T), E>
    where
        F: FnOnce(Vec<ShoppingItem>) -> Result<(Vec<ShoppingItem>, T), E>,
        E: From<RepositoryError>,
    {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let current = lock_list(&mut tx, user_id).await?;
        let (items, value) = f(current.items)?;

        let row = sqlx::query_as::<_, ShoppingListRow>(
            r"
            UPDATE larder.shopping_list
            SET items = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING id, user_id, items, created_at, updated_at
            ",
        )
        .bind(items_json(&items)?)
        .bind(current.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;

        tx.commit().await.map_err(RepositoryError::from)?;

        Ok((row.try_into()?, value))
    }

    /// Move checked items into the pantry and empty the list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; nothing is
    /// written in that case.
    pub async fn finish(&self, user_id: UserId) -> Result<FinishedList, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current = lock_list(&mut tx, user_id).await?;
        let mut added_to_pantry = Vec::new();

        for item in current.items.iter().filter(|item| item.checked) {
            sqlx::query(
                r"
                INSERT INTO larder.pantry_item (id, user_id, name, quantity, unit, category)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(PantryItemId::generate())
            .bind(user_id)
            .bind(&item.name)
            .bind(item.quantity.as_deref())
            .bind(item.unit.as_deref())
            .bind(item.category.as_deref())
            .execute(&mut *tx)
            .await?;

            added_to_pantry.push(item.name.clone());
        }

        sqlx::query(
            r"
            UPDATE larder.shopping_list
            SET items = '[]'::jsonb, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(current.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(FinishedList {
            added_to_pantry,
            cleared_items: current.items,
        })
    }
}

/// Create the user's list row if it doesn't exist yet.
async fn ensure_list(conn: &mut PgConnection, user_id: UserId) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO larder.shopping_list (id, user_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id) DO NOTHING
        ",
    )
    .bind(ShoppingListId::generate())
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Ensure the list exists and lock its row for the rest of the transaction.
async fn lock_list(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<ShoppingList, RepositoryError> {
    ensure_list(conn, user_id).await?;

    let row = sqlx::query_as::<_, ShoppingListRow>(
        r"
        SELECT id, user_id, items, created_at, updated_at
        FROM larder.shopping_list
        WHERE user_id = $1
        FOR UPDATE
        ",
    )
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    row.try_into()
}
