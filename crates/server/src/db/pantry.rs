//! Pantry repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use larder_core::{PantryItemId, UserId};

use super::RepositoryError;
use crate::models::{NewPantryItem, PantryItem, PantryItemUpdate};

/// Internal row type for `PostgreSQL` pantry queries.
#[derive(Debug, sqlx::FromRow)]
struct PantryItemRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    quantity: Option<String>,
    unit: Option<String>,
    category: Option<String>,
    added_at: DateTime<Utc>,
}

impl From<PantryItemRow> for PantryItem {
    fn from(row: PantryItemRow) -> Self {
        Self {
            id: PantryItemId::new(row.id),
            user_id: UserId::new(row.user_id),
            name: row.name,
            quantity: row.quantity,
            unit: row.unit,
            category: row.category,
            added_at: row.added_at,
        }
    }
}

/// Repository for pantry database operations.
pub struct PantryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PantryRepository<'a> {
    /// Create a new pantry repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a user's pantry, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<PantryItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, PantryItemRow>(
            r"
            SELECT id, user_id, name, quantity, unit, category, added_at
            FROM larder.pantry_item
            WHERE user_id = $1
            ORDER BY name, added_at
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Names of everything in a user's pantry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn names(&self, user_id: UserId) -> Result<Vec<String>, RepositoryError> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT name FROM larder.pantry_item WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(self.pool)
                .await?;

        Ok(names)
    }

    /// Insert a pantry item.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(
        &self,
        user_id: UserId,
        item: &NewPantryItem,
    ) -> Result<PantryItem, RepositoryError> {
        let row = sqlx::query_as::<_, PantryItemRow>(
            r"
            INSERT INTO larder.pantry_item (id, user_id, name, quantity, unit, category)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, name, quantity, unit, category, added_at
            ",
        )
        .bind(PantryItemId::generate())
        .bind(user_id)
        .bind(&item.name)
        .bind(item.quantity.as_deref())
        .bind(item.unit.as_deref())
        .bind(item.category.as_deref())
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update(
        &self,
        user_id: UserId,
        id: PantryItemId,
        update: &PantryItemUpdate,
    ) -> Result<PantryItem, RepositoryError> {
        let row = sqlx::query_as::<_, PantryItemRow>(
            r"
            UPDATE larder.pantry_item
            SET name = COALESCE($3, name),
                quantity = COALESCE($4, quantity),
                unit = COALESCE($5, unit),
                category = COALESCE($6, category)
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, name, quantity, unit, category, added_at
            ",
        )
        .bind(id)
        .bind(user_id)
        .bind(update.name.as_deref())
        .bind(update.quantity.as_deref())
        .bind(update.unit.as_deref())
        .bind(update.category.as_deref())
        .fetch_optional(self.pool)
        .await?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// Delete a pantry item.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn delete(&self, user_id: UserId, id: PantryItemId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM larder.pantry_item WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Delete every item whose name contains `fragment`, case-insensitively.
    ///
    /// Returns the number of deleted items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_matching(
        &self,
        user_id: UserId,
        fragment: &str,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM larder.pantry_item
            WHERE user_id = $1 AND name ILIKE '%' || $2 || '%'
            ",
        )
        .bind(user_id)
        .bind(fragment)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Distinct non-blank categories the user has assigned, sorted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn categories(&self, user_id: UserId) -> Result<Vec<String>, RepositoryError> {
        let categories: Vec<String> = sqlx::query_scalar(
            r"
            SELECT DISTINCT btrim(category)
            FROM larder.pantry_item
            WHERE user_id = $1 AND category IS NOT NULL AND btrim(category) <> ''
            ORDER BY 1
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(categories)
    }
}
