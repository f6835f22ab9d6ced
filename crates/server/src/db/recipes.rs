//! Recipe repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use larder_core::{RecipeId, UserId};

use super::RepositoryError;
use crate::models::{IngredientLine, NewRecipe, Recipe, RecipeQuery, RecipeUpdate};

const RECIPE_COLUMNS: &str = "id, user_id, name, description, ingredients, prep_time_minutes, \
                              instructions, source, favourite, category, created_at";

/// Internal row type for `PostgreSQL` recipe queries.
#[derive(Debug, sqlx::FromRow)]
struct RecipeRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    description: Option<String>,
    ingredients: serde_json::Value,
    prep_time_minutes: Option<i32>,
    instructions: Option<String>,
    source: Option<String>,
    favourite: bool,
    category: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<RecipeRow> for Recipe {
    type Error = RepositoryError;

    fn try_from(row: RecipeRow) -> Result<Self, Self::Error> {
        let ingredients: Vec<IngredientLine> = serde_json::from_value(row.ingredients)
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid ingredients for recipe {}: {e}", row.id))
            })?;

        Ok(Self {
            id: RecipeId::new(row.id),
            user_id: UserId::new(row.user_id),
            name: row.name,
            description: row.description,
            ingredients,
            prep_time_minutes: row.prep_time_minutes,
            instructions: row.instructions,
            source: row.source,
            favourite: row.favourite,
            category: row.category,
            created_at: row.created_at,
        })
    }
}

fn ingredients_json(lines: &[IngredientLine]) -> Result<serde_json::Value, RepositoryError> {
    serde_json::to_value(lines)
        .map_err(|e| RepositoryError::DataCorruption(format!("unserializable ingredients: {e}")))
}

/// Repository for recipe database operations.
///
/// Every query is scoped to the owning user; a recipe belonging to someone
/// else behaves exactly like a missing one.
pub struct RecipeRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> RecipeRepository<'a> {
    /// Create a new recipe repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a user's recipes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if stored ingredients are invalid.
    pub async fn list(
        &self,
        user_id: UserId,
        query: &RecipeQuery,
    ) -> Result<Vec<Recipe>, RepositoryError> {
        // The ORDER BY column and direction come from closed enums.
        let sql = format!(
            r"
            SELECT {RECIPE_COLUMNS}
            FROM larder.recipe
            WHERE user_id = $1
              AND ($2::text IS NULL OR ingredients::text ILIKE '%' || $2 || '%')
              AND ($3::boolean IS NULL OR favourite = $3)
              AND ($4::text IS NULL OR category = $4)
              AND ($5::text IS NULL OR name ILIKE '%' || $5 || '%')
            ORDER BY {} {}, id
            ",
            query.sort.column(),
            query.order.keyword(),
        );

        let rows = sqlx::query_as::<_, RecipeRow>(&sql)
            .bind(user_id)
            .bind(query.ingredient.as_deref())
            .bind(query.favourite)
            .bind(query.category.as_deref())
            .bind(query.name.as_deref())
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get a recipe by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if stored ingredients are invalid.
    pub async fn get(
        &self,
        user_id: UserId,
        id: RecipeId,
    ) -> Result<Option<Recipe>, RepositoryError> {
        let sql = format!(
            "SELECT {RECIPE_COLUMNS} FROM larder.recipe WHERE id = $1 AND user_id = $2"
        );

        let row = sqlx::query_as::<_, RecipeRow>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Insert a recipe.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(
        &self,
        user_id: UserId,
        recipe: &NewRecipe,
    ) -> Result<Recipe, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO larder.recipe
                (id, user_id, name, description, ingredients, prep_time_minutes,
                 instructions, source, favourite, category)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {RECIPE_COLUMNS}
            "
        );

        let row = sqlx::query_as::<_, RecipeRow>(&sql)
            .bind(RecipeId::generate())
            .bind(user_id)
            .bind(&recipe.name)
            .bind(recipe.description.as_deref())
            .bind(ingredients_json(&recipe.ingredients)?)
            .bind(recipe.prep_time_minutes)
            .bind(recipe.instructions.as_deref())
            .bind(recipe.source.as_deref())
            .bind(recipe.favourite)
            .bind(recipe.category.as_deref())
            .fetch_one(self.pool)
            .await?;

        row.try_into()
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the recipe doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update(
        &self,
        user_id: UserId,
        id: RecipeId,
        update: &RecipeUpdate,
    ) -> Result<Recipe, RepositoryError> {
        let ingredients = update
            .ingredients
            .as_deref()
            .map(ingredients_json)
            .transpose()?;

        let sql = format!(
            r"
            UPDATE larder.recipe
            SET name = COALESCE($3, name),
                description = COALESCE($4, description),
                ingredients = COALESCE($5, ingredients),
                prep_time_minutes = COALESCE($6, prep_time_minutes),
                instructions = COALESCE($7, instructions),
                source = COALESCE($8, source),
                favourite = COALESCE($9, favourite),
                category = COALESCE($10, category)
            WHERE id = $1 AND user_id = $2
            RETURNING {RECIPE_COLUMNS}
            "
        );

        let row = sqlx::query_as::<_, RecipeRow>(&sql)
            .bind(id)
            .bind(user_id)
            .bind(update.name.as_deref())
            .bind(update.description.as_deref())
            .bind(ingredients)
            .bind(update.prep_time_minutes)
            .bind(update.instructions.as_deref())
            .bind(update.source.as_deref())
            .bind(update.favourite)
            .bind(update.category.as_deref())
            .fetch_optional(self.pool)
            .await?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Delete a recipe.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the recipe doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn delete(&self, user_id: UserId, id: RecipeId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM larder.recipe WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
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
            FROM larder.recipe
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
