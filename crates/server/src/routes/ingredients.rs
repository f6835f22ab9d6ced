//! Pantry ("ingredients") routes.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde::Serialize;

use larder_core::PantryItemId;

use crate::db::{PantryRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{NewPantryItem, PantryItem, PantryItemUpdate};
use crate::services::{ExtractionService, MAX_IMAGE_BYTES};
use crate::state::AppState;

use super::{read_image, required_name};

const EMPTY_INGREDIENT_NAME: &str = "Ingredient name cannot be empty";

/// Build the ingredients router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ingredients", get(list_ingredients).post(create_ingredient))
        .route(
            "/ingredients/{id}",
            put(update_ingredient).delete(delete_ingredient),
        )
        .route(
            "/ingredients/extract/photo",
            post(extract_from_photo).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 64 * 1024)),
        )
}

/// Extracted pantry drafts; nothing is saved.
#[derive(Debug, Serialize)]
pub struct IngredientDrafts {
    pub ingredients: Vec<NewPantryItem>,
}

/// GET /ingredients
async fn list_ingredients(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<PantryItem>>> {
    let items = PantryRepository::new(state.pool()).list(user.id).await?;
    Ok(Json(items))
}

/// POST /ingredients
async fn create_ingredient(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(mut item): Json<NewPantryItem>,
) -> Result<(StatusCode, Json<PantryItem>)> {
    item.name = required_name(&item.name, EMPTY_INGREDIENT_NAME)?;

    let item = PantryRepository::new(state.pool())
        .create(user.id, &item)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// PUT /ingredients/{id}
async fn update_ingredient(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<PantryItemId>,
    Json(mut update): Json<PantryItemUpdate>,
) -> Result<Json<PantryItem>> {
    if let Some(name) = &update.name {
        update.name = Some(required_name(name, EMPTY_INGREDIENT_NAME)?);
    }

    PantryRepository::new(state.pool())
        .update(user.id, id, &update)
        .await
        .map(Json)
        .map_err(not_found)
}

/// DELETE /ingredients/{id}
async fn delete_ingredient(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<PantryItemId>,
) -> Result<StatusCode> {
    PantryRepository::new(state.pool())
        .delete(user.id, id)
        .await
        .map_err(not_found)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /ingredients/extract/photo
async fn extract_from_photo(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    multipart: Multipart,
) -> Result<Json<IngredientDrafts>> {
    let image = read_image(multipart).await?;

    let ingredients = ExtractionService::new(state.pool(), state.claude())
        .ingredients_from_photo(user.id, image.content_type.as_deref(), &image.bytes)
        .await?;

    tracing::debug!(drafts = ingredients.len(), "pantry photo extracted");
    Ok(Json(IngredientDrafts { ingredients }))
}

fn not_found(e: RepositoryError) -> AppError {
    match e {
        RepositoryError::NotFound => AppError::NotFound("Ingredient not found".to_string()),
        other => other.into(),
    }
}
