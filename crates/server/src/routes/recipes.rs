//! Recipe collection, recipe-to-shopping-list and recipe extraction.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use larder_core::{ChatSessionId, RecipeId};

use crate::db::{RecipeRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{NewRecipe, Recipe, RecipeQuery, RecipeSort, RecipeUpdate, SortOrder};
use crate::services::{
    ChatService, ExtractionService, FinalizedList, MAX_IMAGE_BYTES, ShoppingListService,
};
use crate::state::AppState;

use super::{read_image, required_name};

const RECIPE_NOT_FOUND: &str = "Recipe not found";
const EMPTY_RECIPE_NAME: &str = "Recipe name cannot be empty";

/// Build the recipes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route(
            "/recipes/{id}",
            get(get_recipe).put(update_recipe).delete(delete_recipe),
        )
        .route("/recipes/{id}/shopping-list", post(add_to_shopping_list))
        .route("/recipes/extract/chat", post(extract_from_chat))
        .route(
            "/recipes/extract/photo",
            post(extract_from_photo).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 64 * 1024)),
        )
}

/// Query parameters for the recipe listing.
#[derive(Debug, Default, Deserialize)]
pub struct RecipeListParams {
    /// One of `name`, `prep_time_minutes`, `created_at`, `source`.
    pub sort_by: Option<String>,
    /// `asc` or `desc` (default).
    pub order: Option<SortOrder>,
    pub ingredient: Option<String>,
    pub favourite: Option<bool>,
    pub category: Option<String>,
    pub name: Option<String>,
}

impl From<RecipeListParams> for RecipeQuery {
    fn from(params: RecipeListParams) -> Self {
        let non_blank = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        Self {
            sort: RecipeSort::parse(params.sort_by.as_deref()),
            order: params.order.unwrap_or_default(),
            ingredient: non_blank(params.ingredient),
            favourite: params.favourite,
            category: non_blank(params.category),
            name: non_blank(params.name),
        }
    }
}

/// Request body for chat extraction.
#[derive(Debug, Deserialize)]
pub struct ExtractFromChatRequest {
    pub session_id: ChatSessionId,
}

/// Extracted drafts; nothing is saved.
#[derive(Debug, Serialize)]
pub struct RecipeDrafts {
    pub recipes: Vec<NewRecipe>,
}

/// GET /recipes
async fn list_recipes(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(params): Query<RecipeListParams>,
) -> Result<Json<Vec<Recipe>>> {
    let recipes = RecipeRepository::new(state.pool())
        .list(user.id, &params.into())
        .await?;
    Ok(Json(recipes))
}

/// GET /recipes/{id}
async fn get_recipe(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<RecipeId>,
) -> Result<Json<Recipe>> {
    RecipeRepository::new(state.pool())
        .get(user.id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(RECIPE_NOT_FOUND.to_string()))
}

/// POST /recipes
async fn create_recipe(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(mut recipe): Json<NewRecipe>,
) -> Result<(StatusCode, Json<Recipe>)> {
    recipe.name = required_name(&recipe.name, EMPTY_RECIPE_NAME)?;

    let recipe = RecipeRepository::new(state.pool())
        .create(user.id, &recipe)
        .await?;

    tracing::info!(recipe_id = %recipe.id, "recipe created");
    Ok((StatusCode::CREATED, Json(recipe)))
}

/// PUT /recipes/{id}
async fn update_recipe(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<RecipeId>,
    Json(mut update): Json<RecipeUpdate>,
) -> Result<Json<Recipe>> {
    if let Some(name) = &update.name {
        update.name = Some(required_name(name, EMPTY_RECIPE_NAME)?);
    }

    RecipeRepository::new(state.pool())
        .update(user.id, id, &update)
        .await
        .map(Json)
        .map_err(not_found)
}

/// DELETE /recipes/{id}
async fn delete_recipe(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<RecipeId>,
) -> Result<StatusCode> {
    RecipeRepository::new(state.pool())
        .delete(user.id, id)
        .await
        .map_err(not_found)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Consolidate a recipe's ingredients into the shopping list.
///
/// POST /recipes/{id}/shopping-list
async fn add_to_shopping_list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<RecipeId>,
) -> Result<Json<FinalizedList>> {
    let recipe = RecipeRepository::new(state.pool())
        .get(user.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(RECIPE_NOT_FOUND.to_string()))?;

    let finalized = ShoppingListService::new(state.pool())
        .finalize(user.id, &recipe.shopping_candidates())
        .await?;
    Ok(Json(finalized))
}

/// POST /recipes/extract/chat
async fn extract_from_chat(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<ExtractFromChatRequest>,
) -> Result<Json<RecipeDrafts>> {
    let transcript = ChatService::new(state.pool())
        .transcript(user.id, request.session_id)
        .await?;

    let recipes = ExtractionService::new(state.pool(), state.claude())
        .recipes_from_transcript(user.id, &transcript)
        .await?;
    Ok(Json(RecipeDrafts { recipes }))
}

/// POST /recipes/extract/photo
async fn extract_from_photo(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    multipart: Multipart,
) -> Result<Json<RecipeDrafts>> {
    let image = read_image(multipart).await?;

    let recipes = ExtractionService::new(state.pool(), state.claude())
        .recipes_from_photo(user.id, image.content_type.as_deref(), &image.bytes)
        .await?;
    Ok(Json(RecipeDrafts { recipes }))
}

fn not_found(e: RepositoryError) -> AppError {
    match e {
        RepositoryError::NotFound => AppError::NotFound(RECIPE_NOT_FOUND.to_string()),
        other => other.into(),
    }
}
