//! Shopping list routes.
//!
//! Item IDs are the string IDs stored inside the list, not database keys.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, patch, post},
};
use serde::Deserialize;
use serde_json::Value;

use larder_core::RawItem;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::ShoppingList;
use crate::services::{
    FinalizedList, FinishedTrip, NewShoppingItem, ShoppingItemPatch, ShoppingListService,
};
use crate::state::AppState;

/// Build the shopping list router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/shopping-list", get(get_list))
        .route("/shopping-list/items", post(add_item))
        .route(
            "/shopping-list/items/{id}",
            patch(update_item).delete(remove_item),
        )
        .route("/shopping-list/finalize", post(finalize))
        .route("/shopping-list/finish", post(finish))
}

/// Candidates to consolidate into the list.
///
/// Entries are read leniently: anything without a usable name is dropped
/// by consolidation rather than failing the request.
#[derive(Debug, Deserialize)]
pub struct FinalizeRequest {
    #[serde(default)]
    pub ingredients: Value,
}

/// GET /shopping-list
async fn get_list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<ShoppingList>> {
    let list = ShoppingListService::new(state.pool()).get(user.id).await?;
    Ok(Json(list))
}

/// POST /shopping-list/items
async fn add_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(item): Json<NewShoppingItem>,
) -> Result<Json<ShoppingList>> {
    let list = ShoppingListService::new(state.pool())
        .add_item(user.id, &item)
        .await?;
    Ok(Json(list))
}

/// PATCH /shopping-list/items/{id}
async fn update_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(item_id): Path<String>,
    Json(patch): Json<ShoppingItemPatch>,
) -> Result<Json<ShoppingList>> {
    let list = ShoppingListService::new(state.pool())
        .update_item(user.id, &item_id, &patch)
        .await?;
    Ok(Json(list))
}

/// DELETE /shopping-list/items/{id}
async fn remove_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(item_id): Path<String>,
) -> Result<Json<ShoppingList>> {
    let list = ShoppingListService::new(state.pool())
        .remove_item(user.id, &item_id)
        .await?;
    Ok(Json(list))
}

/// POST /shopping-list/finalize
async fn finalize(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<FinalizeRequest>,
) -> Result<Json<FinalizedList>> {
    let candidates = RawItem::list_from_json(&request.ingredients);

    let finalized = ShoppingListService::new(state.pool())
        .finalize(user.id, &candidates)
        .await?;
    Ok(Json(finalized))
}

/// POST /shopping-list/finish
async fn finish(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<FinishedTrip>> {
    let trip = ShoppingListService::new(state.pool()).finish(user.id).await?;
    Ok(Json(trip))
}
