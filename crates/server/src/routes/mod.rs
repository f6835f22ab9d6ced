//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                           - Liveness check
//! GET  /health/ready                     - Readiness check (database)
//!
//! # Auth (strict rate limit)
//! POST /auth/signup                      - Create an account (master key)
//! POST /auth/login                       - Log in
//! POST /auth/logout                      - Log out
//!
//! # Profile (requires auth)
//! GET  /profile                          - Current profile
//! PUT  /profile                          - Update display name / preferences
//! POST /profile/change-password          - Change password
//!
//! # Recipes (requires auth)
//! GET    /recipes                        - List with sorting and filters
//! POST   /recipes                        - Create
//! GET    /recipes/{id}                   - Detail
//! PUT    /recipes/{id}                   - Partial update
//! DELETE /recipes/{id}                   - Delete
//! POST   /recipes/{id}/shopping-list     - Add ingredients to the shopping list
//! POST   /recipes/extract/chat           - Drafts from a chat session
//! POST   /recipes/extract/photo          - Drafts from a photo (multipart)
//!
//! # Ingredients (pantry, requires auth)
//! GET    /ingredients                    - List by name
//! POST   /ingredients                    - Create
//! PUT    /ingredients/{id}               - Partial update
//! DELETE /ingredients/{id}               - Delete
//! POST   /ingredients/extract/photo      - Drafts from a photo (multipart)
//!
//! # Shopping list (requires auth)
//! GET    /shopping-list                  - The list (created on first use)
//! POST   /shopping-list/items            - Append an item
//! PATCH  /shopping-list/items/{id}       - Edit an item
//! DELETE /shopping-list/items/{id}       - Remove an item
//! POST   /shopping-list/finalize         - Consolidate candidates into the list
//! POST   /shopping-list/finish           - Move checked items to the pantry
//!
//! # Chat (requires auth)
//! GET    /chat/sessions                  - Sessions, most recent first
//! GET    /chat/sessions/{id}/messages    - Session history
//! DELETE /chat/sessions/{id}             - Delete a session
//! POST   /chat/send                      - Send a message (SSE response)
//! ```

pub mod auth;
pub mod chat;
pub mod health;
pub mod ingredients;
pub mod profile;
pub mod recipes;
pub mod shopping_list;

use axum::Router;
use axum::extract::Multipart;

use crate::error::AppError;
use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Build the complete API router.
pub fn router() -> Router<AppState> {
    let api = Router::new()
        .merge(profile::router())
        .merge(recipes::router())
        .merge(ingredients::router())
        .merge(shopping_list::router())
        .merge(chat::router())
        .layer(api_rate_limiter());

    Router::new()
        .merge(health::router())
        .nest("/auth", auth::router().layer(auth_rate_limiter()))
        .merge(api)
}

/// Trim a required name, rejecting blank values with `message`.
fn required_name(name: &str, message: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest(message.to_string()));
    }
    Ok(name.to_string())
}

/// An uploaded image: declared content type and bytes.
struct ImageUpload {
    content_type: Option<String>,
    bytes: Vec<u8>,
}

/// Read the `image` field of a multipart upload.
async fn read_image(mut multipart: Multipart) -> Result<ImageUpload, AppError> {
    let invalid = |e: axum::extract::multipart::MultipartError| {
        AppError::BadRequest(format!("Invalid upload: {}", e.body_text()))
    };

    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        if field.name() != Some("image") {
            continue;
        }

        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(invalid)?;
        return Ok(ImageUpload {
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    Err(AppError::BadRequest("Missing image upload".to_string()))
}
