//! End-to-end HTTP tests.
//!
//! These tests require:
//! - A running `PostgreSQL` database with migrations applied (`larder migrate`)
//! - The server running (`cargo run -p larder-server`)
//! - `LARDER_MASTER_KEY` matching the server's
//!
//! Run with: cargo test -p larder-integration-tests -- --ignored

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

/// Base URL for the API (configurable via environment).
fn base_url() -> String {
    std::env::var("LARDER_BASE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string())
}

fn master_key() -> String {
    std::env::var("LARDER_MASTER_KEY").expect("LARDER_MASTER_KEY must be set")
}

/// Sign up a fresh user and return a client holding its session cookie.
async fn signed_up_client() -> Client {
    let client = Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client");

    let username = format!("it_{}", Uuid::new_v4().simple());
    let resp = client
        .post(format!("{}/auth/signup", base_url()))
        .json(&json!({
            "username": username,
            "password": "integration",
            "master_key": master_key(),
        }))
        .send()
        .await
        .expect("Failed to sign up");

    assert_eq!(resp.status(), StatusCode::OK);
    client
}

async fn json_body(resp: reqwest::Response) -> Value {
    resp.json().await.expect("Failed to read JSON body")
}

// ============================================================================
// Health & Auth
// ============================================================================

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_health() {
    let resp = Client::new()
        .get(format!("{}/health", base_url()))
        .send()
        .await
        .expect("Failed to reach server");

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.expect("body"), "ok");
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_requires_session() {
    let resp = Client::new()
        .get(format!("{}/recipes", base_url()))
        .send()
        .await
        .expect("Failed to reach server");

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(resp).await["error"], "Not authenticated");
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_signup_rejects_wrong_master_key() {
    let resp = Client::new()
        .post(format!("{}/auth/signup", base_url()))
        .json(&json!({
            "username": format!("it_{}", Uuid::new_v4().simple()),
            "password": "integration",
            "master_key": "not-the-key",
        }))
        .send()
        .await
        .expect("Failed to reach server");

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

// ============================================================================
// Recipes & Shopping
// ============================================================================

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_recipe_to_shopping_trip() {
    let client = signed_up_client().await;
    let base = base_url();

    // Something already in the pantry
    let resp = client
        .post(format!("{base}/ingredients"))
        .json(&json!({"name": "Eggs", "quantity": "6"}))
        .send()
        .await
        .expect("Failed to add pantry item");
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = client
        .post(format!("{base}/recipes"))
        .json(&json!({
            "name": "Shakshuka",
            "ingredients": [
                {"name": "Tomatoes", "quantity": "4", "unit": ""},
                {"name": "Egg", "quantity": "4", "unit": ""},
                {"name": "Onion", "quantity": "1", "unit": ""}
            ],
            "prep_time_minutes": 30
        }))
        .send()
        .await
        .expect("Failed to create recipe");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let recipe = json_body(resp).await;
    let recipe_id = recipe["id"].as_str().expect("recipe id");

    let resp = client
        .post(format!("{base}/recipes/{recipe_id}/shopping-list"))
        .send()
        .await
        .expect("Failed to add recipe to list");
    assert_eq!(resp.status(), StatusCode::OK);
    let finalized = json_body(resp).await;
    assert_eq!(finalized["excluded_as_in_pantry"], json!(["Egg"]));
    let items = finalized["shopping_list"].as_array().expect("items");
    assert_eq!(items.len(), 2);

    // Finalizing the same candidates again changes nothing
    let resp = client
        .post(format!("{base}/shopping-list/finalize"))
        .json(&json!({"ingredients": [{"name": "tomato"}]}))
        .send()
        .await
        .expect("Failed to finalize");
    let finalized = json_body(resp).await;
    assert_eq!(finalized["shopping_list"].as_array().map(Vec::len), Some(2));

    // Check one item off and finish the trip
    let item_id = finalized["shopping_list"][0]["id"]
        .as_str()
        .expect("item id");
    let resp = client
        .patch(format!("{base}/shopping-list/items/{item_id}"))
        .json(&json!({"checked": true}))
        .send()
        .await
        .expect("Failed to check item");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .post(format!("{base}/shopping-list/finish"))
        .send()
        .await
        .expect("Failed to finish trip");
    let trip = json_body(resp).await;
    assert_eq!(trip["added_to_pantry"], 1);
    assert_eq!(trip["cleared_items"], 2);

    let list = json_body(
        client
            .get(format!("{base}/shopping-list"))
            .send()
            .await
            .expect("Failed to get list"),
    )
    .await;
    assert_eq!(list["items"], json!([]));
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_unknown_shopping_item() {
    let client = signed_up_client().await;

    let resp = client
        .delete(format!("{}/shopping-list/items/missing", base_url()))
        .send()
        .await
        .expect("Failed to reach server");

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(resp).await["error"],
        "Shopping list item not found"
    );
}
