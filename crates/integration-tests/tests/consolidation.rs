//! Integration tests for shopping list consolidation.
//!
//! Candidates arrive the way the HTTP layer sees them: as loose JSON.

use larder_core::{RawItem, ShoppingItem, finalize_shopping_items};
use larder_server::services::ShoppingItemPatch;
use serde_json::json;

fn names(items: &[ShoppingItem]) -> Vec<&str> {
    items.iter().map(|i| i.name.as_str()).collect()
}

#[test]
fn test_week_plan_merges_into_existing_list() {
    let existing = RawItem::list_from_json(&json!([
        {"id": "a", "name": "Tomatoes", "quantity": "4", "checked": true},
        {"id": "b", "name": "Rice", "quantity": "1", "unit": "kg"}
    ]));
    let candidates = RawItem::list_from_json(&json!([
        {"name": "tomato", "quantity": "6"},
        {"name": "Eggs", "quantity": 12},
        {"name": "  Red   Onions ", "category": "veg"},
        {"name": "Olive oil"}
    ]));
    let pantry = ["egg", "Olive Oil"];

    let outcome = finalize_shopping_items(&existing, pantry, &candidates);

    assert_eq!(names(&outcome.items), ["tomato", "Rice", "Red   Onions"]);
    assert_eq!(outcome.excluded, ["Eggs", "Olive oil"]);

    // Later values win, the first position is kept
    let tomato = &outcome.items[0];
    assert_eq!(tomato.quantity.as_deref(), Some("6"));
    assert!(!tomato.checked);
    assert_ne!(tomato.id, "a");

    let rice = &outcome.items[1];
    assert_eq!(rice.id, "b");
    assert_eq!(rice.unit.as_deref(), Some("kg"));
}

#[test]
fn test_unusable_candidates_are_dropped() {
    let candidates = RawItem::list_from_json(&json!([
        {"name": ""},
        {"name": null, "quantity": "2"},
        {"quantity": "1"},
        "flour",
        42,
        {"name": "Flour", "quantity": "500", "unit": "g"}
    ]));

    let outcome = finalize_shopping_items(&[], Vec::<String>::new(), &candidates);

    assert_eq!(names(&outcome.items), ["Flour"]);
    assert!(outcome.excluded.is_empty());
}

#[test]
fn test_consolidating_twice_is_stable() {
    let candidates = RawItem::list_from_json(&json!([
        {"name": "Berries"},
        {"name": "berry", "quantity": "2"}
    ]));

    let first = finalize_shopping_items(&[], Vec::<String>::new(), &candidates);
    let existing: Vec<RawItem> = first.items.iter().map(RawItem::from).collect();
    let second = finalize_shopping_items(&existing, Vec::<String>::new(), &[]);

    assert_eq!(first.items, second.items);
    assert_eq!(names(&second.items), ["berry"]);
}

#[test]
fn test_patch_then_reconsolidate() {
    let candidates = RawItem::list_from_json(&json!([{"name": "Milk"}, {"name": "Bread"}]));
    let mut items = finalize_shopping_items(&[], Vec::<String>::new(), &candidates).items;

    let patch: ShoppingItemPatch =
        serde_json::from_value(json!({"checked": true, "quantity": " 2 "})).expect("patch");
    patch.apply(&mut items[0]).expect("apply");

    let existing: Vec<RawItem> = items.iter().map(RawItem::from).collect();
    let outcome = finalize_shopping_items(&existing, ["bread"], &[]);

    assert_eq!(names(&outcome.items), ["Milk"]);
    assert!(outcome.items[0].checked);
    assert_eq!(outcome.items[0].quantity.as_deref(), Some("2"));
    assert_eq!(outcome.excluded, ["Bread"]);
}
