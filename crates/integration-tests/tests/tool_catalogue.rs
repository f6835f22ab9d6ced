//! Integration tests for the assistant's tool catalogue.
//!
//! These run without a database or API key.

use larder_server::claude::larder_tools;
use larder_server::claude::tools::get_tool_by_name;

#[test]
fn test_tool_names() {
    let names: Vec<String> = larder_tools().into_iter().map(|t| t.name).collect();
    assert_eq!(
        names,
        [
            "save_recipe",
            "search_recipes",
            "add_pantry_item",
            "remove_pantry_item",
            "get_pantry",
            "get_shopping_list",
            "add_to_shopping_list",
        ]
    );
}

#[test]
fn test_every_schema_is_an_object() {
    for tool in larder_tools() {
        assert_eq!(
            tool.input_schema["type"], "object",
            "{} should take an object",
            tool.name
        );
        assert!(
            tool.input_schema["properties"].is_object(),
            "{} should declare properties",
            tool.name
        );
        assert!(!tool.description.is_empty(), "{} needs a description", tool.name);
    }
}

#[test]
fn test_required_fields() {
    let save = get_tool_by_name("save_recipe").expect("save_recipe should exist");
    assert_eq!(
        save.input_schema["required"],
        serde_json::json!(["name", "ingredients"])
    );

    let add = get_tool_by_name("add_to_shopping_list").expect("add_to_shopping_list should exist");
    assert_eq!(add.input_schema["required"], serde_json::json!(["items"]));
}

#[test]
fn test_unknown_tool() {
    assert!(get_tool_by_name("delete_everything").is_none());
}

#[test]
fn test_tools_serialize_for_the_api() {
    let json = serde_json::to_value(larder_tools()).expect("serialize");
    let first = &json[0];
    assert!(first.get("name").is_some());
    assert!(first.get("description").is_some());
    assert!(first.get("input_schema").is_some());
}
