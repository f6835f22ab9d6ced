//! Kitchen tools for the meal-planning assistant.
//!
//! Each tool reads or writes the current user's recipes, pantry or shopping
//! list. Results are plain text for the model to read back to the user.

mod executor;

pub(crate) use executor::{parse_ingredients, parse_minutes, text_field};

use serde_json::json;
use sqlx::PgPool;
use tracing::instrument;

use larder_core::UserId;

use super::error::ClaudeError;
use super::types::Tool;

/// Get the tools available to the assistant.
#[must_use]
pub fn larder_tools() -> Vec<Tool> {
    let line_schema = json!({
        "type": "object",
        "properties": {
            "name": { "type": "string" },
            "quantity": { "type": "string", "description": "Amount, e.g. \"2\" or \"500\"" },
            "unit": { "type": "string", "description": "Unit of measure, e.g. \"g\" or \"cups\"" }
        },
        "required": ["name"]
    });

    vec![
        Tool {
            name: "save_recipe".to_string(),
            description: "Save a recipe to the user's collection.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Recipe name" },
                    "description": { "type": "string", "description": "Short description of the dish" },
                    "ingredients": {
                        "type": "array",
                        "description": "Ingredient list",
                        "items": line_schema
                    },
                    "prep_time_minutes": { "type": "integer", "description": "Estimated prep/cook time in minutes" },
                    "instructions": { "type": "string", "description": "Step-by-step cooking instructions" },
                    "source": { "type": "string", "description": "Where the recipe came from (default \"AI generated\")" },
                    "favourite": { "type": "boolean", "description": "Whether the recipe should be starred" },
                    "category": { "type": "string", "description": "Recipe category like dinner, breakfast, dessert" }
                },
                "required": ["name", "ingredients"]
            }),
        },
        Tool {
            name: "search_recipes".to_string(),
            description: "Search the user's saved recipes by name or ingredient. Returns recipe names with prep time and category.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Text to look for in recipe names and ingredients. Omit to list all recipes." }
                }
            }),
        },
        Tool {
            name: "add_pantry_item".to_string(),
            description: "Add an ingredient to the user's household pantry.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Ingredient name" },
                    "quantity": { "type": "string", "description": "Amount (e.g. \"2\", \"500\")" },
                    "unit": { "type": "string", "description": "Unit of measure (e.g. \"lbs\", \"g\", \"cups\")" },
                    "category": { "type": "string", "description": "Category like produce, dairy, meat, etc." }
                },
                "required": ["name"]
            }),
        },
        Tool {
            name: "remove_pantry_item".to_string(),
            description: "Remove an ingredient from the user's household pantry. Removes every item whose name contains the given text.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Ingredient name to remove" }
                },
                "required": ["name"]
            }),
        },
        Tool {
            name: "get_pantry".to_string(),
            description: "Get all ingredients currently in the user's household pantry.".to_string(),
            input_schema: json!({ "type": "object", "properties": {} }),
        },
        Tool {
            name: "get_shopping_list".to_string(),
            description: "Get the items on the user's shopping list.".to_string(),
            input_schema: json!({ "type": "object", "properties": {} }),
        },
        Tool {
            name: "add_to_shopping_list".to_string(),
            description: "Add items to the user's shopping list. Duplicates are merged and anything already in the pantry is skipped.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "items": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": { "type": "string" },
                                "quantity": { "type": "string" },
                                "unit": { "type": "string" },
                                "category": { "type": "string" }
                            },
                            "required": ["name"]
                        }
                    }
                },
                "required": ["items"]
            }),
        },
    ]
}

/// Get a tool by name.
#[must_use]
pub fn get_tool_by_name(name: &str) -> Option<Tool> {
    larder_tools().into_iter().find(|t| t.name == name)
}

/// Executor for kitchen tools, bound to one user.
pub struct ToolExecutor<'a> {
    pool: &'a PgPool,
    user_id: UserId,
}

impl<'a> ToolExecutor<'a> {
    /// Create a new tool executor for `user_id`.
    #[must_use]
    pub const fn new(pool: &'a PgPool, user_id: UserId) -> Self {
        Self { pool, user_id }
    }

    /// Execute a tool and return the result as text.
    ///
    /// # Errors
    ///
    /// Returns `ClaudeError::ToolExecution` for unknown tools, invalid input
    /// or failed database operations.
    #[instrument(skip(self, input), fields(tool_name = %name, user_id = %self.user_id))]
    pub async fn execute(&self, name: &str, input: &serde_json::Value) -> Result<String, ClaudeError> {
        match name {
            "save_recipe" => self.save_recipe(input).await,
            "search_recipes" => self.search_recipes(input).await,
            "add_pantry_item" => self.add_pantry_item(input).await,
            "remove_pantry_item" => self.remove_pantry_item(input).await,
            "get_pantry" => self.get_pantry().await,
            "get_shopping_list" => self.get_shopping_list().await,
            "add_to_shopping_list" => self.add_to_shopping_list(input).await,
            _ => Err(ClaudeError::ToolExecution(format!("Unknown tool: {name}"))),
        }
    }
}
