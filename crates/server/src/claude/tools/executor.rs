//! Tool executor implementations.
//!
//! Each tool maps to a repository or service call scoped to the executor's
//! user and renders its result as short text.

use std::collections::HashSet;
use std::fmt::Write as _;

use serde_json::Value;

use larder_core::{RawItem, ShoppingItem, normalize_ingredient_name, shopping::optional_text};

use crate::claude::error::ClaudeError;
use crate::db::{PantryRepository, RecipeRepository};
use crate::models::{IngredientLine, NewPantryItem, NewRecipe, PantryItem, Recipe, RecipeQuery};
use crate::services::ShoppingListService;

use super::ToolExecutor;

const DEFAULT_RECIPE_SOURCE: &str = "AI generated";

impl ToolExecutor<'_> {
    // -------------------------------------------------------------------------
    // Recipes
    // -------------------------------------------------------------------------

    pub(super) async fn save_recipe(&self, input: &Value) -> Result<String, ClaudeError> {
        let recipe = parse_new_recipe(input)?;

        RecipeRepository::new(self.pool)
            .create(self.user_id, &recipe)
            .await
            .map_err(|e| ClaudeError::ToolExecution(format!("Failed to save recipe: {e}")))?;

        Ok(format!("Recipe '{}' saved successfully.", recipe.name))
    }

    pub(super) async fn search_recipes(&self, input: &Value) -> Result<String, ClaudeError> {
        let query = text_field(input, "query");

        let recipes = RecipeRepository::new(self.pool)
            .list(self.user_id, &RecipeQuery::default())
            .await
            .map_err(|e| ClaudeError::ToolExecution(format!("Failed to search recipes: {e}")))?;

        Ok(format_recipe_matches(&recipes, query.as_deref()))
    }

    // -------------------------------------------------------------------------
    // Pantry
    // -------------------------------------------------------------------------

    pub(super) async fn add_pantry_item(&self, input: &Value) -> Result<String, ClaudeError> {
        let item = parse_new_pantry_item(input)?;

        PantryRepository::new(self.pool)
            .create(self.user_id, &item)
            .await
            .map_err(|e| ClaudeError::ToolExecution(format!("Failed to add pantry item: {e}")))?;

        Ok(format!("Added '{}' to pantry.", item.name))
    }

    pub(super) async fn remove_pantry_item(&self, input: &Value) -> Result<String, ClaudeError> {
        let name = required_text(input, "name")?;

        let removed = PantryRepository::new(self.pool)
            .delete_matching(self.user_id, &name)
            .await
            .map_err(|e| {
                ClaudeError::ToolExecution(format!("Failed to remove pantry item: {e}"))
            })?;

        if removed == 0 {
            return Ok(format!("No pantry item matching '{name}' found."));
        }

        Ok(format!(
            "Removed {removed} item(s) matching '{name}' from pantry."
        ))
    }

    pub(super) async fn get_pantry(&self) -> Result<String, ClaudeError> {
        let items = PantryRepository::new(self.pool)
            .list(self.user_id)
            .await
            .map_err(|e| ClaudeError::ToolExecution(format!("Failed to load pantry: {e}")))?;

        Ok(format_pantry(&items))
    }

    // -------------------------------------------------------------------------
    // Shopping list
    // -------------------------------------------------------------------------

    pub(super) async fn get_shopping_list(&self) -> Result<String, ClaudeError> {
        let list = ShoppingListService::new(self.pool)
            .get(self.user_id)
            .await
            .map_err(|e| {
                ClaudeError::ToolExecution(format!("Failed to load shopping list: {e}"))
            })?;

        Ok(format_shopping_list(&list.items))
    }

    pub(super) async fn add_to_shopping_list(&self, input: &Value) -> Result<String, ClaudeError> {
        let candidates = RawItem::list_from_json(&input["items"]);
        if candidates.is_empty() {
            return Err(ClaudeError::ToolExecution(
                "Missing required field: items".to_string(),
            ));
        }

        let finalized = ShoppingListService::new(self.pool)
            .finalize(self.user_id, &candidates)
            .await
            .map_err(|e| {
                ClaudeError::ToolExecution(format!("Failed to update shopping list: {e}"))
            })?;

        Ok(format_shopping_update(
            &candidates,
            &finalized.shopping_list,
            &finalized.excluded_as_in_pantry,
        ))
    }
}

// =============================================================================
// Input parsing
// =============================================================================

/// A trimmed, non-empty text value. Numbers are accepted as text.
pub(crate) fn text_field(input: &Value, key: &str) -> Option<String> {
    match input.get(key)? {
        Value::String(s) => optional_text(Some(s)),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn required_text(input: &Value, key: &str) -> Result<String, ClaudeError> {
    text_field(input, key)
        .ok_or_else(|| ClaudeError::ToolExecution(format!("Missing required field: {key}")))
}

/// Ingredient lines from an array, or from a JSON string holding one.
///
/// A string that is not JSON becomes a single line named after it.
pub(crate) fn parse_ingredients(value: &Value) -> Vec<IngredientLine> {
    match value {
        Value::Array(items) => items.iter().filter_map(IngredientLine::from_json).collect(),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(parsed @ Value::Array(_)) => parse_ingredients(&parsed),
            _ => optional_text(Some(text))
                .map(|name| {
                    vec![IngredientLine {
                        name,
                        quantity: String::new(),
                        unit: String::new(),
                    }]
                })
                .unwrap_or_default(),
        },
        _ => Vec::new(),
    }
}

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn parse_minutes(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .and_then(|m| i32::try_from(m).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_new_recipe(input: &Value) -> Result<NewRecipe, ClaudeError> {
    Ok(NewRecipe {
        name: required_text(input, "name")?,
        description: text_field(input, "description"),
        ingredients: parse_ingredients(&input["ingredients"]),
        prep_time_minutes: parse_minutes(&input["prep_time_minutes"]),
        instructions: text_field(input, "instructions"),
        source: text_field(input, "source").or_else(|| Some(DEFAULT_RECIPE_SOURCE.to_string())),
        favourite: input["favourite"].as_bool().unwrap_or(false),
        category: text_field(input, "category"),
    })
}

fn parse_new_pantry_item(input: &Value) -> Result<NewPantryItem, ClaudeError> {
    Ok(NewPantryItem {
        name: required_text(input, "name")?,
        quantity: text_field(input, "quantity"),
        unit: text_field(input, "unit"),
        category: text_field(input, "category"),
    })
}

// =============================================================================
// Output formatting
// =============================================================================

/// "2 g" / "2" / "g" / "" depending on what is known.
fn amount(quantity: Option<&str>, unit: Option<&str>) -> String {
    [quantity, unit]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_pantry(items: &[PantryItem]) -> String {
    if items.is_empty() {
        return "Pantry is empty.".to_string();
    }

    let mut out = String::from("Current pantry:");
    for item in items {
        let _ = write!(out, "\n- {}", item.name);
        let amount = amount(item.quantity.as_deref(), item.unit.as_deref());
        if !amount.is_empty() {
            let _ = write!(out, ": {amount}");
        }
        if let Some(category) = &item.category {
            let _ = write!(out, " ({category})");
        }
    }
    out
}

fn format_shopping_list(items: &[ShoppingItem]) -> String {
    if items.is_empty() {
        return "Shopping list is empty.".to_string();
    }

    let mut out = String::from("Shopping list:");
    for item in items {
        let mark = if item.checked { "x" } else { " " };
        let _ = write!(out, "\n- [{mark}] {}", item.name);
        let amount = amount(item.quantity.as_deref(), item.unit.as_deref());
        if !amount.is_empty() {
            let _ = write!(out, ": {amount}");
        }
    }
    out
}

/// Report which requested items landed on the list and which the pantry
/// already covers.
fn format_shopping_update(
    candidates: &[RawItem],
    list: &[ShoppingItem],
    excluded: &[String],
) -> String {
    let requested: HashSet<String> = candidates
        .iter()
        .filter_map(|item| item.name.as_deref())
        .map(normalize_ingredient_name)
        .filter(|name| !name.is_empty())
        .collect();

    let added: Vec<&str> = list
        .iter()
        .filter(|item| requested.contains(&item.normalized_name()))
        .map(|item| item.name.as_str())
        .collect();

    let mut out = if added.is_empty() {
        "Nothing was added to the shopping list.".to_string()
    } else {
        format!("Added to shopping list: {}.", added.join(", "))
    };
    if !excluded.is_empty() {
        let _ = write!(
            out,
            " Skipped because they are already in the pantry: {}.",
            excluded.join(", ")
        );
    }
    let _ = write!(out, " Shopping list now has {} item(s).", list.len());
    out
}

fn recipe_matches(recipe: &Recipe, needle: &str) -> bool {
    recipe.name.to_lowercase().contains(needle)
        || recipe
            .ingredients
            .iter()
            .any(|line| line.name.to_lowercase().contains(needle))
}

fn format_recipe_matches(recipes: &[Recipe], query: Option<&str>) -> String {
    let needle = query.map(str::to_lowercase);
    let matches: Vec<&Recipe> = recipes
        .iter()
        .filter(|recipe| needle.as_deref().is_none_or(|n| recipe_matches(recipe, n)))
        .collect();

    if matches.is_empty() {
        return query.map_or_else(
            || "No saved recipes.".to_string(),
            |q| format!("No saved recipes match '{q}'."),
        );
    }

    let mut out = String::from("Saved recipes:");
    for recipe in matches {
        let _ = write!(out, "\n- {}", recipe.name);
        let details: Vec<String> = recipe
            .prep_time_minutes
            .map(|m| format!("{m} min"))
            .into_iter()
            .chain(recipe.category.clone())
            .collect();
        if !details.is_empty() {
            let _ = write!(out, " ({})", details.join(", "));
        }
    }
    out
}
