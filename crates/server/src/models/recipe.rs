//! Recipe domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use larder_core::{RawItem, RecipeId, UserId};

/// A saved recipe.
#[derive(Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: RecipeId,
    #[serde(skip)]
    pub user_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub ingredients: Vec<IngredientLine>,
    pub prep_time_minutes: Option<i32>,
    pub instructions: Option<String>,
    pub source: Option<String>,
    pub favourite: bool,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Recipe {
    /// The recipe's ingredient lines as shopping list candidates.
    #[must_use]
    pub fn shopping_candidates(&self) -> Vec<RawItem> {
        self.ingredients
            .iter()
            .map(|line| RawItem {
                name: Some(line.name.clone()),
                quantity: Some(line.quantity.clone()),
                unit: Some(line.unit.clone()),
                ..RawItem::default()
            })
            .collect()
    }
}

/// One ingredient line of a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientLine {
    pub name: String,
    #[serde(default)]
    pub quantity: String,
    #[serde(default)]
    pub unit: String,
}

impl IngredientLine {
    /// Leniently read an ingredient line from model output.
    ///
    /// Numbers are accepted for `quantity`; entries without a name are
    /// rejected.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let raw = RawItem::from_json(value)?;
        let name = raw.name.filter(|name| !name.trim().is_empty())?;

        Some(Self {
            name,
            quantity: raw.quantity.unwrap_or_default(),
            unit: raw.unit.unwrap_or_default(),
        })
    }
}

/// A recipe to insert.
///
/// Also the shape of extracted recipe drafts, so a draft can be posted back
/// unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecipe {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub ingredients: Vec<IngredientLine>,
    #[serde(default)]
    pub prep_time_minutes: Option<i32>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub favourite: bool,
    #[serde(default)]
    pub category: Option<String>,
}

/// Partial recipe update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub ingredients: Option<Vec<IngredientLine>>,
    pub prep_time_minutes: Option<i32>,
    pub instructions: Option<String>,
    pub source: Option<String>,
    pub favourite: Option<bool>,
    pub category: Option<String>,
}

/// Column a recipe listing is sorted by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecipeSort {
    Name,
    PrepTime,
    #[default]
    CreatedAt,
    Source,
}

impl RecipeSort {
    /// Parse a `sort_by` query value. Unknown or missing values sort by
    /// creation time.
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("name") => Self::Name,
            Some("prep_time_minutes") => Self::PrepTime,
            Some("source") => Self::Source,
            _ => Self::CreatedAt,
        }
    }

    /// The SQL column for this sort.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::PrepTime => "prep_time_minutes",
            Self::CreatedAt => "created_at",
            Self::Source => "source",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// The SQL keyword for this direction.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Filters and ordering for a recipe listing.
#[derive(Debug, Clone, Default)]
pub struct RecipeQuery {
    pub sort: RecipeSort,
    pub order: SortOrder,
    /// Case-insensitive substring matched against the ingredient list.
    pub ingredient: Option<String>,
    pub favourite: Option<bool>,
    pub category: Option<String>,
    /// Case-insensitive substring matched against the recipe name.
    pub name: Option<String>,
}
