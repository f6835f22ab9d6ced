//! Shopping list items and consolidation.
//!
//! A user's shopping list is a single ordered collection of [`ShoppingItem`]s.
//! New candidates (manual entry, recipe ingredient lines, assistant output)
//! are merged into it with [`finalize_shopping_items`], which de-duplicates by
//! [`normalize_ingredient_name`] and drops anything already in the pantry.
//!
//! Both functions are pure: callers fetch the current list and pantry, call
//! in, and write the result back inside their own transaction.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// An item on a shopping list.
///
/// Identity is by `id`; merging is by normalized `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShoppingItem {
    /// Opaque identifier, generated when absent.
    #[serde(default = "generate_item_id")]
    pub id: String,
    /// Display name, trimmed and non-empty.
    pub name: String,
    /// Free-text amount (e.g. "2", "500").
    #[serde(default)]
    pub quantity: Option<String>,
    /// Free-text unit (e.g. "g", "cartons").
    #[serde(default)]
    pub unit: Option<String>,
    /// Free-text grouping label (e.g. "produce").
    #[serde(default)]
    pub category: Option<String>,
    /// Whether the item has been picked up.
    #[serde(default)]
    pub checked: bool,
}

impl ShoppingItem {
    /// Build a fresh, unchecked item from user-entered text.
    ///
    /// All values are trimmed and empty optional values become `None`.
    /// Returns `None` if the name is blank.
    #[must_use]
    pub fn new(
        name: &str,
        quantity: Option<&str>,
        unit: Option<&str>,
        category: Option<&str>,
    ) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        Some(Self {
            id: generate_item_id(),
            name: name.to_string(),
            quantity: optional_text(quantity),
            unit: optional_text(unit),
            category: optional_text(category),
            checked: false,
        })
    }

    /// The key this item is merged under.
    #[must_use]
    pub fn normalized_name(&self) -> String {
        normalize_ingredient_name(&self.name)
    }
}

fn generate_item_id() -> String {
    Uuid::new_v4().to_string()
}

/// A candidate record before validation.
///
/// Every field is optional so that loosely-shaped input (model output, old
/// rows, hand-written JSON) can be fed to [`finalize_shopping_items`], which
/// silently drops anything it cannot use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawItem {
    pub id: Option<String>,
    pub name: Option<String>,
    pub quantity: Option<String>,
    pub unit: Option<String>,
    pub category: Option<String>,
    pub checked: Option<bool>,
}

impl RawItem {
    /// Leniently read a candidate from arbitrary JSON.
    ///
    /// Returns `None` unless `value` is an object. Scalar field values are
    /// stringified, `null` counts as absent, a falsy `id` counts as absent,
    /// and `checked` follows JSON truthiness.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let text = |key: &str| object.get(key).and_then(stringify);

        Some(Self {
            id: object
                .get("id")
                .filter(|v| is_truthy(v))
                .and_then(stringify),
            name: text("name"),
            quantity: text("quantity"),
            unit: text("unit"),
            category: text("category"),
            checked: object.get("checked").map(is_truthy),
        })
    }

    /// Read every element of a JSON array, keeping invalid entries as empty
    /// records so they are filtered by consolidation rather than rejected.
    #[must_use]
    pub fn list_from_json(value: &Value) -> Vec<Self> {
        value
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .map(|item| Self::from_json(item).unwrap_or_default())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Validate and clean this candidate.
    ///
    /// Returns the normalized name together with the prepared item, or
    /// `None` if the name is missing or blank.
    fn prepare(&self) -> Option<(String, ShoppingItem)> {
        let name = self.name.as_deref()?.trim();
        if name.is_empty() {
            return None;
        }

        let normalized = normalize_ingredient_name(name);
        if normalized.is_empty() {
            return None;
        }

        let id = self
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(generate_item_id);

        Some((
            normalized,
            ShoppingItem {
                id,
                name: name.to_string(),
                quantity: optional_text(self.quantity.as_deref()),
                unit: optional_text(self.unit.as_deref()),
                category: optional_text(self.category.as_deref()),
                checked: self.checked.unwrap_or(false),
            },
        ))
    }
}

impl<'de> Deserialize<'de> for RawItem {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_json(&value).unwrap_or_default())
    }
}

impl From<&ShoppingItem> for RawItem {
    fn from(item: &ShoppingItem) -> Self {
        Self {
            id: Some(item.id.clone()),
            name: Some(item.name.clone()),
            quantity: item.quantity.clone(),
            unit: item.unit.clone(),
            category: item.category.clone(),
            checked: Some(item.checked),
        }
    }
}

fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Trim a free-text value, mapping blank or missing input to `None`.
#[must_use]
pub fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Canonical form of an ingredient name used as the merge and pantry key.
///
/// Lower-cases, collapses whitespace and passes every token through a naive
/// suffix-stripping singularizer. Never fails; blank input yields `""`.
#[must_use]
pub fn normalize_ingredient_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .map(singularize_token)
        .collect::<Vec<_>>()
        .join(" ")
}

// Rules are tried in order and the first match wins. The suffixes are ASCII,
// so slicing off their byte length always lands on a char boundary.
fn singularize_token(token: &str) -> String {
    let len = token.chars().count();

    if len <= 3 {
        return token.to_string();
    }
    if len > 4
        && let Some(stem) = token.strip_suffix("ies")
    {
        return format!("{stem}y");
    }
    if len > 4
        && let Some(stem) = token.strip_suffix("es")
    {
        return stem.to_string();
    }
    if !token.ends_with("ss")
        && let Some(stem) = token.strip_suffix('s')
    {
        return stem.to_string();
    }
    token.to_string()
}

/// Result of consolidating a shopping list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FinalizeOutcome {
    /// The new list, in first-occurrence order.
    pub items: Vec<ShoppingItem>,
    /// Display names dropped because the pantry already has them.
    pub excluded: Vec<String>,
}

/// Merge `existing` and `candidates` into a single de-duplicated list,
/// removing anything whose normalized name is in the pantry.
///
/// Items are walked as `existing` followed by `candidates`. When two items
/// share a normalized name, the later one's values win but the earlier
/// one's position is kept. Candidates without a usable name are skipped.
pub fn finalize_shopping_items<I>(
    existing: &[RawItem],
    pantry_names: I,
    candidates: &[RawItem],
) -> FinalizeOutcome
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let pantry: HashSet<String> = pantry_names
        .into_iter()
        .map(|name| normalize_ingredient_name(name.as_ref()))
        .filter(|name| !name.is_empty())
        .collect();

    let mut order: Vec<String> = Vec::new();
    let mut merged: HashMap<String, ShoppingItem> = HashMap::new();

    for (normalized, item) in existing.iter().chain(candidates).filter_map(RawItem::prepare) {
        if !merged.contains_key(&normalized) {
            order.push(normalized.clone());
        }
        merged.insert(normalized, item);
    }

    let mut outcome = FinalizeOutcome::default();
    for normalized in order {
        let Some(item) = merged.remove(&normalized) else {
            continue;
        };
        if pantry.contains(&normalized) {
            outcome.excluded.push(item.name);
        } else {
            outcome.items.push(item);
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw(value: Value) -> RawItem {
        RawItem::from_json(&value).expect("object")
    }

    fn names(items: &[ShoppingItem]) -> Vec<&str> {
        items.iter().map(|i| i.name.as_str()).collect()
    }

    // =========================================================================
    // Normalization
    // =========================================================================

    #[test]
    fn test_normalize_basic_examples() {
        assert_eq!(normalize_ingredient_name("  Tomatoes  "), "tomato");
        assert_eq!(normalize_ingredient_name("Green  Beans"), "green bean");
        assert_eq!(normalize_ingredient_name(""), "");
        assert_eq!(normalize_ingredient_name("   \t\n "), "");
    }

    #[test]
    fn test_singularize_rule_order() {
        // Short tokens are never touched.
        assert_eq!(normalize_ingredient_name("gas"), "gas");
        assert_eq!(normalize_ingredient_name("oats"), "oat");
        // "ies" only applies past four characters.
        assert_eq!(normalize_ingredient_name("berries"), "berry");
        assert_eq!(normalize_ingredient_name("pies"), "pie");
        // "es" before plain "s".
        assert_eq!(normalize_ingredient_name("potatoes"), "potato");
        assert_eq!(normalize_ingredient_name("boxes"), "box");
        // Double "s" is kept.
        assert_eq!(normalize_ingredient_name("swiss"), "swiss");
        assert_eq!(normalize_ingredient_name("glasses"), "glass");
        // Irregular plurals are mangled rather than fixed.
        assert_eq!(normalize_ingredient_name("series"), "sery");
    }

    #[test]
    fn test_normalize_collapses_mixed_whitespace() {
        assert_eq!(
            normalize_ingredient_name("Red\tBell \n Peppers"),
            "red bell pepper"
        );
    }

    #[test]
    fn test_normalize_is_stable_for_common_groceries() {
        let corpus = [
            "Tomatoes",
            "Green Beans",
            "eggs",
            "Strawberries",
            "Bananas",
            "onions",
            "Potatoes",
            "glasses",
            "Apples",
            "Brussels Sprouts",
            "chickpeas",
            "Avocados",
            "Radishes",
            "Baby Carrots",
            "rice",
            "Swiss Chard",
            "  Maple   Syrup ",
            "Peas",
            "Cherries",
            "Jalapeños",
        ];

        for name in corpus {
            let once = normalize_ingredient_name(name);
            assert_eq!(normalize_ingredient_name(&once), once, "input: {name}");
        }
    }

    #[test]
    fn test_normalize_single_pass_quirk() {
        // Stripping "es" can expose a bare "s"; a second pass strips again.
        // Only raw display names are ever normalized, so this is harmless.
        assert_eq!(normalize_ingredient_name("cheeses"), "chees");
        assert_eq!(normalize_ingredient_name("chees"), "che");
    }

    // =========================================================================
    // Candidate parsing
    // =========================================================================

    #[test]
    fn test_raw_item_from_json_rejects_non_objects() {
        assert!(RawItem::from_json(&json!("milk")).is_none());
        assert!(RawItem::from_json(&json!(42)).is_none());
        assert!(RawItem::from_json(&json!(null)).is_none());
        assert!(RawItem::from_json(&json!(["milk"])).is_none());
    }

    #[test]
    fn test_raw_item_from_json_stringifies_scalars() {
        let item = raw(json!({"id": 7, "name": "Flour", "quantity": 2.5, "unit": null, "checked": 1}));
        assert_eq!(item.id.as_deref(), Some("7"));
        assert_eq!(item.quantity.as_deref(), Some("2.5"));
        assert_eq!(item.unit, None);
        assert_eq!(item.checked, Some(true));
    }

    #[test]
    fn test_raw_item_falsy_id_is_absent() {
        assert_eq!(raw(json!({"id": "", "name": "a"})).id, None);
        assert_eq!(raw(json!({"id": 0, "name": "a"})).id, None);
    }

    #[test]
    fn test_raw_item_deserialize_is_lenient() {
        let items: Vec<RawItem> =
            serde_json::from_value(json!([{"name": "Milk"}, "junk", 3])).expect("deserialize");
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].name.as_deref(), Some("Milk"));
        assert_eq!(items[1], RawItem::default());
    }

    // =========================================================================
    // Consolidation
    // =========================================================================

    #[test]
    fn test_finalize_worked_example() {
        let existing = [
            raw(json!({"id": "1", "name": "Milk", "checked": false})),
            raw(json!({"id": "2", "name": "Eggs", "checked": false})),
        ];
        let pantry = ["egg"];
        let candidates = [
            raw(json!({"id": "3", "name": "milk", "quantity": "2", "unit": "cartons"})),
            raw(json!({"id": "4", "name": "Bananas"})),
        ];

        let outcome = finalize_shopping_items(&existing, pantry, &candidates);

        assert_eq!(names(&outcome.items), ["milk", "Bananas"]);
        assert_eq!(outcome.items[0].quantity.as_deref(), Some("2"));
        assert_eq!(outcome.items[0].unit.as_deref(), Some("cartons"));
        assert!(outcome.excluded.contains(&"Eggs".to_string()));
    }

    #[test]
    fn test_finalize_duplicates_keep_first_position_last_value() {
        let existing = [
            raw(json!({"id": "a", "name": "Onions"})),
            raw(json!({"id": "b", "name": "Garlic"})),
        ];
        let candidates = [
            raw(json!({"id": "c", "name": "onion", "quantity": "3", "checked": true})),
            raw(json!({"id": "d", "name": "GARLIC  "})),
            raw(json!({"id": "e", "name": "garlic", "unit": "cloves"})),
        ];

        let outcome = finalize_shopping_items(&existing, Vec::<String>::new(), &candidates);

        assert_eq!(outcome.items.len(), 2);
        assert_eq!(outcome.items[0].id, "c");
        assert_eq!(outcome.items[0].name, "onion");
        assert!(outcome.items[0].checked);
        assert_eq!(outcome.items[1].id, "e");
        assert_eq!(outcome.items[1].unit.as_deref(), Some("cloves"));
        assert!(outcome.excluded.is_empty());
    }

    #[test]
    fn test_finalize_drops_blank_names_silently() {
        let candidates = [
            raw(json!({"id": "1", "name": "   "})),
            raw(json!({"id": "2"})),
            raw(json!({"id": "3", "name": null})),
            RawItem::default(),
            raw(json!({"id": "4", "name": "Salt"})),
        ];

        let outcome = finalize_shopping_items(&[], ["   "], &candidates);

        assert_eq!(names(&outcome.items), ["Salt"]);
        assert!(outcome.excluded.is_empty());
    }

    #[test]
    fn test_finalize_pantry_match_is_normalized() {
        let candidates = [raw(json!({"name": "Tomato", "quantity": "6"}))];

        let outcome = finalize_shopping_items(&[], ["tomatoes"], &candidates);

        assert!(outcome.items.is_empty());
        assert_eq!(outcome.excluded, ["Tomato"]);
    }

    #[test]
    fn test_finalize_empty_inputs() {
        let outcome = finalize_shopping_items(&[], Vec::<&str>::new(), &[]);
        assert_eq!(outcome, FinalizeOutcome::default());
    }

    #[test]
    fn test_finalize_cleans_fields_and_generates_ids() {
        let candidates = [raw(json!({
            "name": "  Butter ",
            "quantity": "  ",
            "unit": " g ",
            "category": "dairy",
        }))];

        let outcome = finalize_shopping_items(&[], Vec::<String>::new(), &candidates);
        let item = &outcome.items[0];

        assert_eq!(item.name, "Butter");
        assert_eq!(item.quantity, None);
        assert_eq!(item.unit.as_deref(), Some("g"));
        assert_eq!(item.category.as_deref(), Some("dairy"));
        assert!(!item.checked);
        assert!(Uuid::parse_str(&item.id).is_ok());
    }

    #[test]
    fn test_finalize_reuses_persisted_items() {
        let stored = ShoppingItem::new("Lemons", Some("4"), None, Some("produce")).expect("item");
        let existing = [RawItem::from(&stored)];
        let candidates = [raw(json!({"name": "Limes"}))];

        let outcome = finalize_shopping_items(&existing, Vec::<String>::new(), &candidates);

        assert_eq!(outcome.items[0], stored);
        assert_eq!(names(&outcome.items), ["Lemons", "Limes"]);
    }

    #[test]
    fn test_shopping_item_new_rejects_blank_name() {
        assert!(ShoppingItem::new("  ", None, None, None).is_none());
        let item = ShoppingItem::new(" Kale ", Some(""), Some(" bunch "), None).expect("item");
        assert_eq!(item.name, "Kale");
        assert_eq!(item.quantity, None);
        assert_eq!(item.unit.as_deref(), Some("bunch"));
    }

    #[test]
    fn test_shopping_item_deserialize_defaults() {
        let item: ShoppingItem = serde_json::from_value(json!({"name": "Yeast"})).expect("item");
        assert!(!item.checked);
        assert!(Uuid::parse_str(&item.id).is_ok());
    }
}
