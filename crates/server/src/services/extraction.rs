//! Structured extraction with Claude.
//!
//! Turns a chat transcript or a photo into recipe or pantry drafts. Drafts
//! are returned to the caller for review and are never saved here.

use askama::Template;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::Value;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument, warn};

use larder_core::UserId;

use crate::claude::tools::{parse_ingredients, parse_minutes, text_field};
use crate::claude::{ClaudeClient, ClaudeError, ContentBlock, Message};
use crate::db::{PantryRepository, RecipeRepository, RepositoryError};
use crate::models::{NewPantryItem, NewRecipe};

/// Largest accepted upload.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Image types Claude accepts.
const SUPPORTED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Errors that can occur during extraction.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Claude API error.
    #[error("Claude API error: {0}")]
    Claude(#[from] ClaudeError),

    /// The model's reply was not the JSON we asked for.
    #[error("could not parse model output: {0}")]
    Parse(String),

    /// The upload is not an accepted image type.
    #[error("unsupported image type: {0}")]
    UnsupportedImageType(String),

    /// The upload exceeds [`MAX_IMAGE_BYTES`].
    #[error("image is larger than 10 MB")]
    ImageTooLarge,

    /// The upload was empty.
    #[error("image is empty")]
    EmptyImage,

    /// A prompt template failed to render.
    #[error("prompt rendering failed: {0}")]
    Prompt(#[from] askama::Error),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

#[derive(Template)]
#[template(path = "prompts/recipe_transcript.txt")]
struct RecipeTranscriptPrompt<'a> {
    categories: &'a [String],
    transcript: &'a str,
}

#[derive(Template)]
#[template(path = "prompts/recipe_photo.txt")]
struct RecipePhotoPrompt<'a> {
    categories: &'a [String],
}

#[derive(Template)]
#[template(path = "prompts/ingredient_photo.txt")]
struct IngredientPhotoPrompt<'a> {
    categories: &'a [String],
}

/// Extraction service.
pub struct ExtractionService<'a> {
    pool: &'a PgPool,
    claude: &'a ClaudeClient,
}

impl<'a> ExtractionService<'a> {
    /// Create a new extraction service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, claude: &'a ClaudeClient) -> Self {
        Self { pool, claude }
    }

    /// Extract the recipes discussed in a chat transcript.
    ///
    /// # Errors
    ///
    /// Returns `ExtractionError::Claude` if the API call fails, or
    /// `ExtractionError::Parse` if the reply is not JSON.
    #[instrument(skip(self, transcript), fields(user_id = %user_id))]
    pub async fn recipes_from_transcript(
        &self,
        user_id: UserId,
        transcript: &str,
    ) -> Result<Vec<NewRecipe>, ExtractionError> {
        let categories = RecipeRepository::new(self.pool).categories(user_id).await?;
        let prompt = RecipeTranscriptPrompt {
            categories: &categories,
            transcript,
        }
        .render()?;

        let reply = self.ask(vec![ContentBlock::text(prompt)]).await?;
        let recipes = recipe_drafts(&reply)?;

        info!(count = recipes.len(), "recipes extracted from chat");
        Ok(recipes)
    }

    /// Extract the recipes visible in a photo.
    ///
    /// # Errors
    ///
    /// Returns an image validation error for unusable uploads,
    /// `ExtractionError::Claude` if the API call fails, or
    /// `ExtractionError::Parse` if the reply is not JSON.
    #[instrument(skip(self, image), fields(user_id = %user_id, bytes = image.len()))]
    pub async fn recipes_from_photo(
        &self,
        user_id: UserId,
        content_type: Option<&str>,
        image: &[u8],
    ) -> Result<Vec<NewRecipe>, ExtractionError> {
        let media_type = validate_image(content_type, image)?;
        let categories = RecipeRepository::new(self.pool).categories(user_id).await?;
        let prompt = RecipePhotoPrompt {
            categories: &categories,
        }
        .render()?;

        let reply = self
            .ask(vec![
                ContentBlock::base64_image(media_type, STANDARD.encode(image)),
                ContentBlock::text(prompt),
            ])
            .await?;
        let recipes = recipe_drafts(&reply)?;

        info!(count = recipes.len(), "recipes extracted from photo");
        Ok(recipes)
    }

    /// Extract pantry ingredients from a photo of labels, a list, a receipt
    /// or shelves.
    ///
    /// # Errors
    ///
    /// Returns an image validation error for unusable uploads,
    /// `ExtractionError::Claude` if the API call fails, or
    /// `ExtractionError::Parse` if the reply is not JSON.
    #[instrument(skip(self, image), fields(user_id = %user_id, bytes = image.len()))]
    pub async fn ingredients_from_photo(
        &self,
        user_id: UserId,
        content_type: Option<&str>,
        image: &[u8],
    ) -> Result<Vec<NewPantryItem>, ExtractionError> {
        let media_type = validate_image(content_type, image)?;
        let categories = PantryRepository::new(self.pool).categories(user_id).await?;
        let prompt = IngredientPhotoPrompt {
            categories: &categories,
        }
        .render()?;

        let reply = self
            .ask(vec![
                ContentBlock::base64_image(media_type, STANDARD.encode(image)),
                ContentBlock::text(prompt),
            ])
            .await?;
        let ingredients = pantry_drafts(&reply)?;

        info!(count = ingredients.len(), "ingredients extracted from photo");
        Ok(ingredients)
    }

    async fn ask(&self, blocks: Vec<ContentBlock>) -> Result<String, ExtractionError> {
        let response = self
            .claude
            .chat(vec![Message::user(blocks)], None, None)
            .await?;
        Ok(response.text())
    }
}

/// Check an upload and return its canonical media type.
///
/// # Errors
///
/// Returns `ExtractionError::EmptyImage`, `ExtractionError::ImageTooLarge`
/// or `ExtractionError::UnsupportedImageType`.
pub fn validate_image(
    content_type: Option<&str>,
    image: &[u8],
) -> Result<&'static str, ExtractionError> {
    if image.is_empty() {
        return Err(ExtractionError::EmptyImage);
    }
    if image.len() > MAX_IMAGE_BYTES {
        return Err(ExtractionError::ImageTooLarge);
    }

    let declared = content_type
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase())
        .unwrap_or_default();
    let declared = if declared == "image/jpg" {
        "image/jpeg".to_string()
    } else {
        declared
    };

    SUPPORTED_IMAGE_TYPES
        .into_iter()
        .find(|supported| *supported == declared)
        .ok_or(ExtractionError::UnsupportedImageType(declared))
}

/// Remove a Markdown code fence around the model's JSON.
///
/// Drops a leading fence line, a trailing fence line and a leading `json`
/// language tag. Text that does not start with a fence is only trimmed.
fn strip_code_fences(text: &str) -> String {
    let content = text.trim();
    if !content.starts_with("```") {
        return content.to_string();
    }

    let mut lines: Vec<&str> = content.lines().collect();
    if lines.first().is_some_and(|line| line.starts_with("```")) {
        lines.remove(0);
    }
    if lines.last().is_some_and(|line| line.trim() == "```") {
        lines.pop();
    }

    let joined = lines.join("\n");
    let joined = joined.trim();
    match joined.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => {
            joined.get(4..).unwrap_or_default().trim().to_string()
        }
        _ => joined.to_string(),
    }
}

/// The array under `key` in the model's reply. Anything else is empty.
fn payload_list(reply: &str, key: &str) -> Result<Vec<Value>, ExtractionError> {
    let content = strip_code_fences(reply);
    let data: Value = serde_json::from_str(&content).map_err(|e| {
        warn!(error = %e, "model reply is not JSON");
        ExtractionError::Parse(e.to_string())
    })?;

    match data.get(key) {
        Some(Value::Array(items)) => Ok(items.clone()),
        _ => Ok(Vec::new()),
    }
}

fn recipe_drafts(reply: &str) -> Result<Vec<NewRecipe>, ExtractionError> {
    Ok(payload_list(reply, "recipes")?
        .iter()
        .filter_map(recipe_draft)
        .collect())
}

fn recipe_draft(value: &Value) -> Option<NewRecipe> {
    Some(NewRecipe {
        name: text_field(value, "name")?,
        description: text_field(value, "description"),
        ingredients: value
            .get("ingredients")
            .map(parse_ingredients)
            .unwrap_or_default(),
        prep_time_minutes: value.get("prep_time_minutes").and_then(parse_minutes),
        instructions: text_field(value, "instructions"),
        source: text_field(value, "source"),
        favourite: value
            .get("favourite")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        category: text_field(value, "category"),
    })
}

fn pantry_drafts(reply: &str) -> Result<Vec<NewPantryItem>, ExtractionError> {
    Ok(payload_list(reply, "ingredients")?
        .iter()
        .filter_map(|value| {
            Some(NewPantryItem {
                name: text_field(value, "name")?,
                quantity: text_field(value, "quantity"),
                unit: text_field(value, "unit"),
                category: text_field(value, "category"),
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences_with_language_tag() {
        let reply = "```json\n{\"recipes\": []}\n```";
        assert_eq!(strip_code_fences(reply), "{\"recipes\": []}");
    }

    #[test]
    fn test_strip_code_fences_tag_on_own_line() {
        let reply = "```\nJSON\n{\"recipes\": []}\n```\n";
        assert_eq!(strip_code_fences(reply), "{\"recipes\": []}");
    }

    #[test]
    fn test_strip_code_fences_plain_json_untouched() {
        assert_eq!(strip_code_fences("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_code_fences_unclosed() {
        assert_eq!(strip_code_fences("```json\n[1, 2]"), "[1, 2]");
    }

    #[test]
    fn test_recipe_drafts_lenient_fields() {
        let reply = r#"```json
{"recipes": [
  {"name": " Shakshuka ", "ingredients": [{"name": "Eggs", "quantity": 4}, {"quantity": "1"}],
   "prep_time_minutes": "30", "favourite": true, "category": "brunch", "source": ""},
  {"name": "", "ingredients": [{"name": "Salt"}]},
  {"ingredients": []}
]}
```"#;

        let recipes = recipe_drafts(reply).expect("parse");
        assert_eq!(recipes.len(), 1);

        let recipe = &recipes[0];
        assert_eq!(recipe.name, "Shakshuka");
        assert_eq!(recipe.ingredients.len(), 1);
        assert_eq!(recipe.ingredients[0].quantity, "4");
        assert_eq!(recipe.prep_time_minutes, Some(30));
        assert!(recipe.favourite);
        assert_eq!(recipe.category.as_deref(), Some("brunch"));
        assert_eq!(recipe.source, None);
    }

    #[test]
    fn test_recipe_drafts_non_list_is_empty() {
        assert!(recipe_drafts(r#"{"recipes": "none"}"#).expect("parse").is_empty());
        assert!(recipe_drafts(r#"{"other": []}"#).expect("parse").is_empty());
    }

    #[test]
    fn test_recipe_drafts_invalid_json() {
        assert!(matches!(
            recipe_drafts("Sorry, I can't see a recipe."),
            Err(ExtractionError::Parse(_))
        ));
    }

    #[test]
    fn test_pantry_drafts() {
        let reply = r#"{"ingredients": [
            {"name": "Tomato paste", "quantity": "", "unit": "", "category": null},
            {"name": "Rice", "quantity": 2, "unit": "kg", "category": "grains"},
            {"name": "  ", "quantity": "1"}
        ]}"#;

        let items = pantry_drafts(reply).expect("parse");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "Tomato paste");
        assert_eq!(items[0].quantity, None);
        assert_eq!(items[1].quantity.as_deref(), Some("2"));
        assert_eq!(items[1].category.as_deref(), Some("grains"));
    }

    #[test]
    fn test_validate_image() {
        assert_eq!(
            validate_image(Some("image/PNG"), b"png").expect("png"),
            "image/png"
        );
        assert_eq!(
            validate_image(Some("image/jpg; q=1"), b"jpg").expect("jpg"),
            "image/jpeg"
        );
        assert!(matches!(
            validate_image(Some("application/pdf"), b"pdf"),
            Err(ExtractionError::UnsupportedImageType(t)) if t == "application/pdf"
        ));
        assert!(matches!(
            validate_image(None, b"data"),
            Err(ExtractionError::UnsupportedImageType(_))
        ));
        assert!(matches!(
            validate_image(Some("image/png"), b""),
            Err(ExtractionError::EmptyImage)
        ));
    }

    #[test]
    fn test_validate_image_too_large() {
        let image = vec![0_u8; MAX_IMAGE_BYTES + 1];
        assert!(matches!(
            validate_image(Some("image/webp"), &image),
            Err(ExtractionError::ImageTooLarge)
        ));
    }

    #[test]
    fn test_category_block_in_prompts() {
        let categories = vec!["dinner".to_string(), "soup".to_string()];
        let prompt = RecipeTranscriptPrompt {
            categories: &categories,
            transcript: "User: hi",
        }
        .render()
        .expect("render");
        assert!(prompt.contains("User categories:\n- dinner\n- soup\nUse one of these categories"));
        assert!(prompt.ends_with("Conversation transcript:\nUser: hi"));

        let prompt = IngredientPhotoPrompt { categories: &[] }
            .render()
            .expect("render");
        assert!(prompt.contains(
            "User categories:\n- (none)\nIf no category is clear, return null for category."
        ));
    }
}
