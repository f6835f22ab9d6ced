//! Domain models.
//!
//! These are validated domain objects, separate from the private row types
//! in [`crate::db`].

pub mod chat;
pub mod pantry;
pub mod recipe;
pub mod session;
pub mod shopping_list;
pub mod user;

pub use chat::{ChatMessage, ChatSession};
pub use pantry::{NewPantryItem, PantryItem, PantryItemUpdate};
pub use recipe::{
    IngredientLine, NewRecipe, Recipe, RecipeQuery, RecipeSort, RecipeUpdate, SortOrder,
};
pub use session::{CurrentUser, keys as session_keys};
pub use shopping_list::ShoppingList;
pub use user::{ProfileUpdate, User};
