//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Password authentication and profile management
//! - `chat` - Claude chat orchestration with kitchen tools
//! - `extraction` - Recipe and pantry drafts from transcripts and photos
//! - `shopping_list` - Shopping list edits, consolidation and checkout

pub mod auth;
pub mod chat;
pub mod extraction;
pub mod shopping_list;

pub use auth::{AuthError, AuthService};
pub use chat::{ChatError, ChatService, ChatStreamEvent, stream_chat_message};
pub use extraction::{ExtractionError, ExtractionService, MAX_IMAGE_BYTES};
pub use shopping_list::{
    FinalizedList, FinishedTrip, NewShoppingItem, ShoppingItemPatch, ShoppingListError,
    ShoppingListService,
};
