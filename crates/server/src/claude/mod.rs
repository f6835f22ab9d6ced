//! Claude API integration for the meal-planning assistant and for
//! structured extraction from transcripts and photos.
//!
//! # Features
//!
//! - Non-streaming `chat` for extraction calls
//! - Streaming `chat_stream` (SSE) for the assistant
//! - Image content blocks for photo extraction
//! - Kitchen tools (recipes, pantry, shopping list) bound to the current user

mod client;
mod error;
pub mod tools;
pub mod types;

pub use client::ClaudeClient;
pub use error::{ApiError, ApiErrorResponse, ClaudeError};
pub use tools::{ToolExecutor, larder_tools};
pub use types::{
    ChatRequest, ChatResponse, ContentBlock, ContentBlockDelta, ContentBlockStart, ImageSource,
    Message, MessageContent, StopReason, StreamEvent, Tool, Usage,
};
