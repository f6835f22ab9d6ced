//! Chat service for the meal-planning assistant.
//!
//! A user message is saved before the response stream opens. The stream then
//! replays the session history to Claude, forwards text as it arrives, runs
//! any requested kitchen tools, and persists every block it produces so the
//! next turn can rebuild the conversation.

use std::collections::BTreeMap;

use askama::Template;
use async_stream::try_stream;
use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use larder_core::{ChatRole, ChatSessionId, UserId};

use crate::claude::{
    ClaudeClient, ClaudeError, ContentBlock, ContentBlockDelta, ContentBlockStart, Message,
    MessageContent, StreamEvent, ToolExecutor, larder_tools,
};
use crate::db::{ChatRepository, RepositoryError};
use crate::models::{ChatMessage, ChatSession, User};

/// System prompt template for the assistant.
#[derive(Template)]
#[template(path = "prompts/system_prompt.txt")]
struct SystemPromptTemplate<'a> {
    display_name: Option<&'a str>,
    dietary_preferences: Option<String>,
}

/// Render the system prompt for `user`.
fn render_system_prompt(user: &User) -> String {
    let template = SystemPromptTemplate {
        display_name: user
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty()),
        dietary_preferences: user
            .dietary_preferences
            .as_ref()
            .and_then(describe_preferences),
    };

    template.render().unwrap_or_else(|e| {
        warn!(error = %e, "failed to render system prompt");
        String::from("You are a friendly grocery and meal-planning assistant.")
    })
}

/// Dietary preferences as prompt text. Strings are used as-is.
fn describe_preferences(preferences: &serde_json::Value) -> Option<String> {
    match preferences {
        serde_json::Value::Null => None,
        serde_json::Value::String(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        serde_json::Value::Array(items) if items.is_empty() => None,
        serde_json::Value::Object(map) if map.is_empty() => None,
        other => Some(other.to_string()),
    }
}

/// Maximum number of model rounds per user message.
const MAX_TOOL_ITERATIONS: usize = 10;

/// Errors that can occur in the chat service.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] RepositoryError),

    /// Claude API error.
    #[error("Claude API error: {0}")]
    Claude(#[from] ClaudeError),

    /// Session not found.
    #[error("session not found")]
    SessionNotFound,

    /// The message was blank.
    #[error("message cannot be empty")]
    EmptyMessage,

    /// The session has no user or assistant text.
    #[error("chat session has no messages")]
    EmptyTranscript,

    /// Too many tool iterations (possible infinite loop).
    #[error("too many tool iterations")]
    TooManyToolIterations,
}

impl ChatError {
    /// Message safe to show the user once the stream is open.
    fn stream_message(&self) -> String {
        match self {
            Self::Database(_) => "Failed to save the conversation".to_string(),
            Self::Claude(e) if e.is_transient() => {
                "The assistant is busy right now. Please try again shortly.".to_string()
            }
            Self::Claude(_) => "The assistant is unavailable right now".to_string(),
            other => other.to_string(),
        }
    }
}

/// Events sent to the client while the assistant responds.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatStreamEvent {
    /// The session the message belongs to. Always first.
    Session { session_id: ChatSessionId },
    /// A piece of assistant text.
    Text { text: String },
    /// The assistant called a tool.
    ToolUse { id: String, name: String },
    /// A tool finished.
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
    /// The response is complete.
    Done,
    /// The response failed; no further events follow.
    Error { message: String },
}

/// Chat service for sessions and their history.
pub struct ChatService<'a> {
    chats: ChatRepository<'a>,
}

impl<'a> ChatService<'a> {
    /// Create a new chat service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            chats: ChatRepository::new(pool),
        }
    }

    /// Save a user message, creating the session when `session_id` is `None`.
    ///
    /// New sessions are titled after the message.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::EmptyMessage` if the message is blank.
    /// Returns `ChatError::SessionNotFound` if `session_id` is not the user's.
    #[instrument(skip(self, message), fields(user_id = %user_id))]
    pub async fn begin_message(
        &self,
        user_id: UserId,
        session_id: Option<ChatSessionId>,
        message: &str,
    ) -> Result<ChatSession, ChatError> {
        if message.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let session = match session_id {
            Some(id) => self
                .chats
                .get_session(user_id, id)
                .await?
                .ok_or(ChatError::SessionNotFound)?,
            None => {
                let title = generate_title(message);
                let session = self.chats.create_session(user_id, Some(&title)).await?;
                info!(session_id = %session.id, "chat session created");
                session
            }
        };

        self.chats
            .add_message(session.id, ChatRole::User, json!({ "text": message }))
            .await?;

        Ok(session)
    }

    /// List the user's sessions, most recently active first.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Database` if the query fails.
    pub async fn list_sessions(&self, user_id: UserId) -> Result<Vec<ChatSession>, ChatError> {
        Ok(self.chats.list_sessions(user_id).await?)
    }

    /// Get the messages of one of the user's sessions, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::SessionNotFound` if the session is not the user's.
    pub async fn get_messages(
        &self,
        user_id: UserId,
        session_id: ChatSessionId,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        self.chats
            .get_session(user_id, session_id)
            .await?
            .ok_or(ChatError::SessionNotFound)?;

        Ok(self.chats.get_messages(session_id).await?)
    }

    /// Delete one of the user's sessions.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::SessionNotFound` if the session is not the user's.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn delete_session(
        &self,
        user_id: UserId,
        session_id: ChatSessionId,
    ) -> Result<(), ChatError> {
        if self.chats.delete_session(user_id, session_id).await? {
            Ok(())
        } else {
            Err(ChatError::SessionNotFound)
        }
    }

    /// The user and assistant text of a session as a plain transcript.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::SessionNotFound` if the session is not the user's.
    /// Returns `ChatError::EmptyTranscript` if it holds no text.
    pub async fn transcript(
        &self,
        user_id: UserId,
        session_id: ChatSessionId,
    ) -> Result<String, ChatError> {
        let messages = self.get_messages(user_id, session_id).await?;
        let transcript = build_transcript(&messages);

        if transcript.is_empty() {
            return Err(ChatError::EmptyTranscript);
        }

        Ok(transcript)
    }
}

/// Stream the assistant's response to the latest message in a session.
///
/// The user message must already be saved (see
/// [`ChatService::begin_message`]). Errors end the stream with a
/// [`ChatStreamEvent::Error`].
pub fn stream_chat_message(
    pool: PgPool,
    claude: ClaudeClient,
    user: User,
    session_id: ChatSessionId,
) -> impl Stream<Item = ChatStreamEvent> + Send {
    run_turn(pool, claude, user, session_id).map(move |result| {
        result.unwrap_or_else(|e| {
            tracing::error!(error = %e, session_id = %session_id, "chat stream failed");
            ChatStreamEvent::Error {
                message: e.stream_message(),
            }
        })
    })
}

fn run_turn(
    pool: PgPool,
    claude: ClaudeClient,
    user: User,
    session_id: ChatSessionId,
) -> impl Stream<Item = Result<ChatStreamEvent, ChatError>> + Send {
    try_stream! {
        yield ChatStreamEvent::Session { session_id };

        let chats = ChatRepository::new(&pool);
        let executor = ToolExecutor::new(&pool, user.id);
        let system = render_system_prompt(&user);
        let tools = larder_tools();

        let history = chats.get_messages(session_id).await?;
        let mut messages = convert_to_claude_messages(&history);
        let mut finished = false;

        for _ in 0..MAX_TOOL_ITERATIONS {
            let events = claude
                .chat_stream(messages.clone(), Some(system.clone()), Some(tools.clone()))
                .await?;
            let mut events = std::pin::pin!(events);
            let mut turn = TurnAssembler::default();

            while let Some(event) = events.next().await {
                match turn.apply(event?)? {
                    Some(TurnUpdate::Text(text)) => yield ChatStreamEvent::Text { text },
                    Some(TurnUpdate::Block(ContentBlock::Text { text })) => {
                        if !text.trim().is_empty() {
                            chats
                                .add_message(session_id, ChatRole::Assistant, json!({ "text": text }))
                                .await?;
                        }
                    }
                    // Tool-use rows are saved next to their results once the
                    // round's stream has completed.
                    Some(TurnUpdate::Block(ContentBlock::ToolUse { id, name, .. })) => {
                        yield ChatStreamEvent::ToolUse { id, name };
                    }
                    Some(TurnUpdate::Block(_)) | None => {}
                }
            }

            let blocks = turn.finish();
            let tool_uses: Vec<(String, String, serde_json::Value)> = blocks
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::ToolUse { id, name, input } => {
                        Some((id.clone(), name.clone(), input.clone()))
                    }
                    _ => None,
                })
                .collect();

            if tool_uses.is_empty() {
                finished = true;
                break;
            }

            messages.push(Message::assistant(blocks));

            let mut results = Vec::with_capacity(tool_uses.len());
            for (id, name, input) in tool_uses {
                chats
                    .add_message(
                        session_id,
                        ChatRole::ToolUse,
                        json!({ "id": id, "name": name, "input": input }),
                    )
                    .await?;

                let (content, is_error) = match executor.execute(&name, &input).await {
                    Ok(content) => (content, false),
                    Err(ClaudeError::ToolExecution(message)) => (format!("Error: {message}"), true),
                    Err(e) => (format!("Error: {e}"), true),
                };

                chats
                    .add_message(
                        session_id,
                        ChatRole::ToolResult,
                        json!({ "tool_use_id": id, "content": content, "is_error": is_error }),
                    )
                    .await?;

                results.push(ContentBlock::ToolResult {
                    tool_use_id: id.clone(),
                    content: content.clone(),
                    is_error: Some(is_error),
                });
                yield ChatStreamEvent::ToolResult { tool_use_id: id, content, is_error };
            }

            messages.push(Message::user(results));
        }

        chats.touch_session(session_id).await?;

        if !finished {
            Err(ChatError::TooManyToolIterations)?;
        }

        yield ChatStreamEvent::Done;
    }
}

/// A content block still receiving deltas.
enum PartialBlock {
    Text(String),
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
        json: String,
    },
}

impl PartialBlock {
    fn complete(self) -> ContentBlock {
        match self {
            Self::Text(text) => ContentBlock::Text { text },
            Self::ToolUse {
                id,
                name,
                input,
                json,
            } => {
                let input = if json.trim().is_empty() {
                    input
                } else {
                    serde_json::from_str(&json).unwrap_or_else(|e| {
                        warn!(error = %e, tool_name = %name, "tool input is not valid JSON");
                        serde_json::Value::Object(serde_json::Map::new())
                    })
                };
                ContentBlock::ToolUse { id, name, input }
            }
        }
    }
}

enum TurnUpdate {
    /// Text to forward to the client.
    Text(String),
    /// A block finished.
    Block(ContentBlock),
}

/// Builds the content blocks of one streamed model response.
#[derive(Default)]
struct TurnAssembler {
    open: BTreeMap<usize, PartialBlock>,
    completed: Vec<ContentBlock>,
}

impl TurnAssembler {
    fn apply(&mut self, event: StreamEvent) -> Result<Option<TurnUpdate>, ChatError> {
        match event {
            StreamEvent::ContentBlockStart {
                index,
                content_block,
            } => match content_block {
                ContentBlockStart::Text { text } => {
                    let update = (!text.is_empty()).then(|| TurnUpdate::Text(text.clone()));
                    self.open.insert(index, PartialBlock::Text(text));
                    Ok(update)
                }
                ContentBlockStart::ToolUse { id, name, input } => {
                    self.open.insert(
                        index,
                        PartialBlock::ToolUse {
                            id,
                            name,
                            input,
                            json: String::new(),
                        },
                    );
                    Ok(None)
                }
            },
            StreamEvent::ContentBlockDelta { index, delta } => {
                match (self.open.get_mut(&index), delta) {
                    (Some(PartialBlock::Text(buffer)), ContentBlockDelta::TextDelta { text }) => {
                        buffer.push_str(&text);
                        Ok(Some(TurnUpdate::Text(text)))
                    }
                    (
                        Some(PartialBlock::ToolUse { json, .. }),
                        ContentBlockDelta::InputJsonDelta { partial_json },
                    ) => {
                        json.push_str(&partial_json);
                        Ok(None)
                    }
                    _ => Ok(None),
                }
            }
            StreamEvent::ContentBlockStop { index } => Ok(self.open.remove(&index).map(|block| {
                let block = block.complete();
                self.completed.push(block.clone());
                TurnUpdate::Block(block)
            })),
            StreamEvent::Error { error } => Err(ChatError::Claude(error.into())),
            StreamEvent::MessageStart { .. }
            | StreamEvent::MessageDelta { .. }
            | StreamEvent::MessageStop
            | StreamEvent::Ping => Ok(None),
        }
    }

    /// The completed blocks, including any the stream never closed.
    fn finish(mut self) -> Vec<ContentBlock> {
        let open = std::mem::take(&mut self.open);
        self.completed
            .extend(open.into_values().map(PartialBlock::complete));
        self.completed
    }
}

/// Helper for building Claude messages from stored history.
///
/// Consecutive assistant text and tool-use rows become one assistant message;
/// consecutive tool results become one user message.
///
/// Every tool use is answered in the following user message. A tool use whose
/// result was never stored (the turn was cut short) gets an error result so
/// the history stays valid for the API.
struct MessageBuilder {
    result: Vec<Message>,
    assistant_blocks: Vec<ContentBlock>,
    tool_results: Vec<ContentBlock>,
    /// Tool uses already flushed that have no result yet.
    unanswered: Vec<String>,
}

impl MessageBuilder {
    const INTERRUPTED_TOOL_RESULT: &'static str = "Error: tool call was interrupted";

    const fn new() -> Self {
        Self {
            result: Vec::new(),
            assistant_blocks: Vec::new(),
            tool_results: Vec::new(),
            unanswered: Vec::new(),
        }
    }

    fn flush_assistant_blocks(&mut self) {
        if !self.assistant_blocks.is_empty() {
            self.unanswered
                .extend(self.assistant_blocks.iter().filter_map(|block| match block {
                    ContentBlock::ToolUse { id, .. } => Some(id.clone()),
                    _ => None,
                }));
            self.result
                .push(Message::assistant(std::mem::take(&mut self.assistant_blocks)));
        }
    }

    fn close_unanswered(&mut self) {
        for tool_use_id in self.unanswered.drain(..) {
            self.tool_results.push(ContentBlock::ToolResult {
                tool_use_id,
                content: Self::INTERRUPTED_TOOL_RESULT.to_string(),
                is_error: Some(true),
            });
        }
    }

    fn flush_tool_results(&mut self) {
        self.close_unanswered();
        if !self.tool_results.is_empty() {
            self.result
                .push(Message::user(std::mem::take(&mut self.tool_results)));
        }
    }

    fn add_user_message(&mut self, msg: &ChatMessage) {
        self.flush_assistant_blocks();
        self.close_unanswered();

        let text = get_json_str(&msg.content, "text");

        // Pending tool results and the text share one user message.
        if !self.tool_results.is_empty() {
            self.tool_results.push(ContentBlock::Text { text });
            self.flush_tool_results();
            return;
        }

        self.result.push(Message {
            role: "user".to_string(),
            content: MessageContent::Text(text),
        });
    }

    fn add_assistant_message(&mut self, msg: &ChatMessage) {
        self.flush_tool_results();

        let text = get_json_str(&msg.content, "text");
        self.assistant_blocks.push(ContentBlock::Text { text });
    }

    fn add_tool_use(&mut self, msg: &ChatMessage) {
        self.flush_tool_results();

        let id = get_json_str(&msg.content, "id");
        let name = get_json_str(&msg.content, "name");
        let input = msg
            .content
            .get("input")
            .cloned()
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));

        self.assistant_blocks
            .push(ContentBlock::ToolUse { id, name, input });
    }

    fn add_tool_result(&mut self, msg: &ChatMessage) {
        self.flush_assistant_blocks();

        let tool_use_id = get_json_str(&msg.content, "tool_use_id");
        let content = get_json_str(&msg.content, "content");
        let is_error = msg
            .content
            .get("is_error")
            .and_then(serde_json::Value::as_bool);

        // Results for tool uses the history never recorded are dropped.
        let Some(pos) = self.unanswered.iter().position(|id| *id == tool_use_id) else {
            warn!(tool_use_id = %tool_use_id, "dropping tool result without a tool use");
            return;
        };
        self.unanswered.remove(pos);

        self.tool_results.push(ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        });
    }

    fn finish(mut self) -> Vec<Message> {
        self.flush_assistant_blocks();
        self.flush_tool_results();
        self.result
    }
}

/// Extract a string from JSON content, returning empty string if not found.
fn get_json_str(content: &serde_json::Value, key: &str) -> String {
    content
        .get(key)
        .and_then(serde_json::Value::as_str)
        .unwrap_or("")
        .to_string()
}

/// Convert stored messages to Claude API message format.
fn convert_to_claude_messages(messages: &[ChatMessage]) -> Vec<Message> {
    let mut builder = MessageBuilder::new();

    for msg in messages {
        match msg.role {
            ChatRole::User => builder.add_user_message(msg),
            ChatRole::Assistant => builder.add_assistant_message(msg),
            ChatRole::ToolUse => builder.add_tool_use(msg),
            ChatRole::ToolResult => builder.add_tool_result(msg),
        }
    }

    builder.finish()
}

/// Render user and assistant text as `User: ...` / `Assistant: ...` paragraphs.
fn build_transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .filter_map(|msg| {
            let text = msg.text()?.trim();
            if text.is_empty() {
                return None;
            }
            let speaker = match msg.role {
                ChatRole::User => "User",
                _ => "Assistant",
            };
            Some(format!("{speaker}: {text}"))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Generate a session title from the first user message.
fn generate_title(message: &str) -> String {
    const MAX_TITLE_LENGTH: usize = 60;

    let trimmed = message.trim();
    let Some((cut, _)) = trimmed.char_indices().nth(MAX_TITLE_LENGTH) else {
        return trimmed.to_string();
    };

    let truncated = &trimmed[..cut];
    if trimmed[cut..].starts_with(char::is_whitespace) {
        return format!("{}...", truncated.trim_end());
    }

    truncated.rfind(' ').map_or_else(
        || format!("{truncated}..."),
        |space_idx| format!("{}...", truncated[..space_idx].trim_end()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use larder_core::ChatMessageId;

    use crate::claude::{ApiError, StopReason};

    fn stored(role: ChatRole, content: serde_json::Value) -> ChatMessage {
        ChatMessage {
            id: ChatMessageId::generate(),
            chat_session_id: ChatSessionId::generate(),
            role,
            content,
            created_at: Utc::now(),
        }
    }

    fn user(display_name: Option<&str>, preferences: Option<serde_json::Value>) -> User {
        User {
            id: UserId::generate(),
            username: "sam".to_string(),
            display_name: display_name.map(str::to_string),
            dietary_preferences: preferences,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_generate_title_short() {
        let title = generate_title("Plan dinners for this week");
        assert_eq!(title, "Plan dinners for this week");
    }

    #[test]
    fn test_generate_title_long() {
        let title = generate_title(
            "Can you plan five vegetarian dinners for this week using the lentils and squash I already have?",
        );
        assert!(title.ends_with("..."));
        assert!(title.chars().count() <= 63);
        assert_eq!(
            title,
            "Can you plan five vegetarian dinners for this week using the..."
        );
    }

    #[test]
    fn test_generate_title_trims_whitespace() {
        let title = generate_title("   What's in my pantry?   ");
        assert_eq!(title, "What's in my pantry?");
    }

    #[test]
    fn test_generate_title_multibyte_without_spaces() {
        let message = "é".repeat(80);
        let title = generate_title(&message);
        assert_eq!(title, format!("{}...", "é".repeat(60)));
    }

    #[test]
    fn test_convert_groups_tool_rounds() {
        let history = vec![
            stored(ChatRole::User, json!({"text": "What's in my pantry?"})),
            stored(ChatRole::Assistant, json!({"text": "Let me check."})),
            stored(
                ChatRole::ToolUse,
                json!({"id": "toolu_1", "name": "get_pantry", "input": {}}),
            ),
            stored(
                ChatRole::ToolResult,
                json!({"tool_use_id": "toolu_1", "content": "Pantry is empty.", "is_error": false}),
            ),
            stored(ChatRole::Assistant, json!({"text": "Your pantry is empty."})),
        ];

        let messages = convert_to_claude_messages(&history);
        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["user", "assistant", "user", "assistant"]);

        let MessageContent::Blocks(blocks) = &messages[1].content else {
            panic!("expected blocks");
        };
        assert_eq!(blocks.len(), 2);
        assert!(matches!(&blocks[1], ContentBlock::ToolUse { name, .. } if name == "get_pantry"));

        let MessageContent::Blocks(results) = &messages[2].content else {
            panic!("expected blocks");
        };
        assert!(matches!(
            &results[0],
            ContentBlock::ToolResult { is_error: Some(false), .. }
        ));
    }

    #[test]
    fn test_convert_answers_interrupted_tool_use() {
        let history = vec![
            stored(ChatRole::User, json!({"text": "Plan my dinners"})),
            stored(
                ChatRole::ToolUse,
                json!({"id": "toolu_1", "name": "get_pantry", "input": {}}),
            ),
            stored(ChatRole::User, json!({"text": "hello?"})),
        ];

        let messages = convert_to_claude_messages(&history);
        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["user", "assistant", "user"]);

        let MessageContent::Blocks(blocks) = &messages[2].content else {
            panic!("expected blocks");
        };
        assert!(matches!(
            &blocks[0],
            ContentBlock::ToolResult { tool_use_id, is_error: Some(true), .. } if tool_use_id == "toolu_1"
        ));
        assert!(matches!(&blocks[1], ContentBlock::Text { text } if text == "hello?"));
    }

    #[test]
    fn test_convert_every_tool_use_has_a_result() {
        let history = vec![
            stored(ChatRole::User, json!({"text": "Add eggs"})),
            stored(
                ChatRole::ToolUse,
                json!({"id": "toolu_1", "name": "get_pantry", "input": {}}),
            ),
            stored(
                ChatRole::ToolUse,
                json!({"id": "toolu_2", "name": "add_to_shopping_list", "input": {}}),
            ),
            stored(
                ChatRole::ToolResult,
                json!({"tool_use_id": "toolu_1", "content": "Pantry is empty.", "is_error": false}),
            ),
        ];

        let messages = convert_to_claude_messages(&history);
        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["user", "assistant", "user"]);

        let MessageContent::Blocks(results) = &messages[2].content else {
            panic!("expected blocks");
        };
        let answered: Vec<&str> = results
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolResult { tool_use_id, .. } => Some(tool_use_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(answered, ["toolu_1", "toolu_2"]);
    }

    #[test]
    fn test_convert_drops_result_without_tool_use() {
        let history = vec![
            stored(ChatRole::User, json!({"text": "Hi"})),
            stored(
                ChatRole::ToolResult,
                json!({"tool_use_id": "toolu_9", "content": "stray", "is_error": false}),
            ),
            stored(ChatRole::Assistant, json!({"text": "Hello!"})),
        ];

        let messages = convert_to_claude_messages(&history);
        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["user", "assistant"]);
    }

    #[test]
    fn test_build_transcript_skips_tool_rows() {
        let history = vec![
            stored(ChatRole::User, json!({"text": "A quick pasta?"})),
            stored(
                ChatRole::ToolUse,
                json!({"id": "toolu_1", "name": "get_pantry", "input": {}}),
            ),
            stored(ChatRole::Assistant, json!({"text": "Try aglio e olio."})),
            stored(ChatRole::Assistant, json!({"text": "  "})),
        ];

        assert_eq!(
            build_transcript(&history),
            "User: A quick pasta?\n\nAssistant: Try aglio e olio."
        );
    }

    #[test]
    fn test_turn_assembler_text_and_tool_use() {
        let mut turn = TurnAssembler::default();
        let events = [
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Checking "}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"now."}}"#,
            r#"{"type":"content_block_stop","index":0}"#,
            r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"toolu_1","name":"remove_pantry_item","input":{}}}"#,
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"name\": "}}"#,
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"\"milk\"}"}}"#,
            r#"{"type":"content_block_stop","index":1}"#,
        ];

        let mut streamed = String::new();
        for raw in events {
            let event: StreamEvent = serde_json::from_str(raw).expect("event");
            if let Some(TurnUpdate::Text(text)) = turn.apply(event).expect("apply") {
                streamed.push_str(&text);
            }
        }

        assert_eq!(streamed, "Checking now.");
        let blocks = turn.finish();
        assert_eq!(blocks.len(), 2);
        assert!(matches!(&blocks[0], ContentBlock::Text { text } if text == "Checking now."));
        assert!(matches!(
            &blocks[1],
            ContentBlock::ToolUse { input, .. } if input == &json!({"name": "milk"})
        ));
    }

    #[test]
    fn test_turn_assembler_tool_without_input_keeps_start_input() {
        let mut turn = TurnAssembler::default();
        turn.apply(StreamEvent::ContentBlockStart {
            index: 0,
            content_block: ContentBlockStart::ToolUse {
                id: "toolu_1".to_string(),
                name: "get_pantry".to_string(),
                input: json!({}),
            },
        })
        .expect("start");

        let update = turn
            .apply(StreamEvent::ContentBlockStop { index: 0 })
            .expect("stop");
        assert!(matches!(
            update,
            Some(TurnUpdate::Block(ContentBlock::ToolUse { input, .. })) if input == json!({})
        ));
    }

    #[test]
    fn test_turn_assembler_stream_error() {
        let mut turn = TurnAssembler::default();
        let result = turn.apply(StreamEvent::Error {
            error: ApiError {
                error_type: "overloaded_error".to_string(),
                message: "Overloaded".to_string(),
            },
        });
        assert!(matches!(result, Err(ChatError::Claude(ClaudeError::Overloaded))));
    }

    #[test]
    fn test_turn_assembler_ignores_message_events() {
        let mut turn = TurnAssembler::default();
        let event: StreamEvent = serde_json::from_str(
            r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":3}}"#,
        )
        .expect("event");
        if let StreamEvent::MessageDelta { delta, .. } = &event {
            assert_eq!(delta.stop_reason, Some(StopReason::EndTurn));
        }
        assert!(turn.apply(event).expect("apply").is_none());
        assert!(turn.finish().is_empty());
    }

    #[test]
    fn test_stream_event_serialization() {
        let session_id = ChatSessionId::generate();
        let json = serde_json::to_value(ChatStreamEvent::Session { session_id }).expect("serialize");
        assert_eq!(json["type"], "session");
        assert_eq!(json["session_id"], session_id.to_string());

        let json = serde_json::to_value(ChatStreamEvent::ToolResult {
            tool_use_id: "toolu_1".to_string(),
            content: "Pantry is empty.".to_string(),
            is_error: false,
        })
        .expect("serialize");
        assert_eq!(json["type"], "tool_result");
        assert_eq!(json["is_error"], false);

        let json = serde_json::to_value(ChatStreamEvent::Done).expect("serialize");
        assert_eq!(json, json!({"type": "done"}));
    }

    #[test]
    fn test_system_prompt_includes_profile() {
        let prompt = render_system_prompt(&user(
            Some("Sam"),
            Some(json!("vegetarian, no peanuts")),
        ));
        assert!(prompt.contains("The user's name is Sam."));
        assert!(prompt.contains("vegetarian, no peanuts"));
        assert!(prompt.contains("grocery and meal-planning assistant"));
    }

    #[test]
    fn test_system_prompt_without_profile() {
        let prompt = render_system_prompt(&user(Some("  "), Some(json!([]))));
        assert!(!prompt.contains("The user's name"));
        assert!(!prompt.contains("dietary preferences:"));
    }

    #[test]
    fn test_stream_message_hides_database_details() {
        let error = ChatError::Database(RepositoryError::NotFound);
        assert_eq!(error.stream_message(), "Failed to save the conversation");
        assert_eq!(
            ChatError::TooManyToolIterations.stream_message(),
            "too many tool iterations"
        );
        assert!(
            ChatError::Claude(ClaudeError::Overloaded)
                .stream_message()
                .contains("busy")
        );
    }
}
