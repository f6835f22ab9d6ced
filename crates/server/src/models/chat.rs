//! Chat domain models for the meal-planning assistant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use larder_core::{ChatMessageId, ChatRole, ChatSessionId, UserId};

/// A conversation with the assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    /// Unique session ID.
    pub id: ChatSessionId,
    /// User who owns this session.
    pub user_id: UserId,
    /// Session title (derived from the first message).
    pub title: Option<String>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A message in a chat session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message ID.
    pub id: ChatMessageId,
    /// Session this message belongs to.
    pub chat_session_id: ChatSessionId,
    /// Role of the message sender.
    pub role: ChatRole,
    /// Message content (flexible JSON for tool use).
    pub content: serde_json::Value,
    /// When the message was created.
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// The plain text of a user or assistant message, if any.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self.role {
            ChatRole::User | ChatRole::Assistant => {
                self.content.get("text").and_then(serde_json::Value::as_str)
            }
            ChatRole::ToolUse | ChatRole::ToolResult => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_serialization() {
        let message = ChatMessage {
            id: ChatMessageId::generate(),
            chat_session_id: ChatSessionId::generate(),
            role: ChatRole::ToolUse,
            content: serde_json::json!({"id": "toolu_1", "name": "get_pantry", "input": {}}),
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&message).expect("serialize");
        assert!(json.contains("\"role\":\"tool_use\""));
        assert!(json.contains("\"name\":\"get_pantry\""));
    }

    #[test]
    fn test_text_only_for_conversation_roles() {
        let mut message = ChatMessage {
            id: ChatMessageId::generate(),
            chat_session_id: ChatSessionId::generate(),
            role: ChatRole::Assistant,
            content: serde_json::json!({"text": "Try a lentil soup."}),
            created_at: Utc::now(),
        };
        assert_eq!(message.text(), Some("Try a lentil soup."));

        message.role = ChatRole::ToolResult;
        assert_eq!(message.text(), None);
    }
}
