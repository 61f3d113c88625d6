//! Conversation state types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use crate::protocol::Role;

/// Execution state of one tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    #[default]
    Pending,
    Running,
    Done,
    Error,
}

/// One tool invocation surfaced inside an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ToolCallDetail {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
    pub status: ToolStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolCallDetail {
    /// A freshly announced tool call, arguments not yet known.
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ToolStatus::Pending,
            ..Default::default()
        }
    }
}

/// A reasoning block. Appended whole, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningBlock {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// An ordered sub-unit of a message's display content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Segment {
    Text { text: String },
    Reasoning(ReasoningBlock),
    ToolCall(ToolCallDetail),
}

/// One conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Locally generated until a server-issued id is adopted via rekey.
    pub id: String,
    pub role: Role,
    /// Plain-text content; authoritative once streaming completes.
    pub content: String,
    /// Ordered display segments. Insertion order is display order.
    pub segments: Vec<Segment>,
    /// True from creation until a terminal event is observed.
    pub is_streaming: bool,
    /// Set at creation, never mutated.
    pub created_at: DateTime<Utc>,
}

impl ConversationMessage {
    /// A finished user turn.
    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            id: id.into(),
            role: Role::User,
            segments: vec![Segment::Text {
                text: content.clone(),
            }],
            content,
            is_streaming: false,
            created_at: Utc::now(),
        }
    }

    /// A streaming assistant placeholder awaiting events.
    pub fn assistant_placeholder(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            content: String::new(),
            segments: Vec::new(),
            is_streaming: true,
            created_at: Utc::now(),
        }
    }

    /// The most recently appended tool call, if any.
    pub fn last_tool_call(&self) -> Option<&ToolCallDetail> {
        self.segments.iter().rev().find_map(|s| match s {
            Segment::ToolCall(tc) => Some(tc),
            _ => None,
        })
    }

    /// All tool calls in display order.
    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCallDetail> {
        self.segments.iter().filter_map(|s| match s {
            Segment::ToolCall(tc) => Some(tc),
            _ => None,
        })
    }
}

/// Partial update applied to a message.
#[derive(Debug, Clone, Default)]
pub struct MessagePatch {
    pub content: Option<String>,
    pub is_streaming: Option<bool>,
}

impl MessagePatch {
    /// Patch that finalizes a message with the given content.
    pub fn finalize(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            is_streaming: Some(false),
        }
    }
}

/// Partial update applied to the most recent tool call.
#[derive(Debug, Clone, Default)]
pub struct ToolCallPatch {
    pub arguments: Option<Value>,
    pub status: Option<ToolStatus>,
    pub result: Option<String>,
    pub error: Option<String>,
}
