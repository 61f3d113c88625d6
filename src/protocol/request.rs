//! Request body for opening a chat stream.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A prior turn sent as context with a new request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: Role,
    pub content: String,
}

/// Body POSTed to start a streaming chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The flow this conversation is editing.
    pub flow_id: Uuid,
    /// The user's input text.
    pub message: String,
    /// Prior finalized turns, oldest first.
    #[serde(default)]
    pub history: Vec<HistoryMessage>,
    /// Optional model selector; the server picks a default when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ChatRequest {
    /// Create a request with no history.
    pub fn new(flow_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            flow_id,
            message: message.into(),
            history: Vec::new(),
            model: None,
        }
    }

    /// Attach prior turns.
    pub fn with_history(mut self, history: Vec<HistoryMessage>) -> Self {
        self.history = history;
        self
    }

    /// Pin a model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}
