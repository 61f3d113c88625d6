//! Conversation message store.
//!
//! [`ChatStore`] owns every [`ConversationMessage`] in a conversation and is
//! the only mutation surface. It is an explicitly passed object, not a
//! global; callers hold it and hand references to the pipeline. All
//! mutations are synchronous and announced on a broadcast [`SignalBus`].
//!
//! Clearing the conversation does not cancel an in-flight stream; the
//! session coordinates that before calling [`ChatStore::clear`].

mod signals;
mod types;

pub use signals::{SignalBus, SignalError, SignalReceiver, StoreSignal};
pub use types::{
    ConversationMessage, MessagePatch, ReasoningBlock, Role, Segment, ToolCallDetail,
    ToolCallPatch, ToolStatus,
};

use thiserror::Error;
use tracing::debug;

/// Store operation failures.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Message not found: {0}")]
    NotFound(String),

    #[error("Message id already in use: {0}")]
    DuplicateId(String),

    #[error("Message {0} has no tool call to update")]
    NoToolCall(String),
}

/// Ordered collection of conversation turns.
pub struct ChatStore {
    messages: Vec<ConversationMessage>,
    bus: SignalBus,
}

impl ChatStore {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            bus: SignalBus::new(),
        }
    }

    /// Subscribe to change signals.
    pub fn subscribe(&self) -> SignalReceiver {
        self.bus.subscribe()
    }

    /// All messages, oldest first.
    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    /// Look up a message by id.
    pub fn message(&self, id: &str) -> Option<&ConversationMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Append a message.
    pub fn add_message(&mut self, message: ConversationMessage) {
        debug!(id = %message.id, role = ?message.role, "Adding message");
        let id = message.id.clone();
        self.messages.push(message);
        self.bus.emit(StoreSignal::MessageAdded { id });
    }

    /// Apply a partial update to a message.
    pub fn update_message(&mut self, id: &str, patch: MessagePatch) -> Result<(), StoreError> {
        let msg = self.message_mut(id)?;
        if let Some(content) = patch.content {
            msg.content = content;
        }
        if let Some(is_streaming) = patch.is_streaming {
            msg.is_streaming = is_streaming;
        }
        self.emit_updated(id);
        Ok(())
    }

    /// Append a text delta to a message's content and trailing text
    /// segment, creating the segment if the message doesn't end in one.
    pub fn append_to_message(&mut self, id: &str, delta: &str) -> Result<(), StoreError> {
        let msg = self.message_mut(id)?;
        msg.content.push_str(delta);
        match msg.segments.last_mut() {
            Some(Segment::Text { text }) => text.push_str(delta),
            _ => msg.segments.push(Segment::Text {
                text: delta.to_string(),
            }),
        }
        self.emit_updated(id);
        Ok(())
    }

    /// Append a new tool-call segment.
    pub fn add_tool_call(&mut self, id: &str, detail: ToolCallDetail) -> Result<(), StoreError> {
        let msg = self.message_mut(id)?;
        debug!(id, tool = %detail.name, "Adding tool call");
        msg.segments.push(Segment::ToolCall(detail));
        self.emit_updated(id);
        Ok(())
    }

    /// Mutate the most recently appended tool call (last-one-wins
    /// addressing; earlier tool calls are never touched).
    pub fn update_last_tool_call(
        &mut self,
        id: &str,
        patch: ToolCallPatch,
    ) -> Result<(), StoreError> {
        let msg = self.message_mut(id)?;
        let tc = msg
            .segments
            .iter_mut()
            .rev()
            .find_map(|s| match s {
                Segment::ToolCall(tc) => Some(tc),
                _ => None,
            })
            .ok_or_else(|| StoreError::NoToolCall(id.to_string()))?;

        if let Some(arguments) = patch.arguments {
            tc.arguments = Some(arguments);
        }
        if let Some(status) = patch.status {
            tc.status = status;
        }
        if let Some(result) = patch.result {
            tc.result = Some(result);
        }
        if let Some(error) = patch.error {
            tc.error = Some(error);
        }
        self.emit_updated(id);
        Ok(())
    }

    /// Append a reasoning block. Blocks are never mutated after insertion.
    pub fn add_reasoning(&mut self, id: &str, block: ReasoningBlock) -> Result<(), StoreError> {
        let msg = self.message_mut(id)?;
        msg.segments.push(Segment::Reasoning(block));
        self.emit_updated(id);
        Ok(())
    }

    /// Swap a local placeholder id for a server-issued one, in place.
    ///
    /// Position and partial content are preserved. Dependent structures
    /// keyed by the old id (the typewriter's maps, for one) must be rekeyed
    /// by the caller; this store only renames its own entry.
    pub fn rekey(&mut self, old_id: &str, new_id: &str) -> Result<(), StoreError> {
        if self.message(new_id).is_some() {
            return Err(StoreError::DuplicateId(new_id.to_string()));
        }
        let msg = self.message_mut(old_id)?;
        debug!(old_id, new_id, "Rekeying message");
        msg.id = new_id.to_string();
        self.bus.emit(StoreSignal::Rekeyed {
            old_id: old_id.to_string(),
            new_id: new_id.to_string(),
        });
        Ok(())
    }

    /// Drop all messages. In-flight stream cancellation is the caller's
    /// responsibility; the store holds no network handle.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.bus.emit(StoreSignal::Cleared);
    }

    /// Announce that a structure-editing tool completed successfully.
    pub fn notify_flow_mutated(&self, tool: &str) {
        debug!(tool, "Flow mutation signal");
        self.bus.emit(StoreSignal::FlowMutated {
            tool: tool.to_string(),
        });
    }

    fn message_mut(&mut self, id: &str) -> Result<&mut ConversationMessage, StoreError> {
        self.messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn emit_updated(&self, id: &str) {
        self.bus.emit(StoreSignal::MessageUpdated { id: id.to_string() });
    }
}

impl Default for ChatStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_with_assistant(id: &str) -> ChatStore {
        let mut store = ChatStore::new();
        store.add_message(ConversationMessage::assistant_placeholder(id));
        store
    }

    #[test]
    fn test_add_and_lookup() {
        let mut store = ChatStore::new();
        store.add_message(ConversationMessage::user("u1", "hello"));
        assert_eq!(store.messages().len(), 1);
        assert_eq!(store.message("u1").unwrap().content, "hello");
        assert!(store.message("missing").is_none());
    }

    #[test]
    fn test_append_creates_trailing_text_segment() {
        let mut store = store_with_assistant("a1");
        store.append_to_message("a1", "Hello").unwrap();
        store.append_to_message("a1", " world").unwrap();

        let msg = store.message("a1").unwrap();
        assert_eq!(msg.content, "Hello world");
        assert_eq!(msg.segments.len(), 1);
        assert_eq!(
            msg.segments[0],
            Segment::Text {
                text: "Hello world".to_string()
            }
        );
    }

    #[test]
    fn test_append_after_tool_call_opens_new_segment() {
        let mut store = store_with_assistant("a1");
        store.append_to_message("a1", "before").unwrap();
        store
            .add_tool_call("a1", ToolCallDetail::pending("search"))
            .unwrap();
        store.append_to_message("a1", "after").unwrap();

        let msg = store.message("a1").unwrap();
        assert_eq!(msg.segments.len(), 3);
        assert_eq!(msg.content, "beforeafter");
        assert_eq!(
            msg.segments[2],
            Segment::Text {
                text: "after".to_string()
            }
        );
    }

    #[test]
    fn test_update_message_patch() {
        let mut store = store_with_assistant("a1");
        store
            .update_message("a1", MessagePatch::finalize("final text"))
            .unwrap();
        let msg = store.message("a1").unwrap();
        assert_eq!(msg.content, "final text");
        assert!(!msg.is_streaming);
    }

    #[test]
    fn test_update_unknown_message_errors() {
        let mut store = ChatStore::new();
        let err = store
            .update_message("ghost", MessagePatch::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_update_last_tool_call_targets_most_recent() {
        // tool A goes through its full lifecycle, then tool B does; B's
        // updates must never touch A.
        let mut store = store_with_assistant("a1");

        store
            .add_tool_call("a1", ToolCallDetail::pending("A"))
            .unwrap();
        store
            .update_last_tool_call(
                "a1",
                ToolCallPatch {
                    arguments: Some(json!({"x": 1})),
                    status: Some(ToolStatus::Running),
                    ..Default::default()
                },
            )
            .unwrap();
        store
            .update_last_tool_call(
                "a1",
                ToolCallPatch {
                    status: Some(ToolStatus::Done),
                    result: Some("ra".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        store
            .add_tool_call("a1", ToolCallDetail::pending("B"))
            .unwrap();
        store
            .update_last_tool_call(
                "a1",
                ToolCallPatch {
                    status: Some(ToolStatus::Error),
                    error: Some("boom".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let msg = store.message("a1").unwrap();
        let calls: Vec<_> = msg.tool_calls().collect();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "A");
        assert_eq!(calls[0].status, ToolStatus::Done);
        assert_eq!(calls[0].result.as_deref(), Some("ra"));
        assert!(calls[0].error.is_none());
        assert_eq!(calls[1].name, "B");
        assert_eq!(calls[1].status, ToolStatus::Error);
        assert_eq!(calls[1].error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_update_last_tool_call_without_tool_errors() {
        let mut store = store_with_assistant("a1");
        let err = store
            .update_last_tool_call("a1", ToolCallPatch::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::NoToolCall(_)));
    }

    #[test]
    fn test_add_reasoning_appends_segment() {
        let mut store = store_with_assistant("a1");
        store
            .add_reasoning(
                "a1",
                ReasoningBlock {
                    content: "thinking".to_string(),
                    summary: Some("plan".to_string()),
                },
            )
            .unwrap();
        store
            .add_reasoning(
                "a1",
                ReasoningBlock {
                    content: "more".to_string(),
                    summary: None,
                },
            )
            .unwrap();
        assert_eq!(store.message("a1").unwrap().segments.len(), 2);
    }

    #[test]
    fn test_rekey_preserves_position_and_content() {
        let mut store = ChatStore::new();
        store.add_message(ConversationMessage::user("u1", "hi"));
        store.add_message(ConversationMessage::assistant_placeholder("local-1"));
        store.append_to_message("local-1", "partial").unwrap();

        store.rekey("local-1", "srv-42").unwrap();

        assert!(store.message("local-1").is_none());
        let msg = store.message("srv-42").unwrap();
        assert_eq!(msg.content, "partial");
        assert_eq!(store.messages()[1].id, "srv-42");
    }

    #[test]
    fn test_rekey_rejects_duplicate_and_missing() {
        let mut store = ChatStore::new();
        store.add_message(ConversationMessage::user("u1", "hi"));
        store.add_message(ConversationMessage::user("u2", "yo"));

        assert!(matches!(
            store.rekey("u1", "u2").unwrap_err(),
            StoreError::DuplicateId(_)
        ));
        assert!(matches!(
            store.rekey("ghost", "u3").unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[test]
    fn test_clear_emits_signal() {
        let mut store = ChatStore::new();
        let mut rx = store.subscribe();
        store.add_message(ConversationMessage::user("u1", "hi"));
        store.clear();

        assert!(store.messages().is_empty());
        assert_eq!(
            rx.try_recv().unwrap().unwrap(),
            StoreSignal::MessageAdded {
                id: "u1".to_string()
            }
        );
        assert_eq!(rx.try_recv().unwrap().unwrap(), StoreSignal::Cleared);
    }

    #[test]
    fn test_mutation_signal() {
        let store = ChatStore::new();
        let mut rx = store.subscribe();
        store.notify_flow_mutated("lf_workflow_patch");
        assert_eq!(
            rx.try_recv().unwrap().unwrap(),
            StoreSignal::FlowMutated {
                tool: "lf_workflow_patch".to_string()
            }
        );
    }
}
