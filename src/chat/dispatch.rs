//! Applies stream events to conversation state.

use tracing::{debug, warn};

use crate::protocol::AssistantEvent;
use crate::store::{
    ChatStore, MessagePatch, ReasoningBlock, StoreError, ToolCallDetail, ToolCallPatch,
    ToolStatus,
};
use crate::typewriter::Typewriter;

/// How a turn ended, when an event was terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum TurnOutcome {
    Completed,
    Failed(String),
}

/// Apply one event to the assistant message identified by `message_id`.
///
/// Returns `Some` when the event was terminal. Events arriving after a
/// message has finalized are ignored, so a duplicate or stale terminal
/// event can never re-mutate `content` or `is_streaming`.
pub(super) fn apply_event(
    store: &mut ChatStore,
    typewriter: &Typewriter,
    mutation_tools: &[String],
    message_id: &str,
    event: AssistantEvent,
) -> Result<Option<TurnOutcome>, StoreError> {
    match store.message(message_id) {
        Some(msg) if !msg.is_streaming => {
            debug!(message_id, ?event, "Ignoring event for finalized message");
            return Ok(None);
        }
        Some(_) => {}
        None => return Err(StoreError::NotFound(message_id.to_string())),
    }

    match event {
        AssistantEvent::Text { content } => {
            store.append_to_message(message_id, &content)?;
            typewriter.append_target(message_id, &content);
        }
        AssistantEvent::Reasoning { content, summary } => {
            store.add_reasoning(message_id, ReasoningBlock { content, summary })?;
        }
        AssistantEvent::ToolStart { name } => {
            store.add_tool_call(message_id, ToolCallDetail::pending(name))?;
        }
        AssistantEvent::ToolCall { name, arguments } => {
            let patch = ToolCallPatch {
                arguments: Some(arguments),
                status: Some(ToolStatus::Running),
                ..Default::default()
            };
            match store.update_last_tool_call(message_id, patch) {
                Err(StoreError::NoToolCall(_)) => {
                    warn!(message_id, tool = %name, "tool_call without tool_start, skipping");
                }
                other => other?,
            }
        }
        AssistantEvent::ToolResult {
            name,
            result,
            error,
        } => {
            let failed = error.is_some();
            let patch = ToolCallPatch {
                status: Some(if failed {
                    ToolStatus::Error
                } else {
                    ToolStatus::Done
                }),
                result,
                error,
                ..Default::default()
            };
            match store.update_last_tool_call(message_id, patch) {
                Err(StoreError::NoToolCall(_)) => {
                    warn!(message_id, tool = %name, "tool_result without tool_start, skipping");
                }
                other => other?,
            }
            if !failed && mutation_tools.iter().any(|t| t == &name) {
                store.notify_flow_mutated(&name);
            }
        }
        AssistantEvent::Done { message } => {
            store.update_message(message_id, MessagePatch::finalize(message.clone()))?;
            // The done payload is authoritative and may diverge from the
            // streamed text; force the display to it.
            typewriter.set_target(message_id, message);
            typewriter.finish(message_id);
            return Ok(Some(TurnOutcome::Completed));
        }
        AssistantEvent::Error { message } => {
            store.update_message(
                message_id,
                MessagePatch {
                    is_streaming: Some(false),
                    content: None,
                },
            )?;
            typewriter.finish(message_id);
            return Ok(Some(TurnOutcome::Failed(message)));
        }
    }

    Ok(None)
}
