//! Stream event parsing.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// One decoded event from the assistant stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AssistantEvent {
    /// Incremental assistant text.
    Text { content: String },
    /// A reasoning block emitted by a reasoning-capable model.
    Reasoning {
        content: String,
        summary: Option<String>,
    },
    /// The model named a tool it is about to call.
    ToolStart { name: String },
    /// Tool arguments are complete and execution has begun.
    ToolCall { name: String, arguments: Value },
    /// A tool finished, successfully or not.
    ToolResult {
        name: String,
        result: Option<String>,
        error: Option<String>,
    },
    /// Terminal event carrying the authoritative final text.
    Done { message: String },
    /// Terminal stream-level error.
    Error { message: String },
}

#[derive(Deserialize)]
struct TextPayload {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ReasoningPayload {
    #[serde(default)]
    content: String,
    summary: Option<String>,
}

#[derive(Deserialize)]
struct ToolStartPayload {
    name: String,
}

#[derive(Deserialize)]
struct ToolCallPayload {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Deserialize)]
struct ToolResultPayload {
    #[serde(default)]
    name: String,
    result: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct DonePayload {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    message: String,
}

impl AssistantEvent {
    /// Parse a named event from its JSON payload.
    ///
    /// Returns `None` for unrecognized event names and for payloads that
    /// fail to deserialize. A bad record never aborts the stream.
    pub fn parse(name: &str, data: &str) -> Option<Self> {
        let event = match name {
            "text" => serde_json::from_str(data)
                .map(|p: TextPayload| Self::Text { content: p.content }),
            "reasoning" => serde_json::from_str(data).map(|p: ReasoningPayload| Self::Reasoning {
                content: p.content,
                summary: p.summary,
            }),
            "tool_start" => serde_json::from_str(data)
                .map(|p: ToolStartPayload| Self::ToolStart { name: p.name }),
            "tool_call" => serde_json::from_str(data).map(|p: ToolCallPayload| Self::ToolCall {
                name: p.name,
                arguments: p.arguments,
            }),
            "tool_result" => {
                serde_json::from_str(data).map(|p: ToolResultPayload| Self::ToolResult {
                    name: p.name,
                    result: p.result,
                    error: p.error,
                })
            }
            "done" => serde_json::from_str(data)
                .map(|p: DonePayload| Self::Done { message: p.message }),
            "error" => serde_json::from_str(data)
                .map(|p: ErrorPayload| Self::Error { message: p.message }),
            other => {
                debug!(event = other, "Skipping unrecognized stream event");
                return None;
            }
        };

        match event {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(event = name, error = %e, "Skipping malformed event payload");
                None
            }
        }
    }

    /// Whether this event ends the message's streaming lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}

/// Parse one raw record into an event.
///
/// The expected shape is an `event: <name>` line followed by a
/// `data: <json>` line. Comment lines (leading `:`) and unknown lines are
/// ignored. A record without both parts, or with malformed JSON, yields
/// `None` and is skipped.
pub fn parse_record(record: &str) -> Option<AssistantEvent> {
    let mut event_name: Option<&str> = None;
    let mut data: Option<&str> = None;

    for line in record.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(name) = line.strip_prefix("event:") {
            event_name = Some(name.trim());
        } else if let Some(payload) = line.strip_prefix("data:") {
            data = Some(payload.trim());
        }
    }

    match (event_name, data) {
        (Some(name), Some(data)) => AssistantEvent::parse(name, data),
        _ => {
            debug!("Skipping record without event/data lines");
            None
        }
    }
}
