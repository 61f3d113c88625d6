//! Wire protocol for the flow-assistant chat stream.
//!
//! The server pushes UTF-8 text records separated by a blank line. Each
//! record carries an `event: <name>` line and a `data: <json>` line. This
//! module owns the event grammar and the request body sent to open a stream.

mod events;
mod request;

pub use events::{parse_record, AssistantEvent};
pub use request::{ChatRequest, HistoryMessage, Role};
