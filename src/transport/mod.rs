//! Transport layer for the assistant stream.
//!
//! [`RecordDecoder`] turns raw byte chunks into complete text records,
//! tolerating splits at arbitrary byte positions. [`AssistantClient`] opens
//! the HTTP stream and forwards parsed events over a channel.

mod client;
mod record;

pub use client::{AssistantClient, EventReceiver, TransportError};
pub use record::RecordDecoder;
