//! Flowchat Library
//!
//! Client-side streaming pipeline for a visual flow-builder AI assistant.
//! The server pushes blank-line-delimited `event:`/`data:` records over a
//! chunked HTTP response; this crate frames and parses that stream,
//! maintains the conversation state, and paces a typewriter-style reveal
//! of the assistant's text.
//!
//! ## Main Components
//!
//! - [`protocol`] - Wire events and the chat request body
//! - [`transport`] - Record framing and the streaming HTTP client
//! - [`store`] - Conversation message store and change signals
//! - [`typewriter`] - Bounded-rate text reveal scheduler
//! - [`chat`] - The send pipeline tying it all together
//! - [`config`] - Settings management
//!
//! ## Quick Start
//!
//! ```ignore
//! use flowchat::{ChatSession, Settings, StoreSignal};
//!
//! let settings = Settings::load_default()?;
//! let mut session = ChatSession::new(&settings)?;
//! session.start_typewriter();
//!
//! let mut signals = session.subscribe();
//! let stop = session.cancel_handle(); // cancels mid-stream from another task
//! let id = session.send(flow_id, "add a chat input to my flow").await?;
//! ```

pub mod chat;
pub mod config;
pub mod protocol;
pub mod store;
pub mod transport;
pub mod typewriter;

// Re-export commonly used types
pub use chat::{ChatError, ChatSession, StopHandle};
pub use config::{ChatConfig, ClientSettings, Settings, SettingsError};
pub use protocol::{parse_record, AssistantEvent, ChatRequest, HistoryMessage, Role};
pub use store::{
    ChatStore, ConversationMessage, MessagePatch, ReasoningBlock, Segment, SignalReceiver,
    StoreError, StoreSignal, ToolCallDetail, ToolCallPatch, ToolStatus,
};
pub use transport::{AssistantClient, RecordDecoder, TransportError};
pub use typewriter::{Typewriter, TypewriterConfig};
