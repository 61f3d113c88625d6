//! The chat send pipeline.
//!
//! [`ChatSession`] ties the pieces together: it opens a stream through the
//! [`AssistantClient`], dispatches each event onto the [`ChatStore`] and
//! [`Typewriter`], and settles the turn according to how the stream ended.
//! One stream per conversation: a second send while one is in flight is
//! rejected, not queued.

mod dispatch;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{ChatConfig, Settings};
use crate::protocol::{ChatRequest, HistoryMessage};
use crate::store::{ChatStore, ConversationMessage, MessagePatch, SignalReceiver, StoreError};
use crate::transport::{AssistantClient, EventReceiver, TransportError};
use crate::typewriter::Typewriter;

use dispatch::{apply_event, TurnOutcome};

/// Suffix appended when the user stops a stream mid-turn.
const STOPPED_SUFFIX: &str = "[stopped]";

/// Chat pipeline failures.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("A stream is already in flight for this conversation")]
    StreamInFlight,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Assistant error: {0}")]
    Stream(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Cancel token for the turn currently streaming, if any.
type CancelSlot = Arc<Mutex<Option<watch::Sender<bool>>>>;

fn lock_cancel(slot: &CancelSlot) -> MutexGuard<'_, Option<watch::Sender<bool>>> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

/// Clonable handle that cancels the owning session's in-flight stream.
///
/// [`ChatSession::send`] borrows the session for the whole turn, so the
/// handle exists to reach the cancel token from another task while a send
/// is in progress. Stopping when no stream is in flight is a no-op.
#[derive(Clone)]
pub struct StopHandle {
    cancel: CancelSlot,
}

impl StopHandle {
    /// Cancel the in-flight stream, if any. The partial content is kept and
    /// the turn finalizes as "stopped" rather than errored.
    pub fn stop(&self) {
        if let Some(tx) = lock_cancel(&self.cancel).as_ref() {
            let _ = tx.send(true);
        }
    }
}

/// One conversation against the flow assistant.
pub struct ChatSession {
    client: AssistantClient,
    store: ChatStore,
    typewriter: Typewriter,
    config: ChatConfig,
    model: Option<String>,
    cancel: CancelSlot,
    in_flight: AtomicBool,
}

impl ChatSession {
    /// Build a session from settings.
    pub fn new(settings: &Settings) -> Result<Self, TransportError> {
        let client = AssistantClient::new(&settings.client)?;
        Ok(Self::with_client(client, settings))
    }

    fn with_client(client: AssistantClient, settings: &Settings) -> Self {
        Self {
            client,
            store: ChatStore::new(),
            typewriter: Typewriter::new(settings.typewriter.clone()),
            config: settings.chat.clone(),
            model: settings.client.model.clone(),
            cancel: Arc::new(Mutex::new(None)),
            in_flight: AtomicBool::new(false),
        }
    }

    /// The conversation state.
    pub fn store(&self) -> &ChatStore {
        &self.store
    }

    /// Subscribe to store change signals (including `FlowMutated`).
    pub fn subscribe(&self) -> SignalReceiver {
        self.store.subscribe()
    }

    /// Read access to the typewriter, for rendering `displayed()` text.
    pub fn typewriter(&self) -> &Typewriter {
        &self.typewriter
    }

    /// Start the typewriter's background tick driver.
    pub fn start_typewriter(&mut self) {
        self.typewriter.start();
    }

    /// Stop the typewriter's background tick driver.
    pub async fn stop_typewriter(&mut self) {
        self.typewriter.stop().await;
    }

    /// Whether a stream is currently in flight.
    pub fn is_streaming(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Hand out a handle that can cancel this session's streams from
    /// another task, including while a [`send`](Self::send) is in flight.
    pub fn cancel_handle(&self) -> StopHandle {
        StopHandle {
            cancel: Arc::clone(&self.cancel),
        }
    }

    /// Cancel the in-flight stream, if any. The partial content is kept and
    /// the turn finalizes as "stopped" rather than errored. A stop with no
    /// stream in flight is a no-op and does not affect later turns.
    pub fn stop(&self) {
        if let Some(tx) = lock_cancel(&self.cancel).as_ref() {
            let _ = tx.send(true);
        }
    }

    /// Swap a local placeholder id for a server-issued one across the store
    /// and the typewriter in one step.
    pub fn adopt_server_id(&mut self, old_id: &str, new_id: &str) -> Result<(), StoreError> {
        self.store.rekey(old_id, new_id)?;
        self.typewriter.rekey(old_id, new_id);
        Ok(())
    }

    /// Cancel any in-flight stream and drop all conversation state.
    pub fn clear(&mut self) {
        self.stop();
        self.store.clear();
        self.typewriter.clear();
    }

    /// Send a user message and drive the response stream to completion.
    ///
    /// Returns the assistant message's id. On cancellation the turn settles
    /// as "stopped" and this still returns `Ok`; transport failures and
    /// stream-level `error` events return `Err` after finalizing the
    /// message.
    pub async fn send(&mut self, flow_id: Uuid, text: &str) -> Result<String, ChatError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(ChatError::StreamInFlight);
        }
        let result = self.send_inner(flow_id, text).await;
        *lock_cancel(&self.cancel) = None;
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    async fn send_inner(&mut self, flow_id: Uuid, text: &str) -> Result<String, ChatError> {
        // Each turn gets its own cancel token, so a stop aimed at an earlier
        // turn can never carry over.
        let (cancel_tx, cancel_rx) = watch::channel(false);
        *lock_cancel(&self.cancel) = Some(cancel_tx);

        let history = self.history();
        info!(flow_id = %flow_id, history_len = history.len(), "Sending chat turn");

        self.store
            .add_message(ConversationMessage::user(Uuid::new_v4().to_string(), text));

        let assistant_id = Uuid::new_v4().to_string();
        self.store
            .add_message(ConversationMessage::assistant_placeholder(&assistant_id));
        self.typewriter.set_target(&assistant_id, "");

        let mut request = ChatRequest::new(flow_id, text).with_history(history);
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }

        let rx = match self.client.stream_chat(&request, cancel_rx).await {
            Ok(rx) => rx,
            Err(e) => {
                self.finalize_error(&assistant_id, &e.to_string())?;
                return Err(e.into());
            }
        };

        self.run_stream(&assistant_id, rx).await?;
        Ok(assistant_id)
    }

    /// Drain the event channel, applying each event in arrival order.
    async fn run_stream(
        &mut self,
        message_id: &str,
        mut rx: EventReceiver,
    ) -> Result<(), ChatError> {
        while let Some(item) = rx.recv().await {
            match item {
                Ok(event) => {
                    let outcome = apply_event(
                        &mut self.store,
                        &self.typewriter,
                        &self.config.mutation_tools,
                        message_id,
                        event,
                    )?;
                    match outcome {
                        Some(TurnOutcome::Completed) => {
                            debug!(message_id, "Turn completed");
                            return Ok(());
                        }
                        Some(TurnOutcome::Failed(message)) => {
                            warn!(message_id, error = %message, "Turn failed");
                            return Err(ChatError::Stream(message));
                        }
                        None => {}
                    }
                }
                Err(TransportError::Cancelled) => {
                    self.finalize_stopped(message_id)?;
                    return Ok(());
                }
                Err(e) => {
                    self.finalize_error(message_id, &e.to_string())?;
                    return Err(e.into());
                }
            }
        }

        // Stream ended without a terminal event; keep what was streamed.
        debug!(message_id, "Stream ended without terminal event");
        self.store
            .update_message(message_id, MessagePatch {
                content: None,
                is_streaming: Some(false),
            })?;
        self.typewriter.finish(message_id);
        Ok(())
    }

    fn finalize_stopped(&mut self, message_id: &str) -> Result<(), StoreError> {
        let partial = self
            .store
            .message(message_id)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let content = if partial.is_empty() {
            STOPPED_SUFFIX.to_string()
        } else {
            format!("{partial} {STOPPED_SUFFIX}")
        };
        info!(message_id, "Stream stopped by user");
        self.store
            .update_message(message_id, MessagePatch::finalize(content.clone()))?;
        self.typewriter.set_target(message_id, content);
        self.typewriter.finish(message_id);
        Ok(())
    }

    fn finalize_error(&mut self, message_id: &str, error: &str) -> Result<(), StoreError> {
        let content = format!("Error: {error}");
        self.store
            .update_message(message_id, MessagePatch::finalize(content.clone()))?;
        self.typewriter.set_target(message_id, content);
        self.typewriter.finish(message_id);
        Ok(())
    }

    /// Prior finalized turns as request history, oldest first.
    fn history(&self) -> Vec<HistoryMessage> {
        self.store
            .messages()
            .iter()
            .filter(|m| !m.is_streaming && !m.content.is_empty())
            .map(|m| HistoryMessage {
                role: m.role,
                content: m.content.clone(),
            })
            .collect()
    }
}
