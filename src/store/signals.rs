//! Change signals broadcast by the store.

use tokio::sync::broadcast;

/// A state-change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreSignal {
    /// A message was appended.
    MessageAdded { id: String },
    /// A message's content, segments, or streaming flag changed.
    MessageUpdated { id: String },
    /// A message's id was swapped for a server-issued one.
    Rekeyed { old_id: String, new_id: String },
    /// The conversation was cleared.
    Cleared,
    /// A tool that edits the flow structure completed successfully.
    ///
    /// The owner of the graph state subscribes to this instead of the chat
    /// pipeline reaching into it directly.
    FlowMutated { tool: String },
}

/// Errors receiving signals.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("Signal channel closed")]
    Closed,
    #[error("Lagged behind by {0} signals")]
    Lagged(u64),
}

/// Broadcast bus for store signals.
pub struct SignalBus {
    tx: broadcast::Sender<StoreSignal>,
}

impl SignalBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    /// Subscribe to future signals.
    pub fn subscribe(&self) -> SignalReceiver {
        SignalReceiver {
            rx: self.tx.subscribe(),
        }
    }

    /// Emit a signal. Lossy when nobody is subscribed.
    pub fn emit(&self, signal: StoreSignal) {
        let _ = self.tx.send(signal);
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver half of the signal bus.
pub struct SignalReceiver {
    rx: broadcast::Receiver<StoreSignal>,
}

impl SignalReceiver {
    /// Receive the next signal.
    pub async fn recv(&mut self) -> Result<StoreSignal, SignalError> {
        self.rx.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => SignalError::Closed,
            broadcast::error::RecvError::Lagged(n) => SignalError::Lagged(n),
        })
    }

    /// Receive without waiting.
    pub fn try_recv(&mut self) -> Result<Option<StoreSignal>, SignalError> {
        match self.rx.try_recv() {
            Ok(signal) => Ok(Some(signal)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Closed) => Err(SignalError::Closed),
            Err(broadcast::error::TryRecvError::Lagged(n)) => Err(SignalError::Lagged(n)),
        }
    }
}
