//! Streaming HTTP client for the assistant endpoint.

use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, warn};

use crate::config::ClientSettings;
use crate::protocol::{parse_record, AssistantEvent, ChatRequest};

use super::RecordDecoder;

/// Transport-level failures.
///
/// Cancellation is a distinct variant so callers can finalize a turn as
/// "stopped" instead of errored.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Stream read error: {0}")]
    Read(String),

    #[error("Stream cancelled")]
    Cancelled,
}

/// Receiver for events parsed off one chat stream.
pub type EventReceiver = mpsc::Receiver<Result<AssistantEvent, TransportError>>;

/// Client for the flow-assistant streaming endpoint.
#[derive(Clone)]
pub struct AssistantClient {
    http: reqwest::Client,
    base_url: String,
}

impl AssistantClient {
    /// Build a client from settings.
    pub fn new(settings: &ClientSettings) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Open a chat stream.
    ///
    /// On success a background task reads the response body, frames it into
    /// records, and forwards each parsed event through the returned channel.
    /// Setting `cancel` to `true` makes the read loop exit promptly with a
    /// final [`TransportError::Cancelled`].
    pub async fn stream_chat(
        &self,
        request: &ChatRequest,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<EventReceiver, TransportError> {
        let url = format!("{}/flow-assistant/chat/stream", self.base_url);
        debug!(url = %url, flow_id = %request.flow_id, "Opening assistant stream");

        let resp = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            error!(status = status.as_u16(), body = %body, "Assistant endpoint rejected request");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let (tx, rx) = mpsc::channel(32);
        let mut byte_stream = resp.bytes_stream();

        tokio::spawn(async move {
            let mut decoder = RecordDecoder::new();
            let mut cancel_open = true;
            let mut record_count = 0u32;

            loop {
                tokio::select! {
                    changed = cancel.changed(), if cancel_open => {
                        match changed {
                            Ok(()) if *cancel.borrow() => {
                                debug!(records = record_count, "Stream cancelled by caller");
                                let _ = tx.send(Err(TransportError::Cancelled)).await;
                                return;
                            }
                            Ok(()) => {}
                            // Cancel handle dropped; nobody can stop us anymore.
                            Err(_) => cancel_open = false,
                        }
                    }
                    chunk = byte_stream.next() => {
                        match chunk {
                            Some(Ok(bytes)) => {
                                for record in decoder.push(&bytes) {
                                    record_count += 1;
                                    let Some(event) = parse_record(&record) else {
                                        continue;
                                    };
                                    if tx.send(Ok(event)).await.is_err() {
                                        warn!("Receiver dropped, stopping stream");
                                        return;
                                    }
                                }
                            }
                            Some(Err(e)) => {
                                let error_str = e.to_string();
                                error!(error = %error_str, "Stream read error");
                                let _ = tx.send(Err(TransportError::Read(error_str))).await;
                                return;
                            }
                            None => {
                                // Best-effort parse of a trailing partial record.
                                if let Some(record) = decoder.finish() {
                                    if let Some(event) = parse_record(&record) {
                                        let _ = tx.send(Ok(event)).await;
                                    }
                                }
                                debug!(records = record_count, "Stream completed");
                                return;
                            }
                        }
                    }
                }
            }
        });

        Ok(rx)
    }
}
