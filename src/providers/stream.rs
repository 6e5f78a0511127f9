//! Streaming relay
//!
//! Upstream SSE bodies are read chunk by chunk on a spawned task, translated
//! into OpenAI-shaped payloads and forwarded to the client through an mpsc
//! channel. When the upstream ends (or the client goes away) the usage seen so
//! far is reported on a oneshot channel.

use super::{RelayedResponse, UsageHandle};
use crate::models::openai::{OpenAIStreamChoice, OpenAIStreamDelta, OpenAIStreamResponse};
use crate::models::Usage;
use axum::response::sse::{Event, KeepAlive};
use axum::response::{IntoResponse, Sse};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

/// Turns upstream `data:` payloads into client payloads
pub trait StreamTranslator: Send + 'static {
    /// Translate one upstream payload into zero or more client payloads
    fn on_payload(&mut self, payload: &str) -> Vec<String>;

    /// Payloads to emit after the upstream ends normally
    fn finish(&mut self) -> Vec<String> {
        Vec::new()
    }

    /// Usage accumulated so far
    fn usage(&self) -> Usage;
}

/// Line buffer for SSE bodies whose lines may be split across chunks
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns the `data:` payloads of every completed line
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(payload) = parse_data_line(&line) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flush a trailing line that was not newline-terminated
    pub fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.pending);
        parse_data_line(&line)
    }
}

fn parse_data_line(line: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim_end_matches(['\r', '\n']);
    let data = text.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data);
    if data.is_empty() {
        None
    } else {
        Some(data.to_string())
    }
}

/// Relay an upstream SSE body to the client
pub fn relay_stream<T: StreamTranslator>(response: reqwest::Response, mut translator: T) -> RelayedResponse {
    let (tx, rx) = mpsc::channel::<Result<Event, axum::Error>>(100);
    let (usage_tx, usage_rx) = oneshot::channel::<Usage>();

    tokio::spawn(async move {
        let mut upstream = response.bytes_stream();
        let mut buffer = SseLineBuffer::new();
        let mut client_gone = false;

        'relay: while let Some(chunk) = upstream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    warn!("Upstream stream error: {}", e);
                    break;
                }
            };

            for payload in buffer.push(&chunk) {
                for out in translator.on_payload(&payload) {
                    if tx.send(Ok(Event::default().data(out))).await.is_err() {
                        debug!("Client disconnected");
                        client_gone = true;
                        break 'relay;
                    }
                }
            }
        }

        if !client_gone {
            let mut tail: Vec<String> = buffer
                .finish()
                .map(|payload| translator.on_payload(&payload))
                .unwrap_or_default();
            tail.extend(translator.finish());
            for out in tail {
                if tx.send(Ok(Event::default().data(out))).await.is_err() {
                    break;
                }
            }
        }

        let usage = translator.usage();
        debug!("Stream finished with usage {:?}", usage);
        let _ = usage_tx.send(usage);
    });

    let sse = Sse::new(ReceiverStream::new(rx)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    );

    RelayedResponse {
        response: sse.into_response(),
        usage: UsageHandle::Streaming(usage_rx),
    }
}

/// Serialized OpenAI chat completion chunk
pub fn chat_chunk(
    id: &str,
    created: u64,
    model: &str,
    delta: OpenAIStreamDelta,
    finish_reason: Option<String>,
) -> String {
    let chunk = OpenAIStreamResponse {
        id: id.to_string(),
        object: "chat.completion.chunk".to_string(),
        created,
        model: model.to_string(),
        choices: vec![OpenAIStreamChoice {
            index: 0,
            delta,
            finish_reason,
        }],
        usage: None,
    };
    serde_json::to_string(&chunk).unwrap_or_default()
}

/// Seconds since the Unix epoch
pub fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

pub const DONE: &str = "[DONE]";
