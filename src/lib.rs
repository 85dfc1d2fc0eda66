#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

pub mod assistant;
pub mod audio;
pub mod config;
pub mod error;
pub mod files;
pub mod protocol;
pub mod script;
pub mod sdk;
pub mod tools;
pub mod transport;

pub use assistant::Assistant;
pub use config::AssistantConfig;
pub use error::{Error, Result, ServerError};
pub use files::{FileInfo, FileStore};
pub use protocol::client_events::ClientEvent;
pub use protocol::models::{AudioEncoding, AudioFormat, Item, SessionConfig, Tool, TurnDetection};
pub use protocol::server_events::ServerEvent;
pub use script::{AdvanceOutcome, Progress, Script, ScriptLibrary, ScriptSession, Stage};
pub use sdk::{
    BridgeBuilder, BridgeEvent, BridgeState, EventHandlers, EventKind, EventSink, EventSource,
    RealtimeBridge, ToolCall, ToolRegistry,
};

use futures::{SinkExt, StreamExt};
use protocol::models;
use tokio_tungstenite::tungstenite::protocol::Message;
use transport::ws::WsStream;

const TRACE_LOG_MAX_BYTES: usize = 1024;
const MAX_INPUT_AUDIO_CHUNK_BYTES: usize = 15 * 1024 * 1024;
const TRACE_TRUNCATE_SUFFIX: &str = "... (truncated)";

/// Framed JSON client over the realtime WebSocket.
///
/// Outbound events are typed; inbound frames are handed out as raw text so the
/// caller decides how to react to frames that fail to decode.
#[must_use]
pub struct RealtimeClient {
    stream: WsStream,
}

impl RealtimeClient {
    /// Connect to the realtime endpoint.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the handshake fails.
    pub async fn connect(base_url: &str, api_key: &str, model: &str) -> Result<Self> {
        let stream = transport::ws::connect(base_url, api_key, model).await?;
        Ok(Self { stream })
    }

    /// Split the client into a sender and a receiver for concurrent usage.
    pub fn split(self) -> (RealtimeSender, RealtimeReceiver) {
        let (write, read) = self.stream.split();
        (RealtimeSender { write }, RealtimeReceiver { read })
    }
}

pub(crate) fn safe_truncate(s: &str, max_bytes: usize) -> std::borrow::Cow<'_, str> {
    if s.len() <= max_bytes {
        return std::borrow::Cow::Borrowed(s);
    }

    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    std::borrow::Cow::Owned(format!(
        "{} {} {} bytes",
        &s[..end],
        TRACE_TRUNCATE_SUFFIX,
        s.len() - end
    ))
}

#[allow(clippy::result_large_err)]
fn encode_client_event(event: &ClientEvent) -> Result<String> {
    validate_client_event(event)?;
    let json = serde_json::to_string(event)?;
    tracing::debug!("Sending event: {}", event.event_type());
    tracing::trace!("Sending frame: {}", safe_truncate(&json, TRACE_LOG_MAX_BYTES));
    Ok(json)
}

/// The sending half of a split `RealtimeClient`.
pub struct RealtimeSender {
    write: futures::stream::SplitSink<WsStream, Message>,
}

impl RealtimeSender {
    /// Send a client event.
    ///
    /// # Errors
    /// Returns an error if serialization or sending fails.
    pub async fn send(&mut self, event: ClientEvent) -> Result<()> {
        let json = encode_client_event(&event)?;
        self.write.send(Message::Text(json.into())).await?;
        Ok(())
    }

    /// Send a close frame and shut down the write half.
    ///
    /// # Errors
    /// Returns an error if the close handshake cannot be sent.
    pub async fn close(&mut self) -> Result<()> {
        self.write.close().await?;
        Ok(())
    }
}

/// The receiving half of a split `RealtimeClient`.
pub struct RealtimeReceiver {
    read: futures::stream::SplitStream<WsStream>,
}

impl RealtimeReceiver {
    /// Receive the next text frame; `None` once the server closed the socket.
    ///
    /// # Errors
    /// Returns an error if the WebSocket fails.
    pub async fn next_frame(&mut self) -> Result<Option<String>> {
        while let Some(msg) = self.read.next().await {
            match msg? {
                Message::Text(text) => {
                    tracing::trace!("Received frame (split): {}", safe_truncate(&text, TRACE_LOG_MAX_BYTES));
                    return Ok(Some(text.to_string()));
                }
                Message::Close(frame) => {
                    tracing::info!("WebSocket connection closed by server: {frame:?}");
                    return Ok(None);
                }
                _ => (),
            }
        }
        Ok(None)
    }
}

#[allow(clippy::result_large_err)]
fn validate_client_event(event: &ClientEvent) -> Result<()> {
    match event {
        ClientEvent::InputAudioBufferAppend { audio, .. } => {
            if audio.is_empty() {
                return Err(Error::InvalidClientEvent(
                    "input_audio_buffer.append requires audio".to_string(),
                ));
            }
            // Base64 is the denser of the two encodings, so this is an upper bound.
            let size = audio.len() / 4 * 3;
            if size > MAX_INPUT_AUDIO_CHUNK_BYTES {
                return Err(Error::InvalidClientEvent(format!(
                    "input_audio_buffer.append exceeds 15MB ({size} bytes)",
                )));
            }
        }
        ClientEvent::SessionUpdate { session, .. } => {
            if let Some(tools) = &session.tools {
                validate_tools(tools)?;
            }
        }
        _ => {}
    }
    Ok(())
}

#[allow(clippy::result_large_err)]
fn validate_tools(tools: &[models::Tool]) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for tool in tools {
        let name = tool.name();
        if name.is_empty() {
            return Err(Error::InvalidClientEvent("tool name must not be empty".to_string()));
        }
        if !seen.insert(name) {
            return Err(Error::InvalidClientEvent(format!("duplicate tool declaration: {name}")));
        }
    }
    Ok(())
}
