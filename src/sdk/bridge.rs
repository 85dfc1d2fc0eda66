use crate::error::{ApiErrorType, ServerError};
use crate::protocol::client_events::ClientEvent;
use crate::protocol::models::{AudioEncoding, Item, SessionConfig, TurnDetection};
use crate::protocol::server_events::{ServerEvent, event_type};
use crate::{Error, RealtimeClient, Result};

use super::handlers::{BridgeEvent, EventHandlers, EventKind};
use super::tools::{ToolCall, ToolRegistry, render_output};
use super::transport::{EventSink, EventSource};

use futures::FutureExt;
use parking_lot::{Mutex as SyncMutex, RwLock};
use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, watch};

/// Connection lifecycle of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BridgeState {
    #[default]
    Disconnected,
    Handshaking,
    Listening,
}

/// Everything needed to open and configure a session.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub voice: String,
    pub instructions: Option<String>,
    pub turn_detection: TurnDetection,
    pub audio_encoding: AudioEncoding,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            url: crate::transport::ws::WS_BASE_URL.to_string(),
            api_key: None,
            model: crate::protocol::models::DEFAULT_MODEL.to_string(),
            voice: crate::protocol::models::DEFAULT_VOICE.to_string(),
            instructions: None,
            turn_detection: TurnDetection::default(),
            audio_encoding: AudioEncoding::default(),
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    state: BridgeState,
    session_id: Option<String>,
}

struct Inner {
    settings: BridgeSettings,
    tools: RwLock<ToolRegistry>,
    handlers: RwLock<EventHandlers>,
    sink: Mutex<Option<Box<dyn EventSink>>>,
    session: SyncMutex<SessionState>,
    closing: watch::Sender<bool>,
    call_sequence: AtomicU64,
}

/// Owns the single duplex connection to the realtime service.
///
/// Cloning yields another handle onto the same session, so the audio pump
/// and console can send while the receive loop runs in `connect`.
#[derive(Clone)]
pub struct RealtimeBridge {
    inner: Arc<Inner>,
}

impl RealtimeBridge {
    #[must_use]
    pub fn new(settings: BridgeSettings, tools: ToolRegistry, handlers: EventHandlers) -> Self {
        let (closing, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                settings,
                tools: RwLock::new(tools),
                handlers: RwLock::new(handlers),
                sink: Mutex::new(None),
                session: SyncMutex::new(SessionState::default()),
                closing,
                call_sequence: AtomicU64::new(0),
            }),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &BridgeSettings {
        &self.inner.settings
    }

    #[must_use]
    pub fn state(&self) -> BridgeState {
        self.inner.session.lock().state
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() != BridgeState::Disconnected
    }

    /// Identifier assigned by the server in `session.created`.
    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.inner.session.lock().session_id.clone()
    }

    /// Register (or replace) a tool handler with an explicit parameter schema.
    pub fn register_tool<F, Fut>(&self, name: &str, description: &str, parameters: Value, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.inner
            .tools
            .write()
            .register(name, Some(description.to_string()), parameters, handler);
    }

    /// Register (or replace) a tool whose arguments decode into `TArgs`.
    pub fn register_typed_tool<TArgs, TResp, F, Fut>(&self, name: &str, description: &str, handler: F)
    where
        TArgs: DeserializeOwned + JsonSchema + Send + 'static,
        TResp: Serialize + Send + 'static,
        F: Fn(TArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TResp>> + Send + 'static,
    {
        self.inner
            .tools
            .write()
            .tool_with_description(name, description, handler);
    }

    /// Register (or replace) the handler for one event kind.
    pub fn register_event_handler<F, Fut>(&self, kind: EventKind, handler: F)
    where
        F: Fn(BridgeEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.inner.handlers.write().insert(kind, handler);
    }

    #[must_use]
    pub fn tool_names(&self) -> Vec<String> {
        self.inner
            .tools
            .read()
            .definitions()
            .iter()
            .map(|d| d.name.clone())
            .collect()
    }

    /// Session configuration sent right after the handshake.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        let settings = &self.inner.settings;
        let mut config = SessionConfig::new(settings.model.clone(), settings.voice.clone());
        config.instructions.clone_from(&settings.instructions);
        config.turn_detection = Some(settings.turn_detection.clone());
        let tools = self.inner.tools.read().as_tools();
        if !tools.is_empty() {
            config.tools = Some(tools);
        }
        config
    }

    /// Open the WebSocket, configure the session and run the receive loop
    /// until the connection closes.
    ///
    /// # Errors
    /// Returns [`Error::Connection`] if the handshake fails, [`Error::Config`]
    /// if no API key is configured, or the transport error that ended the loop.
    pub async fn connect(&self) -> Result<()> {
        let settings = &self.inner.settings;
        let api_key = settings
            .api_key
            .clone()
            .ok_or_else(|| Error::Config("OPENAI_API_KEY is not set".to_string()))?;

        self.begin_session().await?;
        let client = match RealtimeClient::connect(&settings.url, &api_key, &settings.model).await {
            Ok(client) => client,
            Err(err) => {
                tracing::error!("Failed to connect to OpenAI Realtime API: {err}");
                self.set_idle_state(BridgeState::Disconnected).await;
                return Err(err);
            }
        };
        let (mut sender, receiver) = client.split();
        if self.closing_requested() {
            tracing::info!("Disconnect requested during handshake");
            if let Err(err) = sender.close().await {
                tracing::debug!("Error while closing realtime connection: {err}");
            }
            self.set_idle_state(BridgeState::Disconnected).await;
            return Ok(());
        }
        self.serve(Box::new(sender), Box::new(receiver)).await
    }

    /// Configure the session over an already-open channel and run the receive
    /// loop on it until the peer closes, a transport error occurs, or
    /// [`disconnect`](Self::disconnect) is called.
    ///
    /// # Errors
    /// Returns an error if a session is already active, the session
    /// configuration cannot be sent, or the transport fails mid-session.
    pub async fn run(&self, sink: Box<dyn EventSink>, source: Box<dyn EventSource>) -> Result<()> {
        self.begin_session().await?;
        self.serve(sink, source).await
    }

    /// Claim the bridge for a new session. Leaves an active session untouched.
    async fn begin_session(&self) -> Result<()> {
        let slot = self.inner.sink.lock().await;
        if slot.is_some() {
            return Err(Error::Connection("a session is already active".to_string()));
        }
        self.inner.closing.send_replace(false);
        self.set_state(BridgeState::Handshaking);
        Ok(())
    }

    async fn serve(&self, sink: Box<dyn EventSink>, source: Box<dyn EventSource>) -> Result<()> {
        {
            let mut slot = self.inner.sink.lock().await;
            if slot.is_some() {
                return Err(Error::Connection("a session is already active".to_string()));
            }
            if self.closing_requested() {
                drop(slot);
                self.set_idle_state(BridgeState::Disconnected).await;
                return Ok(());
            }
            *slot = Some(sink);
        }
        self.inner.call_sequence.store(0, Ordering::SeqCst);

        let update = ClientEvent::SessionUpdate {
            event_id: None,
            session: Box::new(self.session_config()),
        };
        if let Err(err) = self.send_event(update).await {
            tracing::error!("Failed to send session configuration: {err}");
            self.teardown().await;
            return Err(Error::Connection(err.to_string()));
        }
        tracing::info!("Sent session configuration");
        self.set_state(BridgeState::Listening);

        let result = self.receive_loop(source).await;
        self.teardown().await;
        result
    }

    /// Close the connection if open. Always leaves the bridge disconnected.
    pub async fn disconnect(&self) {
        self.inner.closing.send_replace(true);
        let sink = self.inner.sink.lock().await.take();
        if let Some(mut sink) = sink {
            if let Err(err) = sink.close().await {
                tracing::debug!("Error while closing realtime connection: {err}");
            }
        }
        self.set_state(BridgeState::Disconnected);
        tracing::info!("Disconnected from OpenAI Realtime API");
    }

    /// Append a raw PCM chunk to the remote input buffer.
    ///
    /// # Errors
    /// Returns [`Error::NotConnected`] when no session is active.
    pub async fn send_audio(&self, pcm: &[u8]) -> Result<()> {
        self.ensure_connected()?;
        if pcm.is_empty() {
            return Ok(());
        }
        let audio = self.inner.settings.audio_encoding.encode(pcm);
        self.send_event(ClientEvent::InputAudioBufferAppend { event_id: None, audio })
            .await
    }

    /// Add a user message to the conversation and ask for a response.
    ///
    /// # Errors
    /// Returns [`Error::NotConnected`] when no session is active.
    pub async fn send_text(&self, text: &str) -> Result<()> {
        self.ensure_connected()?;
        self.send_event(ClientEvent::item(Item::user_text(text))).await?;
        self.send_event(ClientEvent::response_create()).await
    }

    /// # Errors
    /// Returns [`Error::NotConnected`] when no session is active.
    pub async fn commit_audio_buffer(&self) -> Result<()> {
        self.ensure_connected()?;
        self.send_event(ClientEvent::InputAudioBufferCommit { event_id: None })
            .await
    }

    /// Ask the server to stop generating. An in-flight tool call is not
    /// interrupted.
    ///
    /// # Errors
    /// Returns [`Error::NotConnected`] when no session is active.
    pub async fn cancel_response(&self) -> Result<()> {
        self.ensure_connected()?;
        self.send_event(ClientEvent::ResponseCancel { event_id: None }).await
    }

    /// Send a raw protocol event.
    ///
    /// # Errors
    /// Returns [`Error::NotConnected`] when no session is active, or the send error.
    pub async fn send_raw(&self, event: ClientEvent) -> Result<()> {
        self.ensure_connected()?;
        self.send_event(event).await
    }

    #[allow(clippy::result_large_err)]
    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    async fn send_event(&self, event: ClientEvent) -> Result<()> {
        let mut slot = self.inner.sink.lock().await;
        let sink = slot.as_mut().ok_or(Error::NotConnected)?;
        sink.send(event).await
    }

    fn set_state(&self, state: BridgeState) {
        let mut session = self.inner.session.lock();
        if session.state != state {
            tracing::debug!("Bridge state {:?} -> {state:?}", session.state);
        }
        session.state = state;
        if state == BridgeState::Disconnected {
            session.session_id = None;
        }
    }

    fn closing_requested(&self) -> bool {
        *self.inner.closing.borrow()
    }

    /// Update the state only while no session owns the channel.
    async fn set_idle_state(&self, state: BridgeState) {
        let slot = self.inner.sink.lock().await;
        if slot.is_none() {
            self.set_state(state);
        }
    }

    async fn teardown(&self) {
        self.inner.sink.lock().await.take();
        self.set_state(BridgeState::Disconnected);
    }

    async fn receive_loop(&self, mut source: Box<dyn EventSource>) -> Result<()> {
        let mut closing = self.inner.closing.subscribe();
        loop {
            let frame = tokio::select! {
                frame = source.next_frame() => frame,
                _ = closing.wait_for(|c| *c) => {
                    tracing::debug!("Receive loop stopped by disconnect");
                    return Ok(());
                }
            };
            match frame {
                Ok(Some(text)) => self.handle_frame(&text).await,
                Ok(None) => {
                    tracing::info!("OpenAI connection closed");
                    self.report_transport_error(&Error::ConnectionClosed).await;
                    return Ok(());
                }
                Err(err) => {
                    tracing::error!("Error in event listener: {err}");
                    self.report_transport_error(&err).await;
                    return Err(err);
                }
            }
        }
    }

    async fn report_transport_error(&self, err: &Error) {
        let error = ServerError {
            error_type: ApiErrorType::Unknown,
            code: Some(err.kind().to_string()),
            message: err.to_string(),
            param: None,
            event_id: None,
        };
        self.emit(&EventKind::Error, BridgeEvent::Error(error)).await;
    }

    /// Decode one inbound frame and dispatch it. Never fails: decode errors
    /// and handler errors are logged and the loop moves on.
    async fn handle_frame(&self, frame: &str) {
        let value: Value = match serde_json::from_str(frame) {
            Ok(value) => value,
            Err(err) => {
                tracing::error!(
                    "Failed to decode JSON: {err} ({})",
                    crate::safe_truncate(frame, 256)
                );
                return;
            }
        };
        let raw_type = event_type(&value).map(str::to_owned);
        tracing::debug!("Received event: {}", raw_type.as_deref().unwrap_or("<untyped>"));

        self.dispatch_event(ServerEvent::from_value(value.clone())).await;

        if let Some(raw_type) = raw_type {
            self.emit(&EventKind::Raw(raw_type), BridgeEvent::Raw(value)).await;
        }
    }

    async fn dispatch_event(&self, event: ServerEvent) {
        match event {
            ServerEvent::SessionCreated { session, .. } => {
                tracing::info!("Session created: {}", session.id);
                self.inner.session.lock().session_id = Some(session.id);
            }
            ServerEvent::FunctionCallArgumentsDone { call_id, name, arguments, .. } => {
                let sequence = self.inner.call_sequence.fetch_add(1, Ordering::SeqCst);
                let call = ToolCall {
                    name,
                    call_id,
                    arguments: parse_arguments(&arguments),
                    sequence,
                };
                self.handle_function_call(call).await;
            }
            ServerEvent::AudioDelta { delta, .. } => {
                if !delta.is_empty() {
                    self.emit(&EventKind::AudioDelta, BridgeEvent::AudioDelta(delta)).await;
                }
            }
            ServerEvent::AudioDone { .. } => {
                self.emit(&EventKind::AudioDone, BridgeEvent::AudioDone).await;
            }
            ServerEvent::TextDelta { delta, .. } => {
                if !delta.is_empty() {
                    self.emit(&EventKind::TextDelta, BridgeEvent::TextDelta(delta)).await;
                }
            }
            ServerEvent::TextDone { text, .. } => {
                self.emit(&EventKind::TextDone, BridgeEvent::TextDone(text)).await;
            }
            ServerEvent::Error { error, .. } => {
                tracing::error!("OpenAI API error: {error:?}");
                self.emit(&EventKind::Error, BridgeEvent::Error(error)).await;
            }
            ServerEvent::SessionUpdated { .. } | ServerEvent::Unknown(_) => {}
        }
    }

    async fn emit(&self, kind: &EventKind, event: BridgeEvent) {
        let handler = self.inner.handlers.read().get(kind);
        if let Some(handler) = handler {
            match AssertUnwindSafe(handler(event)).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => tracing::warn!("Event handler for {kind} failed: {err}"),
                Err(_) => tracing::error!("Event handler for {kind} panicked"),
            }
        }
    }

    /// Serve one function call: exactly one `function_call_output` followed
    /// by one `response.create`, whatever the handler does.
    async fn handle_function_call(&self, call: ToolCall) {
        tracing::info!(
            "Function call: {} with call_id: {} (#{})",
            call.name,
            call.call_id,
            call.sequence
        );
        let output = self.execute_tool(&call).await;

        let item = Item::function_output(call.call_id.clone(), output);
        if let Err(err) = self.send_event(ClientEvent::item(item)).await {
            tracing::error!("Failed to send output for call {}: {err}", call.call_id);
        }
        if let Err(err) = self.send_event(ClientEvent::response_create()).await {
            tracing::error!("Failed to resume response after call {}: {err}", call.call_id);
        }
    }

    async fn execute_tool(&self, call: &ToolCall) -> String {
        let handler = self.inner.tools.read().handler(&call.name);
        let Some(handler) = handler else {
            tracing::warn!("Unknown function call: {}", call.name);
            let message = format!("Unknown function: {}", call.name);
            return soft_failure(&message, &message, "unknown_function");
        };

        match AssertUnwindSafe(handler(call.arguments.clone())).catch_unwind().await {
            Ok(Ok(value)) => render_output(&value),
            Ok(Err(err)) => {
                tracing::error!("Error executing function {}: {err}", call.name);
                soft_failure(
                    &err.to_string(),
                    &format!("The {} tool failed: {err}", call.name),
                    err.kind(),
                )
            }
            Err(_) => {
                tracing::error!("Function {} panicked", call.name);
                let message = format!("The {} tool crashed before returning a result.", call.name);
                soft_failure(&message, &message, "panic")
            }
        }
    }
}

/// Decode function-call arguments. Anything that is not a JSON object yields
/// an empty map; the failure is never reported to the remote as such.
fn parse_arguments(arguments: &str) -> Value {
    match serde_json::from_str::<Value>(arguments) {
        Ok(value @ Value::Object(_)) => value,
        Ok(other) => {
            tracing::warn!("Function call arguments are not an object: {other}");
            Value::Object(Map::new())
        }
        Err(err) => {
            tracing::warn!("Failed to parse function call arguments: {err}");
            Value::Object(Map::new())
        }
    }
}

fn soft_failure(error: &str, message: &str, error_type: &str) -> String {
    json!({
        "success": false,
        "error": error,
        "message": message,
        "error_type": error_type,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_arguments_become_empty_map() {
        assert_eq!(parse_arguments("{not json"), json!({}));
        assert_eq!(parse_arguments(""), json!({}));
        assert_eq!(parse_arguments("[1,2]"), json!({}));
        assert_eq!(parse_arguments(r#"{"a":1}"#), json!({"a": 1}));
    }

    #[test]
    fn soft_failure_shape() {
        let payload: Value = serde_json::from_str(&soft_failure("boom", "It failed.", "io_error")).unwrap();
        assert_eq!(payload["success"], json!(false));
        assert_eq!(payload["error"], json!("boom"));
        assert_eq!(payload["message"], json!("It failed."));
    }

    #[tokio::test]
    async fn operations_require_connection() {
        let bridge = RealtimeBridge::new(BridgeSettings::default(), ToolRegistry::new(), EventHandlers::new());
        assert!(matches!(bridge.send_audio(&[1, 2]).await, Err(Error::NotConnected)));
        assert!(matches!(bridge.send_text("hi").await, Err(Error::NotConnected)));
        assert!(matches!(bridge.commit_audio_buffer().await, Err(Error::NotConnected)));
        assert!(matches!(bridge.cancel_response().await, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let bridge = RealtimeBridge::new(BridgeSettings::default(), ToolRegistry::new(), EventHandlers::new());
        bridge.disconnect().await;
        bridge.disconnect().await;
        assert_eq!(bridge.state(), BridgeState::Disconnected);
    }

    #[tokio::test]
    async fn connect_without_api_key_fails_fast() {
        let bridge = RealtimeBridge::new(BridgeSettings::default(), ToolRegistry::new(), EventHandlers::new());
        assert!(matches!(bridge.connect().await, Err(Error::Config(_))));
        assert!(!bridge.is_connected());
    }
}
