#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use realtime_scribe::protocol::models::Item;
use realtime_scribe::sdk::{BoxFuture, EventSink, EventSource};
use realtime_scribe::{ClientEvent, Error, RealtimeBridge, Result};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const WAIT: Duration = Duration::from_secs(2);

/// Ordered record of what happened, shared between the sink and handlers.
pub type Journal = Arc<Mutex<Vec<String>>>;

pub struct MockSink {
    tx: mpsc::UnboundedSender<ClientEvent>,
    journal: Journal,
}

impl EventSink for MockSink {
    fn send(&mut self, event: ClientEvent) -> BoxFuture<'_, Result<()>> {
        let entry = match &event {
            ClientEvent::ConversationItemCreate { item, .. } => match item.as_ref() {
                Item::FunctionCallOutput { call_id, .. } => format!("output:{call_id}"),
                other => format!("item:{other}"),
            },
            other => other.event_type().to_string(),
        };
        self.journal.lock().push(entry);
        let result = self.tx.send(event).map_err(|_| Error::ConnectionClosed);
        Box::pin(async move { result })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

pub struct MockSource {
    rx: mpsc::UnboundedReceiver<Result<Option<String>>>,
}

impl EventSource for MockSource {
    fn next_frame(&mut self) -> BoxFuture<'_, Result<Option<String>>> {
        Box::pin(async move { self.rx.recv().await.unwrap_or(Ok(None)) })
    }
}

/// A bridge session running over in-memory channels.
pub struct Harness {
    pub server: mpsc::UnboundedSender<Result<Option<String>>>,
    pub outbound: mpsc::UnboundedReceiver<ClientEvent>,
    pub journal: Journal,
    pub task: JoinHandle<Result<()>>,
    pub session_update: ClientEvent,
}

impl Harness {
    /// Start `bridge.run` and consume the initial `session.update`.
    pub async fn start(bridge: &RealtimeBridge) -> Self {
        let (out_tx, mut outbound) = mpsc::unbounded_channel();
        let (server, in_rx) = mpsc::unbounded_channel();
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));
        let sink = MockSink {
            tx: out_tx,
            journal: Arc::clone(&journal),
        };
        let source = MockSource { rx: in_rx };
        let runner = bridge.clone();
        let task = tokio::spawn(async move { runner.run(Box::new(sink), Box::new(source)).await });

        let session_update = tokio::time::timeout(WAIT, outbound.recv())
            .await
            .expect("session.update not sent")
            .expect("sink closed");
        assert_eq!(session_update.event_type(), "session.update");

        Self {
            server,
            outbound,
            journal,
            task,
            session_update,
        }
    }

    pub fn push(&self, event: Value) {
        self.push_text(&event.to_string());
    }

    pub fn push_text(&self, frame: &str) {
        self.server
            .send(Ok(Some(frame.to_string())))
            .expect("receive loop gone");
    }

    pub fn fail(&self, err: Error) {
        self.server.send(Err(err)).expect("receive loop gone");
    }

    pub async fn next_event(&mut self) -> ClientEvent {
        tokio::time::timeout(WAIT, self.outbound.recv())
            .await
            .expect("timed out waiting for outbound event")
            .expect("sink closed")
    }

    /// Wait for one function call's output and the `response.create` after it.
    pub async fn next_output(&mut self) -> (String, Value) {
        let event = self.next_event().await;
        let output = match event {
            ClientEvent::ConversationItemCreate { item, .. } => match *item {
                Item::FunctionCallOutput { call_id, output } => {
                    let value = serde_json::from_str(&output).unwrap_or(Value::String(output));
                    (call_id, value)
                }
                other => panic!("expected function_call_output, got {other}"),
            },
            other => panic!("expected conversation.item.create, got {}", other.event_type()),
        };
        let follow_up = self.next_event().await;
        assert_eq!(follow_up.event_type(), "response.create");
        output
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().clone()
    }

    /// Close the inbound stream and wait for the loop to finish.
    pub async fn finish(self) -> Result<()> {
        let _ = self.server.send(Ok(None));
        tokio::time::timeout(WAIT, self.task)
            .await
            .expect("receive loop did not stop")
            .expect("receive loop panicked")
    }
}

/// A transport whose peer is already gone.
pub fn detached_transport() -> (Box<dyn EventSink>, Box<dyn EventSource>) {
    let (tx, _) = mpsc::unbounded_channel();
    let (_, rx) = mpsc::unbounded_channel();
    let sink = MockSink {
        tx,
        journal: Arc::new(Mutex::new(Vec::new())),
    };
    (Box::new(sink), Box::new(MockSource { rx }))
}

pub fn function_call(call_id: &str, name: &str, arguments: &str) -> Value {
    serde_json::json!({
        "type": "response.function_call_arguments.done",
        "event_id": format!("evt_{call_id}"),
        "response_id": "resp_1",
        "item_id": "item_1",
        "call_id": call_id,
        "name": name,
        "arguments": arguments,
    })
}

/// Raw-type handler that forwards every matching frame to a channel.
pub fn observe(bridge: &RealtimeBridge, event_type: &str) -> mpsc::UnboundedReceiver<Value> {
    let (tx, rx) = mpsc::unbounded_channel();
    bridge.register_event_handler(
        realtime_scribe::EventKind::raw(event_type),
        move |event| {
            if let realtime_scribe::BridgeEvent::Raw(value) = event {
                let _ = tx.send(value);
            }
            async { Ok(()) }
        },
    );
    rx
}

pub async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out")
        .expect("channel closed")
}
