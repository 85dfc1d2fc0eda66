//! Realtime bridge: the duplex session, its event handlers and the tool
//! registry that serves server-initiated function calls.

mod bridge;
mod builder;
mod handlers;
mod tools;
mod transport;

pub use bridge::{BridgeSettings, BridgeState, RealtimeBridge};
pub use builder::BridgeBuilder;
pub use handlers::{BridgeEvent, EventHandler, EventHandlers, EventKind};
pub use tools::{ToolCall, ToolDefinition, ToolHandler, ToolRegistry, parameters_schema, render_output};
pub use transport::{BoxFuture, EventSink, EventSource};
