use crate::protocol::client_events::ClientEvent;
use crate::{RealtimeReceiver, RealtimeSender, Result};
use std::future::Future;
use std::pin::Pin;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outbound half of the duplex channel.
pub trait EventSink: Send {
    fn send(&mut self, event: ClientEvent) -> BoxFuture<'_, Result<()>>;
    fn close(&mut self) -> BoxFuture<'_, Result<()>>;
}

/// Inbound half of the duplex channel. Yields raw text frames; `None` means
/// the peer closed the connection.
pub trait EventSource: Send {
    fn next_frame(&mut self) -> BoxFuture<'_, Result<Option<String>>>;
}

impl EventSink for RealtimeSender {
    fn send(&mut self, event: ClientEvent) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { Self::send(self, event).await })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { Self::close(self).await })
    }
}

impl EventSource for RealtimeReceiver {
    fn next_frame(&mut self) -> BoxFuture<'_, Result<Option<String>>> {
        Box::pin(async move { Self::next_frame(self).await })
    }
}
