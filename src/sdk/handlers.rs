use crate::Result;
use crate::error::ServerError;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use super::transport::BoxFuture;

pub type EventHandler = Arc<dyn Fn(BridgeEvent) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Key under which an event handler is registered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    AudioDelta,
    AudioDone,
    TextDelta,
    TextDone,
    Error,
    /// Catch-all keyed by the exact wire `type` string.
    Raw(String),
}

impl EventKind {
    #[must_use]
    pub fn raw(event_type: impl Into<String>) -> Self {
        Self::Raw(event_type.into())
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AudioDelta => write!(f, "audio-delta"),
            Self::AudioDone => write!(f, "audio-complete"),
            Self::TextDelta => write!(f, "text-delta"),
            Self::TextDone => write!(f, "text-complete"),
            Self::Error => write!(f, "error"),
            Self::Raw(t) => write!(f, "raw:{t}"),
        }
    }
}

/// Payload handed to event handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// Encoded audio payload exactly as received.
    AudioDelta(String),
    AudioDone,
    TextDelta(String),
    TextDone(String),
    Error(ServerError),
    /// Full decoded frame for raw-type handlers.
    Raw(Value),
}

#[derive(Default, Clone)]
pub struct EventHandlers {
    handlers: HashMap<EventKind, EventHandler>,
}

impl EventHandlers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`, replacing any previous one.
    pub fn insert<F, Fut>(&mut self, kind: EventKind, handler: F)
    where
        F: Fn(BridgeEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        tracing::info!("Registered event handler: {kind}");
        self.handlers.insert(kind, Arc::new(move |evt| Box::pin(handler(evt))));
    }

    #[must_use]
    pub fn get(&self, kind: &EventKind) -> Option<EventHandler> {
        self.handlers.get(kind).cloned()
    }

    #[must_use]
    pub fn contains(&self, kind: &EventKind) -> bool {
        self.handlers.contains_key(kind)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    #[must_use]
    pub fn on<F, Fut>(mut self, kind: EventKind, handler: F) -> Self
    where
        F: Fn(BridgeEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.insert(kind, handler);
        self
    }

    #[must_use]
    pub fn on_audio_delta<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on(EventKind::AudioDelta, move |evt| -> BoxFuture<'static, Result<()>> {
            match evt {
                BridgeEvent::AudioDelta(delta) => Box::pin(handler(delta)),
                _ => Box::pin(async { Ok(()) }),
            }
        })
    }

    #[must_use]
    pub fn on_audio_done<F, Fut>(self, handler: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on(EventKind::AudioDone, move |_| handler())
    }

    #[must_use]
    pub fn on_text_delta<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on(EventKind::TextDelta, move |evt| -> BoxFuture<'static, Result<()>> {
            match evt {
                BridgeEvent::TextDelta(delta) => Box::pin(handler(delta)),
                _ => Box::pin(async { Ok(()) }),
            }
        })
    }

    #[must_use]
    pub fn on_text_done<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on(EventKind::TextDone, move |evt| -> BoxFuture<'static, Result<()>> {
            match evt {
                BridgeEvent::TextDone(text) => Box::pin(handler(text)),
                _ => Box::pin(async { Ok(()) }),
            }
        })
    }

    #[must_use]
    pub fn on_error<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(ServerError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on(EventKind::Error, move |evt| -> BoxFuture<'static, Result<()>> {
            match evt {
                BridgeEvent::Error(error) => Box::pin(handler(error)),
                _ => Box::pin(async { Ok(()) }),
            }
        })
    }

    #[must_use]
    pub fn on_raw<F, Fut>(self, event_type: &str, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on(EventKind::raw(event_type), move |evt| -> BoxFuture<'static, Result<()>> {
            match evt {
                BridgeEvent::Raw(value) => Box::pin(handler(value)),
                _ => Box::pin(async { Ok(()) }),
            }
        })
    }
}
