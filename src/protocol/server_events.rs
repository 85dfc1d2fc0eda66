use serde::{Deserialize, Deserializer, Serialize};
use super::models::{ArbitraryJson, Session};
use crate::error::ServerError;

/// Inbound events the bridge understands. Anything else is kept verbatim in
/// [`ServerEvent::Unknown`] so raw-type handlers can still observe it.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Error {
        event_id: Option<String>,
        error: ServerError,
    },
    SessionCreated {
        event_id: Option<String>,
        session: Session,
    },
    SessionUpdated {
        event_id: Option<String>,
        session: Session,
    },
    FunctionCallArgumentsDone {
        event_id: Option<String>,
        response_id: Option<String>,
        item_id: Option<String>,
        call_id: String,
        name: String,
        arguments: String,
    },
    AudioDelta {
        event_id: Option<String>,
        response_id: Option<String>,
        item_id: Option<String>,
        delta: String,
    },
    AudioDone {
        event_id: Option<String>,
        response_id: Option<String>,
        item_id: Option<String>,
    },
    TextDelta {
        event_id: Option<String>,
        response_id: Option<String>,
        item_id: Option<String>,
        delta: String,
    },
    TextDone {
        event_id: Option<String>,
        response_id: Option<String>,
        item_id: Option<String>,
        text: String,
    },
    Unknown(ArbitraryJson),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type")]
enum ServerEventRepr {
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        event_id: Option<String>,
        #[serde(default)]
        error: ServerError,
    },
    #[serde(rename = "session.created")]
    SessionCreated {
        #[serde(default)]
        event_id: Option<String>,
        #[serde(default)]
        session: Session,
    },
    #[serde(rename = "session.updated")]
    SessionUpdated {
        #[serde(default)]
        event_id: Option<String>,
        #[serde(default)]
        session: Session,
    },
    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone {
        #[serde(default)]
        event_id: Option<String>,
        #[serde(default)]
        response_id: Option<String>,
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        call_id: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        arguments: String,
    },
    #[serde(rename = "response.audio.delta", alias = "response.output_audio.delta")]
    AudioDelta {
        #[serde(default)]
        event_id: Option<String>,
        #[serde(default)]
        response_id: Option<String>,
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        delta: String,
    },
    #[serde(rename = "response.audio.done", alias = "response.output_audio.done")]
    AudioDone {
        #[serde(default)]
        event_id: Option<String>,
        #[serde(default)]
        response_id: Option<String>,
        #[serde(default)]
        item_id: Option<String>,
    },
    #[serde(rename = "response.text.delta", alias = "response.output_text.delta")]
    TextDelta {
        #[serde(default)]
        event_id: Option<String>,
        #[serde(default)]
        response_id: Option<String>,
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        delta: String,
    },
    #[serde(rename = "response.text.done", alias = "response.output_text.done")]
    TextDone {
        #[serde(default)]
        event_id: Option<String>,
        #[serde(default)]
        response_id: Option<String>,
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        text: String,
    },
}

impl From<ServerEventRepr> for ServerEvent {
    fn from(repr: ServerEventRepr) -> Self {
        match repr {
            ServerEventRepr::Error { event_id, error } => Self::Error { event_id, error },
            ServerEventRepr::SessionCreated { event_id, session } => {
                Self::SessionCreated { event_id, session }
            }
            ServerEventRepr::SessionUpdated { event_id, session } => {
                Self::SessionUpdated { event_id, session }
            }
            ServerEventRepr::FunctionCallArgumentsDone {
                event_id,
                response_id,
                item_id,
                call_id,
                name,
                arguments,
            } => Self::FunctionCallArgumentsDone {
                event_id,
                response_id,
                item_id,
                call_id,
                name,
                arguments,
            },
            ServerEventRepr::AudioDelta { event_id, response_id, item_id, delta } => {
                Self::AudioDelta { event_id, response_id, item_id, delta }
            }
            ServerEventRepr::AudioDone { event_id, response_id, item_id } => {
                Self::AudioDone { event_id, response_id, item_id }
            }
            ServerEventRepr::TextDelta { event_id, response_id, item_id, delta } => {
                Self::TextDelta { event_id, response_id, item_id, delta }
            }
            ServerEventRepr::TextDone { event_id, response_id, item_id, text } => {
                Self::TextDone { event_id, response_id, item_id, text }
            }
        }
    }
}

impl<'de> Deserialize<'de> for ServerEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = ArbitraryJson::deserialize(deserializer)?;
        Ok(Self::from_value(value))
    }
}

impl ServerEvent {
    /// Interpret an already-decoded JSON frame. Frames of an unknown or
    /// malformed shape become [`ServerEvent::Unknown`].
    #[must_use]
    pub fn from_value(value: ArbitraryJson) -> Self {
        match ServerEventRepr::deserialize(&value) {
            Ok(repr) => repr.into(),
            Err(err) => {
                tracing::debug!("Failed to parse ServerEvent: {err}");
                Self::Unknown(value)
            }
        }
    }

    #[must_use]
    pub fn event_id(&self) -> Option<&str> {
        match self {
            Self::Error { event_id, .. }
            | Self::SessionCreated { event_id, .. }
            | Self::SessionUpdated { event_id, .. }
            | Self::FunctionCallArgumentsDone { event_id, .. }
            | Self::AudioDelta { event_id, .. }
            | Self::AudioDone { event_id, .. }
            | Self::TextDelta { event_id, .. }
            | Self::TextDone { event_id, .. } => event_id.as_deref(),
            Self::Unknown(value) => value.get("event_id").and_then(|v| v.as_str()),
        }
    }
}

/// Extract the `type` discriminator of a raw frame.
#[must_use]
pub fn event_type(value: &ArbitraryJson) -> Option<&str> {
    value.get("type").and_then(|v| v.as_str())
}
