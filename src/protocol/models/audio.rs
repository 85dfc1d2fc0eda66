use base64::Engine as _;
use base64::engine::general_purpose;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    #[default]
    Pcm16,
    G711Ulaw,
    G711Alaw,
}

/// Text encoding used for audio payloads on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AudioEncoding {
    #[default]
    Base64,
    Hex,
}

impl AudioEncoding {
    #[must_use]
    pub fn encode(self, bytes: &[u8]) -> String {
        match self {
            Self::Base64 => general_purpose::STANDARD.encode(bytes),
            Self::Hex => hex::encode(bytes),
        }
    }

    /// # Errors
    /// Returns [`Error::Validation`] if the payload is not valid for this encoding.
    #[allow(clippy::result_large_err)]
    pub fn decode(self, payload: &str) -> Result<Vec<u8>> {
        match self {
            Self::Base64 => general_purpose::STANDARD
                .decode(payload.as_bytes())
                .map_err(|e| Error::Validation(format!("invalid base64 audio payload: {e}"))),
            Self::Hex => hex::decode(payload)
                .map_err(|e| Error::Validation(format!("invalid hex audio payload: {e}"))),
        }
    }
}

impl std::str::FromStr for AudioEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "base64" => Ok(Self::Base64),
            "hex" => Ok(Self::Hex),
            other => Err(Error::Config(format!("unknown audio encoding '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnDetection {
    ServerVad {
        threshold: f32,
        prefix_padding_ms: u32,
        silence_duration_ms: u32,
    },
    SemanticVad {
        #[serde(skip_serializing_if = "Option::is_none")]
        eagerness: Option<String>,
    },
}

impl Default for TurnDetection {
    fn default() -> Self {
        Self::ServerVad {
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_encoding_matches_legacy_wire_format() {
        assert_eq!(AudioEncoding::Hex.encode(&[0x00, 0xff, 0x10]), "00ff10");
        assert_eq!(AudioEncoding::Hex.decode("00ff10").unwrap(), vec![0x00, 0xff, 0x10]);
    }

    #[test]
    fn base64_decode_rejects_garbage() {
        assert!(AudioEncoding::Base64.decode("***").is_err());
    }

    #[test]
    fn encoding_parses_from_env_value() {
        assert_eq!("HEX".parse::<AudioEncoding>().unwrap(), AudioEncoding::Hex);
        assert!("wav".parse::<AudioEncoding>().is_err());
    }
}
