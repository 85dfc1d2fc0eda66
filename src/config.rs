//! Process configuration.
//!
//! Values come from the environment, optionally seeded from a `.env` file in
//! the working directory. Every value except the API key has a default; the
//! key is only required once a connection is attempted.

use std::path::PathBuf;

use crate::protocol::models::{AudioEncoding, DEFAULT_MODEL, DEFAULT_VOICE, TurnDetection};
use crate::transport::ws::WS_BASE_URL;
use crate::{Error, Result};

pub const DEFAULT_WORKING_DIRECTORY: &str = "./workspace";
pub const DEFAULT_SCRIPTS_DIRECTORY: &str = "./scripts";
pub const DEFAULT_OUTPUT_FILE: &str = "output.md";

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub voice: String,
    pub realtime_url: String,
    pub instructions: Option<String>,
    pub working_directory: PathBuf,
    pub scripts_directory: PathBuf,
    pub audio_encoding: AudioEncoding,
    pub turn_detection: TurnDetection,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            realtime_url: WS_BASE_URL.to_string(),
            instructions: None,
            working_directory: PathBuf::from(DEFAULT_WORKING_DIRECTORY),
            scripts_directory: PathBuf::from(DEFAULT_SCRIPTS_DIRECTORY),
            audio_encoding: AudioEncoding::default(),
            turn_detection: TurnDetection::default(),
        }
    }
}

impl AssistantConfig {
    /// Load `.env` (if present) and read the process environment.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if a value is present but malformed.
    #[allow(clippy::result_large_err)]
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        Self::from_env()
    }

    /// # Errors
    /// Returns [`Error::Config`] if a value is present but malformed.
    #[allow(clippy::result_large_err)]
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if a value is present but malformed.
    #[allow(clippy::result_large_err)]
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let audio_encoding = match get("AUDIO_ENCODING") {
            Some(raw) => raw.parse()?,
            None => defaults.audio_encoding,
        };

        let turn_detection = match get("VAD_THRESHOLD") {
            Some(raw) => {
                let threshold: f32 = raw
                    .parse()
                    .map_err(|_| Error::Config(format!("VAD_THRESHOLD must be a number, got '{raw}'")))?;
                if !(0.0..=1.0).contains(&threshold) {
                    return Err(Error::Config(format!(
                        "VAD_THRESHOLD must be between 0 and 1, got {threshold}"
                    )));
                }
                TurnDetection::ServerVad {
                    threshold,
                    prefix_padding_ms: 300,
                    silence_duration_ms: 500,
                }
            }
            None => defaults.turn_detection,
        };

        Ok(Self {
            api_key: get("OPENAI_API_KEY"),
            model: get("OPENAI_MODEL").unwrap_or(defaults.model),
            voice: get("DEFAULT_VOICE").unwrap_or(defaults.voice),
            realtime_url: get("OPENAI_REALTIME_URL").unwrap_or(defaults.realtime_url),
            instructions: get("ASSISTANT_INSTRUCTIONS"),
            working_directory: get("WORKING_DIRECTORY").map_or(defaults.working_directory, PathBuf::from),
            scripts_directory: get("SCRIPTS_DIRECTORY").map_or(defaults.scripts_directory, PathBuf::from),
            audio_encoding,
            turn_detection,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = AssistantConfig::from_lookup(lookup(&[])).unwrap();
        assert!(config.api_key.is_none());
        assert_eq!(config.voice, "verse");
        assert_eq!(config.working_directory, PathBuf::from("./workspace"));
        assert_eq!(config.audio_encoding, AudioEncoding::Base64);
    }

    #[test]
    fn env_values_override_defaults() {
        let config = AssistantConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("DEFAULT_VOICE", "alloy"),
            ("WORKING_DIRECTORY", "/tmp/notes"),
            ("AUDIO_ENCODING", "hex"),
        ]))
        .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.voice, "alloy");
        assert_eq!(config.working_directory, PathBuf::from("/tmp/notes"));
        assert_eq!(config.audio_encoding, AudioEncoding::Hex);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = AssistantConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "  ")])).unwrap();
        assert!(config.api_key.is_none());
    }

    #[test]
    fn bad_threshold_is_rejected() {
        assert!(AssistantConfig::from_lookup(lookup(&[("VAD_THRESHOLD", "loud")])).is_err());
        assert!(AssistantConfig::from_lookup(lookup(&[("VAD_THRESHOLD", "1.5")])).is_err());
    }
}
