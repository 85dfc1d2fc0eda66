use crate::config::AssistantConfig;
use crate::protocol::models::{AudioEncoding, TurnDetection};

use super::bridge::{BridgeSettings, RealtimeBridge};
use super::{EventHandlers, ToolRegistry};

pub struct BridgeBuilder {
    settings: BridgeSettings,
    handlers: EventHandlers,
    tools: ToolRegistry,
}

impl BridgeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            settings: BridgeSettings::default(),
            handlers: EventHandlers::new(),
            tools: ToolRegistry::new(),
        }
    }

    /// Start from the connection-related values of an [`AssistantConfig`].
    #[must_use]
    pub fn from_config(config: &AssistantConfig) -> Self {
        let mut builder = Self::new()
            .url(config.realtime_url.clone())
            .model(config.model.clone())
            .voice(config.voice.clone())
            .turn_detection(config.turn_detection.clone())
            .audio_encoding(config.audio_encoding);
        if let Some(key) = &config.api_key {
            builder = builder.api_key(key.clone());
        }
        if let Some(instructions) = &config.instructions {
            builder = builder.instructions(instructions.clone());
        }
        builder
    }

    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.settings.api_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.settings.url = url.into();
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.settings.model = model.into();
        self
    }

    #[must_use]
    pub fn voice(mut self, voice: impl Into<String>) -> Self {
        self.settings.voice = voice.into();
        self
    }

    #[must_use]
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.settings.instructions = Some(instructions.into());
        self
    }

    #[must_use]
    pub fn turn_detection(mut self, turn_detection: TurnDetection) -> Self {
        self.settings.turn_detection = turn_detection;
        self
    }

    #[must_use]
    pub const fn audio_encoding(mut self, encoding: AudioEncoding) -> Self {
        self.settings.audio_encoding = encoding;
        self
    }

    #[must_use]
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    #[must_use]
    pub fn handlers(mut self, handlers: EventHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    #[must_use]
    pub fn build(self) -> RealtimeBridge {
        RealtimeBridge::new(self.settings, self.tools, self.handlers)
    }
}

impl Default for BridgeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
