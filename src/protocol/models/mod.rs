pub mod audio;
pub mod common;
pub mod items;
pub mod session;
pub mod tools;

pub use audio::{AudioEncoding, AudioFormat, TurnDetection};
pub use common::{ArbitraryJson, DEFAULT_MODEL, DEFAULT_VOICE, JsonSchema, Modality, Role};
pub use items::{ContentPart, Item};
pub use session::{Session, SessionConfig};
pub use tools::Tool;
