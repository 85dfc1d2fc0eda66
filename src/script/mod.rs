//! Staged scripts: the definition store and the engine that walks one
//! active script stage by stage.

mod engine;
mod library;

pub use engine::{AdvanceOutcome, LoadedScript, Progress, ScriptSession};
pub use library::{ScriptLibrary, default_scripts};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One step of a script. Fields other than `name` and `prompt` (questions,
/// actions, techniques, ...) are carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stage {
    pub name: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Script {
    #[serde(rename = "name")]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub stages: Vec<Stage>,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}
