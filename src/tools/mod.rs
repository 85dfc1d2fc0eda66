//! Concrete tool families exposed to the model.

mod file_tool;
mod script_tool;

pub use file_tool::{FILE_TOOL_NAME, FileOperation, FileOperationArgs, FileTool};
pub use script_tool::{LoadScriptArgs, ScriptTool, script_tool_names};

use std::sync::Arc;

use parking_lot::Mutex;

use crate::files::FileStore;
use crate::script::ScriptSession;
use crate::sdk::ToolRegistry;

/// Registry holding the file tool and every script tool.
pub async fn default_registry(files: Arc<FileStore>, scripts: Arc<Mutex<ScriptSession>>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    FileTool::new(files).register(&mut registry);
    ScriptTool::new(scripts).register(&mut registry).await;
    registry
}
