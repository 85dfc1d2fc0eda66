//! Per-process coordinator: owns the file store, the script session and the
//! bridge, and wires the tools and transcript logging between them.

use std::sync::Arc;

use chrono::Local;
use parking_lot::Mutex;

use crate::config::{AssistantConfig, DEFAULT_OUTPUT_FILE};
use crate::files::FileStore;
use crate::script::{ScriptLibrary, ScriptSession};
use crate::sdk::{BridgeBuilder, EventHandlers, RealtimeBridge};
use crate::{Result, tools};

pub struct Assistant {
    config: AssistantConfig,
    files: Arc<FileStore>,
    scripts: Arc<Mutex<ScriptSession>>,
    bridge: RealtimeBridge,
}

impl Assistant {
    /// Open the working and scripts directories, register every tool and
    /// make sure the default output file exists.
    ///
    /// # Errors
    /// Returns an error if either directory cannot be prepared.
    pub async fn new(config: AssistantConfig) -> Result<Self> {
        let files = Arc::new(FileStore::open(&config.working_directory).await?);
        let library = ScriptLibrary::open(&config.scripts_directory).await?;
        let scripts = Arc::new(Mutex::new(ScriptSession::new(library)));

        let registry = tools::default_registry(Arc::clone(&files), Arc::clone(&scripts)).await;
        let handlers = transcript_handlers(Arc::clone(&files));
        let bridge = BridgeBuilder::from_config(&config)
            .tools(registry)
            .handlers(handlers)
            .build();

        bootstrap_output(&files).await?;
        tracing::info!("Registered tools: {}", bridge.tool_names().join(", "));

        Ok(Self {
            config,
            files,
            scripts,
            bridge,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &AssistantConfig {
        &self.config
    }

    #[must_use]
    pub const fn bridge(&self) -> &RealtimeBridge {
        &self.bridge
    }

    #[must_use]
    pub const fn files(&self) -> &Arc<FileStore> {
        &self.files
    }

    #[must_use]
    pub const fn scripts(&self) -> &Arc<Mutex<ScriptSession>> {
        &self.scripts
    }

    /// Connect and serve the session until it ends.
    ///
    /// # Errors
    /// Returns the error that ended the session.
    pub async fn run(&self) -> Result<()> {
        self.bridge.connect().await
    }

    pub async fn shutdown(&self) {
        self.bridge.disconnect().await;
    }
}

/// Completed text responses are appended to the default output file.
fn transcript_handlers(files: Arc<FileStore>) -> EventHandlers {
    EventHandlers::new()
        .on_text_done(move |text| {
            let files = Arc::clone(&files);
            async move {
                tracing::info!("AI: {text}");
                let stamp = Local::now().format("%H:%M:%S");
                let entry = format!("\n**[{stamp}] AI Response:**\n{text}\n");
                files.append(DEFAULT_OUTPUT_FILE, &entry).await?;
                Ok(())
            }
        })
        .on_error(|error| async move {
            tracing::error!(
                "Realtime error ({}): {}",
                error.code.as_deref().unwrap_or("unknown"),
                error.message
            );
            Ok(())
        })
}

async fn bootstrap_output(files: &FileStore) -> Result<()> {
    let path = files.path_for(DEFAULT_OUTPUT_FILE)?;
    if tokio::fs::try_exists(&path).await? {
        return Ok(());
    }
    let header = format!(
        "# AI Assistant Session - {}\n\nReady to start!\n",
        Local::now().format("%Y-%m-%d %H:%M")
    );
    files.create(DEFAULT_OUTPUT_FILE, &header).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::{BridgeEvent, EventKind};

    async fn assistant() -> (tempfile::TempDir, Assistant) {
        let dir = tempfile::tempdir().unwrap();
        let config = AssistantConfig {
            working_directory: dir.path().join("workspace"),
            scripts_directory: dir.path().join("scripts"),
            ..AssistantConfig::default()
        };
        let assistant = Assistant::new(config).await.unwrap();
        (dir, assistant)
    }

    #[tokio::test]
    async fn bootstraps_output_file() {
        let (_dir, assistant) = assistant().await;
        let content = assistant.files().read(DEFAULT_OUTPUT_FILE).await.unwrap();
        assert!(content.starts_with("# AI Assistant Session - "));
        assert!(content.contains("Ready to start!"));
    }

    #[tokio::test]
    async fn existing_output_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = dir.path().join("workspace");
        std::fs::create_dir_all(&workspace).unwrap();
        std::fs::write(workspace.join("output.md"), "keep me").unwrap();
        let config = AssistantConfig {
            working_directory: workspace,
            scripts_directory: dir.path().join("scripts"),
            ..AssistantConfig::default()
        };
        let assistant = Assistant::new(config).await.unwrap();
        assert_eq!(assistant.files().read("output").await.unwrap(), "keep me");
    }

    #[tokio::test]
    async fn registers_file_and_script_tools() {
        let (_dir, assistant) = assistant().await;
        let names = assistant.bridge().tool_names();
        assert!(names.contains(&"file_operation".to_string()));
        assert!(names.contains(&"load_script".to_string()));
        assert_eq!(names.len(), 7);
    }

    #[tokio::test]
    async fn text_responses_are_logged_to_output() {
        let dir = tempfile::tempdir().unwrap();
        let files = Arc::new(FileStore::open(dir.path()).await.unwrap());
        let handlers = transcript_handlers(Arc::clone(&files));
        let handler = handlers.get(&EventKind::TextDone).unwrap();
        handler(BridgeEvent::TextDone("Here is your outline.".to_string()))
            .await
            .unwrap();
        let content = files.read(DEFAULT_OUTPUT_FILE).await.unwrap();
        assert!(content.contains("AI Response:**\nHere is your outline.\n"));
    }
}
