use std::sync::Arc;

use parking_lot::Mutex;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::script::{AdvanceOutcome, ScriptLibrary, ScriptSession};
use crate::sdk::ToolRegistry;
use crate::Error;

const LOAD_SCRIPT: &str = "load_script";
const LIST_SCRIPTS: &str = "list_scripts";
const SCRIPT_PROGRESS: &str = "script_progress";
const ADVANCE_STAGE: &str = "advance_stage";
const RESET_SCRIPT: &str = "reset_script";
const CLEAR_SCRIPT: &str = "clear_script";

/// Names of every tool registered by [`ScriptTool::register`].
#[must_use]
pub const fn script_tool_names() -> [&'static str; 6] {
    [LOAD_SCRIPT, LIST_SCRIPTS, SCRIPT_PROGRESS, ADVANCE_STAGE, RESET_SCRIPT, CLEAR_SCRIPT]
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct LoadScriptArgs {
    /// Name of the script to load
    #[serde(alias = "scriptName")]
    pub script_name: String,
}

/// Tools driving the shared [`ScriptSession`].
#[derive(Debug, Clone)]
pub struct ScriptTool {
    session: Arc<Mutex<ScriptSession>>,
}

impl ScriptTool {
    #[must_use]
    pub const fn new(session: Arc<Mutex<ScriptSession>>) -> Self {
        Self { session }
    }

    /// Parameter schema for `load_script`; the name is restricted to the
    /// scripts known at registration time.
    pub async fn load_script_parameters(&self) -> Value {
        let names = self.library().names().await;
        json!({
            "type": "object",
            "properties": {
                "script_name": {
                    "type": "string",
                    "enum": names,
                    "description": "Name of the script to load"
                }
            },
            "required": ["script_name"]
        })
    }

    pub async fn register(&self, registry: &mut ToolRegistry) {
        let tool = self.clone();
        registry.register(
            LOAD_SCRIPT,
            Some("Load an interactive script to guide the conversation".to_string()),
            self.load_script_parameters().await,
            move |args| {
                let tool = tool.clone();
                async move {
                    let args: LoadScriptArgs = serde_json::from_value(args).map_err(|e| {
                        Error::Validation(format!("Invalid arguments for {LOAD_SCRIPT}: {e}"))
                    })?;
                    Ok(tool.load_script(&args.script_name).await)
                }
            },
        );

        let tool = self.clone();
        registry.register(
            LIST_SCRIPTS,
            Some("List the available interactive scripts".to_string()),
            json!({ "type": "object", "properties": {} }),
            move |_args| {
                let tool = tool.clone();
                async move { Ok::<_, Error>(tool.list_scripts().await) }
            },
        );
        self.register_simple(registry, SCRIPT_PROGRESS, "Report progress through the active script", Self::progress);
        self.register_simple(registry, ADVANCE_STAGE, "Move the active script to its next stage", Self::advance_stage);
        self.register_simple(registry, RESET_SCRIPT, "Restart the active script from its first stage", Self::reset_script);
        self.register_simple(registry, CLEAR_SCRIPT, "Deactivate the current script", Self::clear_script);
    }

    fn register_simple(&self, registry: &mut ToolRegistry, name: &str, description: &str, op: fn(&Self) -> Value) {
        let tool = self.clone();
        registry.register(
            name,
            Some(description.to_string()),
            json!({ "type": "object", "properties": {} }),
            move |_args| {
                let tool = tool.clone();
                async move { Ok::<_, Error>(op(&tool)) }
            },
        );
    }

    /// Snapshot of the library so definitions are read without the session lock.
    fn library(&self) -> ScriptLibrary {
        self.session.lock().library().clone()
    }

    pub async fn load_script(&self, name: &str) -> Value {
        let script = match self.library().get(name).await {
            Ok(script) => script,
            Err(err) => return failure(&err, &format!("Failed to load script '{name}'")),
        };
        let mut session = self.session.lock();
        let loaded = session.activate(name, script);
        json!({
            "success": true,
            "script_name": loaded.name,
            "script_title": loaded.script.title,
            "script_description": loaded.script.description,
            "current_stage": session.current_stage(),
            "instructions": loaded.instructions,
            "progress": session.progress(),
            "message": format!("Loaded script: {}", loaded.script.title),
        })
    }

    pub async fn list_scripts(&self) -> Value {
        let scripts = self.library().list().await;
        json!({
            "success": true,
            "message": format!("Found {} available scripts", scripts.len()),
            "scripts": scripts,
        })
    }

    pub fn progress(&self) -> Value {
        let progress = self.session.lock().progress();
        json!({
            "success": true,
            "progress": progress,
            "message": "Retrieved script progress",
        })
    }

    pub fn advance_stage(&self) -> Value {
        match self.session.lock().advance_stage() {
            AdvanceOutcome::Advanced {
                stage,
                instructions,
                stage_number,
                total_stages,
            } => json!({
                "success": true,
                "current_stage": stage,
                "instructions": instructions,
                "stage_number": stage_number,
                "total_stages": total_stages,
            }),
            AdvanceOutcome::AtFinalStage { is_complete } => json!({
                "success": false,
                "message": "Already at the final stage",
                "is_complete": is_complete,
            }),
            AdvanceOutcome::NoActiveScript => json!({
                "success": false,
                "message": "No active script",
            }),
        }
    }

    pub fn reset_script(&self) -> Value {
        let mut session = self.session.lock();
        if session.reset_script() {
            json!({
                "success": true,
                "progress": session.progress(),
                "instructions": session.stage_instructions(),
                "message": "Script reset to beginning",
            })
        } else {
            json!({ "success": false, "message": "No active script to reset" })
        }
    }

    pub fn clear_script(&self) -> Value {
        self.session.lock().clear_script();
        json!({ "success": true, "message": "Cleared active script" })
    }
}

fn failure(err: &Error, message: &str) -> Value {
    json!({
        "success": false,
        "error": err.to_string(),
        "message": format!("{message}: {err}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> ScriptTool {
        ScriptTool::new(Arc::new(Mutex::new(ScriptSession::new(ScriptLibrary::builtin()))))
    }

    #[tokio::test]
    async fn load_script_reports_stage_and_progress() {
        let tool = tool();
        let out = tool.load_script("blog_writer").await;
        assert_eq!(out["success"], true);
        assert_eq!(out["script_title"], "Blog Post Writing Assistant");
        assert_eq!(out["current_stage"]["name"], "discovery");
        assert!(out["current_stage"]["questions"].is_array());
        assert_eq!(out["progress"]["total_stages"], 3);
    }

    #[tokio::test]
    async fn unknown_script_is_a_soft_failure() {
        let out = tool().load_script("poetry").await;
        assert_eq!(out["success"], false);
        assert_eq!(out["error"], "Script 'poetry' not found");
    }

    #[tokio::test]
    async fn advance_past_last_stage() {
        let tool = tool();
        tool.load_script("improv_game").await;
        let advanced = tool.advance_stage();
        assert_eq!(advanced["stage_number"], 2);
        assert_eq!(advanced["current_stage"]["name"], "play");
        let out = tool.advance_stage();
        assert_eq!(out["success"], false);
        assert_eq!(out["is_complete"], true);
    }

    #[tokio::test]
    async fn schema_enumerates_known_scripts() {
        let params = tool().load_script_parameters().await;
        let names = params["properties"]["script_name"]["enum"].as_array().unwrap();
        assert_eq!(names.len(), 5);
        assert!(names.contains(&json!("interview_prep")));
    }

    #[tokio::test]
    async fn registers_every_script_tool() {
        let mut registry = ToolRegistry::new();
        tool().register(&mut registry).await;
        for name in script_tool_names() {
            assert!(registry.contains(name), "{name} missing");
        }
    }

    #[tokio::test]
    async fn directory_scripts_are_read_at_load_time() {
        let dir = tempfile::tempdir().unwrap();
        let library = ScriptLibrary::open(dir.path()).await.unwrap();
        let tool = ScriptTool::new(Arc::new(Mutex::new(ScriptSession::new(library))));
        std::fs::write(
            dir.path().join("haiku.json"),
            r#"{"name":"Haiku","stages":[{"name":"syllables","prompt":"Count to seventeen","hints":["5-7-5"]}]}"#,
        )
        .unwrap();

        let out = tool.load_script("haiku").await;
        assert_eq!(out["success"], true);
        assert_eq!(out["current_stage"]["hints"], json!(["5-7-5"]));
        assert_eq!(tool.list_scripts().await["scripts"]["haiku"], "No description");
    }

    #[test]
    fn reset_without_script() {
        assert_eq!(tool().reset_script()["success"], false);
    }
}
