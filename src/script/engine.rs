use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use super::{Script, ScriptLibrary, Stage};
use crate::Result;

pub const NO_ACTIVE_STAGE: &str = "No active script or stage";

/// Result of loading a script: the definition and its opening instructions.
#[derive(Debug, Clone)]
pub struct LoadedScript {
    pub name: String,
    pub script: Arc<Script>,
    pub instructions: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdvanceOutcome {
    Advanced {
        stage: Stage,
        instructions: String,
        stage_number: usize,
        total_stages: usize,
    },
    /// Already on the last stage (or the script has none); nothing changed.
    AtFinalStage { is_complete: bool },
    NoActiveScript,
}

impl AdvanceOutcome {
    #[must_use]
    pub const fn advanced(&self) -> bool {
        matches!(self, Self::Advanced { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// 1-based position; zero when no script is active.
    pub current_stage: usize,
    pub total_stages: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_name: Option<String>,
    pub is_complete: bool,
}

impl Progress {
    const fn inactive() -> Self {
        Self {
            active: false,
            script_name: None,
            title: None,
            current_stage: 0,
            total_stages: 0,
            stage_name: None,
            is_complete: false,
        }
    }
}

#[derive(Debug, Clone)]
struct ActiveScript {
    name: String,
    script: Arc<Script>,
    index: usize,
}

impl ActiveScript {
    fn stage(&self) -> Option<&Stage> {
        self.script.stages.get(self.index)
    }
}

/// Holds at most one active script and a cursor into its stages.
///
/// The cursor only moves forward through [`ScriptSession::advance_stage`] and
/// never past the last stage.
#[derive(Debug, Clone, Default)]
pub struct ScriptSession {
    library: ScriptLibrary,
    active: Option<ActiveScript>,
}

impl ScriptSession {
    #[must_use]
    pub const fn new(library: ScriptLibrary) -> Self {
        Self { library, active: None }
    }

    #[must_use]
    pub const fn library(&self) -> &ScriptLibrary {
        &self.library
    }

    /// Name → description of every script the library knows.
    pub async fn list_scripts(&self) -> BTreeMap<String, String> {
        self.library.list().await
    }

    /// Make `name` the active script, positioned on its first stage.
    ///
    /// # Errors
    /// Returns [`crate::Error::ScriptNotFound`] if the library has no such
    /// script. The previously active script is kept in that case.
    pub async fn load_script(&mut self, name: &str) -> Result<LoadedScript> {
        let script = self.library.get(name).await?;
        Ok(self.activate(name, script))
    }

    /// Install an already fetched definition as the active script.
    pub fn activate(&mut self, name: &str, script: Arc<Script>) -> LoadedScript {
        tracing::info!("Loaded script {name} ({} stages)", script.stages.len());
        self.active = Some(ActiveScript {
            name: name.to_string(),
            script: Arc::clone(&script),
            index: 0,
        });
        LoadedScript {
            name: name.to_string(),
            script,
            instructions: self.stage_instructions(),
        }
    }

    #[must_use]
    pub fn active_script(&self) -> Option<(&str, &Script)> {
        self.active
            .as_ref()
            .map(|active| (active.name.as_str(), active.script.as_ref()))
    }

    #[must_use]
    pub fn current_stage(&self) -> Option<&Stage> {
        self.active.as_ref().and_then(ActiveScript::stage)
    }

    /// Prompt of the current stage, or a fixed sentinel when there is none.
    #[must_use]
    pub fn stage_instructions(&self) -> String {
        match self.current_stage() {
            Some(stage) if !stage.prompt.is_empty() => stage.prompt.clone(),
            Some(_) => "No instructions for this stage".to_string(),
            None => NO_ACTIVE_STAGE.to_string(),
        }
    }

    pub fn advance_stage(&mut self) -> AdvanceOutcome {
        let Some(active) = self.active.as_mut() else {
            return AdvanceOutcome::NoActiveScript;
        };
        let total = active.script.stages.len();
        if active.index + 1 >= total {
            return AdvanceOutcome::AtFinalStage { is_complete: true };
        }
        active.index += 1;
        let stage = active.script.stages[active.index].clone();
        let stage_number = active.index + 1;
        tracing::info!("Advanced {} to stage {stage_number}/{total}: {}", active.name, stage.name);
        AdvanceOutcome::Advanced {
            stage,
            instructions: self.stage_instructions(),
            stage_number,
            total_stages: total,
        }
    }

    #[must_use]
    pub fn progress(&self) -> Progress {
        let Some(active) = &self.active else {
            return Progress::inactive();
        };
        let total = active.script.stages.len();
        Progress {
            active: true,
            script_name: Some(active.name.clone()),
            title: Some(active.script.title.clone()),
            current_stage: active.index + 1,
            total_stages: total,
            stage_name: active.stage().map(|stage| stage.name.clone()),
            is_complete: active.index >= total,
        }
    }

    /// Rewind the active script to its first stage. Returns `false` when no
    /// script is active.
    pub fn reset_script(&mut self) -> bool {
        match self.active.as_mut() {
            Some(active) => {
                active.index = 0;
                true
            }
            None => false,
        }
    }

    pub fn clear_script(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::info!("Cleared script {}", active.name);
        }
    }
}
