use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Value, json};

use super::Script;
use crate::{Error, Result};

const SCRIPT_EXTENSION: &str = "json";

#[derive(Debug, Clone)]
enum Backing {
    Memory(BTreeMap<String, Arc<Script>>),
    Directory(PathBuf),
}

/// Script definitions keyed by name (the file stem when directory-backed).
#[derive(Debug, Clone)]
pub struct ScriptLibrary {
    backing: Backing,
}

impl ScriptLibrary {
    /// In-memory library holding the built-in catalog.
    #[must_use]
    pub fn builtin() -> Self {
        let scripts = default_scripts()
            .into_iter()
            .filter_map(|(name, value)| match serde_json::from_value::<Script>(value) {
                Ok(script) => Some((name.to_string(), script)),
                Err(err) => {
                    tracing::error!("Built-in script {name} is malformed: {err}");
                    None
                }
            });
        Self::in_memory(scripts)
    }

    #[must_use]
    pub fn in_memory<I, K>(scripts: I) -> Self
    where
        I: IntoIterator<Item = (K, Script)>,
        K: Into<String>,
    {
        let map = scripts
            .into_iter()
            .map(|(name, script)| (name.into(), Arc::new(script)))
            .collect();
        Self { backing: Backing::Memory(map) }
    }

    /// Directory-backed library. The directory is created if needed and any
    /// built-in script without a file is written out.
    ///
    /// # Errors
    /// Returns an error if the directory or a seed file cannot be written.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        for (name, value) in default_scripts() {
            let path = dir.join(format!("{name}.{SCRIPT_EXTENSION}"));
            if !tokio::fs::try_exists(&path).await? {
                tokio::fs::write(&path, serde_json::to_string_pretty(&value)?).await?;
                tracing::debug!("Seeded script {}", path.display());
            }
        }
        Ok(Self { backing: Backing::Directory(dir) })
    }

    /// Look up a script by name.
    ///
    /// # Errors
    /// Returns [`Error::ScriptNotFound`] if no definition exists, or a
    /// serialization error if the stored definition is malformed.
    pub async fn get(&self, name: &str) -> Result<Arc<Script>> {
        match &self.backing {
            Backing::Memory(map) => map
                .get(name)
                .cloned()
                .ok_or_else(|| Error::ScriptNotFound(name.to_string())),
            Backing::Directory(dir) => {
                if !is_plain_name(name) {
                    return Err(Error::ScriptNotFound(name.to_string()));
                }
                let path = dir.join(format!("{name}.{SCRIPT_EXTENSION}"));
                let text = match tokio::fs::read_to_string(&path).await {
                    Ok(text) => text,
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                        return Err(Error::ScriptNotFound(name.to_string()));
                    }
                    Err(err) => return Err(err.into()),
                };
                Ok(Arc::new(serde_json::from_str(&text)?))
            }
        }
    }

    /// Name → description for every readable definition. Unreadable files are
    /// logged and skipped.
    pub async fn list(&self) -> BTreeMap<String, String> {
        let mut listed = BTreeMap::new();
        for name in self.names().await {
            match self.get(&name).await {
                Ok(script) => {
                    listed.insert(name, describe(&script));
                }
                Err(err) => tracing::warn!("Error loading script {name}: {err}"),
            }
        }
        listed
    }

    /// Sorted script names.
    pub async fn names(&self) -> Vec<String> {
        let dir = match &self.backing {
            Backing::Memory(map) => return map.keys().cloned().collect(),
            Backing::Directory(dir) => dir,
        };
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!("Cannot read scripts directory {}: {err}", dir.display());
                return Vec::new();
            }
        };
        let mut names = Vec::new();
        loop {
            let path = match entries.next_entry().await {
                Ok(Some(entry)) => entry.path(),
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!("Error reading scripts directory {}: {err}", dir.display());
                    break;
                }
            };
            if path.extension().is_some_and(|ext| ext == SCRIPT_EXTENSION) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_owned());
                }
            }
        }
        names.sort();
        names
    }
}

impl Default for ScriptLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

fn describe(script: &Script) -> String {
    if script.description.is_empty() {
        "No description".to_string()
    } else {
        script.description.clone()
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// The built-in script catalog as raw definitions.
#[must_use]
pub fn default_scripts() -> Vec<(&'static str, Value)> {
    vec![
        (
            "blog_writer",
            json!({
                "name": "Blog Post Writing Assistant",
                "description": "Helps create engaging blog posts through conversation",
                "stages": [
                    {
                        "name": "discovery",
                        "prompt": "First, let's explore your topic. What are you passionate about? What unique perspective do you bring?",
                        "questions": ["What's your main message?", "Who's your audience?", "What's your unique angle?"]
                    },
                    {
                        "name": "outline",
                        "prompt": "Now let's structure your ideas into a compelling narrative...",
                        "actions": ["create_outline", "suggest_sections"]
                    },
                    {
                        "name": "writing",
                        "prompt": "Let's bring your outline to life with engaging prose...",
                        "actions": ["write_section", "add_examples", "refine_tone"]
                    }
                ],
                "output_format": "markdown",
                "interactive_elements": ["brainstorming", "feedback_loops", "style_coaching"]
            }),
        ),
        (
            "improv_game",
            json!({
                "name": "Yes, And... Improv Game",
                "description": "Play collaborative storytelling games",
                "stages": [
                    {
                        "name": "setup",
                        "prompt": "Let's create a story together! I'll start with a scenario, and we'll build on each other's ideas using 'Yes, and...'",
                        "rules": ["Accept what's given", "Add new information", "Keep it flowing"]
                    },
                    {
                        "name": "play",
                        "prompt": "Remember to build on what I say and add your own twist!",
                        "actions": ["continue_story", "add_character", "introduce_conflict"]
                    }
                ],
                "output_format": "markdown",
                "save_transcript": true
            }),
        ),
        (
            "email_workshop",
            json!({
                "name": "Email Writing Workshop",
                "description": "Craft effective emails through guided practice",
                "stages": [
                    {
                        "name": "context",
                        "prompt": "Tell me about the email you need to write. What's the situation?",
                        "questions": ["What's your relationship?", "What outcome do you want?", "Any sensitivities?"]
                    },
                    {
                        "name": "drafting",
                        "prompt": "Let's draft this email together, starting with your key message...",
                        "techniques": ["pyramid_principle", "action_oriented", "empathy_mapping"]
                    }
                ],
                "output_format": "markdown"
            }),
        ),
        (
            "brainstorm_session",
            json!({
                "name": "Creative Brainstorming Session",
                "description": "Generate and develop ideas interactively",
                "stages": [
                    {
                        "name": "diverge",
                        "prompt": "Let's generate as many ideas as possible. No judgment, just creativity!",
                        "techniques": ["word_association", "reverse_brainstorming", "scamper_method"]
                    },
                    {
                        "name": "converge",
                        "prompt": "Now let's identify the most promising ideas and develop them further...",
                        "actions": ["rank_ideas", "combine_concepts", "detail_development"]
                    }
                ],
                "output_format": "markdown",
                "deliverable": "idea_map"
            }),
        ),
        (
            "interview_prep",
            json!({
                "name": "Interview Preparation Coach",
                "description": "Practice interviews with real-time feedback",
                "stages": [
                    {
                        "name": "setup",
                        "prompt": "Let's prepare for your interview. What role and company?",
                        "preparation": ["research_questions", "story_development", "answer_structure"]
                    },
                    {
                        "name": "practice",
                        "prompt": "I'll ask you interview questions and provide feedback on your responses...",
                        "feedback_areas": ["clarity", "specificity", "energy", "structure"]
                    }
                ],
                "output_format": "markdown",
                "creates": "interview_notes"
            }),
        ),
    ]
}
