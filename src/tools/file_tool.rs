use std::fmt;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::DEFAULT_OUTPUT_FILE;
use crate::files::FileStore;
use crate::sdk::ToolRegistry;
use crate::{Error, Result};

pub const FILE_TOOL_NAME: &str = "file_operation";
const FILE_TOOL_DESCRIPTION: &str = "Perform operations on local markdown files";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FileOperation {
    Create,
    Read,
    Write,
    Append,
    Insert,
    Replace,
    SaveAs,
    List,
    Backup,
    Info,
}

impl FileOperation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Write => "write",
            Self::Append => "append",
            Self::Insert => "insert",
            Self::Replace => "replace",
            Self::SaveAs => "save_as",
            Self::List => "list",
            Self::Backup => "backup",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for FileOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_filename() -> String {
    DEFAULT_OUTPUT_FILE.to_string()
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct FileOperationArgs {
    /// The type of file operation to perform
    pub operation: FileOperation,
    /// Name of the markdown file to operate on
    #[serde(default = "default_filename")]
    pub filename: String,
    /// Content for write operations
    #[serde(default)]
    pub content: Option<String>,
    /// Line number for insert operations (1-indexed)
    #[serde(default, alias = "lineNumber")]
    pub line_number: Option<i64>,
    /// Regular expression pattern to search for in replace operations
    #[serde(default)]
    pub pattern: Option<String>,
    /// Replacement text for replace operations; `\1` refers to a captured group
    #[serde(default)]
    pub replacement: Option<String>,
}

impl FileOperationArgs {
    #[must_use]
    pub fn new(operation: FileOperation) -> Self {
        Self {
            operation,
            filename: default_filename(),
            content: None,
            line_number: None,
            pattern: None,
            replacement: None,
        }
    }

    #[must_use]
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    #[must_use]
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    #[must_use]
    pub const fn line_number(mut self, line: i64) -> Self {
        self.line_number = Some(line);
        self
    }

    #[must_use]
    pub fn pattern(mut self, pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self.replacement = Some(replacement.into());
        self
    }

    #[allow(clippy::result_large_err)]
    fn require_content(&self) -> Result<&str> {
        self.content.as_deref().ok_or_else(|| {
            Error::Validation(format!("Content is required for {} operation", self.operation))
        })
    }
}

/// The multiplexed `file_operation` tool.
///
/// Every outcome, including a failure, is returned as a JSON payload with a
/// `success` flag so the model always gets an answer.
#[derive(Debug, Clone)]
pub struct FileTool {
    store: Arc<FileStore>,
}

impl FileTool {
    #[must_use]
    pub const fn new(store: Arc<FileStore>) -> Self {
        Self { store }
    }

    pub fn register(&self, registry: &mut ToolRegistry) {
        let tool = self.clone();
        registry.tool_with_description(
            FILE_TOOL_NAME,
            FILE_TOOL_DESCRIPTION,
            move |args: FileOperationArgs| {
                let tool = tool.clone();
                async move { Ok::<_, Error>(tool.execute(args).await) }
            },
        );
    }

    pub async fn execute(&self, args: FileOperationArgs) -> Value {
        let operation = args.operation;
        match self.run(&args).await {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!("{FILE_TOOL_NAME} {operation} on {} failed: {err}", args.filename);
                json!({
                    "success": false,
                    "operation": operation,
                    "error": err.to_string(),
                    "message": format!("Failed to {operation} file: {err}"),
                })
            }
        }
    }

    async fn run(&self, args: &FileOperationArgs) -> Result<Value> {
        let store = &self.store;
        let filename = args.filename.as_str();
        let payload = match args.operation {
            FileOperation::Create => {
                let path = store.create(filename, args.content.as_deref().unwrap_or_default()).await?;
                json!({
                    "success": true,
                    "operation": "create",
                    "filepath": path.display().to_string(),
                    "message": format!("Created file: {filename}"),
                })
            }
            FileOperation::Read => {
                let content = store.read(filename).await?;
                json!({
                    "success": true,
                    "operation": "read",
                    "filepath": store.path_for(filename)?.display().to_string(),
                    "content": content,
                    "message": format!("Read file: {filename}"),
                })
            }
            FileOperation::Write => {
                let path = store.write(filename, args.require_content()?).await?;
                json!({
                    "success": true,
                    "operation": "write",
                    "filepath": path.display().to_string(),
                    "message": format!("Wrote to file: {filename}"),
                })
            }
            FileOperation::Append => {
                let path = store.append(filename, args.require_content()?).await?;
                json!({
                    "success": true,
                    "operation": "append",
                    "filepath": path.display().to_string(),
                    "message": format!("Appended to file: {filename}"),
                })
            }
            FileOperation::Insert => {
                let (Some(content), Some(line)) = (args.content.as_deref(), args.line_number) else {
                    return Err(Error::Validation(
                        "Content and line_number are required for insert operation".to_string(),
                    ));
                };
                let path = store.insert_at_line(filename, line, content).await?;
                json!({
                    "success": true,
                    "operation": "insert",
                    "filepath": path.display().to_string(),
                    "line_number": line,
                    "message": format!("Inserted content at line {line} in {filename}"),
                })
            }
            FileOperation::Replace => {
                let (Some(pattern), Some(replacement)) = (args.pattern.as_deref(), args.replacement.as_deref())
                else {
                    return Err(Error::Validation(
                        "Pattern and replacement are required for replace operation".to_string(),
                    ));
                };
                let count = store.find_and_replace(filename, pattern, replacement).await?;
                json!({
                    "success": true,
                    "operation": "replace",
                    "filepath": store.path_for(filename)?.display().to_string(),
                    "replacements": count,
                    "message": format!("Made {count} replacements in {filename}"),
                })
            }
            FileOperation::SaveAs => {
                let path = store.save_as(filename, args.content.as_deref()).await?;
                json!({
                    "success": true,
                    "operation": "save_as",
                    "filepath": path.display().to_string(),
                    "message": format!("Saved as: {filename}"),
                })
            }
            FileOperation::List => {
                let files = store.list_files().await?;
                json!({
                    "success": true,
                    "operation": "list",
                    "message": format!("Found {} markdown files", files.len()),
                    "files": files,
                })
            }
            FileOperation::Backup => {
                let path = store.create_backup(filename).await?;
                json!({
                    "success": true,
                    "operation": "backup",
                    "backup_path": path.display().to_string(),
                    "message": format!("Created backup of {filename}"),
                })
            }
            FileOperation::Info => {
                let info = store.file_info(filename).await?;
                json!({
                    "success": true,
                    "operation": "info",
                    "file_info": info,
                    "message": format!("File info for {filename}"),
                })
            }
        };
        Ok(payload)
    }
}
