use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use regex::Regex;
use serde::Serialize;

use crate::config::DEFAULT_OUTPUT_FILE;
use crate::{Error, Result};

const MARKDOWN_SUFFIX: &str = ".md";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Rewrite a replacement into `regex` template syntax: `$` is escaped and
/// `\N` / `\g<name>` become `${N}` / `${name}`.
fn replacement_template(replacement: &str) -> String {
    let mut out = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '$' => out.push_str("$$"),
            '\\' => match chars.peek() {
                Some(d) if d.is_ascii_digit() => {
                    let mut group = String::new();
                    while let Some(d) = chars.next_if(char::is_ascii_digit) {
                        group.push(d);
                    }
                    out.push_str(&format!("${{{group}}}"));
                }
                Some('g') => {
                    let rest: String = chars.clone().skip(1).collect();
                    match rest.strip_prefix('<').and_then(|r| r.split_once('>')) {
                        Some((name, _)) if !name.is_empty() => {
                            out.push_str(&format!("${{{name}}}"));
                            // 'g', '<', name, '>'
                            for _ in 0..name.chars().count() + 3 {
                                chars.next();
                            }
                        }
                        _ => out.push('\\'),
                    }
                }
                Some('\\') => {
                    chars.next();
                    out.push('\\');
                }
                _ => out.push('\\'),
            },
            _ => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub modified: String,
    pub created: String,
}

/// Append `.md` unless the name already ends with it.
#[must_use]
pub fn normalize_filename(name: &str) -> String {
    if name.ends_with(MARKDOWN_SUFFIX) {
        name.to_string()
    } else {
        format!("{name}{MARKDOWN_SUFFIX}")
    }
}

/// Markdown CRUD rooted at one directory.
///
/// Nothing is cached between calls: each operation reads the file fresh and
/// every write replaces the file in one rename, so a reader never sees a
/// half-written file. The only state kept is the name of the file most
/// recently created or written, used as the source for `save_as`.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    current_file: Mutex<Option<String>>,
}

impl FileStore {
    /// Open the store, creating the working directory if needed.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        tracing::debug!("File store rooted at {}", root.display());
        Ok(Self {
            root,
            current_file: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Name of the file last created or written, if any.
    #[must_use]
    pub fn current_file(&self) -> Option<String> {
        self.current_file.lock().clone()
    }

    /// Absolute-ish path for `name` after normalization.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] if the name would escape the working
    /// directory.
    #[allow(clippy::result_large_err)]
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        let name = normalize_filename(name);
        if name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(Error::Validation(format!("Invalid filename: {name}")));
        }
        Ok(self.root.join(name))
    }

    /// Create (or truncate) a file with `content` and make it current.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub async fn create(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.path_for(name)?;
        self.replace_contents(&path, content).await?;
        self.set_current(name);
        tracing::info!("Created {}", path.display());
        Ok(path)
    }

    /// # Errors
    /// Returns [`Error::FileNotFound`] if the file does not exist.
    pub async fn read(&self, name: &str) -> Result<String> {
        let path = self.existing(name).await?;
        Ok(tokio::fs::read_to_string(&path).await?)
    }

    /// Overwrite a file and make it current.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub async fn write(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.path_for(name)?;
        self.replace_contents(&path, content).await?;
        self.set_current(name);
        tracing::debug!("Wrote {} bytes to {}", content.len(), path.display());
        Ok(path)
    }

    /// Append to a file, creating it when missing.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or written.
    pub async fn append(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.path_for(name)?;
        if !tokio::fs::try_exists(&path).await? {
            return self.create(name, content).await;
        }
        let mut existing = tokio::fs::read_to_string(&path).await?;
        existing.push_str(content);
        self.replace_contents(&path, &existing).await?;
        Ok(path)
    }

    /// Insert `content` as a new line before 1-based `line`. The line number is
    /// clamped to `[1, line_count + 1]` and the inserted text always ends with
    /// a newline.
    ///
    /// # Errors
    /// Returns [`Error::FileNotFound`] if the file does not exist.
    pub async fn insert_at_line(&self, name: &str, line: i64, content: &str) -> Result<PathBuf> {
        let path = self.existing(name).await?;
        let text = tokio::fs::read_to_string(&path).await?;
        let mut lines: Vec<&str> = text.split_inclusive('\n').collect();

        let max = lines.len() + 1;
        let line = usize::try_from(line.max(1)).unwrap_or(max).min(max);

        let inserted = if content.ends_with('\n') {
            content.to_string()
        } else {
            format!("{content}\n")
        };
        lines.insert(line - 1, &inserted);
        self.replace_contents(&path, &lines.concat()).await?;
        Ok(path)
    }

    /// Replace every match of the regex `pattern`. Returns the number of
    /// non-overlapping matches in the content before the edit.
    ///
    /// `replacement` is literal text except for group references written
    /// `\1` or `\g<name>`.
    ///
    /// # Errors
    /// Returns [`Error::FileNotFound`] for a missing file and
    /// [`Error::Regex`] for an invalid pattern.
    pub async fn find_and_replace(&self, name: &str, pattern: &str, replacement: &str) -> Result<usize> {
        let path = self.existing(name).await?;
        let regex = Regex::new(pattern)?;
        let text = tokio::fs::read_to_string(&path).await?;
        let count = regex.find_iter(&text).count();
        if count > 0 {
            let template = replacement_template(replacement);
            let updated = regex.replace_all(&text, template.as_str());
            self.replace_contents(&path, &updated).await?;
        }
        Ok(count)
    }

    /// Copy a file to `<stem>_backup_<timestamp>.md`.
    ///
    /// # Errors
    /// Returns [`Error::FileNotFound`] if the file does not exist.
    pub async fn create_backup(&self, name: &str) -> Result<PathBuf> {
        let path = self.existing(name).await?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("backup")
            .to_string();
        let stamp = Local::now().format(BACKUP_TIMESTAMP_FORMAT);
        let backup = self.root.join(format!("{stem}_backup_{stamp}{MARKDOWN_SUFFIX}"));
        let text = tokio::fs::read_to_string(&path).await?;
        self.replace_contents(&backup, &text).await?;
        tracing::info!("Backed up {} to {}", path.display(), backup.display());
        Ok(backup)
    }

    /// Sorted names of the markdown files in the working directory.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be read.
    pub async fn list_files(&self) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(MARKDOWN_SUFFIX) && !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// # Errors
    /// Returns [`Error::FileNotFound`] if the file does not exist.
    pub async fn file_info(&self, name: &str) -> Result<FileInfo> {
        let path = self.existing(name).await?;
        let metadata = tokio::fs::metadata(&path).await?;
        let modified = metadata.modified()?;
        let created = metadata.created().unwrap_or(modified);
        Ok(FileInfo {
            name: normalize_filename(name),
            path: path.display().to_string(),
            size: metadata.len(),
            modified: rfc3339(modified),
            created: rfc3339(created),
        })
    }

    /// Write `content` under a new name. Without content, the current file
    /// (or `output.md` when nothing is current) is copied instead.
    ///
    /// # Errors
    /// Returns an error if the source cannot be read or the target written.
    pub async fn save_as(&self, name: &str, content: Option<&str>) -> Result<PathBuf> {
        let content = match content {
            Some(content) => content.to_string(),
            None => {
                let source = self
                    .current_file()
                    .unwrap_or_else(|| DEFAULT_OUTPUT_FILE.to_string());
                self.read(&source).await?
            }
        };
        self.create(name, &content).await
    }

    async fn existing(&self, name: &str) -> Result<PathBuf> {
        let path = self.path_for(name)?;
        if tokio::fs::try_exists(&path).await? {
            Ok(path)
        } else {
            Err(Error::FileNotFound(normalize_filename(name)))
        }
    }

    async fn replace_contents(&self, path: &Path, content: &str) -> Result<()> {
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(DEFAULT_OUTPUT_FILE);
        let temp = self.root.join(format!(".{file_name}.tmp"));
        tokio::fs::write(&temp, content).await?;
        if let Err(err) = tokio::fs::rename(&temp, path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(err.into());
        }
        Ok(())
    }

    fn set_current(&self, name: &str) {
        *self.current_file.lock() = Some(normalize_filename(name));
    }
}

fn rfc3339(time: SystemTime) -> String {
    DateTime::<Local>::from(time).to_rfc3339()
}
