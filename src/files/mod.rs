//! Markdown files under a single working directory.

mod store;

pub use store::{FileInfo, FileStore, normalize_filename};
