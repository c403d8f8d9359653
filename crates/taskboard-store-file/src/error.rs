//! Error types for file store operations.

use std::path::PathBuf;

use taskboard_core::{BoardError, SectionId, TaskId};
use thiserror::Error;

/// Errors that can occur during `FileStore` operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Task was not found in the document.
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    /// Section was not found in the document.
    #[error("Section not found: {0}")]
    SectionNotFound(SectionId),

    /// Section still owns tasks and cannot be deleted.
    #[error("Section {id} has {count} tasks and cannot be deleted")]
    SectionNotEmpty {
        /// Section that was targeted.
        id: SectionId,
        /// Number of tasks still referencing it.
        count: usize,
    },

    /// Title is empty or whitespace-only.
    #[error("Title must not be blank")]
    BlankTitle,

    /// Query parameters were rejected.
    #[error("Invalid query: {0}")]
    InvalidQuery(#[from] BoardError),

    /// Failed to parse the board document.
    #[error("Failed to parse {path}: {source}")]
    Parse {
        /// Document path.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Failed to serialize the board document.
    #[error("Failed to serialize board document: {0}")]
    Serialize(#[source] serde_json::Error),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other unclassified error.
    #[error("Other error: {0}")]
    Other(String),
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
