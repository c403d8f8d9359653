//! Errors raised by in-memory board operations.

use thiserror::Error;

use crate::id::{SectionId, TaskId};

/// Errors that can occur while mutating a [`Board`](crate::Board).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    /// Task is not on the board.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// Section is not on the board.
    #[error("section not found: {0}")]
    SectionNotFound(SectionId),

    /// Task exists but lives in another column.
    #[error("task {task} is not in section {section}")]
    TaskNotInSection {
        /// Task that was looked up.
        task: TaskId,
        /// Section it was expected in.
        section: SectionId,
    },

    /// Source and target of a cross-column move are identical.
    #[error("task is already in section {0}")]
    SameSection(SectionId),

    /// A task id occurs more than once.
    #[error("duplicate task id: {0}")]
    DuplicateTask(TaskId),

    /// A section id occurs more than once.
    #[error("duplicate section id: {0}")]
    DuplicateSection(SectionId),

    /// A task's section reference disagrees with the column that holds it.
    #[error("task {task} references section {referenced} but sits in {actual}")]
    SectionMismatch {
        /// Offending task.
        task: TaskId,
        /// Section the task points at.
        referenced: SectionId,
        /// Column whose array holds the task.
        actual: SectionId,
    },

    /// Title is empty or whitespace-only.
    #[error("title must not be blank")]
    BlankTitle,

    /// Page numbers start at 1 and page sizes must be positive.
    #[error("invalid page request: page {page_no}, size {page_size}")]
    InvalidPage {
        /// Requested page number.
        page_no: usize,
        /// Requested page size.
        page_size: usize,
    },
}

/// Result alias for board operations.
pub type Result<T> = std::result::Result<T, BoardError>;
