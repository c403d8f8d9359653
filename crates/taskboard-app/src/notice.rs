//! User-facing failure notices.

use std::fmt;
use tokio::sync::mpsc;

/// Operation category a notice reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Loading the board from the backend.
    Load,
    /// Moving a task between columns.
    MoveTask,
    /// Creating a task.
    CreateTask,
    /// Editing task fields.
    UpdateTask,
    /// Deleting a task.
    DeleteTask,
    /// Creating a column.
    CreateSection,
    /// Renaming a column.
    RenameSection,
    /// Deleting a column.
    DeleteSection,
}

impl OperationKind {
    /// Short failure headline.
    #[must_use]
    pub const fn failure(self) -> &'static str {
        match self {
            Self::Load => "Error loading board",
            Self::MoveTask => "Error moving task",
            Self::CreateTask => "Error creating task",
            Self::UpdateTask => "Error updating task",
            Self::DeleteTask => "Error deleting task",
            Self::CreateSection => "Error creating section",
            Self::RenameSection => "Error renaming section",
            Self::DeleteSection => "Error deleting section",
        }
    }
}

/// Transient message raised when an operation failed and was rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Failed operation.
    pub operation: OperationKind,
    /// Text shown to the user.
    pub message: String,
}

impl Notice {
    /// Notice for a failed `operation`.
    #[must_use]
    pub fn failed(operation: OperationKind) -> Self {
        Self {
            operation,
            message: format!("{}, please try again", operation.failure()),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Receiving end of the notice channel.
pub type NoticeReceiver = mpsc::UnboundedReceiver<Notice>;
