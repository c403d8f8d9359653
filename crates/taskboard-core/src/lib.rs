//! Domain types for the task board: entities, the in-memory board model and
//! the drag session state machine.

/// In-memory board projection.
pub mod board;
/// Drag session state machine.
pub mod drag;
mod error;
/// Identifier types.
pub mod id;
/// Partial updates.
pub mod patch;
mod priority;
/// Filtering, sorting, pagination.
pub mod query;
mod task;

pub use board::{Board, Column, TaskLocation, Undo};
pub use drag::{DragId, DragKind, DragSession, DragState, DropCommit, DropPlan, MoveRequest};
pub use error::{BoardError, Result};
pub use id::{SectionId, TaskId};
pub use patch::{FieldPatch, SetDiff, TaskPatch, diff_sets};
pub use priority::{ParsePriorityError, Priority};
pub use query::{Page, SortDirection, SortKey, TaskFilter, TaskQuery, TaskSort};
pub use task::{NewTask, Section, Task, is_blank};
