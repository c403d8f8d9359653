//! Drag session state machine.
//!
//! Pointer sensors report opaque identifiers prefixed with `task-` or
//! `column-`. The session tracks at most one active drag and, on drop,
//! produces a [`DropCommit`] that resolves against the board into a
//! [`DropPlan`].

use std::fmt;

use crate::board::Board;
use crate::id::{SectionId, TaskId};

const TASK_PREFIX: &str = "task-";
const COLUMN_PREFIX: &str = "column-";

/// What a drag identifier points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragKind {
    /// A task card.
    Task,
    /// A column drop zone.
    Column,
}

/// A parsed drag identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DragId {
    /// `task-<id>`
    Task(TaskId),
    /// `column-<id>`
    Column(SectionId),
}

impl DragId {
    /// Parse a prefixed identifier. Unknown prefixes and empty ids yield `None`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        if let Some(id) = raw.strip_prefix(TASK_PREFIX).filter(|id| !id.is_empty()) {
            return Some(Self::Task(TaskId::new(id)));
        }
        raw.strip_prefix(COLUMN_PREFIX)
            .filter(|id| !id.is_empty())
            .map(|id| Self::Column(SectionId::new(id)))
    }

    /// Kind of target.
    #[must_use]
    pub const fn kind(&self) -> DragKind {
        match self {
            Self::Task(_) => DragKind::Task,
            Self::Column(_) => DragKind::Column,
        }
    }
}

impl fmt::Display for DragId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task(id) => write!(f, "{TASK_PREFIX}{id}"),
            Self::Column(id) => write!(f, "{COLUMN_PREFIX}{id}"),
        }
    }
}

/// Current phase of the drag gesture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DragState {
    /// No drag in progress.
    #[default]
    Idle,
    /// A task is being dragged but hovers nothing droppable.
    Dragging {
        /// Task being dragged.
        active: TaskId,
        /// Column it was picked up from.
        origin: SectionId,
    },
    /// A task is being dragged over a candidate target.
    Hovering {
        /// Task being dragged.
        active: TaskId,
        /// Column it was picked up from.
        origin: SectionId,
        /// Candidate drop target.
        candidate: DragId,
    },
}

impl DragState {
    /// Dragged task, if any.
    #[must_use]
    pub const fn active(&self) -> Option<&TaskId> {
        match self {
            Self::Idle => None,
            Self::Dragging { active, .. } | Self::Hovering { active, .. } => Some(active),
        }
    }

    /// Column the dragged task came from.
    #[must_use]
    pub const fn origin(&self) -> Option<&SectionId> {
        match self {
            Self::Idle => None,
            Self::Dragging { origin, .. } | Self::Hovering { origin, .. } => Some(origin),
        }
    }

    /// Current candidate target.
    #[must_use]
    pub const fn candidate(&self) -> Option<&DragId> {
        match self {
            Self::Hovering { candidate, .. } => Some(candidate),
            _ => None,
        }
    }
}

/// A drop that should be handed to the board reducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropCommit {
    /// Task that was dropped.
    pub task: TaskId,
    /// Column it was picked up from.
    pub origin: SectionId,
    /// Where it was dropped.
    pub target: DragId,
}

/// Cross-column move derived from a drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRequest {
    /// Task to move.
    pub task: TaskId,
    /// Column it is expected in.
    pub source: SectionId,
    /// Destination column.
    pub target: SectionId,
    /// Insert before this task (end of column when `None`).
    pub before: Option<TaskId>,
}

/// Board operation a drop resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropPlan {
    /// Move across columns.
    Move(MoveRequest),
    /// Reorder inside the origin column.
    Reorder {
        /// Task to reorder.
        task: TaskId,
        /// Its column.
        section: SectionId,
        /// Insert before this task.
        before: TaskId,
    },
    /// Nothing to do (target vanished or the task was dropped where it was).
    Nothing,
}

impl DropCommit {
    /// Translate the drop into a board operation using the current board.
    ///
    /// Dropping on a column appends to it; dropping on a task inserts before
    /// that task in whichever column holds it.
    #[must_use]
    pub fn resolve(&self, board: &Board) -> DropPlan {
        let (target, before) = match &self.target {
            DragId::Column(section) => {
                if board.column(section).is_none() {
                    return DropPlan::Nothing;
                }
                (section.clone(), None)
            }
            DragId::Task(anchor) => match board.section_of(anchor) {
                Some(section) => (section.clone(), Some(anchor.clone())),
                None => return DropPlan::Nothing,
            },
        };

        if target != self.origin {
            return DropPlan::Move(MoveRequest {
                task: self.task.clone(),
                source: self.origin.clone(),
                target,
                before,
            });
        }
        match before {
            Some(before) => DropPlan::Reorder {
                task: self.task.clone(),
                section: target,
                before,
            },
            None => DropPlan::Nothing,
        }
    }
}

/// Single-pointer drag session.
#[derive(Debug, Clone, Default)]
pub struct DragSession {
    state: DragState,
}

impl DragSession {
    /// Idle session.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: DragState::Idle,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &DragState {
        &self.state
    }

    /// Whether a drag is in progress.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !matches!(self.state, DragState::Idle)
    }

    /// Handle drag-start. Returns true when a session began.
    ///
    /// Only tasks can be dragged; the origin column is resolved by scanning the
    /// board. Unknown tasks, non-task ids, and starts during an active session
    /// are ignored.
    pub fn start(&mut self, raw: &str, board: &Board) -> bool {
        if self.is_active() {
            return false;
        }
        let Some(DragId::Task(active)) = DragId::parse(raw) else {
            return false;
        };
        let Some(origin) = board.section_of(&active).cloned() else {
            return false;
        };
        self.state = DragState::Dragging { active, origin };
        true
    }

    /// Handle drag-over. Returns true when the candidate target changed.
    ///
    /// Events for a different active id, unparsable targets, and hovering the
    /// dragged task itself leave the state untouched.
    pub fn over(&mut self, active_raw: &str, over_raw: &str) -> bool {
        let (active, origin) = match &self.state {
            DragState::Idle => return false,
            DragState::Dragging { active, origin } | DragState::Hovering { active, origin, .. } => {
                (active, origin)
            }
        };
        if DragId::parse(active_raw).as_ref() != Some(&DragId::Task(active.clone())) {
            return false;
        }
        let Some(candidate) = DragId::parse(over_raw) else {
            return false;
        };
        if candidate == DragId::Task(active.clone()) {
            return false;
        }
        if self.state.candidate() == Some(&candidate) {
            return false;
        }
        self.state = DragState::Hovering {
            active: active.clone(),
            origin: origin.clone(),
            candidate,
        };
        true
    }

    /// Handle drag-end. Always returns the session to idle; yields a commit
    /// when the drop landed on a valid target other than the dragged task.
    pub fn end(&mut self, over_raw: Option<&str>) -> Option<DropCommit> {
        let (task, origin) = match std::mem::take(&mut self.state) {
            DragState::Idle => return None,
            DragState::Dragging { active, origin } | DragState::Hovering { active, origin, .. } => {
                (active, origin)
            }
        };
        let target = over_raw.and_then(DragId::parse)?;
        if target == DragId::Task(task.clone()) {
            return None;
        }
        Some(DropCommit { task, origin, target })
    }

    /// Abort the gesture without committing.
    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }
}
