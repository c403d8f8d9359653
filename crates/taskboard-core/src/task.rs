use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use time::Date;

use crate::id::{SectionId, TaskId};
use crate::priority::Priority;

/// A card on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Identifier (temporary until the backend confirms creation).
    pub id: TaskId,
    /// Human-readable title.
    pub title: String,
    /// Completion flag.
    #[serde(default)]
    pub completed: bool,
    /// Urgency.
    #[serde(default)]
    pub priority: Priority,
    /// Free-form labels.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Assignee reference.
    #[serde(default)]
    pub assignee: Option<String>,
    /// Due date.
    #[serde(default)]
    pub due_date: Option<Date>,
    /// Owning section.
    pub section: SectionId,
}

impl Task {
    /// Build a task from creation fields and an id.
    #[must_use]
    pub fn from_new(id: TaskId, fields: NewTask) -> Self {
        let NewTask {
            title,
            section,
            priority,
            tags,
            assignee,
            due_date,
        } = fields;
        Self {
            id,
            title,
            completed: false,
            priority,
            tags,
            assignee,
            due_date,
            section,
        }
    }

    /// Fields needed to recreate this task on a backend.
    #[must_use]
    pub fn to_new(&self) -> NewTask {
        NewTask {
            title: self.title.clone(),
            section: self.section.clone(),
            priority: self.priority,
            tags: self.tags.clone(),
            assignee: self.assignee.clone(),
            due_date: self.due_date,
        }
    }
}

/// Fields supplied when creating a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    /// Title (must not be blank).
    pub title: String,
    /// Section the task starts in.
    pub section: SectionId,
    /// Urgency.
    #[serde(default)]
    pub priority: Priority,
    /// Labels.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Assignee reference.
    #[serde(default)]
    pub assignee: Option<String>,
    /// Due date.
    #[serde(default)]
    pub due_date: Option<Date>,
}

impl NewTask {
    /// Minimal creation payload: a title in a section.
    #[must_use]
    pub fn new(section: SectionId, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            section,
            priority: Priority::default(),
            tags: BTreeSet::new(),
            assignee: None,
            due_date: None,
        }
    }
}

/// A board column as stored by a backend: identity and title only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Stable identifier tasks refer to.
    pub id: SectionId,
    /// Display title.
    pub title: String,
}

impl Section {
    /// Create a section record.
    #[must_use]
    pub fn new(id: SectionId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
        }
    }
}

/// Returns true when `title` has no visible characters.
#[must_use]
pub fn is_blank(title: &str) -> bool {
    title.trim().is_empty()
}
