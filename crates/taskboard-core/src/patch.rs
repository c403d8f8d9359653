use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use time::Date;

use crate::id::SectionId;
use crate::priority::Priority;
use crate::task::Task;

/// Difference between two tag sets.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDiff<T: Ord> {
    /// Entries to add.
    #[serde(default)]
    pub added: BTreeSet<T>,
    /// Entries to remove.
    #[serde(default)]
    pub removed: BTreeSet<T>,
}

impl<T: Ord> SetDiff<T> {
    /// Returns true when both added/removed are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Compute differences between two sets.
#[must_use]
pub fn diff_sets<T: Ord + Clone>(current: &BTreeSet<T>, desired: &BTreeSet<T>) -> SetDiff<T> {
    SetDiff {
        added: desired.difference(current).cloned().collect(),
        removed: current.difference(desired).cloned().collect(),
    }
}

/// Overwrite-or-clear patch for optional fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum FieldPatch<T> {
    /// Set the field to the provided value.
    Set(T),
    /// Clear the field.
    Clear,
}

impl<T: Clone> FieldPatch<T> {
    fn apply_to(&self, slot: &mut Option<T>) {
        *slot = match self {
            Self::Set(value) => Some(value.clone()),
            Self::Clear => None,
        };
    }
}

/// Partial task update sent to backends and applied optimistically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    /// Overwrite the title.
    #[serde(default)]
    pub title: Option<String>,
    /// Overwrite the completion flag.
    #[serde(default)]
    pub completed: Option<bool>,
    /// Overwrite the priority.
    #[serde(default)]
    pub priority: Option<Priority>,
    /// Tag diffs.
    #[serde(default)]
    pub tags: SetDiff<String>,
    /// Patch applied to the assignee.
    #[serde(default)]
    pub assignee: Option<FieldPatch<String>>,
    /// Patch applied to the due date.
    #[serde(default)]
    pub due_date: Option<FieldPatch<Date>>,
    /// Reassign to another section.
    #[serde(default)]
    pub section: Option<SectionId>,
}

impl TaskPatch {
    /// Patch that only reassigns the section.
    #[must_use]
    pub fn move_to(section: SectionId) -> Self {
        Self {
            section: Some(section),
            ..Self::default()
        }
    }

    /// Patch that only sets the completion flag.
    #[must_use]
    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    /// Returns true when applying the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.completed.is_none()
            && self.priority.is_none()
            && self.tags.is_empty()
            && self.assignee.is_none()
            && self.due_date.is_none()
            && self.section.is_none()
    }

    /// Whether the patch would blank out the title.
    #[must_use]
    pub fn clears_title(&self) -> bool {
        self.title.as_deref().is_some_and(crate::task::is_blank)
    }

    /// Apply the patch in place.
    pub fn apply(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title.clone_from(title);
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        for tag in &self.tags.removed {
            task.tags.remove(tag);
        }
        task.tags.extend(self.tags.added.iter().cloned());
        if let Some(patch) = &self.assignee {
            patch.apply_to(&mut task.assignee);
        }
        if let Some(patch) = &self.due_date {
            patch.apply_to(&mut task.due_date);
        }
        if let Some(section) = &self.section {
            task.section = section.clone();
        }
    }
}
