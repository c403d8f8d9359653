//! In-memory projection of the board: ordered columns owning ordered tasks.
//!
//! Every mutating method returns an [`Undo`] describing its inverse so callers
//! can apply a change optimistically and take it back if the backend rejects
//! it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{BoardError, Result};
use crate::id::{SectionId, TaskId};
use crate::patch::TaskPatch;
use crate::task::{Section, Task, is_blank};

/// A section together with the tasks it currently holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Section identity and title.
    pub section: Section,
    /// Tasks in display order.
    pub tasks: Vec<Task>,
}

impl Column {
    /// Empty column for `section`.
    #[must_use]
    pub const fn new(section: Section) -> Self {
        Self {
            section,
            tasks: Vec::new(),
        }
    }

    /// Section id of this column.
    #[must_use]
    pub const fn id(&self) -> &SectionId {
        &self.section.id
    }

    /// Section title of this column.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.section.title
    }

    fn position_of(&self, task: &TaskId) -> Option<usize> {
        self.tasks.iter().position(|candidate| &candidate.id == task)
    }
}

/// Position of a task on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskLocation {
    /// Index into [`Board::columns`].
    pub column: usize,
    /// Index into that column's tasks.
    pub index: usize,
}

/// Inverse of an applied board mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Undo {
    /// Put a moved task back at its former position.
    MoveBack {
        /// Task to move.
        task: TaskId,
        /// Section it came from.
        section: SectionId,
        /// Former index in that section.
        index: usize,
    },
    /// Drop an optimistically inserted task.
    RemoveTask(TaskId),
    /// Reinstate a task value (after an edit or a removal).
    RestoreTask {
        /// Previous value, including its section.
        task: Task,
        /// Previous index within its section.
        index: usize,
    },
    /// Drop an optimistically inserted section.
    RemoveSection(SectionId),
    /// Restore a previous section title.
    RenameSection {
        /// Section to rename.
        id: SectionId,
        /// Title to restore.
        title: String,
    },
    /// Reinstate a removed column with its tasks.
    RestoreSection {
        /// Removed column.
        column: Column,
        /// Former column index.
        index: usize,
    },
}

/// Ordered collection of columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    columns: Vec<Column>,
}

impl Board {
    /// Empty board.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    /// Assemble a board from backend records.
    ///
    /// Tasks keep their relative order and land in the column their section
    /// reference names. Tasks whose section is unknown are returned separately.
    #[must_use]
    pub fn from_records(sections: Vec<Section>, tasks: Vec<Task>) -> (Self, Vec<Task>) {
        let mut board = Self {
            columns: sections.into_iter().map(Column::new).collect(),
        };
        let mut orphans = Vec::new();
        for task in tasks {
            match board.column_index(&task.section) {
                Some(idx) => board.columns[idx].tasks.push(task),
                None => orphans.push(task),
            }
        }
        (board, orphans)
    }

    /// Columns in display order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Look up a column by section id.
    #[must_use]
    pub fn column(&self, section: &SectionId) -> Option<&Column> {
        self.columns.iter().find(|column| column.id() == section)
    }

    /// Index of a column by section id.
    #[must_use]
    pub fn column_index(&self, section: &SectionId) -> Option<usize> {
        self.columns.iter().position(|column| column.id() == section)
    }

    /// Find where a task currently sits.
    #[must_use]
    pub fn locate(&self, task: &TaskId) -> Option<TaskLocation> {
        self.columns.iter().enumerate().find_map(|(column, col)| {
            col.position_of(task).map(|index| TaskLocation { column, index })
        })
    }

    /// Look up a task anywhere on the board.
    #[must_use]
    pub fn task(&self, task: &TaskId) -> Option<&Task> {
        self.locate(task)
            .map(|loc| &self.columns[loc.column].tasks[loc.index])
    }

    /// Section id of the column holding `task`.
    #[must_use]
    pub fn section_of(&self, task: &TaskId) -> Option<&SectionId> {
        self.locate(task).map(|loc| self.columns[loc.column].id())
    }

    /// Title of the section `task` belongs to, resolved through its section id.
    #[must_use]
    pub fn section_title_of(&self, task: &TaskId) -> Option<&str> {
        let task = self.task(task)?;
        self.column(&task.section).map(Column::title)
    }

    /// Total number of tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.columns.iter().map(|column| column.tasks.len()).sum()
    }

    /// Move a task across columns, inserting before `before` (or at the end).
    ///
    /// # Errors
    /// [`BoardError::SameSection`] when source and target match,
    /// [`BoardError::SectionNotFound`] for an unknown target, and
    /// [`BoardError::TaskNotInSection`] when the task is not in `source`.
    pub fn move_task(
        &mut self,
        task: &TaskId,
        source: &SectionId,
        target: &SectionId,
        before: Option<&TaskId>,
    ) -> Result<Undo> {
        if source == target {
            return Err(BoardError::SameSection(source.clone()));
        }
        let source_idx = self
            .column_index(source)
            .ok_or_else(|| BoardError::SectionNotFound(source.clone()))?;
        let target_idx = self
            .column_index(target)
            .ok_or_else(|| BoardError::SectionNotFound(target.clone()))?;
        let index = self.columns[source_idx]
            .position_of(task)
            .ok_or_else(|| BoardError::TaskNotInSection {
                task: task.clone(),
                section: source.clone(),
            })?;

        let mut moved = self.columns[source_idx].tasks.remove(index);
        moved.section = target.clone();
        let column = &mut self.columns[target_idx];
        let at = before
            .and_then(|anchor| column.position_of(anchor))
            .unwrap_or(column.tasks.len());
        column.tasks.insert(at, moved);

        Ok(Undo::MoveBack {
            task: task.clone(),
            section: source.clone(),
            index,
        })
    }

    /// Reorder a task within its own column.
    ///
    /// # Errors
    /// Fails when the section is unknown or does not hold the task.
    pub fn reorder_task(
        &mut self,
        task: &TaskId,
        section: &SectionId,
        before: Option<&TaskId>,
    ) -> Result<Undo> {
        let column_idx = self
            .column_index(section)
            .ok_or_else(|| BoardError::SectionNotFound(section.clone()))?;
        let column = &mut self.columns[column_idx];
        let index = column
            .position_of(task)
            .ok_or_else(|| BoardError::TaskNotInSection {
                task: task.clone(),
                section: section.clone(),
            })?;
        let moved = column.tasks.remove(index);
        let at = before
            .filter(|anchor| *anchor != task)
            .and_then(|anchor| column.position_of(anchor))
            .unwrap_or(column.tasks.len());
        column.tasks.insert(at, moved);

        Ok(Undo::MoveBack {
            task: task.clone(),
            section: section.clone(),
            index,
        })
    }

    /// Append a task to the end of the column its section reference names.
    ///
    /// # Errors
    /// Fails on an unknown section, a duplicate id, or a blank title.
    pub fn insert_task(&mut self, task: Task) -> Result<Undo> {
        if is_blank(&task.title) {
            return Err(BoardError::BlankTitle);
        }
        if self.locate(&task.id).is_some() {
            return Err(BoardError::DuplicateTask(task.id));
        }
        let idx = self
            .column_index(&task.section)
            .ok_or_else(|| BoardError::SectionNotFound(task.section.clone()))?;
        let id = task.id.clone();
        self.columns[idx].tasks.push(task);
        Ok(Undo::RemoveTask(id))
    }

    /// Swap a task id in place, keeping position and every other field.
    ///
    /// # Errors
    /// Fails when `old` is missing or `new` is already taken.
    pub fn replace_task_id(&mut self, old: &TaskId, new: TaskId) -> Result<()> {
        if old != &new && self.locate(&new).is_some() {
            return Err(BoardError::DuplicateTask(new));
        }
        let loc = self
            .locate(old)
            .ok_or_else(|| BoardError::TaskNotFound(old.clone()))?;
        self.columns[loc.column].tasks[loc.index].id = new;
        Ok(())
    }

    /// Apply a field patch; a section change moves the task to the end of its
    /// new column.
    ///
    /// # Errors
    /// Fails when the task or a patched-in section is unknown, or the patch
    /// blanks the title.
    pub fn patch_task(&mut self, task: &TaskId, patch: &TaskPatch) -> Result<Undo> {
        if patch.clears_title() {
            return Err(BoardError::BlankTitle);
        }
        let loc = self
            .locate(task)
            .ok_or_else(|| BoardError::TaskNotFound(task.clone()))?;
        let target_idx = match &patch.section {
            Some(section) => Some(
                self.column_index(section)
                    .ok_or_else(|| BoardError::SectionNotFound(section.clone()))?,
            ),
            None => None,
        };

        let previous = self.columns[loc.column].tasks[loc.index].clone();
        match target_idx {
            Some(target) if target != loc.column => {
                let mut moved = self.columns[loc.column].tasks.remove(loc.index);
                patch.apply(&mut moved);
                self.columns[target].tasks.push(moved);
            }
            _ => patch.apply(&mut self.columns[loc.column].tasks[loc.index]),
        }

        Ok(Undo::RestoreTask {
            task: previous,
            index: loc.index,
        })
    }

    /// Remove a task.
    ///
    /// # Errors
    /// Fails when the task is not on the board.
    pub fn remove_task(&mut self, task: &TaskId) -> Result<Undo> {
        let loc = self
            .locate(task)
            .ok_or_else(|| BoardError::TaskNotFound(task.clone()))?;
        let removed = self.columns[loc.column].tasks.remove(loc.index);
        Ok(Undo::RestoreTask {
            task: removed,
            index: loc.index,
        })
    }

    /// Append a new, empty column.
    ///
    /// # Errors
    /// Fails on a duplicate id or a blank title.
    pub fn insert_section(&mut self, section: Section) -> Result<Undo> {
        if is_blank(&section.title) {
            return Err(BoardError::BlankTitle);
        }
        if self.column_index(&section.id).is_some() {
            return Err(BoardError::DuplicateSection(section.id));
        }
        let id = section.id.clone();
        self.columns.push(Column::new(section));
        Ok(Undo::RemoveSection(id))
    }

    /// Swap a section id in place and repoint the tasks that reference it.
    ///
    /// # Errors
    /// Fails when `old` is missing or `new` is already taken.
    pub fn replace_section_id(&mut self, old: &SectionId, new: SectionId) -> Result<()> {
        if old != &new && self.column_index(&new).is_some() {
            return Err(BoardError::DuplicateSection(new));
        }
        let idx = self
            .column_index(old)
            .ok_or_else(|| BoardError::SectionNotFound(old.clone()))?;
        let column = &mut self.columns[idx];
        for task in &mut column.tasks {
            task.section = new.clone();
        }
        column.section.id = new;
        Ok(())
    }

    /// Rename a column.
    ///
    /// # Errors
    /// Fails on an unknown section or a blank title.
    pub fn rename_section(&mut self, section: &SectionId, title: &str) -> Result<Undo> {
        if is_blank(title) {
            return Err(BoardError::BlankTitle);
        }
        let idx = self
            .column_index(section)
            .ok_or_else(|| BoardError::SectionNotFound(section.clone()))?;
        let previous = std::mem::replace(&mut self.columns[idx].section.title, title.to_owned());
        Ok(Undo::RenameSection {
            id: section.clone(),
            title: previous,
        })
    }

    /// Remove a column together with the tasks it holds.
    ///
    /// # Errors
    /// Fails when the section is unknown.
    pub fn remove_section(&mut self, section: &SectionId) -> Result<Undo> {
        let index = self
            .column_index(section)
            .ok_or_else(|| BoardError::SectionNotFound(section.clone()))?;
        let column = self.columns.remove(index);
        Ok(Undo::RestoreSection { column, index })
    }

    /// Apply the inverse of an earlier mutation.
    ///
    /// # Errors
    /// Fails when the board changed so much that the inverse no longer has a
    /// place to land (e.g. the original section was removed meanwhile).
    pub fn revert(&mut self, undo: Undo) -> Result<()> {
        match undo {
            Undo::MoveBack {
                task,
                section,
                index,
            } => {
                let target = self
                    .column_index(&section)
                    .ok_or_else(|| BoardError::SectionNotFound(section.clone()))?;
                let loc = self
                    .locate(&task)
                    .ok_or_else(|| BoardError::TaskNotFound(task.clone()))?;
                let mut moved = self.columns[loc.column].tasks.remove(loc.index);
                moved.section = section;
                let column = &mut self.columns[target];
                column.tasks.insert(index.min(column.tasks.len()), moved);
            }
            Undo::RemoveTask(task) => {
                self.remove_task(&task)?;
            }
            Undo::RestoreTask { task, index } => {
                let target = self
                    .column_index(&task.section)
                    .ok_or_else(|| BoardError::SectionNotFound(task.section.clone()))?;
                if let Some(loc) = self.locate(&task.id) {
                    self.columns[loc.column].tasks.remove(loc.index);
                }
                let column = &mut self.columns[target];
                column.tasks.insert(index.min(column.tasks.len()), task);
            }
            Undo::RemoveSection(section) => {
                self.remove_section(&section)?;
            }
            Undo::RenameSection { id, title } => {
                self.rename_section(&id, &title)?;
            }
            Undo::RestoreSection { column, index } => {
                if self.column_index(column.id()).is_some() {
                    return Err(BoardError::DuplicateSection(column.section.id));
                }
                self.columns.insert(index.min(self.columns.len()), column);
            }
        }
        Ok(())
    }

    /// Verify the board's structural invariants: unique ids and agreement
    /// between each task's section reference and the column holding it.
    ///
    /// # Errors
    /// Returns the first violation found.
    pub fn check_invariants(&self) -> Result<()> {
        let mut sections = HashSet::new();
        let mut tasks = HashSet::new();
        for column in &self.columns {
            if !sections.insert(column.id()) {
                return Err(BoardError::DuplicateSection(column.id().clone()));
            }
            for task in &column.tasks {
                if !tasks.insert(&task.id) {
                    return Err(BoardError::DuplicateTask(task.id.clone()));
                }
                if &task.section != column.id() {
                    return Err(BoardError::SectionMismatch {
                        task: task.id.clone(),
                        referenced: task.section.clone(),
                        actual: column.id().clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
