//! In-process backend used by tests and demos.

use taskboard_core::{
    BoardError, NewTask, Page, Section, SectionId, Task, TaskId, TaskPatch, TaskQuery, is_blank,
};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::backend::{Ack, BoardBackend, UpdateAck};

/// Errors raised by [`MemoryBackend`].
#[derive(Debug, Error)]
pub enum BackendError {
    /// Task is unknown.
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),
    /// Section is unknown.
    #[error("Section not found: {0}")]
    SectionNotFound(SectionId),
    /// Section still owns tasks.
    #[error("Section {id} has {count} tasks and cannot be deleted")]
    SectionNotEmpty {
        /// Section that was targeted.
        id: SectionId,
        /// Tasks still referencing it.
        count: usize,
    },
    /// Title is empty or whitespace-only.
    #[error("Title must not be blank")]
    BlankTitle,
    /// Query parameters were rejected.
    #[error("Invalid query: {0}")]
    InvalidQuery(#[from] BoardError),
}

#[derive(Debug)]
struct MemoryState {
    sections: Vec<Section>,
    tasks: Vec<Task>,
    next_id: u64,
}

impl MemoryState {
    fn issue(&mut self) -> String {
        let id = format!("srv-{}", self.next_id);
        self.next_id += 1;
        id
    }

    fn task_index(&self, id: &TaskId) -> Result<usize, BackendError> {
        self.tasks
            .iter()
            .position(|task| &task.id == id)
            .ok_or_else(|| BackendError::TaskNotFound(id.clone()))
    }

    fn section_index(&self, id: &SectionId) -> Result<usize, BackendError> {
        self.sections
            .iter()
            .position(|section| &section.id == id)
            .ok_or_else(|| BackendError::SectionNotFound(id.clone()))
    }
}

/// Backend that keeps records in memory and issues `srv-<n>` ids.
#[derive(Debug)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Empty backend issuing ids from `srv-1`.
    #[must_use]
    pub fn new() -> Self {
        Self::from_records(Vec::new(), Vec::new())
    }

    /// Backend pre-populated with records, in storage order.
    #[must_use]
    pub fn from_records(sections: Vec<Section>, tasks: Vec<Task>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                sections,
                tasks,
                next_id: 1,
            }),
        }
    }

    /// Set the number the next issued id will carry.
    #[must_use]
    pub fn with_next_id(self, next_id: u64) -> Self {
        let mut state = self.state.into_inner();
        state.next_id = next_id;
        Self {
            state: Mutex::new(state),
        }
    }

    /// Copy of the stored records.
    pub async fn records(&self) -> (Vec<Section>, Vec<Task>) {
        let state = self.state.lock().await;
        (state.sections.clone(), state.tasks.clone())
    }
}

impl BoardBackend for MemoryBackend {
    type Error = BackendError;

    async fn list_sections(&self) -> Result<Vec<Section>, Self::Error> {
        Ok(self.state.lock().await.sections.clone())
    }

    async fn get_tasks(&self, query: &TaskQuery) -> Result<Page<Task>, Self::Error> {
        let state = self.state.lock().await;
        Ok(query.run(&state.tasks)?)
    }

    async fn create_task(&self, fields: NewTask) -> Result<TaskId, Self::Error> {
        if is_blank(&fields.title) {
            return Err(BackendError::BlankTitle);
        }
        let mut state = self.state.lock().await;
        state.section_index(&fields.section)?;
        let id = TaskId::new(state.issue());
        debug!(task = %id, "Created task");
        state.tasks.push(Task::from_new(id.clone(), fields));
        drop(state);
        Ok(id)
    }

    async fn update_task(
        &self,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> Result<UpdateAck<TaskId>, Self::Error> {
        if patch.clears_title() {
            return Err(BackendError::BlankTitle);
        }
        let mut state = self.state.lock().await;
        let idx = state.task_index(id)?;
        if let Some(section) = &patch.section {
            state.section_index(section)?;
        }
        let moves = patch
            .section
            .as_ref()
            .is_some_and(|section| section != &state.tasks[idx].section);
        if moves {
            let mut task = state.tasks.remove(idx);
            patch.apply(&mut task);
            state.tasks.push(task);
        } else {
            patch.apply(&mut state.tasks[idx]);
        }
        drop(state);
        debug!(task = %id, moved = moves, "Updated task");
        Ok(UpdateAck::accepted(id.clone()))
    }

    async fn delete_task(&self, id: &TaskId) -> Result<Ack, Self::Error> {
        let mut state = self.state.lock().await;
        let idx = state.task_index(id)?;
        state.tasks.remove(idx);
        drop(state);
        debug!(task = %id, "Deleted task");
        Ok(Ack::ACCEPTED)
    }

    async fn create_section(&self, title: &str) -> Result<SectionId, Self::Error> {
        if is_blank(title) {
            return Err(BackendError::BlankTitle);
        }
        let mut state = self.state.lock().await;
        let id = SectionId::new(state.issue());
        state.sections.push(Section::new(id.clone(), title));
        drop(state);
        debug!(section = %id, "Created section");
        Ok(id)
    }

    async fn update_section(
        &self,
        id: &SectionId,
        title: &str,
    ) -> Result<UpdateAck<SectionId>, Self::Error> {
        if is_blank(title) {
            return Err(BackendError::BlankTitle);
        }
        let mut state = self.state.lock().await;
        let idx = state.section_index(id)?;
        title.clone_into(&mut state.sections[idx].title);
        drop(state);
        Ok(UpdateAck::accepted(id.clone()))
    }

    async fn delete_section(&self, id: &SectionId) -> Result<Ack, Self::Error> {
        let mut state = self.state.lock().await;
        let idx = state.section_index(id)?;
        let count = state.tasks.iter().filter(|task| &task.section == id).count();
        if count > 0 {
            return Err(BackendError::SectionNotEmpty {
                id: id.clone(),
                count,
            });
        }
        state.sections.remove(idx);
        drop(state);
        debug!(section = %id, "Deleted section");
        Ok(Ack::ACCEPTED)
    }
}
