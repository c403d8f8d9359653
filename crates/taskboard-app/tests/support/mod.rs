#![allow(dead_code)]

use anyhow::{Result, anyhow};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use taskboard_app::{Ack, BoardBackend, BoardController, MemoryBackend, NoticeReceiver, UpdateAck};
use taskboard_core::{NewTask, Page, Section, SectionId, Task, TaskId, TaskPatch, TaskQuery};
use tokio::sync::Semaphore;

/// Backend requests, for counting and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    ListSections,
    GetTasks,
    CreateTask,
    UpdateTask,
    DeleteTask,
    CreateSection,
    UpdateSection,
    DeleteSection,
}

impl Call {
    pub const fn is_mutation(self) -> bool {
        !matches!(self, Self::ListSections | Self::GetTasks)
    }
}

fn guard<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Wraps [`MemoryBackend`] with a call log, injectable failures and an
/// optional gate that holds mutations until permits are released.
pub struct ScriptedBackend {
    pub inner: MemoryBackend,
    calls: Mutex<Vec<Call>>,
    failing: Mutex<HashSet<Call>>,
    unacknowledged: Mutex<HashSet<Call>>,
    gate: Option<Semaphore>,
}

impl ScriptedBackend {
    pub fn new(inner: MemoryBackend) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            unacknowledged: Mutex::new(HashSet::new()),
            gate: None,
        }
    }

    /// Mutations wait for [`Self::release`] before reaching the inner backend.
    pub fn gated(inner: MemoryBackend) -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new(inner)
        }
    }

    pub fn fail(&self, call: Call) {
        guard(&self.failing).insert(call);
    }

    pub fn heal(&self, call: Call) {
        guard(&self.failing).remove(&call);
    }

    pub fn refuse_ack(&self, call: Call) {
        guard(&self.unacknowledged).insert(call);
    }

    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        guard(&self.calls).clone()
    }

    pub fn count(&self, call: Call) -> usize {
        guard(&self.calls).iter().filter(|c| **c == call).count()
    }

    pub fn mutation_count(&self) -> usize {
        guard(&self.calls).iter().filter(|c| c.is_mutation()).count()
    }

    async fn enter(&self, call: Call) -> Result<()> {
        guard(&self.calls).push(call);
        if call.is_mutation() {
            if let Some(gate) = &self.gate {
                gate.acquire().await?.forget();
            }
        }
        if guard(&self.failing).contains(&call) {
            return Err(anyhow!("injected failure for {call:?}"));
        }
        Ok(())
    }

    fn acked(&self, call: Call) -> bool {
        !guard(&self.unacknowledged).contains(&call)
    }
}

impl BoardBackend for ScriptedBackend {
    type Error = anyhow::Error;

    async fn list_sections(&self) -> Result<Vec<Section>> {
        self.enter(Call::ListSections).await?;
        Ok(self.inner.list_sections().await?)
    }

    async fn get_tasks(&self, query: &TaskQuery) -> Result<Page<Task>> {
        self.enter(Call::GetTasks).await?;
        Ok(self.inner.get_tasks(query).await?)
    }

    async fn create_task(&self, fields: NewTask) -> Result<TaskId> {
        self.enter(Call::CreateTask).await?;
        Ok(self.inner.create_task(fields).await?)
    }

    async fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<UpdateAck<TaskId>> {
        self.enter(Call::UpdateTask).await?;
        if !self.acked(Call::UpdateTask) {
            return Ok(UpdateAck {
                item_id: id.clone(),
                acknowledged: false,
            });
        }
        Ok(self.inner.update_task(id, patch).await?)
    }

    async fn delete_task(&self, id: &TaskId) -> Result<Ack> {
        self.enter(Call::DeleteTask).await?;
        if !self.acked(Call::DeleteTask) {
            return Ok(Ack {
                acknowledged: false,
            });
        }
        Ok(self.inner.delete_task(id).await?)
    }

    async fn create_section(&self, title: &str) -> Result<SectionId> {
        self.enter(Call::CreateSection).await?;
        Ok(self.inner.create_section(title).await?)
    }

    async fn update_section(&self, id: &SectionId, title: &str) -> Result<UpdateAck<SectionId>> {
        self.enter(Call::UpdateSection).await?;
        Ok(self.inner.update_section(id, title).await?)
    }

    async fn delete_section(&self, id: &SectionId) -> Result<Ack> {
        self.enter(Call::DeleteSection).await?;
        Ok(self.inner.delete_section(id).await?)
    }
}

pub fn todo() -> SectionId {
    SectionId::new("todo")
}

pub fn done() -> SectionId {
    SectionId::new("done")
}

/// `To Do` holding t1 and t2, `Done` holding t3.
pub fn two_columns() -> MemoryBackend {
    let task = |id: &str, section: SectionId, title: &str| {
        Task::from_new(TaskId::new(id), NewTask::new(section, title))
    };
    MemoryBackend::from_records(
        vec![Section::new(todo(), "To Do"), Section::new(done(), "Done")],
        vec![
            task("t1", todo(), "Draft agenda"),
            task("t2", todo(), "Book room"),
            task("t3", done(), "Send invites"),
        ],
    )
}

/// Controller over `backend`, loaded once. The load requests are cleared
/// from the call log.
pub async fn loaded(
    backend: ScriptedBackend,
) -> (BoardController<ScriptedBackend>, NoticeReceiver) {
    let (controller, notices) = BoardController::new(backend, 50);
    assert!(controller.refetch().await, "initial load");
    guard(&controller.backend().calls).clear();
    (controller, notices)
}

/// Yield until `condition` holds.
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

pub fn ids(controller: &BoardController<ScriptedBackend>, section: &SectionId) -> Vec<String> {
    controller
        .snapshot()
        .column(section)
        .map(|column| column.tasks.iter().map(|task| task.id.to_string()).collect())
        .unwrap_or_default()
}
