//! Async board backend abstraction.

use anyhow::Error;
use std::future::Future;
use std::sync::Arc;
use taskboard_core::{NewTask, Page, Section, SectionId, Task, TaskId, TaskPatch, TaskQuery};
use taskboard_store_file::{FileStore, StoreError};
use tokio::sync::Mutex;

/// Response to an update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateAck<Id> {
    /// Item the backend updated.
    pub item_id: Id,
    /// Whether the backend accepted the change.
    pub acknowledged: bool,
}

impl<Id> UpdateAck<Id> {
    /// Accepted update of `item_id`.
    pub const fn accepted(item_id: Id) -> Self {
        Self {
            item_id,
            acknowledged: true,
        }
    }
}

/// Response to a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// Whether the backend accepted the change.
    pub acknowledged: bool,
}

impl Ack {
    /// Accepted request.
    pub const ACCEPTED: Self = Self { acknowledged: true };
}

/// Asynchronous task and section service the board reconciles against.
///
/// Futures are `Send` so controller operations can be spawned onto a
/// multi-threaded runtime.
pub trait BoardBackend: Send + Sync {
    /// Error type bubbled up from the backing service.
    type Error: Into<Error> + Send + 'static;

    /// Sections in column order.
    fn list_sections(&self) -> impl Future<Output = Result<Vec<Section>, Self::Error>> + Send;

    /// One page of tasks.
    fn get_tasks(
        &self,
        query: &TaskQuery,
    ) -> impl Future<Output = Result<Page<Task>, Self::Error>> + Send;

    /// Create a task; returns the server-issued id.
    fn create_task(
        &self,
        fields: NewTask,
    ) -> impl Future<Output = Result<TaskId, Self::Error>> + Send;

    /// Apply a patch to a task.
    fn update_task(
        &self,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> impl Future<Output = Result<UpdateAck<TaskId>, Self::Error>> + Send;

    /// Delete a task.
    fn delete_task(&self, id: &TaskId) -> impl Future<Output = Result<Ack, Self::Error>> + Send;

    /// Create a section; returns the server-issued id.
    fn create_section(
        &self,
        title: &str,
    ) -> impl Future<Output = Result<SectionId, Self::Error>> + Send;

    /// Rename a section.
    fn update_section(
        &self,
        id: &SectionId,
        title: &str,
    ) -> impl Future<Output = Result<UpdateAck<SectionId>, Self::Error>> + Send;

    /// Delete a section.
    fn delete_section(
        &self,
        id: &SectionId,
    ) -> impl Future<Output = Result<Ack, Self::Error>> + Send;
}

/// Run a store call on the blocking pool.
///
/// The lock is held for the whole call since every write is a
/// read-modify-write of one document.
async fn blocking<T, F>(store: &Mutex<FileStore>, f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&FileStore) -> Result<T, StoreError> + Send + 'static,
{
    let guard = store.lock().await;
    let handle = guard.clone();
    let out = tokio::task::spawn_blocking(move || f(&handle))
        .await
        .map_err(|e| StoreError::Other(format!("Task join error: {e}")))?;
    drop(guard);
    out
}

impl BoardBackend for Arc<Mutex<FileStore>> {
    type Error = StoreError;

    async fn list_sections(&self) -> Result<Vec<Section>, Self::Error> {
        blocking(self, FileStore::list_sections).await
    }

    async fn get_tasks(&self, query: &TaskQuery) -> Result<Page<Task>, Self::Error> {
        let query = query.clone();
        blocking(self, move |store| store.get_tasks(&query)).await
    }

    async fn create_task(&self, fields: NewTask) -> Result<TaskId, Self::Error> {
        blocking(self, move |store| store.create_task(fields)).await
    }

    async fn update_task(
        &self,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> Result<UpdateAck<TaskId>, Self::Error> {
        let id = id.clone();
        let patch = patch.clone();
        blocking(self, move |store| {
            store.update_task(&id, &patch)?;
            Ok(UpdateAck::accepted(id))
        })
        .await
    }

    async fn delete_task(&self, id: &TaskId) -> Result<Ack, Self::Error> {
        let id = id.clone();
        blocking(self, move |store| store.delete_task(&id).map(|()| Ack::ACCEPTED)).await
    }

    async fn create_section(&self, title: &str) -> Result<SectionId, Self::Error> {
        let title = title.to_owned();
        blocking(self, move |store| store.create_section(&title)).await
    }

    async fn update_section(
        &self,
        id: &SectionId,
        title: &str,
    ) -> Result<UpdateAck<SectionId>, Self::Error> {
        let id = id.clone();
        let title = title.to_owned();
        blocking(self, move |store| {
            store.update_section(&id, &title)?;
            Ok(UpdateAck::accepted(id))
        })
        .await
    }

    async fn delete_section(&self, id: &SectionId) -> Result<Ack, Self::Error> {
        let id = id.clone();
        blocking(self, move |store| store.delete_section(&id).map(|()| Ack::ACCEPTED)).await
    }
}
