//! Board controller: optimistic mutations reconciled against a backend.

use anyhow::{Context, Error, anyhow};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use taskboard_core::{
    Board, BoardError, DropCommit, DropPlan, NewTask, Section, SectionId, Task, TaskId, TaskPatch,
    TaskQuery, Undo, is_blank,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::backend::BoardBackend;
use crate::notice::{Notice, NoticeReceiver, OperationKind};
use crate::queue::{EntityKey, OperationQueue, Ticket};

/// Page size used by [`BoardController::refetch`] when none is configured.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Result of a board operation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Outcome<T> {
    /// Applied locally and accepted by the backend.
    Confirmed(T),
    /// Rejected before anything changed: invalid input, a no-op, or an item
    /// that is no longer where the caller expected it.
    Ignored,
    /// The backend refused; the local change was reverted and a notice sent.
    RolledBack,
}

impl<T> Outcome<T> {
    /// Returns true for [`Outcome::Confirmed`].
    pub const fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }

    /// Confirmed value, if any.
    pub fn confirmed(self) -> Option<T> {
        match self {
            Self::Confirmed(value) => Some(value),
            Self::Ignored | Self::RolledBack => None,
        }
    }
}

/// Board plus the temporary ids that have since been confirmed.
#[derive(Debug, Default)]
struct BoardState {
    board: Board,
    task_aliases: HashMap<TaskId, TaskId>,
    section_aliases: HashMap<SectionId, SectionId>,
}

impl BoardState {
    fn task_id(&self, id: &TaskId) -> TaskId {
        self.task_aliases.get(id).unwrap_or(id).clone()
    }

    fn section_id(&self, id: &SectionId) -> SectionId {
        self.section_aliases.get(id).unwrap_or(id).clone()
    }
}

/// Counts a mutation as in flight until dropped.
#[derive(Debug)]
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A local change awaiting the backend's verdict.
#[derive(Debug)]
struct Pending {
    kind: OperationKind,
    undo: Undo,
    ticket: Ticket,
    in_flight: InFlight,
}

/// A task inserted locally under a temporary id, not yet sent to the backend.
///
/// Hand it to [`BoardController::confirm_task`]. Until then the board will
/// not accept refetched data, so it should be confirmed promptly. Dropping
/// it unconfirmed removes the task from the board again.
#[derive(Debug)]
pub struct StagedTask {
    id: TaskId,
    fields: NewTask,
    pending: Option<Pending>,
    state: Arc<Mutex<BoardState>>,
}

impl Drop for StagedTask {
    fn drop(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.board.revert(pending.undo) {
            Ok(()) => debug!(task = %self.id, "Discarded unconfirmed task"),
            Err(err) => warn!(task = %self.id, %err, "Could not discard unconfirmed task"),
        }
    }
}

impl StagedTask {
    /// Temporary id the task is shown under.
    #[must_use]
    pub const fn id(&self) -> &TaskId {
        &self.id
    }
}

struct Inner<B> {
    backend: B,
    state: Arc<Mutex<BoardState>>,
    queue: OperationQueue,
    in_flight: Arc<AtomicUsize>,
    generation: AtomicU64,
    page_size: usize,
    notices: mpsc::UnboundedSender<Notice>,
}

/// Owns the in-memory board and applies every mutation optimistically.
///
/// Each mutation follows the same path: wait for earlier mutations of the
/// same entity, apply locally, ask the backend, then either keep the change
/// or revert it and raise a [`Notice`]. Once no mutation is in flight the
/// board is refetched from the backend.
pub struct BoardController<B> {
    inner: Arc<Inner<B>>,
}

impl<B> Clone for BoardController<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

fn acknowledged(acknowledged: bool, what: &str) -> anyhow::Result<()> {
    if acknowledged {
        Ok(())
    } else {
        Err(anyhow!("{what} was not acknowledged"))
    }
}

impl<B: BoardBackend> BoardController<B> {
    /// Create a controller over `backend` with an empty board.
    ///
    /// Call [`Self::refetch`] to load the board. Failure notices are
    /// delivered on the returned receiver.
    pub fn new(backend: B, page_size: usize) -> (Self, NoticeReceiver) {
        let (notices, receiver) = mpsc::unbounded_channel();
        let inner = Inner {
            backend,
            state: Arc::new(Mutex::new(BoardState::default())),
            queue: OperationQueue::new(),
            in_flight: Arc::new(AtomicUsize::new(0)),
            generation: AtomicU64::new(0),
            page_size: page_size.max(1),
            notices,
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            receiver,
        )
    }

    /// Backend the controller reconciles against.
    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    /// Copy of the current board.
    pub fn snapshot(&self) -> Board {
        self.lock_state().board.clone()
    }

    /// Number of mutations awaiting the backend.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    fn lock_state(&self) -> MutexGuard<'_, BoardState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, kind: OperationKind) {
        if self.inner.notices.send(Notice::failed(kind)).is_err() {
            debug!(?kind, "Notice receiver dropped");
        }
    }

    async fn load(&self) -> anyhow::Result<(Vec<Section>, Vec<Task>)> {
        let backend = &self.inner.backend;
        let sections = backend
            .list_sections()
            .await
            .map_err(Into::<Error>::into)
            .context("Failed to list sections")?;
        let mut tasks = Vec::new();
        let mut query = TaskQuery::page(1, self.inner.page_size);
        loop {
            let page = backend
                .get_tasks(&query)
                .await
                .map_err(Into::<Error>::into)
                .with_context(|| format!("Failed to load task page {}", query.page_no))?;
            let more = page.has_next_page && !page.items.is_empty();
            tasks.extend(page.items);
            if !more {
                break;
            }
            query = query.next_page();
        }
        Ok((sections, tasks))
    }

    /// Replace the board with the backend's current records.
    ///
    /// Returns false when loading failed (a notice is raised) or when a
    /// mutation started while loading, in which case the stale result is
    /// dropped.
    pub async fn refetch(&self) -> bool {
        let started = self.inner.generation.load(Ordering::SeqCst);
        match self.load().await {
            Ok((sections, tasks)) => self.install(started, sections, tasks),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "Failed to refetch board");
                self.notify(OperationKind::Load);
                false
            }
        }
    }

    fn install(&self, started: u64, sections: Vec<Section>, tasks: Vec<Task>) -> bool {
        let mut state = self.lock_state();
        let busy = self.in_flight();
        if busy > 0 || self.inner.generation.load(Ordering::SeqCst) != started {
            warn!(in_flight = busy, "Discarding stale refetch");
            return false;
        }
        let (board, orphans) = Board::from_records(sections, tasks);
        if !orphans.is_empty() {
            warn!(count = orphans.len(), "Skipping tasks that reference unknown sections");
        }
        // The refetched board only knows issued ids. Aliases stay while a
        // caller may still come back with the temporary one.
        let queue = &self.inner.queue;
        state
            .task_aliases
            .retain(|temporary, _| queue.is_busy(&EntityKey::Task(temporary.clone())));
        state
            .section_aliases
            .retain(|temporary, _| queue.is_busy(&EntityKey::Section(temporary.clone())));
        debug!(
            columns = board.columns().len(),
            tasks = board.task_count(),
            "Installed refetched board"
        );
        state.board = board;
        true
    }

    async fn reconcile(&self) {
        if self.in_flight() == 0 {
            self.refetch().await;
        } else {
            debug!(in_flight = self.in_flight(), "Deferring refetch");
        }
    }

    /// Apply a local change and count it as in flight. `None` when the change
    /// was rejected; the board is left untouched in that case.
    fn begin<P>(
        &self,
        ticket: Ticket,
        kind: OperationKind,
        apply: impl FnOnce(&mut BoardState) -> Result<(Undo, P), BoardError>,
    ) -> Option<(Pending, P)> {
        let mut state = self.lock_state();
        match apply(&mut state) {
            Ok((undo, payload)) => {
                let in_flight = InFlight::enter(&self.inner.in_flight);
                self.inner.generation.fetch_add(1, Ordering::SeqCst);
                drop(state);
                debug!(?kind, entity = %ticket.key(), "Applied optimistic change");
                Some((
                    Pending {
                        kind,
                        undo,
                        ticket,
                        in_flight,
                    },
                    payload,
                ))
            }
            Err(err) => {
                debug!(?kind, entity = %ticket.key(), %err, "Ignoring board operation");
                None
            }
        }
    }

    /// Keep or revert a pending change depending on the backend's answer,
    /// then reconcile.
    async fn settle<T>(
        &self,
        pending: Pending,
        result: anyhow::Result<T>,
        confirm: impl FnOnce(&mut BoardState, &T),
    ) -> Outcome<T> {
        let Pending {
            kind,
            undo,
            ticket,
            in_flight,
        } = pending;
        let outcome = self.resolve(kind, undo, &ticket, result, confirm);
        drop(in_flight);
        self.reconcile().await;
        drop(ticket);
        outcome
    }

    fn resolve<T>(
        &self,
        kind: OperationKind,
        undo: Undo,
        ticket: &Ticket,
        result: anyhow::Result<T>,
        confirm: impl FnOnce(&mut BoardState, &T),
    ) -> Outcome<T> {
        let mut state = self.lock_state();
        match result {
            Ok(value) => {
                confirm(&mut state, &value);
                drop(state);
                info!(?kind, entity = %ticket.key(), "Confirmed board operation");
                Outcome::Confirmed(value)
            }
            Err(err) => {
                if let Err(revert) = state.board.revert(undo) {
                    warn!(?kind, entity = %ticket.key(), error = %revert, "Could not revert locally");
                }
                drop(state);
                warn!(
                    ?kind,
                    entity = %ticket.key(),
                    error = %format!("{err:#}"),
                    "Backend rejected operation, rolled back"
                );
                self.notify(kind);
                Outcome::RolledBack
            }
        }
    }

    async fn acquire_task(&self, id: &TaskId) -> (Ticket, TaskId) {
        let ticket = self.inner.queue.acquire(EntityKey::Task(id.clone())).await;
        let resolved = self.lock_state().task_id(id);
        if &resolved == id {
            return (ticket, resolved);
        }
        drop(ticket);
        let ticket = self
            .inner
            .queue
            .acquire(EntityKey::Task(resolved.clone()))
            .await;
        (ticket, resolved)
    }

    /// Issued id for `section`, waiting for its create to finish first when
    /// it is still temporary.
    async fn settled_section(&self, section: &SectionId) -> SectionId {
        let resolved = self.lock_state().section_id(section);
        if !resolved.is_temporary() {
            return resolved;
        }
        drop(
            self.inner
                .queue
                .acquire(EntityKey::Section(resolved.clone()))
                .await,
        );
        self.lock_state().section_id(&resolved)
    }

    async fn acquire_section(&self, id: &SectionId) -> (Ticket, SectionId) {
        let ticket = self
            .inner
            .queue
            .acquire(EntityKey::Section(id.clone()))
            .await;
        let resolved = self.lock_state().section_id(id);
        if &resolved == id {
            return (ticket, resolved);
        }
        drop(ticket);
        let ticket = self
            .inner
            .queue
            .acquire(EntityKey::Section(resolved.clone()))
            .await;
        (ticket, resolved)
    }

    /// Move `task` from `source` to `target`, before `before` (end when absent).
    ///
    /// Moving within one column, or a task that is not in `source` any more,
    /// is ignored without contacting the backend.
    pub async fn move_task(
        &self,
        task: &TaskId,
        source: &SectionId,
        target: &SectionId,
        before: Option<&TaskId>,
    ) -> Outcome<()> {
        if source == target {
            debug!(%task, section = %source, "Ignoring move within the same column");
            return Outcome::Ignored;
        }
        let (ticket, id) = self.acquire_task(task).await;
        let Some((pending, target)) = self.begin(ticket, OperationKind::MoveTask, |state| {
            let source = state.section_id(source);
            let target = state.section_id(target);
            let before = before.map(|anchor| state.task_id(anchor));
            let undo = state
                .board
                .move_task(&id, &source, &target, before.as_ref())?;
            Ok((undo, target))
        }) else {
            return Outcome::Ignored;
        };
        let target = self.settled_section(&target).await;

        let result = match self
            .inner
            .backend
            .update_task(&id, &TaskPatch::move_to(target))
            .await
        {
            Ok(ack) => acknowledged(ack.acknowledged, "Task move"),
            Err(err) => Err(err.into()),
        };
        self.settle(pending, result, |_, _| {}).await
    }

    /// Reorder a task inside its column. Local only: storage order is the
    /// backend's, so the next refetch may undo it.
    pub fn reorder_task(&self, task: &TaskId, section: &SectionId, before: Option<&TaskId>) -> bool {
        let mut state = self.lock_state();
        let task = state.task_id(task);
        let section = state.section_id(section);
        let before = before.map(|anchor| state.task_id(anchor));
        match state.board.reorder_task(&task, &section, before.as_ref()) {
            Ok(_) => true,
            Err(err) => {
                debug!(%task, %err, "Ignoring reorder");
                false
            }
        }
    }

    /// Carry out a committed drop.
    ///
    /// Cross-column drops move the task; drops on a task in the same column
    /// reorder locally and report `Confirmed` without a backend round trip.
    pub async fn handle_drop(&self, commit: &DropCommit) -> Outcome<()> {
        let plan = commit.resolve(&self.snapshot());
        match plan {
            DropPlan::Move(request) => {
                self.move_task(
                    &request.task,
                    &request.source,
                    &request.target,
                    request.before.as_ref(),
                )
                .await
            }
            DropPlan::Reorder {
                task,
                section,
                before,
            } => {
                if self.reorder_task(&task, &section, Some(&before)) {
                    Outcome::Confirmed(())
                } else {
                    Outcome::Ignored
                }
            }
            DropPlan::Nothing => Outcome::Ignored,
        }
    }

    /// Insert a task under a temporary id at the end of its column.
    ///
    /// Returns `None` for a blank title or an unknown column. The task is not
    /// sent anywhere until [`Self::confirm_task`] is called.
    pub fn stage_task(&self, fields: NewTask) -> Option<StagedTask> {
        if is_blank(&fields.title) {
            debug!("Ignoring task with a blank title");
            return None;
        }
        let id = TaskId::temporary();
        let ticket = self.inner.queue.try_acquire(EntityKey::Task(id.clone()))?;
        let (pending, fields) = self.begin(ticket, OperationKind::CreateTask, |state| {
            let mut fields = fields;
            fields.section = state.section_id(&fields.section);
            let undo = state.board.insert_task(Task::from_new(id.clone(), fields.clone()))?;
            Ok((undo, fields))
        })?;
        Some(StagedTask {
            id,
            fields,
            pending: Some(pending),
            state: Arc::clone(&self.inner.state),
        })
    }

    /// Send a staged task to the backend and swap in the issued id.
    pub async fn confirm_task(&self, mut staged: StagedTask) -> Outcome<TaskId> {
        let Some(pending) = staged.pending.take() else {
            return Outcome::Ignored;
        };
        let temporary = staged.id.clone();
        let mut fields = staged.fields.clone();
        drop(staged);
        fields.section = self.settled_section(&fields.section).await;
        let result = self
            .inner
            .backend
            .create_task(fields)
            .await
            .map_err(Into::into);
        self.settle(pending, result, |state, issued: &TaskId| {
            if let Err(err) = state.board.replace_task_id(&temporary, issued.clone()) {
                warn!(%temporary, %issued, %err, "Could not swap in issued task id");
            }
            state.task_aliases.insert(temporary.clone(), issued.clone());
        })
        .await
    }

    /// Create a task with the given fields.
    pub async fn create_task(&self, fields: NewTask) -> Outcome<TaskId> {
        match self.stage_task(fields) {
            Some(staged) => self.confirm_task(staged).await,
            None => Outcome::Ignored,
        }
    }

    /// Add a task titled `title` at the end of `section`.
    pub async fn add_task(&self, section: &SectionId, title: &str) -> Outcome<TaskId> {
        self.create_task(NewTask::new(section.clone(), title)).await
    }

    /// Apply a field patch. Empty patches and blank titles are ignored.
    pub async fn update_task(&self, task: &TaskId, patch: &TaskPatch) -> Outcome<()> {
        if patch.is_empty() || patch.clears_title() {
            debug!(%task, "Ignoring empty or invalid patch");
            return Outcome::Ignored;
        }
        let (ticket, id) = self.acquire_task(task).await;
        let Some((pending, patch)) = self.begin(ticket, OperationKind::UpdateTask, |state| {
            let mut patch = patch.clone();
            patch.section = patch.section.map(|section| state.section_id(&section));
            let undo = state.board.patch_task(&id, &patch)?;
            Ok((undo, patch))
        }) else {
            return Outcome::Ignored;
        };
        let mut patch = patch;
        if let Some(section) = patch.section.take() {
            patch.section = Some(self.settled_section(&section).await);
        }

        let result = match self.inner.backend.update_task(&id, &patch).await {
            Ok(ack) => acknowledged(ack.acknowledged, "Task update"),
            Err(err) => Err(err.into()),
        };
        self.settle(pending, result, |_, _| {}).await
    }

    /// Flip the completion flag. Confirms with the new value.
    pub async fn toggle_complete(&self, task: &TaskId) -> Outcome<bool> {
        let (ticket, id) = self.acquire_task(task).await;
        let Some((pending, completed)) = self.begin(ticket, OperationKind::UpdateTask, |state| {
            let completed = !state
                .board
                .task(&id)
                .ok_or_else(|| BoardError::TaskNotFound(id.clone()))?
                .completed;
            let undo = state.board.patch_task(&id, &TaskPatch::completed(completed))?;
            Ok((undo, completed))
        }) else {
            return Outcome::Ignored;
        };

        let result = match self
            .inner
            .backend
            .update_task(&id, &TaskPatch::completed(completed))
            .await
        {
            Ok(ack) => acknowledged(ack.acknowledged, "Completion toggle").map(|()| completed),
            Err(err) => Err(err.into()),
        };
        self.settle(pending, result, |_, _| {}).await
    }

    /// Delete a task.
    pub async fn delete_task(&self, task: &TaskId) -> Outcome<()> {
        let (ticket, id) = self.acquire_task(task).await;
        let Some((pending, ())) = self.begin(ticket, OperationKind::DeleteTask, |state| {
            Ok((state.board.remove_task(&id)?, ()))
        }) else {
            return Outcome::Ignored;
        };

        let result = match self.inner.backend.delete_task(&id).await {
            Ok(ack) => acknowledged(ack.acknowledged, "Task deletion"),
            Err(err) => Err(err.into()),
        };
        self.settle(pending, result, |_, _| {}).await
    }

    /// Append a column. Blank titles are ignored.
    pub async fn create_section(&self, title: &str) -> Outcome<SectionId> {
        if is_blank(title) {
            debug!("Ignoring section with a blank title");
            return Outcome::Ignored;
        }
        let temporary = SectionId::temporary();
        let ticket = self
            .inner
            .queue
            .acquire(EntityKey::Section(temporary.clone()))
            .await;
        let Some((pending, ())) = self.begin(ticket, OperationKind::CreateSection, |state| {
            let undo = state
                .board
                .insert_section(Section::new(temporary.clone(), title))?;
            Ok((undo, ()))
        }) else {
            return Outcome::Ignored;
        };

        let result = self
            .inner
            .backend
            .create_section(title)
            .await
            .map_err(Into::into);
        self.settle(pending, result, |state, issued: &SectionId| {
            if let Err(err) = state.board.replace_section_id(&temporary, issued.clone()) {
                warn!(%temporary, %issued, %err, "Could not swap in issued section id");
            }
            state
                .section_aliases
                .insert(temporary.clone(), issued.clone());
        })
        .await
    }

    /// Rename a column. Blank titles are ignored.
    pub async fn rename_section(&self, section: &SectionId, title: &str) -> Outcome<()> {
        if is_blank(title) {
            debug!(%section, "Ignoring rename to a blank title");
            return Outcome::Ignored;
        }
        let (ticket, id) = self.acquire_section(section).await;
        let Some((pending, ())) = self.begin(ticket, OperationKind::RenameSection, |state| {
            Ok((state.board.rename_section(&id, title)?, ()))
        }) else {
            return Outcome::Ignored;
        };

        let result = match self.inner.backend.update_section(&id, title).await {
            Ok(ack) => acknowledged(ack.acknowledged, "Section rename"),
            Err(err) => Err(err.into()),
        };
        self.settle(pending, result, |_, _| {}).await
    }

    /// Delete a column. Backends refuse columns that still hold tasks, in
    /// which case the column and its tasks are restored.
    pub async fn delete_section(&self, section: &SectionId) -> Outcome<()> {
        let (ticket, id) = self.acquire_section(section).await;
        let Some((pending, ())) = self.begin(ticket, OperationKind::DeleteSection, |state| {
            Ok((state.board.remove_section(&id)?, ()))
        }) else {
            return Outcome::Ignored;
        };

        let result = match self.inner.backend.delete_section(&id).await {
            Ok(ack) => acknowledged(ack.acknowledged, "Section deletion"),
            Err(err) => Err(err.into()),
        };
        self.settle(pending, result, |_, _| {}).await
    }
}
