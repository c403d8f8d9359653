//! Per-entity single-flight queue for board mutations.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use taskboard_core::{SectionId, TaskId};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Entity a mutation is serialized on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    /// A task.
    Task(TaskId),
    /// A section (column).
    Section(SectionId),
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task(id) => write!(f, "task:{id}"),
            Self::Section(id) => write!(f, "section:{id}"),
        }
    }
}

/// Held while a mutation of one entity is in flight.
#[derive(Debug)]
pub struct Ticket {
    key: EntityKey,
    _guard: OwnedMutexGuard<()>,
}

impl Ticket {
    /// Entity this ticket serializes.
    #[must_use]
    pub const fn key(&self) -> &EntityKey {
        &self.key
    }
}

/// FIFO queue with at most one in-flight mutation per entity.
///
/// Waiters are served in arrival order (tokio's mutex is fair); different
/// entities proceed independently.
#[derive(Debug, Default)]
pub struct OperationQueue {
    slots: Mutex<HashMap<EntityKey, Arc<AsyncMutex<()>>>>,
}

impl OperationQueue {
    /// Empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &EntityKey) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        // Entries nobody holds or waits on are only referenced by the map.
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    /// Wait until no other mutation of `key` is in flight.
    pub async fn acquire(&self, key: EntityKey) -> Ticket {
        let guard = self.slot(&key).lock_owned().await;
        Ticket { key, _guard: guard }
    }

    /// Take the ticket immediately, or `None` when `key` is busy.
    #[must_use]
    pub fn try_acquire(&self, key: EntityKey) -> Option<Ticket> {
        let guard = self.slot(&key).try_lock_owned().ok()?;
        Some(Ticket { key, _guard: guard })
    }

    /// Whether a mutation of `key` holds or waits for its ticket.
    #[must_use]
    pub fn is_busy(&self, key: &EntityKey) -> bool {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .is_some_and(|slot| Arc::strong_count(slot) > 1)
    }

    /// Number of entities currently tracked.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| Arc::strong_count(slot) > 1)
            .count()
    }
}
