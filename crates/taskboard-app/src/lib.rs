//! Application layer for taskboard.
//!
//! This crate provides the backend abstraction, the optimistic board
//! controller, and project configuration shared by the CLI and TUI.

pub mod backend;
pub mod config;
pub mod controller;
pub mod memory;
pub mod notice;
pub mod queue;

// Re-exports for convenience
pub use backend::{Ack, BoardBackend, UpdateAck};
pub use config::{BoardConfig, ProjectConfig, StoreConfig};
pub use controller::{BoardController, DEFAULT_PAGE_SIZE, Outcome, StagedTask};
pub use memory::{BackendError, MemoryBackend};
pub use notice::{Notice, NoticeReceiver, OperationKind};
pub use queue::{EntityKey, OperationQueue, Ticket};
