//! # Kanban DnD Core
//!
//! Ordering and reconciliation engine behind a drag-and-drop kanban board.
//!
//! This crate decides which drop target an in-flight drag is aiming at,
//! turns a drop into a minimal positional mutation, applies it optimistically
//! to the local board and reconciles with an asynchronous persistence service,
//! rolling back when the service refuses. It has no dependency on any UI,
//! transport or storage backend beyond the traits in [`storage`].

pub mod config;
pub mod dnd;
pub mod domain;
pub mod engine;
pub mod error;
pub mod reconcile;
pub mod storage;

// Re-export commonly used types
pub use config::{CollisionConfig, EngineConfig};
pub use dnd::{DragFrame, DragItem, DragStatus};
pub use domain::{
    board::{Board, Card, CardId, Column, ColumnId},
    mutation::{MoveIntent, MutationAck, MutationId, PendingMutation},
    zone::{DropZone, DropZoneId},
};
pub use engine::{BoardEngine, EngineStep, InputEvent};
pub use error::{DndError, MutationRejection, Result};
pub use reconcile::{CommitOutcome, Reconciler, Settlement};
pub use storage::{MutationService, Storage};
