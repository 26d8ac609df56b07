use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DndError>;

#[derive(Debug, Error)]
pub enum DndError {
    #[error("Card not found: {0}")]
    CardNotFound(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Pending mutation not found: {0}")]
    MutationNotFound(u64),

    #[error("Mutation {0} has not been dispatched")]
    MutationNotDispatched(u64),

    #[error("Index {index} out of bounds for list of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Invalid drop zone identifier: {0}")]
    InvalidDropZone(String),

    #[error("A drag gesture is already in progress")]
    DragInProgress,

    #[error("No drag gesture is in progress")]
    NoActiveDrag,

    #[error("Board invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Mutation rejected: {0}")]
    Rejected(#[from] MutationRejection),

    #[error("Board not initialized")]
    BoardNotInitialized,

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Typed failure returned by a persistence service for a pending mutation.
///
/// Every variant leads to the same recovery (rollback to the pre-commit
/// snapshot); they differ only in what the user is told.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum MutationRejection {
    #[error("{entity} changed concurrently (expected version {expected}, found {actual})")]
    Conflict {
        entity: String,
        expected: u64,
        actual: u64,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Transport failure: {0}")]
    Transport(String),
}

impl MutationRejection {
    /// Short sentence shown after the local board has been rolled back
    pub fn user_message(&self) -> String {
        match self {
            Self::Conflict { .. } => {
                "The board changed elsewhere, so your move was undone. Drag again to retry."
                    .to_string()
            }
            Self::NotFound(what) => format!("Your move was undone because {what} no longer exists."),
            Self::Validation(_) => "Your move could not be saved and was undone.".to_string(),
            Self::Transport(_) => {
                "Your move could not reach the server and was undone.".to_string()
            }
        }
    }
}
