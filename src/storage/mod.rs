use crate::{
    domain::{Board, MutationAck, PendingMutation},
    error::{MutationRejection, Result},
};
use async_trait::async_trait;

#[cfg(feature = "file-storage")]
pub mod file_storage;

#[cfg(feature = "file-storage")]
pub use file_storage::FileStorage;

/// Storage trait for persisting board state
#[async_trait]
pub trait Storage: Send + Sync {
    /// Initializes the storage backend
    async fn initialize(&self) -> Result<()>;

    /// Saves the board state
    async fn save_board(&self, board: &Board) -> Result<()>;

    /// Loads the board state
    async fn load_board(&self) -> Result<Board>;

    /// Checks if the project is initialized
    async fn is_initialized(&self) -> bool;
}

/// Persists one move.
///
/// Implementations either apply every sibling position in the mutation and
/// return the moved entity's new version, or apply nothing and reject.
#[async_trait]
pub trait MutationService: Send + Sync {
    async fn apply(
        &self,
        mutation: &PendingMutation,
    ) -> std::result::Result<MutationAck, MutationRejection>;
}
