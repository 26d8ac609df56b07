pub mod board;
pub mod geometry;
pub mod mutation;
pub mod ordering;
pub mod zone;

pub use board::{AppliedMove, Board, Card, CardId, CardLocation, Column, ColumnId};
pub use geometry::{Point, Rect};
pub use mutation::{
    EntityKind, ListKey, ListVersion, MoveIntent, MutationAck, MutationId, PendingMutation,
    SiblingPosition,
};
pub use ordering::{dense_positions, move_across_lists, reorder_within_list};
pub use zone::{DropZone, DropZoneId};
