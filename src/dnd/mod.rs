pub mod collision;
pub mod narrator;
pub mod session;

pub use collision::{Collision, CollisionStrategy, CollisionTier, DragFrame};
pub use narrator::narrate;
pub use session::{
    CancelReason, DragItem, DragMachine, DragOrigin, DragSession, DragState, DragStatus, DropOutcome,
};
