//! Lifecycle of a single drag gesture.
//!
//! ```text
//! Idle ──start──▶ Dragging ──release──▶ Committing ──finish──▶ Idle
//!                    │   └──release/cancel──▶ Cancelled ──finish──▶ Idle
//!                    └─update (re-runs collision, records target)
//! ```
//!
//! Nothing here performs I/O; `update` runs at input-event frequency.

use crate::config::EngineConfig;
use crate::dnd::collision::{CollisionStrategy, DragFrame};
use crate::domain::{Board, CardId, ColumnId, DropZoneId, EntityKind, MoveIntent, Point};
use crate::error::{DndError, Result};
use tracing::debug;

/// The thing being dragged
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragItem {
    Card(CardId),
    Column(ColumnId),
}

impl DragItem {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Card(_) => EntityKind::Card,
            Self::Column(_) => EntityKind::Column,
        }
    }
}

/// Where the item sat when the gesture started
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragOrigin {
    pub column_id: ColumnId,
    pub index: usize,
}

/// State of one gesture, created on start and dropped on finish
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    pub item: DragItem,
    pub origin: DragOrigin,
    pub over: Option<DropZoneId>,
    pub cancelled: bool,
    start_pointer: Option<Point>,
    activated: bool,
}

impl DragSession {
    pub fn kind(&self) -> EntityKind {
        self.item.kind()
    }

    /// False until the pointer has travelled the activation distance
    pub fn is_active(&self) -> bool {
        self.activated
    }
}

/// Why a drop produced no move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Escape, pointer-cancel or an explicit call
    Explicit,
    /// Released before the activation distance was reached
    NotActivated,
    /// No drop zone under the item
    NoTarget,
    /// The drop would leave the item where it started
    SameAsOrigin,
    /// Cards cannot be dropped into a disabled column
    TargetDisabled,
    /// The dragged item disappeared from the board mid-gesture
    ItemMissing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragState {
    Idle,
    Dragging(DragSession),
    Committing { session: DragSession, intent: MoveIntent },
    Cancelled { session: DragSession, reason: CancelReason },
}

/// What the drop decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    Commit(MoveIntent),
    Cancelled(CancelReason),
}

/// Read-only view of the machine, as consumed by the narrator and renderer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragStatus {
    Idle,
    Dragging {
        kind: EntityKind,
        over: Option<DropZoneId>,
    },
    Committed {
        kind: EntityKind,
        intent: MoveIntent,
    },
    Cancelled {
        kind: EntityKind,
    },
}

pub struct DragMachine {
    state: DragState,
    collision: CollisionStrategy,
    activation_distance: f64,
}

impl DragMachine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            state: DragState::Idle,
            collision: CollisionStrategy::new(config.collision.clone()),
            activation_distance: config.activation_distance,
        }
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn session(&self) -> Option<&DragSession> {
        match &self.state {
            DragState::Idle => None,
            DragState::Dragging(session)
            | DragState::Committing { session, .. }
            | DragState::Cancelled { session, .. } => Some(session),
        }
    }

    pub fn status(&self) -> DragStatus {
        match &self.state {
            DragState::Idle => DragStatus::Idle,
            DragState::Dragging(session) if !session.activated => DragStatus::Idle,
            DragState::Dragging(session) => DragStatus::Dragging {
                kind: session.kind(),
                over: session.over.clone(),
            },
            DragState::Committing { session, intent } => DragStatus::Committed {
                kind: session.kind(),
                intent: intent.clone(),
            },
            DragState::Cancelled { session, .. } => DragStatus::Cancelled {
                kind: session.kind(),
            },
        }
    }

    /// Starts a gesture on `item`, recording its origin on `board`.
    ///
    /// Without a pointer (keyboard pickup) the session is active at once.
    pub fn start(&mut self, board: &Board, item: DragItem, pointer: Option<Point>) -> Result<()> {
        if !matches!(self.state, DragState::Idle) {
            return Err(DndError::DragInProgress);
        }

        let origin = match &item {
            DragItem::Card(card_id) => {
                let location = board
                    .locate_card(card_id)
                    .ok_or_else(|| DndError::CardNotFound(card_id.to_string()))?;
                DragOrigin {
                    column_id: location.column_id,
                    index: location.index,
                }
            }
            DragItem::Column(column_id) => DragOrigin {
                column_id: column_id.clone(),
                index: board
                    .column_index(column_id)
                    .ok_or_else(|| DndError::ColumnNotFound(column_id.to_string()))?,
            },
        };

        debug!(item = ?item, origin = ?origin, "drag started");
        self.state = DragState::Dragging(DragSession {
            item,
            origin,
            over: None,
            cancelled: false,
            activated: pointer.is_none() || self.activation_distance <= 0.0,
            start_pointer: pointer,
        });
        Ok(())
    }

    /// Re-runs collision for a new frame. Returns true when the hovered
    /// target changed (activation included).
    pub fn update(&mut self, frame: &DragFrame) -> Result<bool> {
        let DragState::Dragging(session) = &mut self.state else {
            return Err(DndError::NoActiveDrag);
        };

        let mut changed = false;
        if !session.activated {
            let travelled = match (session.start_pointer, frame.pointer) {
                (Some(start), Some(now)) => start.distance_to(now) >= self.activation_distance,
                _ => true,
            };
            if !travelled {
                return Ok(false);
            }
            session.activated = true;
            changed = true;
        }

        let over = self
            .collision
            .detect(frame, session.kind())
            .map(|collision| collision.zone);
        if over != session.over {
            debug!(over = ?over, "drag target changed");
            session.over = over;
            changed = true;
        }
        Ok(changed)
    }

    /// Ends the gesture, resolving the hovered zone into a move on `board`.
    pub fn release(&mut self, board: &Board) -> Result<DropOutcome> {
        let session = self.take_dragging()?;

        let resolved = if !session.activated {
            Err(CancelReason::NotActivated)
        } else {
            match &session.over {
                None => Err(CancelReason::NoTarget),
                Some(zone) => resolve_intent(board, &session, zone),
            }
        };

        match resolved {
            Ok(intent) => {
                debug!(intent = ?intent, "drop committing");
                self.state = DragState::Committing {
                    session,
                    intent: intent.clone(),
                };
                Ok(DropOutcome::Commit(intent))
            }
            Err(reason) => {
                debug!(reason = ?reason, "drop cancelled");
                self.state = DragState::Cancelled {
                    session: DragSession {
                        cancelled: true,
                        ..session
                    },
                    reason,
                };
                Ok(DropOutcome::Cancelled(reason))
            }
        }
    }

    /// Abandons the gesture with no residual effect
    pub fn cancel(&mut self) -> Result<()> {
        let session = self.take_dragging()?;
        debug!(item = ?session.item, "drag cancelled");
        self.state = DragState::Cancelled {
            session: DragSession {
                cancelled: true,
                ..session
            },
            reason: CancelReason::Explicit,
        };
        Ok(())
    }

    fn take_dragging(&mut self) -> Result<DragSession> {
        match std::mem::replace(&mut self.state, DragState::Idle) {
            DragState::Dragging(session) => Ok(session),
            other => {
                self.state = other;
                Err(DndError::NoActiveDrag)
            }
        }
    }

    /// Returns to `Idle` after a commit or cancel has been handled
    pub fn finish(&mut self) {
        if !matches!(self.state, DragState::Dragging(_)) {
            self.state = DragState::Idle;
        }
    }
}

/// Turns the hovered zone into a concrete move, or explains why there is none.
fn resolve_intent(
    board: &Board,
    session: &DragSession,
    zone: &DropZoneId,
) -> std::result::Result<MoveIntent, CancelReason> {
    match &session.item {
        DragItem::Card(card_id) => resolve_card_drop(board, card_id, zone),
        DragItem::Column(column_id) => {
            let current = board
                .column_index(column_id)
                .ok_or(CancelReason::ItemMissing)?;
            let target = zone.owning_column(board).ok_or(CancelReason::NoTarget)?;
            let to_index = board.column_index(&target).ok_or(CancelReason::NoTarget)?;
            if to_index == current {
                return Err(CancelReason::SameAsOrigin);
            }
            Ok(MoveIntent::Column {
                column_id: column_id.clone(),
                to_index,
            })
        }
    }
}

fn resolve_card_drop(
    board: &Board,
    card_id: &CardId,
    zone: &DropZoneId,
) -> std::result::Result<MoveIntent, CancelReason> {
    let origin = board.locate_card(card_id).ok_or(CancelReason::ItemMissing)?;

    let (to_column, to_index) = match zone {
        DropZoneId::Card(target) if target == card_id => return Err(CancelReason::SameAsOrigin),
        DropZoneId::Card(target) => {
            let location = board.locate_card(target).ok_or(CancelReason::NoTarget)?;
            let index = if location.column_id == origin.column_id && location.index > origin.index {
                location.index - 1
            } else {
                location.index
            };
            (location.column_id, index)
        }
        DropZoneId::ColumnEnd(column_id) => {
            let column = board.column(column_id).ok_or(CancelReason::NoTarget)?;
            let len = column.cards.len();
            let index = if column.id == origin.column_id { len - 1 } else { len };
            (column.id.clone(), index)
        }
        DropZoneId::ColumnBody(column_id) | DropZoneId::Column(column_id) => {
            if column_id == &origin.column_id {
                return Err(CancelReason::SameAsOrigin);
            }
            let column = board.column(column_id).ok_or(CancelReason::NoTarget)?;
            (column.id.clone(), column.cards.len())
        }
    };

    if to_column != origin.column_id && board.column(&to_column).is_some_and(|col| !col.enabled) {
        return Err(CancelReason::TargetDisabled);
    }
    if to_column == origin.column_id && to_index == origin.index {
        return Err(CancelReason::SameAsOrigin);
    }

    Ok(MoveIntent::Card {
        card_id: card_id.clone(),
        to_column,
        to_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Column, DropZone, Rect};

    fn col(s: &str) -> ColumnId {
        s.parse().unwrap()
    }

    fn card(s: &str) -> CardId {
        s.parse().unwrap()
    }

    fn board() -> Board {
        let mut board = Board::new("Test");
        for (id, title) in [("backlog", "Backlog"), ("doing", "Doing"), ("done", "Done")] {
            board.push_column(Column::new(col(id), title.to_string(), 0));
        }
        for name in ["A", "B", "C"] {
            board.push_card(&col("backlog"), card(name), name).unwrap();
        }
        board.push_card(&col("doing"), card("D"), "D").unwrap();
        board
    }

    fn machine() -> DragMachine {
        DragMachine::new(&EngineConfig::default())
    }

    /// A frame whose pointer sits inside exactly one zone
    fn frame_over(zone: DropZoneId) -> DragFrame {
        DragFrame::new(
            Some(Point::new(50.0, 50.0)),
            Rect::new(40.0, 40.0, 20.0, 20.0),
            vec![DropZone::new(zone, Rect::new(0.0, 0.0, 100.0, 100.0))],
        )
    }

    fn drop_on(board: &Board, item: DragItem, zone: DropZoneId) -> DropOutcome {
        let mut machine = machine();
        machine.start(board, item, None).unwrap();
        machine.update(&frame_over(zone)).unwrap();
        machine.release(board).unwrap()
    }

    #[test]
    fn test_full_lifecycle() {
        let board = board();
        let mut machine = machine();
        assert_eq!(machine.status(), DragStatus::Idle);

        machine.start(&board, DragItem::Card(card("C")), None).unwrap();
        assert!(machine.session().unwrap().is_active());
        assert_eq!(machine.session().unwrap().origin.index, 2);

        assert!(machine.update(&frame_over(DropZoneId::Card(card("A")))).unwrap());
        assert!(!machine.update(&frame_over(DropZoneId::Card(card("A")))).unwrap());

        let outcome = machine.release(&board).unwrap();
        assert!(matches!(outcome, DropOutcome::Commit(_)));
        assert!(matches!(machine.status(), DragStatus::Committed { .. }));

        machine.finish();
        assert_eq!(machine.state(), &DragState::Idle);
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let board = board();
        let mut machine = machine();
        machine.start(&board, DragItem::Card(card("A")), None).unwrap();
        assert!(matches!(
            machine.start(&board, DragItem::Card(card("B")), None),
            Err(DndError::DragInProgress)
        ));
    }

    #[test]
    fn test_start_unknown_item() {
        let board = board();
        let mut machine = machine();
        assert!(machine.start(&board, DragItem::Card(card("nope")), None).is_err());
        assert_eq!(machine.state(), &DragState::Idle);
    }

    #[test]
    fn test_update_without_drag() {
        let mut machine = machine();
        let frame = frame_over(DropZoneId::Column(col("done")));
        assert!(matches!(machine.update(&frame), Err(DndError::NoActiveDrag)));
        assert!(matches!(machine.cancel(), Err(DndError::NoActiveDrag)));
    }

    #[test]
    fn test_activation_distance() {
        let board = board();
        let mut machine = machine();
        machine
            .start(&board, DragItem::Card(card("A")), Some(Point::new(50.0, 50.0)))
            .unwrap();

        let mut frame = frame_over(DropZoneId::ColumnEnd(col("doing")));
        frame.pointer = Some(Point::new(52.0, 51.0));
        assert!(!machine.update(&frame).unwrap());
        assert_eq!(machine.status(), DragStatus::Idle);

        frame.pointer = Some(Point::new(58.0, 50.0));
        assert!(machine.update(&frame).unwrap());
        assert!(matches!(machine.status(), DragStatus::Dragging { over: Some(_), .. }));
    }

    #[test]
    fn test_release_before_activation_is_cancelled() {
        let board = board();
        let mut machine = machine();
        machine
            .start(&board, DragItem::Card(card("A")), Some(Point::new(50.0, 50.0)))
            .unwrap();
        assert_eq!(
            machine.release(&board).unwrap(),
            DropOutcome::Cancelled(CancelReason::NotActivated)
        );
    }

    #[test]
    fn test_explicit_cancel() {
        let board = board();
        let mut machine = machine();
        machine.start(&board, DragItem::Card(card("A")), None).unwrap();
        machine.update(&frame_over(DropZoneId::ColumnEnd(col("doing")))).unwrap();
        machine.cancel().unwrap();

        assert!(machine.session().unwrap().cancelled);
        assert!(matches!(
            machine.state(),
            DragState::Cancelled {
                reason: CancelReason::Explicit,
                ..
            }
        ));
        machine.finish();
        assert_eq!(machine.status(), DragStatus::Idle);
    }

    #[test]
    fn test_drop_without_target() {
        let board = board();
        let mut machine = machine();
        machine.start(&board, DragItem::Card(card("A")), None).unwrap();
        machine
            .update(&DragFrame::new(None, Rect::new(0.0, 0.0, 1.0, 1.0), vec![]))
            .unwrap();
        assert_eq!(
            machine.release(&board).unwrap(),
            DropOutcome::Cancelled(CancelReason::NoTarget)
        );
    }

    #[test]
    fn test_card_over_card_moving_up_inserts_before() {
        let outcome = drop_on(&board(), DragItem::Card(card("C")), DropZoneId::Card(card("A")));
        assert_eq!(
            outcome,
            DropOutcome::Commit(MoveIntent::Card {
                card_id: card("C"),
                to_column: col("backlog"),
                to_index: 0,
            })
        );
    }

    #[test]
    fn test_card_over_card_moving_down_inserts_before() {
        let outcome = drop_on(&board(), DragItem::Card(card("A")), DropZoneId::Card(card("C")));
        assert_eq!(
            outcome,
            DropOutcome::Commit(MoveIntent::Card {
                card_id: card("A"),
                to_column: col("backlog"),
                to_index: 1,
            })
        );
    }

    #[test]
    fn test_card_over_next_card_is_noop() {
        let outcome = drop_on(&board(), DragItem::Card(card("A")), DropZoneId::Card(card("B")));
        assert_eq!(outcome, DropOutcome::Cancelled(CancelReason::SameAsOrigin));
    }

    #[test]
    fn test_card_over_itself_is_noop() {
        let outcome = drop_on(&board(), DragItem::Card(card("A")), DropZoneId::Card(card("A")));
        assert_eq!(outcome, DropOutcome::Cancelled(CancelReason::SameAsOrigin));
    }

    #[test]
    fn test_card_over_other_column_card() {
        let outcome = drop_on(&board(), DragItem::Card(card("A")), DropZoneId::Card(card("D")));
        assert_eq!(
            outcome,
            DropOutcome::Commit(MoveIntent::Card {
                card_id: card("A"),
                to_column: col("doing"),
                to_index: 0,
            })
        );
    }

    #[test]
    fn test_card_over_column_end_appends() {
        let outcome = drop_on(&board(), DragItem::Card(card("A")), DropZoneId::ColumnEnd(col("doing")));
        assert_eq!(
            outcome,
            DropOutcome::Commit(MoveIntent::Card {
                card_id: card("A"),
                to_column: col("doing"),
                to_index: 1,
            })
        );

        let same_column = drop_on(&board(), DragItem::Card(card("A")), DropZoneId::ColumnEnd(col("backlog")));
        assert_eq!(
            same_column,
            DropOutcome::Commit(MoveIntent::Card {
                card_id: card("A"),
                to_column: col("backlog"),
                to_index: 2,
            })
        );

        let already_last = drop_on(&board(), DragItem::Card(card("C")), DropZoneId::ColumnEnd(col("backlog")));
        assert_eq!(already_last, DropOutcome::Cancelled(CancelReason::SameAsOrigin));
    }

    #[test]
    fn test_card_over_body_or_column() {
        let into_empty = drop_on(&board(), DragItem::Card(card("B")), DropZoneId::ColumnBody(col("done")));
        assert_eq!(
            into_empty,
            DropOutcome::Commit(MoveIntent::Card {
                card_id: card("B"),
                to_column: col("done"),
                to_index: 0,
            })
        );

        let own_body = drop_on(&board(), DragItem::Card(card("B")), DropZoneId::ColumnBody(col("backlog")));
        assert_eq!(own_body, DropOutcome::Cancelled(CancelReason::SameAsOrigin));

        let whole_column = drop_on(&board(), DragItem::Card(card("B")), DropZoneId::Column(col("doing")));
        assert!(matches!(whole_column, DropOutcome::Commit(MoveIntent::Card { to_index: 1, .. })));
    }

    #[test]
    fn test_card_into_disabled_column() {
        let mut board = board();
        board.column_mut(&col("done")).unwrap().enabled = false;
        let outcome = drop_on(&board, DragItem::Card(card("A")), DropZoneId::ColumnBody(col("done")));
        assert_eq!(outcome, DropOutcome::Cancelled(CancelReason::TargetDisabled));
    }

    #[test]
    fn test_column_drop_resolves_owning_column() {
        let board = board();
        let over_column = drop_on(&board, DragItem::Column(col("done")), DropZoneId::Column(col("backlog")));
        assert_eq!(
            over_column,
            DropOutcome::Commit(MoveIntent::Column {
                column_id: col("done"),
                to_index: 0,
            })
        );

        let over_card = drop_on(&board, DragItem::Column(col("backlog")), DropZoneId::Card(card("D")));
        assert_eq!(
            over_card,
            DropOutcome::Commit(MoveIntent::Column {
                column_id: col("backlog"),
                to_index: 1,
            })
        );

        let over_self = drop_on(&board, DragItem::Column(col("doing")), DropZoneId::ColumnBody(col("doing")));
        assert_eq!(over_self, DropOutcome::Cancelled(CancelReason::SameAsOrigin));
    }

    #[test]
    fn test_item_removed_mid_drag() {
        let mut board = board();
        let mut machine = machine();
        machine.start(&board, DragItem::Card(card("A")), None).unwrap();
        machine.update(&frame_over(DropZoneId::ColumnEnd(col("doing")))).unwrap();

        board.columns[0].cards.remove(0);
        assert_eq!(
            machine.release(&board).unwrap(),
            DropOutcome::Cancelled(CancelReason::ItemMissing)
        );
    }
}
