//! Input-event front door.
//!
//! [`BoardEngine`] owns the drag machine and the reconciler. Each call to
//! [`BoardEngine::handle`] advances the gesture, stages the resulting move on
//! drop and narrates what changed. Dispatching staged mutations is left to the
//! caller through [`BoardEngine::reconciler_mut`].

use crate::config::EngineConfig;
use crate::dnd::{narrate, DragFrame, DragItem, DragMachine, DragStatus, DropOutcome};
use crate::domain::{Board, MoveIntent, MutationId};
use crate::error::Result;
use crate::reconcile::Reconciler;
use tracing::debug;

/// One input from the pointer, touch or keyboard layer
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// Press on an item. A frame without a pointer is a keyboard pickup.
    Start { item: DragItem, frame: DragFrame },
    Move { frame: DragFrame },
    Drop,
    Cancel,
}

/// What a single event produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStep {
    pub announcement: Option<String>,
    pub staged: Option<MutationId>,
}

pub struct BoardEngine {
    drag: DragMachine,
    reconciler: Reconciler,
    config: EngineConfig,
}

impl BoardEngine {
    pub fn new(board: Board, config: EngineConfig) -> Self {
        Self {
            drag: DragMachine::new(&config),
            reconciler: Reconciler::new(board),
            config,
        }
    }

    pub fn board(&self) -> &Board {
        self.reconciler.board()
    }

    pub fn drag_status(&self) -> DragStatus {
        self.drag.status()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn reconciler_mut(&mut self) -> &mut Reconciler {
        &mut self.reconciler
    }

    pub fn handle(&mut self, event: InputEvent) -> Result<EngineStep> {
        let before = self.drag.status();
        let mut staged = None;

        match event {
            InputEvent::Start { item, frame } => {
                self.drag.start(self.reconciler.board(), item, frame.pointer)?;
                self.drag.update(&frame)?;
            }
            InputEvent::Move { frame } => {
                self.drag.update(&frame)?;
            }
            InputEvent::Drop => {
                if let DropOutcome::Commit(intent) = self.drag.release(self.reconciler.board())? {
                    match self.reconciler.stage(intent) {
                        Ok(id) => staged = id,
                        Err(err) => {
                            self.drag.finish();
                            return Err(err);
                        }
                    }
                }
            }
            InputEvent::Cancel => self.drag.cancel()?,
        }

        let after = self.drag.status();
        let announcement = self.announce(&before, &after);
        if let Some(sentence) = &announcement {
            debug!(announcement = %sentence, "narrated");
        }
        self.drag.finish();

        Ok(EngineStep {
            announcement,
            staged,
        })
    }

    fn announce(&self, before: &DragStatus, after: &DragStatus) -> Option<String> {
        if !self.config.announcements {
            return None;
        }
        let target = self.target_name(before, after);
        narrate(before, after, target.as_deref())
    }

    /// Title of the column the current target belongs to
    fn target_name(&self, before: &DragStatus, after: &DragStatus) -> Option<String> {
        let board = self.reconciler.board();
        let column_id = match (before, after) {
            (_, DragStatus::Dragging { over: Some(zone), .. }) => zone.owning_column(board),
            (
                _,
                DragStatus::Committed {
                    intent: MoveIntent::Card { to_column, .. },
                    ..
                },
            ) => Some(to_column.clone()),
            (DragStatus::Dragging { over: Some(zone), .. }, DragStatus::Committed { .. }) => {
                zone.owning_column(board)
            }
            _ => None,
        }?;
        board.column(&column_id).map(|col| col.title.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CardId, Column, ColumnId, DropZone, DropZoneId, MutationAck, PendingMutation, Point, Rect};
    use crate::error::{DndError, MutationRejection};
    use crate::storage::MutationService;
    use async_trait::async_trait;

    fn col(s: &str) -> ColumnId {
        s.parse().unwrap()
    }

    fn card(s: &str) -> CardId {
        s.parse().unwrap()
    }

    fn titles(board: &Board, column: &str) -> Vec<String> {
        board
            .column(&col(column))
            .unwrap()
            .cards
            .iter()
            .map(|c| c.title.clone())
            .collect()
    }

    fn board() -> Board {
        let mut board = Board::new("Sprint");
        board.push_column(Column::new(col("todo"), "Todo".to_string(), 0));
        board.push_column(Column::new(col("doing"), "Doing".to_string(), 0));
        board.push_card(&col("todo"), card("A"), "A").unwrap();
        board.push_card(&col("todo"), card("B"), "B").unwrap();
        board.push_card(&col("doing"), card("C"), "C").unwrap();
        board
    }

    fn zones() -> Vec<DropZone> {
        vec![
            DropZone::new(DropZoneId::Column(col("todo")), Rect::new(0.0, 0.0, 200.0, 600.0)),
            DropZone::new(DropZoneId::ColumnBody(col("todo")), Rect::new(0.0, 40.0, 200.0, 560.0)),
            DropZone::new(DropZoneId::Card(card("A")), Rect::new(10.0, 50.0, 180.0, 40.0)),
            DropZone::new(DropZoneId::Card(card("B")), Rect::new(10.0, 100.0, 180.0, 40.0)),
            DropZone::new(DropZoneId::Column(col("doing")), Rect::new(220.0, 0.0, 200.0, 600.0)),
            DropZone::new(DropZoneId::ColumnBody(col("doing")), Rect::new(220.0, 40.0, 200.0, 560.0)),
            DropZone::new(DropZoneId::Card(card("C")), Rect::new(230.0, 50.0, 180.0, 40.0)),
        ]
    }

    fn pointer_frame(x: f64, y: f64) -> DragFrame {
        DragFrame::new(
            Some(Point::new(x, y)),
            Rect::new(x - 90.0, y - 20.0, 180.0, 40.0),
            zones(),
        )
    }

    fn keyboard_frame(active: Rect) -> DragFrame {
        DragFrame::new(None, active, zones())
    }

    struct AcceptAll;

    #[async_trait]
    impl MutationService for AcceptAll {
        async fn apply(
            &self,
            _mutation: &PendingMutation,
        ) -> std::result::Result<MutationAck, MutationRejection> {
            Ok(MutationAck::new(1))
        }
    }

    #[test]
    fn test_pointer_drag_across_columns() {
        let mut engine = BoardEngine::new(board(), EngineConfig::default());

        let step = engine
            .handle(InputEvent::Start {
                item: DragItem::Card(card("A")),
                frame: pointer_frame(100.0, 70.0),
            })
            .unwrap();
        assert_eq!(step, EngineStep::default());
        assert_eq!(engine.drag_status(), DragStatus::Idle);

        let step = engine
            .handle(InputEvent::Move {
                frame: pointer_frame(320.0, 70.0),
            })
            .unwrap();
        assert_eq!(
            step.announcement.as_deref(),
            Some("Picked up card. Dragging over column Doing.")
        );

        let step = engine.handle(InputEvent::Drop).unwrap();
        assert_eq!(step.announcement.as_deref(), Some("Moved card to column Doing."));
        assert!(step.staged.is_some());
        assert_eq!(engine.drag_status(), DragStatus::Idle);

        assert_eq!(titles(engine.board(), "todo"), vec!["B"]);
        assert_eq!(titles(engine.board(), "doing"), vec!["A", "C"]);
        assert_eq!(engine.reconciler().pending_len(), 1);
    }

    #[test]
    fn test_press_without_travel_is_a_click() {
        let initial = board();
        let mut engine = BoardEngine::new(initial.clone(), EngineConfig::default());

        engine
            .handle(InputEvent::Start {
                item: DragItem::Card(card("A")),
                frame: pointer_frame(100.0, 70.0),
            })
            .unwrap();
        engine
            .handle(InputEvent::Move {
                frame: pointer_frame(102.0, 71.0),
            })
            .unwrap();
        let step = engine.handle(InputEvent::Drop).unwrap();

        assert_eq!(step, EngineStep::default());
        assert_eq!(engine.board(), &initial);
    }

    #[test]
    fn test_keyboard_pickup_announces_at_once() {
        let mut engine = BoardEngine::new(board(), EngineConfig::default());

        let step = engine
            .handle(InputEvent::Start {
                item: DragItem::Card(card("B")),
                frame: keyboard_frame(Rect::new(10.0, 100.0, 180.0, 40.0)),
            })
            .unwrap();

        assert_eq!(
            step.announcement.as_deref(),
            Some("Picked up card. Dragging over column Todo.")
        );
        assert!(matches!(engine.drag_status(), DragStatus::Dragging { .. }));
    }

    #[test]
    fn test_cancel_restores_nothing_and_announces() {
        let initial = board();
        let mut engine = BoardEngine::new(initial.clone(), EngineConfig::default());

        engine
            .handle(InputEvent::Start {
                item: DragItem::Card(card("A")),
                frame: keyboard_frame(Rect::new(10.0, 50.0, 180.0, 40.0)),
            })
            .unwrap();
        engine
            .handle(InputEvent::Move {
                frame: keyboard_frame(Rect::new(230.0, 50.0, 180.0, 40.0)),
            })
            .unwrap();
        let step = engine.handle(InputEvent::Cancel).unwrap();

        assert_eq!(
            step.announcement.as_deref(),
            Some("Drag cancelled. The card was returned to its place.")
        );
        assert_eq!(step.staged, None);
        assert_eq!(engine.board(), &initial);
        assert_eq!(engine.drag_status(), DragStatus::Idle);
    }

    #[test]
    fn test_drop_on_own_place_stages_nothing() {
        let initial = board();
        let mut engine = BoardEngine::new(initial.clone(), EngineConfig::default());

        engine
            .handle(InputEvent::Start {
                item: DragItem::Card(card("A")),
                frame: keyboard_frame(Rect::new(10.0, 50.0, 180.0, 40.0)),
            })
            .unwrap();
        let step = engine.handle(InputEvent::Drop).unwrap();

        assert_eq!(step.staged, None);
        assert!(step.announcement.unwrap().starts_with("Drag cancelled."));
        assert_eq!(engine.board(), &initial);
        assert_eq!(engine.reconciler().pending_len(), 0);
    }

    #[test]
    fn test_announcements_can_be_disabled() {
        let config = EngineConfig {
            announcements: false,
            ..EngineConfig::default()
        };
        let mut engine = BoardEngine::new(board(), config);

        let step = engine
            .handle(InputEvent::Start {
                item: DragItem::Card(card("B")),
                frame: keyboard_frame(Rect::new(10.0, 100.0, 180.0, 40.0)),
            })
            .unwrap();
        assert_eq!(step.announcement, None);
    }

    #[test]
    fn test_events_out_of_order() {
        let mut engine = BoardEngine::new(board(), EngineConfig::default());

        assert!(matches!(engine.handle(InputEvent::Drop), Err(DndError::NoActiveDrag)));
        assert!(matches!(engine.handle(InputEvent::Cancel), Err(DndError::NoActiveDrag)));

        let start = InputEvent::Start {
            item: DragItem::Card(card("A")),
            frame: keyboard_frame(Rect::new(10.0, 50.0, 180.0, 40.0)),
        };
        engine.handle(start.clone()).unwrap();
        assert!(matches!(engine.handle(start), Err(DndError::DragInProgress)));
        assert!(matches!(engine.drag_status(), DragStatus::Dragging { .. }));
    }

    #[tokio::test]
    async fn test_column_drag_then_flush() {
        let mut engine = BoardEngine::new(board(), EngineConfig::default());

        engine
            .handle(InputEvent::Start {
                item: DragItem::Column(col("doing")),
                frame: keyboard_frame(Rect::new(220.0, 0.0, 200.0, 600.0)),
            })
            .unwrap();
        engine
            .handle(InputEvent::Move {
                frame: DragFrame::new(
                    None,
                    Rect::new(0.0, 700.0, 200.0, 600.0),
                    zones().into_iter().filter(|z| !z.id.accepts_cards()).collect(),
                ),
            })
            .unwrap();
        let step = engine.handle(InputEvent::Drop).unwrap();

        assert_eq!(
            step.announcement.as_deref(),
            Some("Moved column to the place of column Todo.")
        );
        assert_eq!(engine.board().column_ids(), vec![col("doing"), col("todo")]);

        let settlements = engine.reconciler_mut().flush(&AcceptAll).await.unwrap();
        assert_eq!(settlements.len(), 1);
        assert_eq!(engine.reconciler().pending_len(), 0);
        assert_eq!(engine.board().column(&col("doing")).unwrap().version, 1);
    }
}
