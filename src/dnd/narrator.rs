//! Screen-reader sentences derived from drag status transitions.

use crate::dnd::session::DragStatus;
use crate::domain::EntityKind;

/// Sentence for the transition `previous -> current`, if it is worth saying.
///
/// `target_name` is the display name of the column the hovered or chosen
/// zone belongs to.
pub fn narrate(previous: &DragStatus, current: &DragStatus, target_name: Option<&str>) -> Option<String> {
    match (previous, current) {
        (DragStatus::Dragging { .. }, DragStatus::Dragging { over: None, .. }) => None,
        (DragStatus::Dragging { over: before, .. }, DragStatus::Dragging { over: Some(zone), .. })
            if before.as_ref() == Some(zone) =>
        {
            None
        }
        (DragStatus::Dragging { .. }, DragStatus::Dragging { over: Some(_), .. }) => {
            target_name.map(|name| format!("Dragging over column {name}."))
        }
        (_, DragStatus::Dragging { kind, over }) => {
            let mut sentence = format!("Picked up {}.", noun(*kind));
            if let (Some(_), Some(name)) = (over, target_name) {
                sentence.push_str(&format!(" Dragging over column {name}."));
            }
            Some(sentence)
        }
        (DragStatus::Dragging { .. }, DragStatus::Committed { kind, .. }) => Some(match (kind, target_name) {
            (EntityKind::Card, Some(name)) => format!("Moved card to column {name}."),
            (EntityKind::Column, Some(name)) => format!("Moved column to the place of column {name}."),
            (_, None) => format!("Moved {}.", noun(*kind)),
        }),
        (DragStatus::Dragging { .. }, DragStatus::Cancelled { kind }) => {
            Some(format!("Drag cancelled. The {} was returned to its place.", noun(*kind)))
        }
        _ => None,
    }
}

fn noun(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Card => "card",
        EntityKind::Column => "column",
    }
}
