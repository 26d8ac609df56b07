use crate::domain::board::{Board, CardId, ColumnId};
use crate::domain::geometry::Rect;
use crate::error::DndError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Identifier of a drop zone, encoding its kind and owning entity.
///
/// String form is `<kind>:<id>`, e.g. `card:42` or `column-end:todo`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DropZoneId {
    /// A specific card; dropping inserts before it
    Card(CardId),
    /// A column's card list; dropping joins the column
    ColumnBody(ColumnId),
    /// Marker after a column's last card; dropping appends
    ColumnEnd(ColumnId),
    /// A whole column, used for column reordering
    Column(ColumnId),
}

impl DropZoneId {
    const CARD: &'static str = "card";
    const COLUMN_BODY: &'static str = "column-body";
    const COLUMN_END: &'static str = "column-end";
    const COLUMN: &'static str = "column";

    /// Card, column-body and column-end zones: the ones a dragged card may land in
    pub fn accepts_cards(&self) -> bool {
        !matches!(self, Self::Column(_))
    }

    /// Column that owns this zone on `board`.
    ///
    /// Card zones resolve through the card's current column.
    pub fn owning_column(&self, board: &Board) -> Option<ColumnId> {
        match self {
            Self::Card(card_id) => board.locate_card(card_id).map(|loc| loc.column_id),
            Self::ColumnBody(id) | Self::ColumnEnd(id) | Self::Column(id) => {
                board.column(id).map(|col| col.id.clone())
            }
        }
    }
}

impl fmt::Display for DropZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Card(id) => write!(f, "{}:{}", Self::CARD, id),
            Self::ColumnBody(id) => write!(f, "{}:{}", Self::COLUMN_BODY, id),
            Self::ColumnEnd(id) => write!(f, "{}:{}", Self::COLUMN_END, id),
            Self::Column(id) => write!(f, "{}:{}", Self::COLUMN, id),
        }
    }
}

impl FromStr for DropZoneId {
    type Err = DndError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| DndError::InvalidDropZone(s.to_string()))?;
        let invalid = |_| DndError::InvalidDropZone(s.to_string());

        match kind {
            Self::CARD => id.parse().map(Self::Card).map_err(invalid),
            Self::COLUMN_BODY => id.parse().map(Self::ColumnBody).map_err(invalid),
            Self::COLUMN_END => id.parse().map(Self::ColumnEnd).map_err(invalid),
            Self::COLUMN => id.parse().map(Self::Column).map_err(invalid),
            _ => Err(DndError::InvalidDropZone(s.to_string())),
        }
    }
}

impl TryFrom<String> for DropZoneId {
    type Error = DndError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DropZoneId> for String {
    fn from(value: DropZoneId) -> Self {
        value.to_string()
    }
}

/// A mounted drop zone and its current bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropZone {
    pub id: DropZoneId,
    pub rect: Rect,
}

impl DropZone {
    pub fn new(id: DropZoneId, rect: Rect) -> Self {
        Self { id, rect }
    }
}
