use crate::domain::mutation::{ListKey, SiblingPosition};
use crate::domain::ordering::{
    clamp_index, dense_positions, is_strictly_ordered, move_across_lists, reorder_within_list,
};
use crate::error::{DndError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::{fmt, str::FromStr};
use uuid::Uuid;

fn validate_id(s: &str) -> Result<()> {
    if s.trim().is_empty() || s.contains(':') {
        return Err(DndError::InvalidId(s.to_string()));
    }
    Ok(())
}

/// Unique identifier for a column
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ColumnId(String);

impl ColumnId {
    /// Creates a fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ColumnId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for ColumnId {
    type Err = DndError;

    fn from_str(s: &str) -> Result<Self> {
        validate_id(s)?;
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for ColumnId {
    type Error = DndError;

    fn try_from(s: String) -> Result<Self> {
        validate_id(&s)?;
        Ok(Self(s))
    }
}

impl From<ColumnId> for String {
    fn from(id: ColumnId) -> Self {
        id.0
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a card
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CardId(String);

impl CardId {
    /// Creates a fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CardId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for CardId {
    type Err = DndError;

    fn from_str(s: &str) -> Result<Self> {
        validate_id(s)?;
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for CardId {
    type Error = DndError;

    fn try_from(s: String) -> Result<Self> {
        validate_id(&s)?;
        Ok(Self(s))
    }
}

impl From<CardId> for String {
    fn from(id: CardId) -> Self {
        id.0
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A card on the board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub column_id: ColumnId,
    pub title: String,
    pub position: i64,
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    pub fn new(id: CardId, column_id: ColumnId, title: String, position: i64) -> Self {
        let now = Utc::now();
        Self {
            id,
            column_id,
            title,
            position,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A board column holding its cards in position order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    pub title: String,
    pub position: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub version: u64,
    /// Bumped by the store whenever this column's card order changes
    #[serde(default)]
    pub cards_version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub cards: Vec<Card>,
}

fn default_enabled() -> bool {
    true
}

impl Column {
    pub fn new(id: ColumnId, title: String, position: i64) -> Self {
        let now = Utc::now();
        Self {
            id,
            title,
            position,
            color: None,
            icon: None,
            enabled: true,
            version: 0,
            cards_version: 0,
            created_at: now,
            updated_at: now,
            cards: Vec::new(),
        }
    }

    pub fn card_index(&self, card_id: &CardId) -> Option<usize> {
        self.cards.iter().position(|card| &card.id == card_id)
    }

    pub fn card_ids(&self) -> Vec<CardId> {
        self.cards.iter().map(|card| card.id.clone()).collect()
    }

    /// Rewrites every card's position to its index
    fn renumber(&mut self) {
        for (index, card) in self.cards.iter_mut().enumerate() {
            card.position = index as i64;
        }
    }

    fn sibling_positions(&self) -> Vec<SiblingPosition> {
        dense_positions(self.cards.iter().map(|card| card.id.as_str()))
    }
}

/// Where a card currently sits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardLocation {
    pub column_id: ColumnId,
    pub column_index: usize,
    pub index: usize,
}

/// Result of applying a move to the board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    /// Set when a card changed columns
    pub new_parent: Option<ColumnId>,
    /// Dense positions of every sibling in every affected list
    pub siblings: Vec<SiblingPosition>,
}

/// Kanban board state: columns in position order, each owning its cards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub name: String,
    /// Bumped by the store whenever the column order changes
    #[serde(default)]
    pub columns_version: u64,
    pub columns: Vec<Column>,
}

impl Board {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns_version: 0,
            columns: Vec::new(),
        }
    }

    /// Last acknowledged version of one ordered list
    pub fn list_version(&self, list: &ListKey) -> Option<u64> {
        match list {
            ListKey::Columns => Some(self.columns_version),
            ListKey::Cards(column_id) => self.column(column_id).map(|col| col.cards_version),
        }
    }

    pub fn set_list_version(&mut self, list: &ListKey, version: u64) {
        match list {
            ListKey::Columns => self.columns_version = version,
            ListKey::Cards(column_id) => {
                if let Some(column) = self.column_mut(column_id) {
                    column.cards_version = version;
                }
            }
        }
    }

    /// Appends a column after the last one and returns its id
    pub fn add_column(&mut self, title: impl Into<String>) -> ColumnId {
        let id = ColumnId::new();
        self.push_column(Column::new(id.clone(), title.into(), 0));
        id
    }

    /// Appends an existing column, placing it after the current last position
    pub fn push_column(&mut self, mut column: Column) {
        column.position = self
            .columns
            .last()
            .map(|last| last.position + 1)
            .unwrap_or(0);
        for card in column.cards.iter_mut() {
            card.column_id = column.id.clone();
        }
        column.renumber();
        self.columns.push(column);
    }

    /// Appends a new card to the end of a column
    pub fn add_card(&mut self, column_id: &ColumnId, title: impl Into<String>) -> Result<CardId> {
        let id = CardId::new();
        self.push_card(column_id, id.clone(), title)?;
        Ok(id)
    }

    /// Appends a card with a caller-chosen id to the end of a column
    pub fn push_card(&mut self, column_id: &ColumnId, id: CardId, title: impl Into<String>) -> Result<()> {
        if self.card(&id).is_some() {
            return Err(DndError::InvariantViolation(format!("duplicate card id {id}")));
        }
        let column = self
            .column_mut(column_id)
            .ok_or_else(|| DndError::ColumnNotFound(column_id.to_string()))?;
        let position = column.cards.last().map(|c| c.position + 1).unwrap_or(0);
        column
            .cards
            .push(Card::new(id, column_id.clone(), title.into(), position));
        Ok(())
    }

    pub fn column(&self, id: &ColumnId) -> Option<&Column> {
        self.columns.iter().find(|col| &col.id == id)
    }

    pub fn column_mut(&mut self, id: &ColumnId) -> Option<&mut Column> {
        self.columns.iter_mut().find(|col| &col.id == id)
    }

    pub fn column_index(&self, id: &ColumnId) -> Option<usize> {
        self.columns.iter().position(|col| &col.id == id)
    }

    pub fn column_ids(&self) -> Vec<ColumnId> {
        self.columns.iter().map(|col| col.id.clone()).collect()
    }

    pub fn locate_card(&self, id: &CardId) -> Option<CardLocation> {
        self.columns
            .iter()
            .enumerate()
            .find_map(|(column_index, column)| {
                column.card_index(id).map(|index| CardLocation {
                    column_id: column.id.clone(),
                    column_index,
                    index,
                })
            })
    }

    pub fn card(&self, id: &CardId) -> Option<&Card> {
        self.columns
            .iter()
            .flat_map(|col| col.cards.iter())
            .find(|card| &card.id == id)
    }

    pub fn card_mut(&mut self, id: &CardId) -> Option<&mut Card> {
        self.columns
            .iter_mut()
            .flat_map(|col| col.cards.iter_mut())
            .find(|card| &card.id == id)
    }

    pub fn card_count(&self) -> usize {
        self.columns.iter().map(|col| col.cards.len()).sum()
    }

    /// All card ids, column by column in board order
    pub fn card_ids(&self) -> Vec<CardId> {
        self.columns
            .iter()
            .flat_map(|col| col.cards.iter().map(|card| card.id.clone()))
            .collect()
    }

    /// Moves a card to `to_index` of `to_column`.
    ///
    /// `to_index` addresses the destination list with the card already
    /// removed and is clamped to an append. Returns `None` when the card
    /// would end up where it already is.
    pub fn apply_card_move(
        &mut self,
        card_id: &CardId,
        to_column: &ColumnId,
        to_index: usize,
    ) -> Result<Option<AppliedMove>> {
        let location = self
            .locate_card(card_id)
            .ok_or_else(|| DndError::CardNotFound(card_id.to_string()))?;
        let destination_index = self
            .column_index(to_column)
            .ok_or_else(|| DndError::ColumnNotFound(to_column.to_string()))?;

        if location.column_index == destination_index {
            let column = &mut self.columns[destination_index];
            let clamped = clamp_index(to_index, column.cards.len() - 1);
            if clamped == location.index {
                return Ok(None);
            }

            let cards = std::mem::take(&mut column.cards);
            column.cards = reorder_within_list(cards, location.index, clamped)?;
            column.renumber();

            return Ok(Some(AppliedMove {
                new_parent: None,
                siblings: column.sibling_positions(),
            }));
        }

        let source_cards = std::mem::take(&mut self.columns[location.column_index].cards);
        let destination_cards = std::mem::take(&mut self.columns[destination_index].cards);
        let (source_cards, mut destination_cards) =
            move_across_lists(source_cards, destination_cards, location.index, to_index)?;

        for card in destination_cards.iter_mut() {
            if &card.id == card_id {
                card.column_id = to_column.clone();
            }
        }

        self.columns[location.column_index].cards = source_cards;
        self.columns[destination_index].cards = destination_cards;
        self.columns[location.column_index].renumber();
        self.columns[destination_index].renumber();

        let mut siblings = self.columns[location.column_index].sibling_positions();
        siblings.extend(self.columns[destination_index].sibling_positions());

        Ok(Some(AppliedMove {
            new_parent: Some(to_column.clone()),
            siblings,
        }))
    }

    /// Moves a column to `to_index` in the column order.
    ///
    /// Returns `None` when the column is already there.
    pub fn apply_column_move(&mut self, column_id: &ColumnId, to_index: usize) -> Result<Option<AppliedMove>> {
        let current = self
            .column_index(column_id)
            .ok_or_else(|| DndError::ColumnNotFound(column_id.to_string()))?;
        let clamped = clamp_index(to_index, self.columns.len() - 1);
        if clamped == current {
            return Ok(None);
        }

        let columns = std::mem::take(&mut self.columns);
        self.columns = reorder_within_list(columns, current, clamped)?;
        for (index, column) in self.columns.iter_mut().enumerate() {
            column.position = index as i64;
        }

        Ok(Some(AppliedMove {
            new_parent: None,
            siblings: dense_positions(self.columns.iter().map(|col| col.id.as_str())),
        }))
    }

    /// Checks the ordering invariants: unique, increasing positions in every
    /// list, cards point at their owning column, no card appears twice.
    pub fn validate(&self) -> Result<()> {
        let column_positions: Vec<i64> = self.columns.iter().map(|c| c.position).collect();
        if !is_strictly_ordered(&column_positions) {
            return Err(DndError::InvariantViolation(format!(
                "column positions out of order: {column_positions:?}"
            )));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            let positions: Vec<i64> = column.cards.iter().map(|c| c.position).collect();
            if !is_strictly_ordered(&positions) {
                return Err(DndError::InvariantViolation(format!(
                    "card positions in column {} out of order: {positions:?}",
                    column.id
                )));
            }
            for card in &column.cards {
                if card.column_id != column.id {
                    return Err(DndError::InvariantViolation(format!(
                        "card {} sits in column {} but references {}",
                        card.id, column.id, card.column_id
                    )));
                }
                if !seen.insert(card.id.clone()) {
                    return Err(DndError::InvariantViolation(format!(
                        "card {} appears more than once",
                        card.id
                    )));
                }
            }
        }

        Ok(())
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new("Default Board")
    }
}
