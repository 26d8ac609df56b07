use crate::domain::board::{CardId, ColumnId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which kind of entity a drag or mutation concerns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Card,
    Column,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Card => write!(f, "card"),
            Self::Column => write!(f, "column"),
        }
    }
}

/// One ordered list on the board: the column order, or one column's cards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "columnId", rename_all = "camelCase")]
pub enum ListKey {
    Columns,
    Cards(ColumnId),
}

impl fmt::Display for ListKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Columns => write!(f, "column order"),
            Self::Cards(column_id) => write!(f, "cards of column {column_id}"),
        }
    }
}

/// Version of one ordered list, as last acknowledged by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListVersion {
    pub list: ListKey,
    pub version: u64,
}

/// Resolved outcome of a drop, before the order model runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MoveIntent {
    Card {
        card_id: CardId,
        to_column: ColumnId,
        to_index: usize,
    },
    Column {
        column_id: ColumnId,
        to_index: usize,
    },
}

impl MoveIntent {
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            Self::Card { .. } => EntityKind::Card,
            Self::Column { .. } => EntityKind::Column,
        }
    }
}

/// New position of one sibling in an affected list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiblingPosition {
    pub id: String,
    pub position: i64,
}

/// Client-local sequence number of a pending mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MutationId(pub u64);

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// "Move entity E to these positions, optionally under a new parent."
///
/// `affected_sibling_positions` carries every sibling of every list the move
/// touched, moved entity included, so the receiver can apply the change
/// atomically. `expected_list_versions` names the order each list had when the
/// positions were computed; a store holding a newer order refuses the move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingMutation {
    pub id: MutationId,
    pub entity_kind: EntityKind,
    pub entity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_parent_id: Option<ColumnId>,
    pub affected_sibling_positions: Vec<SiblingPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expected_list_versions: Vec<ListVersion>,
}

impl PendingMutation {
    pub fn position_of(&self, id: &str) -> Option<i64> {
        self.affected_sibling_positions
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.position)
    }
}

/// Successful acknowledgement from the persistence service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationAck {
    /// Version of the moved entity after the mutation was applied
    pub version: u64,
    /// New version of every list the mutation reordered
    #[serde(default)]
    pub list_versions: Vec<ListVersion>,
}

impl MutationAck {
    pub fn new(version: u64) -> Self {
        Self {
            version,
            list_versions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_mutation_wire_shape() {
        let mutation = PendingMutation {
            id: MutationId(3),
            entity_kind: EntityKind::Card,
            entity_id: "a".to_string(),
            new_parent_id: None,
            affected_sibling_positions: vec![SiblingPosition {
                id: "a".to_string(),
                position: 0,
            }],
            expected_version: Some(2),
            expected_list_versions: vec![ListVersion {
                list: ListKey::Cards("todo".parse().unwrap()),
                version: 5,
            }],
        };

        let json = serde_json::to_string(&mutation).unwrap();
        assert!(json.contains("\"entityKind\":\"card\""));
        assert!(json.contains("\"affectedSiblingPositions\""));
        assert!(json.contains("\"expectedVersion\":2"));
        assert!(!json.contains("newParentId"));
        assert!(json.contains(
            r#""expectedListVersions":[{"list":{"kind":"cards","columnId":"todo"},"version":5}]"#
        ));
        assert_eq!(mutation.position_of("a"), Some(0));
        assert_eq!(mutation.position_of("b"), None);

        let back: PendingMutation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mutation);
    }

    #[test]
    fn test_column_order_list_version_shape() {
        let version = ListVersion {
            list: ListKey::Columns,
            version: 1,
        };
        let json = serde_json::to_string(&version).unwrap();
        assert_eq!(json, r#"{"list":{"kind":"columns"},"version":1}"#);
        assert_eq!(serde_json::from_str::<ListVersion>(&json).unwrap(), version);
    }
}
