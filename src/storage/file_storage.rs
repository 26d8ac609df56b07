use crate::{
    domain::{Board, CardId, ColumnId, EntityKind, ListKey, ListVersion, MutationAck, PendingMutation},
    error::{DndError, MutationRejection, Result},
    storage::{MutationService, Storage},
};
use async_trait::async_trait;
use chrono::Utc;
use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};
use tokio::{fs, sync::Mutex};
use tracing::{debug, warn};

type Applied = std::result::Result<MutationAck, MutationRejection>;

/// File-based storage implementation.
///
/// Keeps the whole board in one JSON document and doubles as a reference
/// [`MutationService`] that validates moves the way a real backend would.
pub struct FileStorage {
    root_path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    const DATA_DIR: &'static str = ".kanban";
    const BOARD_FILE: &'static str = "board.json";

    /// Creates a new FileStorage instance for the given project root
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            root_path: project_root.as_ref().join(Self::DATA_DIR),
            write_lock: Mutex::new(()),
        }
    }

    fn board_file(&self) -> PathBuf {
        self.root_path.join(Self::BOARD_FILE)
    }

    async fn ensure_directory_exists(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).await?;
        }
        Ok(())
    }

    async fn apply_locked(&self, mutation: &PendingMutation) -> Applied {
        let _guard = self.write_lock.lock().await;

        let mut board = self.load_board().await.map_err(transport)?;
        let ack = match mutation.entity_kind {
            EntityKind::Card => apply_card(&mut board, mutation)?,
            EntityKind::Column => apply_column(&mut board, mutation)?,
        };
        self.save_board(&board).await.map_err(transport)?;

        debug!(
            mutation = %mutation.id,
            entity = %mutation.entity_id,
            version = ack.version,
            "mutation persisted"
        );
        Ok(ack)
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn initialize(&self) -> Result<()> {
        self.ensure_directory_exists(&self.root_path).await?;

        if !self.board_file().exists() {
            let board = Board::default();
            self.save_board(&board).await?;
        }

        Ok(())
    }

    async fn save_board(&self, board: &Board) -> Result<()> {
        self.ensure_directory_exists(&self.root_path).await?;

        let json = serde_json::to_string_pretty(board)?;
        fs::write(self.board_file(), json).await?;

        Ok(())
    }

    async fn load_board(&self) -> Result<Board> {
        let board_file = self.board_file();

        if !board_file.exists() {
            return Err(DndError::BoardNotInitialized);
        }

        let contents = fs::read_to_string(&board_file).await?;
        let board: Board = serde_json::from_str(&contents)?;

        Ok(board)
    }

    async fn is_initialized(&self) -> bool {
        self.root_path.exists() && self.board_file().exists()
    }
}

#[async_trait]
impl MutationService for FileStorage {
    async fn apply(&self, mutation: &PendingMutation) -> Applied {
        let result = self.apply_locked(mutation).await;
        if let Err(rejection) = &result {
            warn!(mutation = %mutation.id, error = %rejection, "mutation refused");
        }
        result
    }
}

fn transport(err: DndError) -> MutationRejection {
    MutationRejection::Transport(err.to_string())
}

fn check_version(entity: String, expected: Option<u64>, actual: u64) -> std::result::Result<(), MutationRejection> {
    match expected {
        Some(expected) if expected != actual => Err(MutationRejection::Conflict {
            entity,
            expected,
            actual,
        }),
        _ => Ok(()),
    }
}

/// Refuses a mutation computed against an order the store has since replaced
fn check_list_versions(board: &Board, mutation: &PendingMutation) -> std::result::Result<(), MutationRejection> {
    for expected in &mutation.expected_list_versions {
        let actual = board
            .list_version(&expected.list)
            .ok_or_else(|| MutationRejection::NotFound(expected.list.to_string()))?;
        check_version(expected.list.to_string(), Some(expected.version), actual)?;
    }
    Ok(())
}

fn bump_lists(board: &mut Board, lists: &[ListKey]) -> Vec<ListVersion> {
    lists
        .iter()
        .filter_map(|list| {
            let version = board.list_version(list)? + 1;
            board.set_list_version(list, version);
            Some(ListVersion {
                list: list.clone(),
                version,
            })
        })
        .collect()
}

/// Positions keyed by id, provided the mutation names exactly `members`
fn sibling_map(
    mutation: &PendingMutation,
    members: &HashSet<String>,
) -> std::result::Result<HashMap<String, i64>, MutationRejection> {
    let mut positions = HashMap::with_capacity(mutation.affected_sibling_positions.len());
    for sibling in &mutation.affected_sibling_positions {
        if positions.insert(sibling.id.clone(), sibling.position).is_some() {
            return Err(MutationRejection::Validation(format!(
                "{} is listed more than once",
                sibling.id
            )));
        }
    }

    let named: HashSet<String> = positions.keys().cloned().collect();
    if &named != members {
        return Err(MutationRejection::Validation(
            "sibling list does not match the stored membership".to_string(),
        ));
    }
    Ok(positions)
}

fn ensure_unique<'a>(list: &str, positions: impl Iterator<Item = &'a i64>) -> std::result::Result<(), MutationRejection> {
    let mut seen = HashSet::new();
    for position in positions {
        if !seen.insert(*position) {
            return Err(MutationRejection::Validation(format!(
                "duplicate position {position} in {list}"
            )));
        }
    }
    Ok(())
}

fn apply_card(board: &mut Board, mutation: &PendingMutation) -> Applied {
    let card_id: CardId = mutation
        .entity_id
        .parse()
        .map_err(|_| MutationRejection::Validation(format!("invalid card id {}", mutation.entity_id)))?;
    let label = format!("card {card_id}");

    let location = board
        .locate_card(&card_id)
        .ok_or_else(|| MutationRejection::NotFound(label.clone()))?;
    let source = location.column_id;
    let current_version = board.columns[location.column_index].cards[location.index].version;
    check_version(label.clone(), mutation.expected_version, current_version)?;
    check_list_versions(board, mutation)?;

    let destination = mutation.new_parent_id.clone().unwrap_or_else(|| source.clone());
    let dest_column = board
        .column(&destination)
        .ok_or_else(|| MutationRejection::NotFound(format!("column {destination}")))?;
    if destination != source && !dest_column.enabled {
        return Err(MutationRejection::Validation(format!(
            "column {destination} does not accept cards"
        )));
    }

    let mut lists: Vec<(ColumnId, Vec<String>)> = Vec::new();
    let source_members: Vec<String> = board.columns[location.column_index]
        .cards
        .iter()
        .filter(|c| destination == source || c.id != card_id)
        .map(|c| c.id.to_string())
        .collect();
    lists.push((source.clone(), source_members));
    if destination != source {
        let mut dest_members: Vec<String> = dest_column.cards.iter().map(|c| c.id.to_string()).collect();
        dest_members.push(card_id.to_string());
        lists.push((destination.clone(), dest_members));
    }

    let members: HashSet<String> = lists.iter().flat_map(|(_, ids)| ids.iter().cloned()).collect();
    let positions = sibling_map(mutation, &members)?;
    for (column_id, ids) in &lists {
        ensure_unique(column_id.as_str(), ids.iter().filter_map(|id| positions.get(id)))?;
    }

    // Validated; nothing below can fail.
    let now = Utc::now();
    let mut moving = None;
    if destination != source {
        let column = &mut board.columns[location.column_index];
        let mut card = column.cards.remove(location.index);
        card.column_id = destination.clone();
        moving = Some(card);
    }

    for (column_id, _) in &lists {
        let Some(column) = board.column_mut(column_id) else {
            continue;
        };
        if column_id == &destination {
            if let Some(card) = moving.take() {
                column.cards.push(card);
            }
        }
        for card in column.cards.iter_mut() {
            if let Some(position) = positions.get(card.id.as_str()) {
                card.position = *position;
            }
            if card.id == card_id {
                card.version += 1;
                card.updated_at = now;
            }
        }
        column.cards.sort_by_key(|c| c.position);
    }

    let keys: Vec<ListKey> = lists
        .iter()
        .map(|(column_id, _)| ListKey::Cards(column_id.clone()))
        .collect();
    let list_versions = bump_lists(board, &keys);

    let version = board
        .card(&card_id)
        .map(|c| c.version)
        .ok_or_else(|| MutationRejection::NotFound(label))?;
    Ok(MutationAck {
        version,
        list_versions,
    })
}

fn apply_column(board: &mut Board, mutation: &PendingMutation) -> Applied {
    let column_id: ColumnId = mutation
        .entity_id
        .parse()
        .map_err(|_| MutationRejection::Validation(format!("invalid column id {}", mutation.entity_id)))?;
    let label = format!("column {column_id}");

    let current_version = board
        .column(&column_id)
        .map(|c| c.version)
        .ok_or_else(|| MutationRejection::NotFound(label.clone()))?;
    check_version(label.clone(), mutation.expected_version, current_version)?;
    check_list_versions(board, mutation)?;

    if mutation.new_parent_id.is_some() {
        return Err(MutationRejection::Validation(
            "columns have no parent".to_string(),
        ));
    }

    let members: HashSet<String> = board.columns.iter().map(|c| c.id.to_string()).collect();
    let positions = sibling_map(mutation, &members)?;
    ensure_unique("columns", positions.values())?;

    let now = Utc::now();
    for column in board.columns.iter_mut() {
        if let Some(position) = positions.get(column.id.as_str()) {
            column.position = *position;
        }
        if column.id == column_id {
            column.version += 1;
            column.updated_at = now;
        }
    }
    board.columns.sort_by_key(|c| c.position);
    let list_versions = bump_lists(board, &[ListKey::Columns]);

    let version = board
        .column(&column_id)
        .map(|c| c.version)
        .ok_or_else(|| MutationRejection::NotFound(label))?;
    Ok(MutationAck {
        version,
        list_versions,
    })
}
