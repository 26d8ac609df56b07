//! Optimistic application of moves and reconciliation with the persistence
//! service.
//!
//! Every staged move is applied to the local board at once, snapshotted per
//! affected list, and queued. A mutation is dispatched only when it is first
//! in line for every list it touches, so at most one mutation per list is in
//! flight. When a mutation is rejected, it and every later mutation sharing a
//! list with it (transitively) are rolled back newest-first from their own
//! snapshots. Those followers were never dispatched, so nothing on the server
//! needs undoing.

use crate::domain::{
    Board, Card, ColumnId, EntityKind, ListKey, ListVersion, MoveIntent, MutationAck, MutationId,
    PendingMutation,
};
use crate::error::{DndError, MutationRejection, Result};
use crate::storage::MutationService;
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, warn};

/// Pre-commit copy of one list
#[derive(Debug, Clone, PartialEq)]
enum ListSnapshot {
    Columns(Vec<(ColumnId, i64)>),
    Cards { column_id: ColumnId, cards: Vec<Card> },
}

impl ListSnapshot {
    fn capture(board: &Board, key: &ListKey) -> Result<Self> {
        match key {
            ListKey::Columns => Ok(Self::Columns(
                board
                    .columns
                    .iter()
                    .map(|col| (col.id.clone(), col.position))
                    .collect(),
            )),
            ListKey::Cards(column_id) => {
                let column = board
                    .column(column_id)
                    .ok_or_else(|| DndError::ColumnNotFound(column_id.to_string()))?;
                Ok(Self::Cards {
                    column_id: column_id.clone(),
                    cards: column.cards.clone(),
                })
            }
        }
    }

    fn restore(self, board: &mut Board) {
        match self {
            Self::Columns(order) => {
                let mut remaining = std::mem::take(&mut board.columns);
                let mut restored = Vec::with_capacity(remaining.len());
                for (id, position) in order {
                    if let Some(index) = remaining.iter().position(|col| col.id == id) {
                        let mut column = remaining.remove(index);
                        column.position = position;
                        restored.push(column);
                    }
                }
                restored.extend(remaining);
                board.columns = restored;
            }
            Self::Cards { column_id, cards } => match board.column_mut(&column_id) {
                Some(column) => column.cards = cards,
                None => warn!(column = %column_id, "column vanished before rollback"),
            },
        }
    }

    /// Keeps an acknowledged version so a later rollback does not revert it
    fn record_version(&mut self, card_id: &str, version: u64) {
        if let Self::Cards { cards, .. } = self {
            for card in cards.iter_mut().filter(|c| c.id.as_str() == card_id) {
                card.version = version;
            }
        }
    }
}

#[derive(Debug)]
struct InFlight {
    mutation: PendingMutation,
    lists: Vec<ListKey>,
    snapshots: Vec<ListSnapshot>,
    dispatched: bool,
}

impl InFlight {
    fn shares_list(&self, lists: &HashSet<ListKey>) -> bool {
        self.lists.iter().any(|key| lists.contains(key))
    }
}

/// How a dispatched mutation was reconciled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Confirmed {
        id: MutationId,
        version: u64,
    },
    RolledBack {
        id: MutationId,
        rejection: MutationRejection,
        /// Queued followers rolled back with it
        dropped: Vec<MutationId>,
        notice: String,
    },
}

impl Settlement {
    pub fn id(&self) -> MutationId {
        match self {
            Self::Confirmed { id, .. } | Self::RolledBack { id, .. } => *id,
        }
    }

    fn covers(&self, target: MutationId) -> bool {
        match self {
            Self::Confirmed { id, .. } => *id == target,
            Self::RolledBack { id, dropped, .. } => *id == target || dropped.contains(&target),
        }
    }
}

/// Result of driving a single move through [`Reconciler::commit`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The move left everything in place; nothing was dispatched
    NoOp,
    Confirmed { id: MutationId, version: u64 },
    /// Applied locally but still waiting behind a mutation the caller dispatched
    Queued(MutationId),
}

/// Owns the board and every unresolved mutation.
#[derive(Debug)]
pub struct Reconciler {
    board: Board,
    queue: VecDeque<InFlight>,
    next_id: u64,
    notices: Vec<String>,
}

impl Reconciler {
    pub fn new(board: Board) -> Self {
        Self {
            board,
            queue: VecDeque::new(),
            next_id: 1,
            notices: Vec::new(),
        }
    }

    /// The local board, optimistic updates included
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Unresolved mutations, dispatched or queued
    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_pending(&self, id: MutationId) -> bool {
        self.queue.iter().any(|entry| entry.mutation.id == id)
    }

    /// User-facing failure notices since the last call
    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    /// Applies `intent` to the local board and queues its mutation.
    ///
    /// Returns `None` when the move would change nothing.
    pub fn stage(&mut self, intent: MoveIntent) -> Result<Option<MutationId>> {
        let lists = self.affected_lists(&intent)?;
        let snapshots = lists
            .iter()
            .map(|key| ListSnapshot::capture(&self.board, key))
            .collect::<Result<Vec<_>>>()?;

        let (entity_id, applied) = match &intent {
            MoveIntent::Card {
                card_id,
                to_column,
                to_index,
            } => (
                card_id.to_string(),
                self.board.apply_card_move(card_id, to_column, *to_index)?,
            ),
            MoveIntent::Column { column_id, to_index } => (
                column_id.to_string(),
                self.board.apply_column_move(column_id, *to_index)?,
            ),
        };

        let Some(applied) = applied else {
            debug!(intent = ?intent, "move is a no-op");
            return Ok(None);
        };

        let id = MutationId(self.next_id);
        self.next_id += 1;

        let mutation = PendingMutation {
            id,
            entity_kind: intent.entity_kind(),
            entity_id,
            new_parent_id: applied.new_parent,
            affected_sibling_positions: applied.siblings,
            expected_version: None,
            expected_list_versions: Vec::new(),
        };
        info!(
            mutation = %id,
            kind = %mutation.entity_kind,
            entity = %mutation.entity_id,
            siblings = mutation.affected_sibling_positions.len(),
            "staged optimistic move"
        );

        self.queue.push_back(InFlight {
            mutation,
            lists,
            snapshots,
            dispatched: false,
        });
        Ok(Some(id))
    }

    /// Mutations that may be sent now. Each is marked dispatched and stamped
    /// with the last acknowledged versions of the moved entity and of every
    /// list it reorders.
    pub fn ready(&mut self) -> Vec<PendingMutation> {
        let mut claimed: HashSet<ListKey> = HashSet::new();
        let mut ready = Vec::new();

        for entry in self.queue.iter_mut() {
            if !entry.dispatched && !entry.shares_list(&claimed) {
                entry.dispatched = true;
                entry.mutation.expected_version = entity_version(&self.board, &entry.mutation);
                entry.mutation.expected_list_versions = entry
                    .lists
                    .iter()
                    .filter_map(|list| {
                        self.board.list_version(list).map(|version| ListVersion {
                            list: list.clone(),
                            version,
                        })
                    })
                    .collect();
                debug!(mutation = %entry.mutation.id, "dispatching");
                ready.push(entry.mutation.clone());
            }
            claimed.extend(entry.lists.iter().cloned());
        }

        ready
    }

    /// Reconciles the service's answer for a dispatched mutation.
    pub fn settle(
        &mut self,
        id: MutationId,
        outcome: std::result::Result<MutationAck, MutationRejection>,
    ) -> Result<Settlement> {
        let position = self
            .queue
            .iter()
            .position(|entry| entry.mutation.id == id)
            .ok_or(DndError::MutationNotFound(id.0))?;
        if !self.queue[position].dispatched {
            return Err(DndError::MutationNotDispatched(id.0));
        }

        match outcome {
            Ok(ack) => {
                let entry = self
                    .queue
                    .remove(position)
                    .ok_or(DndError::MutationNotFound(id.0))?;
                Ok(self.confirm(entry, ack))
            }
            Err(rejection) => Ok(self.roll_back(position, rejection)),
        }
    }

    /// Stages `intent` and drives dispatch until it settles.
    ///
    /// Every mutation dispatched along the way is settled before returning,
    /// including unrelated ones that shared a batch with `intent`. A rejection
    /// is returned as `Err(DndError::Rejected)` after the board has been
    /// rolled back.
    pub async fn commit<S>(&mut self, service: &S, intent: MoveIntent) -> Result<CommitOutcome>
    where
        S: MutationService + ?Sized,
    {
        let Some(id) = self.stage(intent)? else {
            return Ok(CommitOutcome::NoOp);
        };

        loop {
            let batch = self.ready();
            if batch.is_empty() {
                return Ok(CommitOutcome::Queued(id));
            }

            let mut own = None;
            for mutation in batch {
                let outcome = service.apply(&mutation).await;
                let settlement = self.settle(mutation.id, outcome)?;
                if own.is_none() && settlement.covers(id) {
                    own = Some(settlement);
                }
            }

            match own {
                Some(Settlement::Confirmed { id, version }) => {
                    return Ok(CommitOutcome::Confirmed { id, version })
                }
                Some(Settlement::RolledBack { rejection, .. }) => {
                    return Err(DndError::Rejected(rejection))
                }
                None => {}
            }
        }
    }

    /// Dispatches and settles until nothing dispatchable remains.
    pub async fn flush<S>(&mut self, service: &S) -> Result<Vec<Settlement>>
    where
        S: MutationService + ?Sized,
    {
        let mut settlements = Vec::new();
        loop {
            let batch = self.ready();
            if batch.is_empty() {
                return Ok(settlements);
            }
            for mutation in batch {
                let outcome = service.apply(&mutation).await;
                settlements.push(self.settle(mutation.id, outcome)?);
            }
        }
    }

    fn affected_lists(&self, intent: &MoveIntent) -> Result<Vec<ListKey>> {
        match intent {
            MoveIntent::Card {
                card_id, to_column, ..
            } => {
                let location = self
                    .board
                    .locate_card(card_id)
                    .ok_or_else(|| DndError::CardNotFound(card_id.to_string()))?;
                let mut lists = vec![ListKey::Cards(location.column_id.clone())];
                if &location.column_id != to_column {
                    lists.push(ListKey::Cards(to_column.clone()));
                }
                Ok(lists)
            }
            MoveIntent::Column { .. } => Ok(vec![ListKey::Columns]),
        }
    }

    fn confirm(&mut self, entry: InFlight, ack: MutationAck) -> Settlement {
        let mutation = entry.mutation;
        for list_version in &ack.list_versions {
            self.board.set_list_version(&list_version.list, list_version.version);
        }

        match mutation.entity_kind {
            EntityKind::Card => {
                if let Some(card) = self
                    .board
                    .columns
                    .iter_mut()
                    .flat_map(|col| col.cards.iter_mut())
                    .find(|card| card.id.as_str() == mutation.entity_id)
                {
                    card.version = ack.version;
                }
                for later in self.queue.iter_mut() {
                    for snapshot in later.snapshots.iter_mut() {
                        snapshot.record_version(&mutation.entity_id, ack.version);
                    }
                }
            }
            EntityKind::Column => {
                if let Some(column) = self
                    .board
                    .columns
                    .iter_mut()
                    .find(|col| col.id.as_str() == mutation.entity_id)
                {
                    column.version = ack.version;
                }
            }
        }

        info!(mutation = %mutation.id, version = ack.version, "mutation confirmed");
        Settlement::Confirmed {
            id: mutation.id,
            version: ack.version,
        }
    }

    fn roll_back(&mut self, position: usize, rejection: MutationRejection) -> Settlement {
        let id = self.queue[position].mutation.id;
        let mut touched: HashSet<ListKey> = self.queue[position].lists.iter().cloned().collect();
        let mut chain = vec![position];
        for index in position + 1..self.queue.len() {
            if self.queue[index].shares_list(&touched) {
                touched.extend(self.queue[index].lists.iter().cloned());
                chain.push(index);
            }
        }

        let mut removed = Vec::with_capacity(chain.len());
        for index in chain.into_iter().rev() {
            if let Some(entry) = self.queue.remove(index) {
                for snapshot in entry.snapshots.into_iter().rev() {
                    snapshot.restore(&mut self.board);
                }
                removed.push(entry.mutation.id);
            }
        }
        removed.reverse();
        let dropped: Vec<MutationId> = removed.into_iter().filter(|m| *m != id).collect();

        warn!(
            mutation = %id,
            dropped = dropped.len(),
            error = %rejection,
            "mutation rejected, local board rolled back"
        );

        let notice = rejection.user_message();
        self.notices.push(notice.clone());
        Settlement::RolledBack {
            id,
            rejection,
            dropped,
            notice,
        }
    }
}

fn entity_version(board: &Board, mutation: &PendingMutation) -> Option<u64> {
    match mutation.entity_kind {
        EntityKind::Card => board
            .columns
            .iter()
            .flat_map(|col| col.cards.iter())
            .find(|card| card.id.as_str() == mutation.entity_id)
            .map(|card| card.version),
        EntityKind::Column => board
            .columns
            .iter()
            .find(|col| col.id.as_str() == mutation.entity_id)
            .map(|col| col.version),
    }
}
