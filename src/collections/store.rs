use std::fmt;

use tokio::sync::watch;

use crate::catalog::MovieId;
use crate::identity::Identity;
use crate::storage::{decode_id_list, Database, DatabaseError};

// ============================================================================
// Collection Kind
// ============================================================================

/// The three per-user movie collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Favorites,
    Watchlist,
    NotInterested,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 3] = [
        CollectionKind::Favorites,
        CollectionKind::Watchlist,
        CollectionKind::NotInterested,
    ];

    /// Prefix of the identity-scoped storage key.
    pub fn key_prefix(self) -> &'static str {
        match self {
            CollectionKind::Favorites => "favorites",
            CollectionKind::Watchlist => "watchlist",
            CollectionKind::NotInterested => "uninterested",
        }
    }

    /// Storage key for this collection under `identity`.
    pub fn storage_key(self, identity: &Identity) -> String {
        format!("{}_{}", self.key_prefix(), identity)
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CollectionKind::Favorites => "favorites",
            CollectionKind::Watchlist => "watchlist",
            CollectionKind::NotInterested => "not interested",
        };
        f.write_str(label)
    }
}

// ============================================================================
// Tagged Collection
// ============================================================================

/// Lifecycle of a collection relative to the identity it is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionState {
    /// No identity transition observed yet.
    Uninitialized,
    /// Identity is absent; contents are memory-only.
    Empty,
    /// Loaded for an identity; every mutation is persisted.
    Loaded(Identity),
}

/// An ordered set of movie ids scoped to one identity.
///
/// Insertion order is preserved for display and ids are unique. While an
/// identity is loaded, each mutation writes the whole collection under the
/// identity-scoped key before the in-memory copy changes.
pub struct TaggedCollection {
    kind: CollectionKind,
    db: Database,
    state: CollectionState,
    ids: Vec<MovieId>,
    changes: watch::Sender<Vec<MovieId>>,
}

impl TaggedCollection {
    pub fn new(kind: CollectionKind, db: Database) -> Self {
        let (changes, _) = watch::channel(Vec::new());
        Self {
            kind,
            db,
            state: CollectionState::Uninitialized,
            ids: Vec::new(),
            changes,
        }
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    pub fn state(&self) -> &CollectionState {
        &self.state
    }

    /// React to an identity transition.
    ///
    /// In-memory contents are always discarded; they were already persisted
    /// incrementally, or belonged to an anonymous session. A failed read
    /// leaves the collection as it was.
    pub async fn switch_identity(
        &mut self,
        identity: Option<&Identity>,
    ) -> Result<(), DatabaseError> {
        let ids = match identity {
            Some(identity) => self.read_for(identity).await?,
            None => Vec::new(),
        };
        self.install(identity, ids);
        Ok(())
    }

    /// Read the persisted ids for `identity` without changing this collection.
    pub(crate) async fn read_for(&self, identity: &Identity) -> Result<Vec<MovieId>, DatabaseError> {
        let key = self.kind.storage_key(identity);
        let Some(raw) = self.db.get_value(&key).await? else {
            return Ok(Vec::new());
        };

        let decoded = decode_id_list(&raw);
        if decoded.unreadable {
            tracing::warn!(
                key = %key,
                "PersistenceCorruption: stored collection is not an array, loading empty"
            );
        } else if decoded.dropped > 0 {
            tracing::warn!(
                key = %key,
                dropped = decoded.dropped,
                "PersistenceCorruption: dropped entries that are not movie ids"
            );
        }
        Ok(decoded.ids)
    }

    /// Replace the contents with `ids` already read for `identity`.
    pub(crate) fn install(&mut self, identity: Option<&Identity>, ids: Vec<MovieId>) {
        self.ids = ids;
        self.state = match identity {
            Some(identity) => {
                tracing::debug!(
                    collection = %self.kind,
                    identity = %identity,
                    count = self.ids.len(),
                    "Collection loaded"
                );
                CollectionState::Loaded(identity.clone())
            }
            None => CollectionState::Empty,
        };
        self.notify();
    }

    /// Append `id` if absent. Returns true if the collection changed.
    pub async fn add(&mut self, id: MovieId) -> Result<bool, DatabaseError> {
        if self.contains(id) {
            return Ok(false);
        }

        let mut next = self.ids.clone();
        next.push(id);
        self.commit(next).await?;
        Ok(true)
    }

    /// Remove `id` if present. Returns true if the collection changed.
    pub async fn remove(&mut self, id: MovieId) -> Result<bool, DatabaseError> {
        if !self.contains(id) {
            return Ok(false);
        }

        let next: Vec<MovieId> = self.ids.iter().copied().filter(|&m| m != id).collect();
        self.commit(next).await?;
        Ok(true)
    }

    pub fn contains(&self, id: MovieId) -> bool {
        self.ids.contains(&id)
    }

    /// Ids in insertion order.
    pub fn all(&self) -> &[MovieId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Receive a snapshot after every change.
    pub fn subscribe(&self) -> watch::Receiver<Vec<MovieId>> {
        self.changes.subscribe()
    }

    async fn commit(&mut self, next: Vec<MovieId>) -> Result<(), DatabaseError> {
        if let CollectionState::Loaded(identity) = &self.state {
            let key = self.kind.storage_key(identity);
            self.db.set_json(&key, &next).await?;
        }
        self.ids = next;
        self.notify();
        Ok(())
    }

    fn notify(&self) {
        self.changes.send_replace(self.ids.clone());
    }
}
