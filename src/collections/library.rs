use std::collections::HashSet;

use crate::catalog::MovieId;
use crate::identity::Identity;
use crate::storage::{Database, DatabaseError};

use super::store::{CollectionKind, TaggedCollection};

/// Persisted contents of all three collections for one identity.
#[derive(Debug, Default)]
pub(crate) struct LoadedCollections {
    favorites: Vec<MovieId>,
    watchlist: Vec<MovieId>,
    not_interested: Vec<MovieId>,
}

/// The three collections of one user, with their cross-collection rules.
///
/// Flagging a movie as not interested evicts it from favorites and the
/// watchlist. The reverse is not enforced: adding a favorite leaves the
/// not-interested flag alone until it is removed explicitly.
pub struct Library {
    favorites: TaggedCollection,
    watchlist: TaggedCollection,
    not_interested: TaggedCollection,
}

impl Library {
    pub fn new(db: Database) -> Self {
        Self {
            favorites: TaggedCollection::new(CollectionKind::Favorites, db.clone()),
            watchlist: TaggedCollection::new(CollectionKind::Watchlist, db.clone()),
            not_interested: TaggedCollection::new(CollectionKind::NotInterested, db),
        }
    }

    pub fn get(&self, kind: CollectionKind) -> &TaggedCollection {
        match kind {
            CollectionKind::Favorites => &self.favorites,
            CollectionKind::Watchlist => &self.watchlist,
            CollectionKind::NotInterested => &self.not_interested,
        }
    }

    fn get_mut(&mut self, kind: CollectionKind) -> &mut TaggedCollection {
        match kind {
            CollectionKind::Favorites => &mut self.favorites,
            CollectionKind::Watchlist => &mut self.watchlist,
            CollectionKind::NotInterested => &mut self.not_interested,
        }
    }

    pub fn favorites(&self) -> &TaggedCollection {
        &self.favorites
    }

    pub fn watchlist(&self) -> &TaggedCollection {
        &self.watchlist
    }

    pub fn not_interested(&self) -> &TaggedCollection {
        &self.not_interested
    }

    /// Reload every collection for a new identity, or clear them all.
    ///
    /// All three are read before any is replaced, so a failed read leaves
    /// the library unchanged.
    pub async fn switch_identity(
        &mut self,
        identity: Option<&Identity>,
    ) -> Result<(), DatabaseError> {
        let loaded = match identity {
            Some(identity) => self.read_for(identity).await?,
            None => LoadedCollections::default(),
        };
        self.install(identity, loaded);
        Ok(())
    }

    /// Read all three persisted collections for `identity` without
    /// touching the in-memory state.
    pub(crate) async fn read_for(
        &self,
        identity: &Identity,
    ) -> Result<LoadedCollections, DatabaseError> {
        Ok(LoadedCollections {
            favorites: self.favorites.read_for(identity).await?,
            watchlist: self.watchlist.read_for(identity).await?,
            not_interested: self.not_interested.read_for(identity).await?,
        })
    }

    pub(crate) fn install(&mut self, identity: Option<&Identity>, loaded: LoadedCollections) {
        self.favorites.install(identity, loaded.favorites);
        self.watchlist.install(identity, loaded.watchlist);
        self.not_interested.install(identity, loaded.not_interested);
    }

    /// Add `id` to `kind`. Returns true if that collection changed.
    ///
    /// Adding to [`CollectionKind::NotInterested`] always evicts `id` from
    /// favorites and the watchlist, even when the flag was already set.
    /// Evictions are written first; the flag is only set once they succeed.
    pub async fn add(&mut self, kind: CollectionKind, id: MovieId) -> Result<bool, DatabaseError> {
        if kind == CollectionKind::NotInterested {
            let evicted_favorite = self.favorites.remove(id).await?;
            let evicted_watchlist = self.watchlist.remove(id).await?;
            if evicted_favorite || evicted_watchlist {
                tracing::debug!(
                    movie_id = id,
                    evicted_favorite,
                    evicted_watchlist,
                    "Evicted movie flagged as not interested"
                );
            }
        }

        self.get_mut(kind).add(id).await
    }

    /// Remove `id` from `kind`. Returns true if that collection changed.
    pub async fn remove(
        &mut self,
        kind: CollectionKind,
        id: MovieId,
    ) -> Result<bool, DatabaseError> {
        self.get_mut(kind).remove(id).await
    }

    pub fn contains(&self, kind: CollectionKind, id: MovieId) -> bool {
        self.get(kind).contains(id)
    }

    /// Snapshot of the not-interested ids, for exclusion at merge time.
    pub fn not_interested_set(&self) -> HashSet<MovieId> {
        self.not_interested.all().iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::CollectionState;
    use proptest::prelude::*;

    async fn signed_in_library() -> Library {
        signed_in_library_with_db().await.0
    }

    async fn signed_in_library_with_db() -> (Library, Database) {
        let db = Database::open(":memory:").await.unwrap();
        let mut library = Library::new(db.clone());
        let alice = Identity::parse("alice").unwrap();
        library.switch_identity(Some(&alice)).await.unwrap();
        (library, db)
    }

    #[tokio::test]
    async fn test_not_interested_evicts_from_favorites_and_watchlist() {
        let mut library = signed_in_library().await;
        library.add(CollectionKind::Favorites, 7).await.unwrap();
        library.add(CollectionKind::Watchlist, 7).await.unwrap();
        library.add(CollectionKind::Favorites, 8).await.unwrap();

        library.add(CollectionKind::NotInterested, 7).await.unwrap();

        assert!(!library.contains(CollectionKind::Favorites, 7));
        assert!(!library.contains(CollectionKind::Watchlist, 7));
        assert!(library.contains(CollectionKind::NotInterested, 7));
        assert!(library.contains(CollectionKind::Favorites, 8));
    }

    /// Make every write to keys starting with `prefix` fail.
    async fn reject_writes(db: &Database, prefix: &str) {
        for event in ["INSERT", "UPDATE"] {
            let sql = format!(
                "CREATE TRIGGER reject_{prefix}_{event} BEFORE {event} ON kv_store \
                 WHEN NEW.key LIKE '{prefix}_%' BEGIN SELECT RAISE(ABORT, 'disk full'); END"
            );
            sqlx::query(&sql).execute(&db.pool).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_failed_eviction_leaves_flag_unset() {
        let (mut library, db) = signed_in_library_with_db().await;
        library.add(CollectionKind::Favorites, 7).await.unwrap();
        reject_writes(&db, "favorites").await;

        let result = library.add(CollectionKind::NotInterested, 7).await;

        assert!(result.is_err());
        assert!(library.contains(CollectionKind::Favorites, 7));
        assert!(!library.contains(CollectionKind::NotInterested, 7));
        assert_eq!(db.get_value("uninterested_alice").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_switch_keeps_previous_collections() {
        let (mut library, db) = signed_in_library_with_db().await;
        library.add(CollectionKind::Watchlist, 9).await.unwrap();

        // A blob is not readable as text
        sqlx::query("INSERT INTO kv_store (key, value) VALUES ('watchlist_bob', x'FF')")
            .execute(&db.pool)
            .await
            .unwrap();

        let bob = Identity::parse("bob").unwrap();
        assert!(library.switch_identity(Some(&bob)).await.is_err());

        let alice = Identity::parse("alice").unwrap();
        for kind in CollectionKind::ALL {
            assert_eq!(library.get(kind).state(), &CollectionState::Loaded(alice.clone()));
        }
        assert_eq!(library.watchlist().all(), &[9]);
    }

    #[tokio::test]
    async fn test_favorite_does_not_clear_not_interested() {
        let mut library = signed_in_library().await;
        library.add(CollectionKind::NotInterested, 3).await.unwrap();

        assert!(library.add(CollectionKind::Favorites, 3).await.unwrap());
        assert!(library.contains(CollectionKind::Favorites, 3));
        assert!(library.contains(CollectionKind::NotInterested, 3));
    }

    #[tokio::test]
    async fn test_repeat_not_interested_still_evicts() {
        let mut library = signed_in_library().await;
        library.add(CollectionKind::NotInterested, 3).await.unwrap();
        library.add(CollectionKind::Favorites, 3).await.unwrap();

        let changed = library.add(CollectionKind::NotInterested, 3).await.unwrap();
        assert!(!changed);
        assert!(!library.contains(CollectionKind::Favorites, 3));
    }

    #[tokio::test]
    async fn test_not_interested_set_snapshot() {
        let mut library = signed_in_library().await;
        library.add(CollectionKind::NotInterested, 1).await.unwrap();
        library.add(CollectionKind::NotInterested, 2).await.unwrap();

        let set = library.not_interested_set();
        assert_eq!(set, HashSet::from([1, 2]));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(CollectionKind, MovieId),
        Remove(CollectionKind, MovieId),
    }

    fn kind_strategy() -> impl Strategy<Value = CollectionKind> {
        prop_oneof![
            Just(CollectionKind::Favorites),
            Just(CollectionKind::Watchlist),
            Just(CollectionKind::NotInterested),
        ]
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        (any::<bool>(), kind_strategy(), 0_i64..6).prop_map(|(add, kind, id)| {
            if add {
                Op::Add(kind, id)
            } else {
                Op::Remove(kind, id)
            }
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn prop_collections_match_ordered_set_model(ops in prop::collection::vec(op_strategy(), 0..30)) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                let mut library = signed_in_library().await;
                let mut model: [Vec<MovieId>; 3] = Default::default();
                let slot = |kind: CollectionKind| kind as usize;

                for op in &ops {
                    match *op {
                        Op::Add(kind, id) => {
                            library.add(kind, id).await.unwrap();
                            if !model[slot(kind)].contains(&id) {
                                model[slot(kind)].push(id);
                            }
                            if kind == CollectionKind::NotInterested {
                                model[slot(CollectionKind::Favorites)].retain(|&m| m != id);
                                model[slot(CollectionKind::Watchlist)].retain(|&m| m != id);
                            }
                        }
                        Op::Remove(kind, id) => {
                            library.remove(kind, id).await.unwrap();
                            model[slot(kind)].retain(|&m| m != id);
                        }
                    }
                }

                for kind in CollectionKind::ALL {
                    assert_eq!(library.get(kind).all(), model[slot(kind)].as_slice());
                }
                for &id in library.not_interested().all() {
                    // Exclusivity only holds for ids flagged after their last favorite/watchlist add
                    let last_flag = ops.iter().rposition(|op| matches!(op, Op::Add(CollectionKind::NotInterested, m) if *m == id));
                    let last_fav = ops.iter().rposition(|op| matches!(op, Op::Add(CollectionKind::Favorites, m) if *m == id));
                    if last_flag > last_fav {
                        assert!(!library.contains(CollectionKind::Favorites, id));
                    }
                }
            });
        }
    }
}
