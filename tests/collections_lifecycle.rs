//! Integration tests for identity and collections: sign in, mutate, restore,
//! sign out.
//!
//! Each test creates its own in-memory SQLite database for isolation.

use moviematch::collections::CollectionKind;
use moviematch::identity::{Identity, IdentityError};
use moviematch::session::Session;
use moviematch::storage::Database;
use pretty_assertions::assert_eq;

async fn test_db() -> Database {
    Database::open(":memory:").await.unwrap()
}

// ============================================================================
// Identity Transitions
// ============================================================================

#[tokio::test]
async fn test_anonymous_additions_do_not_carry_over() {
    let db = test_db().await;
    let mut session = Session::open(db.clone()).await.unwrap();

    session.add(CollectionKind::Favorites, 100).await.unwrap();
    assert!(session.library().contains(CollectionKind::Favorites, 100));

    session.sign_in("alice").await.unwrap();
    assert!(!session.library().contains(CollectionKind::Favorites, 100));
    assert_eq!(db.get_value("favorites_alice").await.unwrap(), None);
}

#[tokio::test]
async fn test_collections_survive_restart() {
    let db = test_db().await;
    {
        let mut session = Session::open(db.clone()).await.unwrap();
        session.sign_in("alice").await.unwrap();
        for id in [603, 27205, 157336] {
            session.add(CollectionKind::Favorites, id).await.unwrap();
        }
        session.add(CollectionKind::Watchlist, 78).await.unwrap();
    }

    let session = Session::open(db).await.unwrap();
    assert_eq!(
        session.identity().map(Identity::as_str),
        Some("alice")
    );
    assert_eq!(session.library().favorites().all(), &[603, 27205, 157336]);
    assert_eq!(session.library().watchlist().all(), &[78]);
}

#[tokio::test]
async fn test_users_are_isolated() {
    let db = test_db().await;
    let mut session = Session::open(db).await.unwrap();

    session.sign_in("alice").await.unwrap();
    session.add(CollectionKind::Favorites, 1).await.unwrap();

    session.sign_in("bob").await.unwrap();
    assert!(session.library().favorites().is_empty());
    session.add(CollectionKind::Favorites, 2).await.unwrap();

    session.sign_in("  alice  ").await.unwrap();
    assert_eq!(session.library().favorites().all(), &[1]);
}

#[tokio::test]
async fn test_sign_out_clears_but_keeps_persisted_state() {
    let db = test_db().await;
    let mut session = Session::open(db.clone()).await.unwrap();
    session.sign_in("alice").await.unwrap();
    session.add(CollectionKind::Watchlist, 5).await.unwrap();

    session.sign_out().await.unwrap();
    assert!(session.identity().is_none());
    assert!(session.library().watchlist().is_empty());
    assert_eq!(db.get_value("user").await.unwrap(), None);

    session.sign_in("alice").await.unwrap();
    assert_eq!(session.library().watchlist().all(), &[5]);
}

#[tokio::test]
async fn test_blank_sign_in_rejected_without_side_effects() {
    let db = test_db().await;
    let mut session = Session::open(db.clone()).await.unwrap();

    let result = session.sign_in(" \t ").await;
    assert!(matches!(result, Err(IdentityError::InvalidIdentity)));
    assert!(session.identity().is_none());
    assert_eq!(db.get_value("user").await.unwrap(), None);
}

// ============================================================================
// Exclusivity
// ============================================================================

#[tokio::test]
async fn test_hiding_a_movie_evicts_it_everywhere() {
    let db = test_db().await;
    let mut session = Session::open(db.clone()).await.unwrap();
    session.sign_in("alice").await.unwrap();

    session.add(CollectionKind::Favorites, 42).await.unwrap();
    session.add(CollectionKind::Watchlist, 42).await.unwrap();
    session.add(CollectionKind::NotInterested, 42).await.unwrap();

    assert!(!session.library().contains(CollectionKind::Favorites, 42));
    assert!(!session.library().contains(CollectionKind::Watchlist, 42));
    assert!(session.not_interested_set().contains(&42));

    // Eviction is persisted too
    assert_eq!(
        db.get_value("favorites_alice").await.unwrap().as_deref(),
        Some("[]")
    );
    assert_eq!(
        db.get_value("uninterested_alice").await.unwrap().as_deref(),
        Some("[42]")
    );
}

#[tokio::test]
async fn test_corrupt_collection_is_coerced_on_sign_in() {
    let db = test_db().await;
    db.set_value("favorites_carol", r#"[1, "2", "two", 3.0, 1]"#)
        .await
        .unwrap();

    let mut session = Session::open(db).await.unwrap();
    session.sign_in("carol").await.unwrap();
    assert_eq!(session.library().favorites().all(), &[1, 2, 3]);
}
