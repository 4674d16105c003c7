//! A user session: identity plus the collections scoped to it.
use std::collections::HashSet;

use crate::catalog::MovieId;
use crate::collections::{CollectionKind, Library};
use crate::identity::{Identity, IdentityError, IdentityStore};
use crate::storage::{Database, DatabaseError};

/// Owns the identity store and the library, and keeps them in step.
///
/// Every identity transition is followed by a reload of all three
/// collections before the call returns.
pub struct Session {
    db: Database,
    identity: IdentityStore,
    library: Library,
}

impl Session {
    /// Restore the persisted identity and load its collections.
    pub async fn open(db: Database) -> Result<Self, DatabaseError> {
        let identity = IdentityStore::restore(db.clone()).await?;
        let mut library = Library::new(db.clone());
        library.switch_identity(identity.current()).await?;
        Ok(Self {
            db,
            identity,
            library,
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.current()
    }

    pub fn identity_store(&self) -> &IdentityStore {
        &self.identity
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut Library {
        &mut self.library
    }

    /// Sign in as `name` and load that user's collections.
    ///
    /// Collections are read before the identity is persisted; if either
    /// step fails the previous identity and collections stay in place.
    pub async fn sign_in(&mut self, name: &str) -> Result<Identity, IdentityError> {
        let identity = Identity::parse(name)?;
        let loaded = self.library.read_for(&identity).await?;
        let identity = self.identity.sign_in(identity.as_str()).await?;
        self.library.install(Some(&identity), loaded);
        Ok(identity)
    }

    pub async fn sign_out(&mut self) -> Result<(), IdentityError> {
        self.identity.sign_out().await?;
        self.library.switch_identity(None).await?;
        Ok(())
    }

    pub async fn add(&mut self, kind: CollectionKind, id: MovieId) -> Result<bool, DatabaseError> {
        self.library.add(kind, id).await
    }

    pub async fn remove(
        &mut self,
        kind: CollectionKind,
        id: MovieId,
    ) -> Result<bool, DatabaseError> {
        self.library.remove(kind, id).await
    }

    pub fn not_interested_set(&self) -> HashSet<MovieId> {
        self.library.not_interested_set()
    }
}
