//! Current user identity.
//!
//! The identity is a trivial handle: a trimmed, non-empty string. It is
//! persisted under a fixed key so it survives restarts, and every per-user
//! collection is scoped to it.
use std::fmt;

use thiserror::Error;
use tokio::sync::watch;

use crate::storage::{Database, DatabaseError};

/// Storage key holding the signed-in identity.
pub const IDENTITY_KEY: &str = "user";

#[derive(Debug, Error)]
pub enum IdentityError {
    /// Sign-in name was empty or whitespace only.
    #[error("Identity must not be empty")]
    InvalidIdentity,

    #[error(transparent)]
    Storage(#[from] DatabaseError),
}

/// A signed-in user's handle. Always trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    /// Validate and normalize a raw name.
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(IdentityError::InvalidIdentity);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Holds the current identity and mirrors it to storage.
pub struct IdentityStore {
    db: Database,
    current: Option<Identity>,
    changes: watch::Sender<Option<Identity>>,
}

impl IdentityStore {
    /// Restore the persisted identity, if any.
    ///
    /// A stored value that is blank, or that is not a JSON string, is read
    /// leniently: raw text is accepted, blank text means anonymous.
    pub async fn restore(db: Database) -> Result<Self, DatabaseError> {
        let current = match db.get_value(IDENTITY_KEY).await? {
            Some(raw) => {
                let name = serde_json::from_str::<String>(&raw).unwrap_or(raw);
                match Identity::parse(&name) {
                    Ok(identity) => Some(identity),
                    Err(_) => {
                        tracing::warn!("Stored identity is blank, starting anonymous");
                        None
                    }
                }
            }
            None => None,
        };

        if let Some(identity) = &current {
            tracing::debug!(identity = %identity, "Restored identity");
        }

        let (changes, _) = watch::channel(current.clone());
        Ok(Self {
            db,
            current,
            changes,
        })
    }

    pub fn current(&self) -> Option<&Identity> {
        self.current.as_ref()
    }

    /// Sign in as `name`, replacing any current identity.
    ///
    /// Rejected names leave the store untouched.
    pub async fn sign_in(&mut self, name: &str) -> Result<Identity, IdentityError> {
        let identity = Identity::parse(name)?;
        self.db.set_json(IDENTITY_KEY, identity.as_str()).await?;

        tracing::info!(identity = %identity, "Signed in");
        self.current = Some(identity.clone());
        self.changes.send_replace(self.current.clone());
        Ok(identity)
    }

    /// Clear the current identity and its persisted value.
    pub async fn sign_out(&mut self) -> Result<(), IdentityError> {
        self.db.remove_value(IDENTITY_KEY).await?;

        if let Some(previous) = self.current.take() {
            tracing::info!(identity = %previous, "Signed out");
        }
        self.changes.send_replace(None);
        Ok(())
    }

    /// Receive every identity transition.
    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.changes.subscribe()
    }
}
