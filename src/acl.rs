//! Access control list
//!
//! Two disjoint lists (`allowed`, `revoked`) plus a single configured owner.
//! Every mutation hands the full snapshot to the persister; the in-memory
//! state is authoritative even when a save fails.

pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::mpsc;

/// Chat-platform assigned user id
pub type UserId = i64;

/// Identity of the sender of an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
}

impl User {
    pub fn new(id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}

/// Persisted ACL entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AclEntry {
    pub id: UserId,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granted_at: Option<DateTime<Utc>>,
}

impl AclEntry {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name.clone(),
            granted_at: Some(Utc::now()),
        }
    }
}

/// Full ACL as written to durable storage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AclSnapshot {
    #[serde(default)]
    pub allowed_users: Vec<AclEntry>,
    #[serde(default)]
    pub revoked_users: Vec<AclEntry>,
}

impl AclSnapshot {
    /// Drop duplicate ids, any allowed entry that is also revoked, and the
    /// owner, who is implicitly allowed and never revoked
    #[must_use]
    pub fn normalized(mut self, owner: Option<UserId>) -> Self {
        let mut seen: HashSet<UserId> = owner.into_iter().collect();
        self.revoked_users.retain(|e| seen.insert(e.id));
        self.allowed_users.retain(|e| seen.insert(e.id));
        self
    }

    pub fn is_allowed(&self, id: UserId) -> bool {
        self.allowed_users.iter().any(|e| e.id == id)
    }

    pub fn is_revoked(&self, id: UserId) -> bool {
        self.revoked_users.iter().any(|e| e.id == id)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AclError {
    #[error("Already authorized.\nType /start to begin.")]
    AlreadyAuthorized,
    #[error("Your access has been revoked and cannot reauthorize.\nPlease reach out to the bot owner for support.")]
    Banned,
    #[error("Invalid password.")]
    BadPassword,
    #[error("Could not find user {0} in the access list")]
    NotFound(UserId),
    #[error("The bot owner's access cannot be changed.")]
    OwnerProtected,
}

/// Outcome of a successful `/auth`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorized {
    pub entry: AclEntry,
    /// First user ever authorized while no owner is configured
    pub needs_owner_setup: bool,
}

pub struct AclRegistry {
    lists: RwLock<AclSnapshot>,
    owner: Option<UserId>,
    password: String,
    persist_tx: Option<mpsc::UnboundedSender<AclSnapshot>>,
}

impl AclRegistry {
    pub fn new(snapshot: AclSnapshot, owner: Option<UserId>, password: impl Into<String>) -> Self {
        Self {
            lists: RwLock::new(snapshot.normalized(owner)),
            owner,
            password: password.into(),
            persist_tx: None,
        }
    }

    /// Send every post-mutation snapshot to a persister task
    pub fn with_persistence(mut self, tx: mpsc::UnboundedSender<AclSnapshot>) -> Self {
        self.persist_tx = Some(tx);
        self
    }

    pub fn owner(&self) -> Option<UserId> {
        self.owner
    }

    pub fn is_owner(&self, id: UserId) -> bool {
        self.owner == Some(id)
    }

    pub fn is_allowed(&self, id: UserId) -> bool {
        self.is_owner(id) || self.read().is_allowed(id)
    }

    pub fn is_revoked(&self, id: UserId) -> bool {
        self.read().is_revoked(id)
    }

    pub fn allowed_users(&self) -> Vec<AclEntry> {
        self.read().allowed_users.clone()
    }

    pub fn revoked_users(&self) -> Vec<AclEntry> {
        self.read().revoked_users.clone()
    }

    pub fn snapshot(&self) -> AclSnapshot {
        self.read().clone()
    }

    pub fn authorize(&self, user: &User, password: &str) -> Result<Authorized, AclError> {
        let snapshot = {
            let mut lists = self.write();
            if self.is_owner(user.id) || lists.is_allowed(user.id) {
                return Err(AclError::AlreadyAuthorized);
            }
            if lists.is_revoked(user.id) {
                return Err(AclError::Banned);
            }
            if password != self.password {
                return Err(AclError::BadPassword);
            }
            lists.allowed_users.push(AclEntry::from_user(user));
            lists.clone()
        };

        tracing::info!(user_id = %user.id, name = %user.display_name, "User authorized");
        let needs_owner_setup = self.owner.is_none() && snapshot.allowed_users.len() == 1;
        let entry = snapshot
            .allowed_users
            .last()
            .cloned()
            .unwrap_or_else(|| AclEntry::from_user(user));
        self.persist(snapshot);

        Ok(Authorized {
            entry,
            needs_owner_setup,
        })
    }

    /// Move a user from `allowed` to `revoked`
    pub fn revoke(&self, id: UserId) -> Result<AclEntry, AclError> {
        if self.is_owner(id) {
            return Err(AclError::OwnerProtected);
        }
        let (entry, snapshot) = {
            let mut lists = self.write();
            let index = lists
                .allowed_users
                .iter()
                .position(|e| e.id == id)
                .ok_or(AclError::NotFound(id))?;
            let entry = lists.allowed_users.remove(index);
            lists.revoked_users.push(entry.clone());
            (entry, lists.clone())
        };

        tracing::info!(user_id = %id, "User access revoked");
        self.persist(snapshot);
        Ok(entry)
    }

    /// Move a user from `revoked` back to `allowed`
    pub fn unrevoke(&self, id: UserId) -> Result<AclEntry, AclError> {
        if self.is_owner(id) {
            return Err(AclError::OwnerProtected);
        }
        let (entry, snapshot) = {
            let mut lists = self.write();
            let index = lists
                .revoked_users
                .iter()
                .position(|e| e.id == id)
                .ok_or(AclError::NotFound(id))?;
            let entry = lists.revoked_users.remove(index);
            lists.allowed_users.push(entry.clone());
            (entry, lists.clone())
        };

        tracing::info!(user_id = %id, "User access restored");
        self.persist(snapshot);
        Ok(entry)
    }

    fn persist(&self, snapshot: AclSnapshot) {
        if let Some(tx) = &self.persist_tx {
            if tx.send(snapshot).is_err() {
                tracing::error!("ACL persister is gone, change kept in memory only");
            }
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, AclSnapshot> {
        self.lists.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, AclSnapshot> {
        self.lists.write().unwrap_or_else(PoisonError::into_inner)
    }
}
