//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::acl::store::AclStoreError;
use crate::acl::{AclSnapshot, UserId};
use crate::catalog::{CatalogError, RemoteProfile, SearchOutcome, TrackedTitle};
use crate::replies::Reply;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessagingError {
    #[error("chat network error: {0}")]
    Network(String),
    #[error("chat API error: {0}")]
    Api(String),
}

/// Outbound chat transport
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(&self, user: UserId, reply: &Reply) -> Result<(), MessagingError>;
}

/// Remote media catalog
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn search_titles(&self, query: &str) -> Result<SearchOutcome, CatalogError>;

    /// Every title the service already tracks
    async fn list_catalog(&self) -> Result<Vec<TrackedTitle>, CatalogError>;

    async fn list_profiles(&self) -> Result<Vec<RemoteProfile>, CatalogError>;

    async fn add_title(
        &self,
        identifier: &str,
        title: &str,
        profile_id: &str,
    ) -> Result<(), CatalogError>;

    /// Ask the service to search for every wanted title
    async fn full_search(&self) -> Result<(), CatalogError>;
}

/// Durable storage for the ACL lists
#[async_trait]
pub trait AclStore: Send + Sync {
    async fn load(&self) -> Result<AclSnapshot, AclStoreError>;

    async fn save(&self, snapshot: &AclSnapshot) -> Result<(), AclStoreError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: Messenger + ?Sized> Messenger for Arc<T> {
    async fn send_message(&self, user: UserId, reply: &Reply) -> Result<(), MessagingError> {
        (**self).send_message(user, reply).await
    }
}

#[async_trait]
impl<T: Catalog + ?Sized> Catalog for Arc<T> {
    async fn search_titles(&self, query: &str) -> Result<SearchOutcome, CatalogError> {
        (**self).search_titles(query).await
    }

    async fn list_catalog(&self) -> Result<Vec<TrackedTitle>, CatalogError> {
        (**self).list_catalog().await
    }

    async fn list_profiles(&self) -> Result<Vec<RemoteProfile>, CatalogError> {
        (**self).list_profiles().await
    }

    async fn add_title(
        &self,
        identifier: &str,
        title: &str,
        profile_id: &str,
    ) -> Result<(), CatalogError> {
        (**self).add_title(identifier, title, profile_id).await
    }

    async fn full_search(&self) -> Result<(), CatalogError> {
        (**self).full_search().await
    }
}

#[async_trait]
impl<T: AclStore + ?Sized> AclStore for Arc<T> {
    async fn load(&self) -> Result<AclSnapshot, AclStoreError> {
        (**self).load().await
    }

    async fn save(&self, snapshot: &AclSnapshot) -> Result<(), AclStoreError> {
        (**self).save(snapshot).await
    }
}
