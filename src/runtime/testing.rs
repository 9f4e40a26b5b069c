//! Mock implementations for testing
//!
//! These mocks enable executor and runtime tests without real I/O.

use super::traits::*;
use crate::acl::store::AclStoreError;
use crate::acl::{AclSnapshot, UserId};
use crate::catalog::{CatalogError, RemoteProfile, SearchOutcome, TrackedTitle};
use crate::replies::Reply;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Mock Messenger
// ============================================================================

/// Records every message sent; can be told to fail
#[derive(Default)]
pub struct MockMessenger {
    sent: Mutex<Vec<(UserId, Reply)>>,
    fail_next: Mutex<usize>,
    delay: Option<Duration>,
}

impl MockMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep before recording each message
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make the next `n` sends fail
    pub fn fail_next(&self, n: usize) {
        *self.fail_next.lock().unwrap() = n;
    }

    pub fn sent(&self) -> Vec<(UserId, Reply)> {
        self.sent.lock().unwrap().clone()
    }

    /// Texts sent to one user, in order
    pub fn texts_for(&self, user: UserId) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| *to == user)
            .map(|(_, reply)| reply.text.clone())
            .collect()
    }

    pub fn last_for(&self, user: UserId) -> Option<Reply> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| *to == user)
            .map(|(_, reply)| reply.clone())
    }
}

#[async_trait]
impl Messenger for MockMessenger {
    async fn send_message(&self, user: UserId, reply: &Reply) -> Result<(), MessagingError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        {
            let mut fail = self.fail_next.lock().unwrap();
            if *fail > 0 {
                *fail -= 1;
                return Err(MessagingError::Network("mock send failure".to_string()));
            }
        }
        self.sent.lock().unwrap().push((user, reply.clone()));
        Ok(())
    }
}

// ============================================================================
// Mock Catalog
// ============================================================================

/// Catalog with canned answers and a record of mutating calls
#[derive(Default)]
pub struct MockCatalog {
    searches: Mutex<VecDeque<Result<SearchOutcome, CatalogError>>>,
    library: Mutex<Vec<TrackedTitle>>,
    profiles: Mutex<Vec<RemoteProfile>>,
    fail_add: Mutex<bool>,
    fail_full_search: Mutex<bool>,
    /// `(identifier, title, profile_id)` of every successful add
    pub added: Mutex<Vec<(String, String, String)>>,
    pub full_searches: Mutex<usize>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_search(&self, result: Result<SearchOutcome, CatalogError>) {
        self.searches.lock().unwrap().push_back(result);
    }

    pub fn set_library(&self, titles: Vec<TrackedTitle>) {
        *self.library.lock().unwrap() = titles;
    }

    pub fn set_profiles(&self, profiles: Vec<RemoteProfile>) {
        *self.profiles.lock().unwrap() = profiles;
    }

    pub fn fail_add(&self) {
        *self.fail_add.lock().unwrap() = true;
    }

    pub fn fail_full_search(&self) {
        *self.fail_full_search.lock().unwrap() = true;
    }

    pub fn added(&self) -> Vec<(String, String, String)> {
        self.added.lock().unwrap().clone()
    }

    pub fn full_search_count(&self) -> usize {
        *self.full_searches.lock().unwrap()
    }
}

#[async_trait]
impl Catalog for MockCatalog {
    async fn search_titles(&self, _query: &str) -> Result<SearchOutcome, CatalogError> {
        self.searches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(SearchOutcome::NotFound))
    }

    async fn list_catalog(&self) -> Result<Vec<TrackedTitle>, CatalogError> {
        Ok(self.library.lock().unwrap().clone())
    }

    async fn list_profiles(&self) -> Result<Vec<RemoteProfile>, CatalogError> {
        Ok(self.profiles.lock().unwrap().clone())
    }

    async fn add_title(
        &self,
        identifier: &str,
        title: &str,
        profile_id: &str,
    ) -> Result<(), CatalogError> {
        if *self.fail_add.lock().unwrap() {
            return Err(CatalogError::api("could not add movie"));
        }
        self.added.lock().unwrap().push((
            identifier.to_string(),
            title.to_string(),
            profile_id.to_string(),
        ));
        Ok(())
    }

    async fn full_search(&self) -> Result<(), CatalogError> {
        if *self.fail_full_search.lock().unwrap() {
            return Err(CatalogError::api("full search failed"));
        }
        *self.full_searches.lock().unwrap() += 1;
        Ok(())
    }
}

// ============================================================================
// Mock ACL Store
// ============================================================================

/// In-memory ACL store whose first saves can be made to fail
#[derive(Default)]
pub struct MockAclStore {
    failures_left: Mutex<usize>,
    attempts: Mutex<usize>,
    saved: Mutex<Vec<AclSnapshot>>,
}

impl MockAclStore {
    /// Fail the first `n` save attempts
    pub fn failing(n: usize) -> Self {
        Self {
            failures_left: Mutex::new(n),
            ..Self::default()
        }
    }

    pub fn save_attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }

    /// Successfully saved snapshots, oldest first
    pub fn saved(&self) -> Vec<AclSnapshot> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl AclStore for MockAclStore {
    async fn load(&self) -> Result<AclSnapshot, AclStoreError> {
        Ok(self.saved().last().cloned().unwrap_or_default())
    }

    async fn save(&self, snapshot: &AclSnapshot) -> Result<(), AclStoreError> {
        *self.attempts.lock().unwrap() += 1;
        let mut failures = self.failures_left.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(AclStoreError::Io(std::io::Error::other("mock save failure")));
        }
        self.saved.lock().unwrap().push(snapshot.clone());
        Ok(())
    }
}
