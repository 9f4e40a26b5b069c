//! Per-user conversation data with a fixed time-to-live
//!
//! Entries are keyed by `(user, kind)`, so a user has at most one value of
//! each kind and can never see another user's data. Expired entries are
//! invisible to readers even before the sweeper removes them.

use crate::acl::UserId;
use crate::catalog::{Candidate, Profile};
use crate::state_machine::{ConvState, Target};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    State,
    Candidates,
    SelectedCandidate,
    Profiles,
    Targets,
    PendingTarget,
}

impl SessionKind {
    pub const ALL: [SessionKind; 6] = [
        SessionKind::State,
        SessionKind::Candidates,
        SessionKind::SelectedCandidate,
        SessionKind::Profiles,
        SessionKind::Targets,
        SessionKind::PendingTarget,
    ];
}

/// A typed session value; its variant determines the [`SessionKind`] it is stored under
#[derive(Debug, Clone, PartialEq)]
pub enum SessionValue {
    State(ConvState),
    Candidates(Vec<Candidate>),
    /// Ordinal of the chosen candidate
    SelectedCandidate(usize),
    Profiles(Vec<Profile>),
    Targets(Vec<Target>),
    /// Display name of the user picked in a revoke/unrevoke flow
    PendingTarget(String),
}

impl SessionValue {
    pub fn kind(&self) -> SessionKind {
        match self {
            SessionValue::State(_) => SessionKind::State,
            SessionValue::Candidates(_) => SessionKind::Candidates,
            SessionValue::SelectedCandidate(_) => SessionKind::SelectedCandidate,
            SessionValue::Profiles(_) => SessionKind::Profiles,
            SessionValue::Targets(_) => SessionKind::Targets,
            SessionValue::PendingTarget(_) => SessionKind::PendingTarget,
        }
    }
}

/// Everything stored for one user, read at a single instant
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    /// `Idle` when no state entry exists
    pub state: ConvState,
    pub candidates: Option<Vec<Candidate>>,
    pub selected_candidate: Option<usize>,
    pub profiles: Option<Vec<Profile>>,
    pub targets: Option<Vec<Target>>,
    pub pending_target: Option<String>,
}

impl SessionSnapshot {
    #[must_use]
    pub fn with(mut self, value: SessionValue) -> Self {
        match value {
            SessionValue::State(state) => self.state = state,
            SessionValue::Candidates(list) => self.candidates = Some(list),
            SessionValue::SelectedCandidate(ordinal) => self.selected_candidate = Some(ordinal),
            SessionValue::Profiles(list) => self.profiles = Some(list),
            SessionValue::Targets(list) => self.targets = Some(list),
            SessionValue::PendingTarget(name) => self.pending_target = Some(name),
        }
        self
    }

    /// The candidate chosen earlier in the add-title flow
    pub fn selected(&self) -> Option<&Candidate> {
        let ordinal = self.selected_candidate?;
        self.candidates.as_ref()?.iter().find(|c| c.ordinal == ordinal)
    }
}

#[derive(Debug)]
struct Entry {
    value: SessionValue,
    expires_at: Instant,
}

pub struct SessionStore {
    ttl: Duration,
    entries: Mutex<HashMap<(UserId, SessionKind), Entry>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn set(&self, user: UserId, value: SessionValue) {
        self.set_at(user, value, Instant::now());
    }

    pub fn get(&self, user: UserId, kind: SessionKind) -> Option<SessionValue> {
        self.get_at(user, kind, Instant::now())
    }

    pub fn clear(&self, user: UserId, kind: SessionKind) {
        self.lock().remove(&(user, kind));
    }

    pub fn clear_all(&self, user: UserId, kinds: &[SessionKind]) {
        let mut entries = self.lock();
        for kind in kinds {
            entries.remove(&(user, *kind));
        }
    }

    /// Drop every kind stored for the user
    pub fn clear_user(&self, user: UserId) {
        self.clear_all(user, &SessionKind::ALL);
    }

    /// Store a conversation state; `Idle` is stored as absence
    pub fn set_state(&self, user: UserId, state: &ConvState) {
        if state.is_idle() {
            self.clear(user, SessionKind::State);
        } else {
            self.set(user, SessionValue::State(state.clone()));
        }
    }

    pub fn snapshot(&self, user: UserId) -> SessionSnapshot {
        self.snapshot_at(user, Instant::now())
    }

    /// Evict expired entries, returning how many were removed
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run [`sweep`](Self::sweep) on a fixed interval until cancelled
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = store.sweep();
                        if evicted > 0 {
                            tracing::debug!(evicted, remaining = store.len(), "Swept expired session entries");
                        }
                    }
                }
            }
            tracing::info!("Session sweeper stopped");
        })
    }

    pub(crate) fn set_at(&self, user: UserId, value: SessionValue, now: Instant) {
        let entry = Entry {
            expires_at: now + self.ttl,
            value,
        };
        self.lock().insert((user, entry.value.kind()), entry);
    }

    pub(crate) fn get_at(&self, user: UserId, kind: SessionKind, now: Instant) -> Option<SessionValue> {
        self.lock()
            .get(&(user, kind))
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone())
    }

    pub(crate) fn snapshot_at(&self, user: UserId, now: Instant) -> SessionSnapshot {
        let entries = self.lock();
        SessionKind::ALL
            .iter()
            .filter_map(|kind| entries.get(&(user, *kind)))
            .filter(|entry| entry.expires_at > now)
            .fold(SessionSnapshot::default(), |snapshot, entry| {
                snapshot.with(entry.value.clone())
            })
    }

    pub(crate) fn sweep_at(&self, now: Instant) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        // Expiry is read under the same lock `set` takes, so a refresh always wins
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(UserId, SessionKind), Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
