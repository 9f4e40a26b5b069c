//! Effects produced by state transitions

use super::state::{AccessChange, Target};
use crate::catalog::{Candidate, Profile};
use crate::replies::Reply;
use crate::session::SessionValue;

/// Effects to be executed after state transition
#[derive(Debug, Clone)]
pub enum Effect {
    /// Send a message to the user
    Reply(Reply),

    /// Persist the new state to the session store
    PersistState,

    /// Store a session value for the user
    Remember(SessionValue),

    /// Drop every session value for the user
    ClearSession,

    /// Search the catalog; yields `SearchCompleted` or `UpstreamFailed`
    SearchCatalog { query: String },

    /// Look for the candidate among tracked titles; yields `LibraryChecked`
    CheckLibrary { candidate: Candidate },

    /// Yields `ProfilesFetched` with enabled profiles only
    FetchProfiles,

    /// Yields `TitleAdded`
    AddTitle { candidate: Candidate, profile: Profile },

    /// Revoke or restore a user; yields `AccessChanged`
    ChangeAccess { change: AccessChange, target: Target },
}

impl Effect {
    pub fn reply(reply: Reply) -> Self {
        Effect::Reply(reply)
    }

    pub fn remember(value: SessionValue) -> Self {
        Effect::Remember(value)
    }
}
