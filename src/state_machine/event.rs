//! Events that can occur in a conversation

use super::state::{AccessChange, Target};
use crate::acl::AclError;
use crate::catalog::{Candidate, Profile, SearchOutcome};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    /// Free text (usually a custom keyboard button)
    Text { text: String },
    Search { query: String },
    BeginAccessChange {
        change: AccessChange,
        targets: Vec<Target>,
    },
    Clear,

    // Catalog events
    SearchCompleted {
        query: String,
        outcome: SearchOutcome,
    },
    LibraryChecked {
        ordinal: usize,
        /// The service already tracks this title
        tracked: bool,
    },
    ProfilesFetched { profiles: Vec<Profile> },
    TitleAdded { candidate: Candidate },
    UpstreamFailed { message: String },

    // ACL events
    AccessChanged {
        change: AccessChange,
        display_name: String,
        result: Result<(), AclError>,
    },
}
