//! Conversation state types

use crate::acl::{AclEntry, User, UserId};
use crate::session::SessionSnapshot;

/// Conversation state, one per user
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConvState {
    /// No active flow
    #[default]
    Idle,

    /// Search results listed, waiting for the user to pick one
    AwaitingMovieSelection,

    /// Quality profiles listed, waiting for the user to pick one
    AwaitingProfileSelection,

    /// Allowed users listed, waiting for the owner to pick one to revoke
    AwaitingRevokeTarget,

    /// Waiting for the owner to confirm the revoke
    AwaitingRevokeConfirm,

    /// Revoked users listed, waiting for the owner to pick one to restore
    AwaitingUnrevokeTarget,

    /// Waiting for the owner to confirm the unrevoke
    AwaitingUnrevokeConfirm,
}

impl ConvState {
    pub fn is_idle(&self) -> bool {
        matches!(self, ConvState::Idle)
    }

    /// States that belong to owner-only flows
    pub fn is_admin_flow(&self) -> bool {
        matches!(
            self,
            ConvState::AwaitingRevokeTarget
                | ConvState::AwaitingRevokeConfirm
                | ConvState::AwaitingUnrevokeTarget
                | ConvState::AwaitingUnrevokeConfirm
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConvState::Idle => "idle",
            ConvState::AwaitingMovieSelection => "awaiting_movie_selection",
            ConvState::AwaitingProfileSelection => "awaiting_profile_selection",
            ConvState::AwaitingRevokeTarget => "awaiting_revoke_target",
            ConvState::AwaitingRevokeConfirm => "awaiting_revoke_confirm",
            ConvState::AwaitingUnrevokeTarget => "awaiting_unrevoke_target",
            ConvState::AwaitingUnrevokeConfirm => "awaiting_unrevoke_confirm",
        }
    }
}

/// Which admin flow is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessChange {
    Revoke,
    Unrevoke,
}

impl AccessChange {
    pub fn verb(self) -> &'static str {
        match self {
            AccessChange::Revoke => "revoked",
            AccessChange::Unrevoke => "unrevoked",
        }
    }

    pub fn target_state(self) -> ConvState {
        match self {
            AccessChange::Revoke => ConvState::AwaitingRevokeTarget,
            AccessChange::Unrevoke => ConvState::AwaitingUnrevokeTarget,
        }
    }

    pub fn confirm_state(self) -> ConvState {
        match self {
            AccessChange::Revoke => ConvState::AwaitingRevokeConfirm,
            AccessChange::Unrevoke => ConvState::AwaitingUnrevokeConfirm,
        }
    }
}

/// A user offered in a revoke/unrevoke list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub ordinal: usize,
    pub user_id: UserId,
    pub display_name: String,
}

impl Target {
    /// Number ACL entries from 1, leaving out the owner.
    ///
    /// The display name doubles as the keyboard label the user sends back,
    /// so names shared by several entries get the user id appended.
    pub fn list(entries: &[AclEntry], owner: Option<UserId>) -> Vec<Target> {
        let listed: Vec<&AclEntry> = entries.iter().filter(|e| Some(e.id) != owner).collect();
        let shared = |name: &str| listed.iter().filter(|e| e.display_name == name).count() > 1;

        listed
            .iter()
            .enumerate()
            .map(|(i, e)| Target {
                ordinal: i + 1,
                user_id: e.id,
                display_name: if shared(e.display_name.as_str()) {
                    format!("{} ({})", e.display_name, e.id)
                } else {
                    e.display_name.clone()
                },
            })
            .collect()
    }
}

/// Inputs a transition may read besides the state itself
#[derive(Debug, Clone)]
pub struct ConvContext {
    pub user: User,
    pub session: SessionSnapshot,
}

impl ConvContext {
    pub fn new(user: User, session: SessionSnapshot) -> Self {
        Self { user, session }
    }
}
