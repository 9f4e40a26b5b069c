//! User-facing error types
//!
//! Every failure that reaches a user is converted into exactly one reply.
//! The `Display` text of [`BotError`] is the body of that reply.

use crate::acl::AclError;
use crate::catalog::CatalogError;
use crate::runtime::MessagingError;
use crate::state_machine::FlowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("You are not authorized to use this bot.\nType `/auth [password]` to authorize.")]
    NotAuthorized,
    #[error("Only the bot owner can use this command.")]
    AdminOnly,
    #[error("Unknown command `{0}`, type /help for the list of commands.")]
    UnknownCommand(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error("Movie already exists and is already being tracked by CouchPotato")]
    AlreadyTracked,
    #[error("Could not find {0}, try searching again")]
    TitleNotFound(String),
    #[error("Unable to locate {0} in CouchPotato library")]
    LibraryEmpty(String),
    #[error("Could not get profiles, try searching again")]
    NoProfiles,
    #[error("CouchPotato is unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error(transparent)]
    Acl(#[from] AclError),
    #[error(transparent)]
    Flow(#[from] FlowError),
}

impl From<CatalogError> for BotError {
    fn from(err: CatalogError) -> Self {
        BotError::UpstreamUnavailable(err.to_string())
    }
}

impl From<MessagingError> for BotError {
    fn from(err: MessagingError) -> Self {
        BotError::UpstreamUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acl_errors_keep_their_message() {
        let err: BotError = AclError::Banned.into();
        assert_eq!(err.to_string(), AclError::Banned.to_string());
    }

    #[test]
    fn catalog_errors_become_upstream_unavailable() {
        let err: BotError = CatalogError::network("connection refused").into();
        assert!(matches!(err, BotError::UpstreamUnavailable(_)));
        assert!(err.to_string().contains("connection refused"));
    }
}
