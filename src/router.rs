//! Inbound text classification
//!
//! Every message is either a command from the fixed grammar or free text
//! for the state machine. Each route declares the access level it needs;
//! the executor checks it before anything else runs.

use crate::error::BotError;
use crate::state_machine::ConvState;
use regex::Regex;
use std::sync::LazyLock;

static COMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^/(?P<cmd>[A-Za-z0-9_]+)(?:@\S+)?(?:\s+(?P<arg>.+))?$")
        .expect("command pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Access {
    Anyone,
    Allowed,
    Owner,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Search { query: String },
    Library { filter: Option<String> },
    Clear,
    Auth { password: String },
    Wanted,
    Users,
    Revoke,
    Unrevoke,
}

impl Command {
    pub fn access(&self) -> Access {
        match self {
            Command::Auth { .. } => Access::Anyone,
            Command::Start
            | Command::Help
            | Command::Search { .. }
            | Command::Library { .. }
            | Command::Clear => Access::Allowed,
            Command::Wanted | Command::Users | Command::Revoke | Command::Unrevoke => {
                Access::Owner
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Help => "help",
            Command::Search { .. } => "query",
            Command::Library { .. } => "library",
            Command::Clear => "clear",
            Command::Auth { .. } => "auth",
            Command::Wanted => "wanted",
            Command::Users => "users",
            Command::Revoke => "revoke",
            Command::Unrevoke => "unrevoke",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Command(Command),
    /// A known command missing its required argument
    Usage(&'static str),
    Unknown(String),
    FreeText(String),
}

impl Route {
    /// Access needed to take this route while the user is in `state`
    pub fn access(&self, state: &ConvState) -> Access {
        match self {
            Route::Command(command) => command.access(),
            Route::Usage(usage) if usage.starts_with("/auth") => Access::Anyone,
            Route::Usage(_) | Route::Unknown(_) => Access::Allowed,
            Route::FreeText(_) if state.is_admin_flow() => Access::Owner,
            Route::FreeText(_) => Access::Allowed,
        }
    }

    /// Reply for routes that never reach a handler
    pub fn rejection(&self) -> Option<BotError> {
        match self {
            Route::Usage(usage) => Some(BotError::Usage(*usage)),
            Route::Unknown(command) => Some(BotError::UnknownCommand(command.clone())),
            Route::Command(_) | Route::FreeText(_) => None,
        }
    }
}

pub fn classify(text: &str) -> Route {
    let text = text.trim();
    if !text.starts_with('/') {
        return Route::FreeText(text.to_string());
    }
    let Some(caps) = COMMAND.captures(text) else {
        let word = text.split_whitespace().next().unwrap_or("/");
        return Route::Unknown(word.to_string());
    };

    let cmd = caps.name("cmd").map_or("", |m| m.as_str()).to_lowercase();
    let arg = caps
        .name("arg")
        .map(|m| m.as_str().trim().to_string())
        .filter(|a| !a.is_empty());

    let command = match (cmd.as_str(), arg) {
        ("start", _) => Command::Start,
        ("help", _) => Command::Help,
        ("q" | "query", Some(query)) => Command::Search { query },
        ("q" | "query", None) => return Route::Usage("/q [movie name]"),
        ("library", filter) => Command::Library { filter },
        ("clear", _) => Command::Clear,
        ("auth", Some(password)) => Command::Auth { password },
        ("auth", None) => return Route::Usage("/auth [password]"),
        ("wanted", _) => Command::Wanted,
        ("users", _) => Command::Users,
        ("revoke", _) => Command::Revoke,
        ("unrevoke", _) => Command::Unrevoke,
        _ => return Route::Unknown(format!("/{cmd}")),
    };
    Route::Command(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_takes_rest_of_line() {
        assert_eq!(
            classify("/q the dark knight"),
            Route::Command(Command::Search {
                query: "the dark knight".to_string()
            })
        );
        assert_eq!(
            classify("/query@my_bot heat"),
            Route::Command(Command::Search {
                query: "heat".to_string()
            })
        );
    }

    #[test]
    fn missing_arguments_give_usage() {
        assert_eq!(classify("/q"), Route::Usage("/q [movie name]"));
        assert_eq!(classify("/auth   "), Route::Usage("/auth [password]"));
        assert_eq!(classify("/auth").access(&ConvState::Idle), Access::Anyone);
    }

    #[test]
    fn library_filter_is_optional() {
        assert_eq!(
            classify("/library"),
            Route::Command(Command::Library { filter: None })
        );
        assert_eq!(
            classify("/library star wars"),
            Route::Command(Command::Library {
                filter: Some("star wars".to_string())
            })
        );
    }

    #[test]
    fn unknown_commands_and_free_text() {
        assert_eq!(classify("/dance"), Route::Unknown("/dance".to_string()));
        assert_eq!(
            classify("Heat - 1995"),
            Route::FreeText("Heat - 1995".to_string())
        );
        assert_eq!(classify("/dance").access(&ConvState::Idle), Access::Allowed);
    }

    #[test]
    fn slash_text_never_reaches_the_state_machine() {
        assert_eq!(classify("/2fa"), Route::Unknown("/2fa".to_string()));
        assert_eq!(classify("/é bonjour"), Route::Unknown("/é".to_string()));
        assert_eq!(classify("/"), Route::Unknown("/".to_string()));
    }

    #[test]
    fn arguments_may_span_lines() {
        assert_eq!(
            classify("/q heat\n1995"),
            Route::Command(Command::Search {
                query: "heat\n1995".to_string()
            })
        );
        assert_eq!(
            classify("/revoke\nbob"),
            Route::Command(Command::Revoke)
        );
    }

    #[test]
    fn access_levels() {
        assert_eq!(classify("/auth secret").access(&ConvState::Idle), Access::Anyone);
        assert_eq!(classify("/help").access(&ConvState::Idle), Access::Allowed);
        assert_eq!(classify("/revoke").access(&ConvState::Idle), Access::Owner);
        assert_eq!(classify("/wanted").access(&ConvState::Idle), Access::Owner);

        let text = classify("bob");
        assert_eq!(text.access(&ConvState::AwaitingMovieSelection), Access::Allowed);
        assert_eq!(text.access(&ConvState::AwaitingRevokeConfirm), Access::Owner);
    }
}
