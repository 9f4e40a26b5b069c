//! Outbound message rendering
//!
//! Lists are numbered from 1 and paired with a custom keyboard whose button
//! text is exactly what the state machine expects back.

use crate::acl::{AclEntry, User, UserId};
use crate::catalog::{Candidate, Profile, TrackedTitle};
use crate::state_machine::{AccessChange, Target};
use std::fmt::Display;

/// Titles per `/library` message
pub const LIBRARY_CHUNK: usize = 50;

/// What happens to the user's custom keyboard
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Keyboard {
    #[default]
    Unchanged,
    /// One-time keyboard, one inner vec per row
    Options(Vec<Vec<String>>),
    Remove,
}

/// A message to one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Keyboard,
    pub disable_preview: bool,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: Keyboard::Unchanged,
            disable_preview: true,
        }
    }

    pub fn error(err: &impl Display) -> Self {
        Self::text(format!("*Oh no!* {err}")).with_keyboard(Keyboard::Remove)
    }

    #[must_use]
    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = keyboard;
        self
    }

    #[must_use]
    pub fn with_preview(mut self) -> Self {
        self.disable_preview = false;
        self
    }

    pub fn is_error(&self) -> bool {
        self.text.starts_with("*Oh no!*")
    }
}

fn rows<T>(items: &[T], per_row: usize, label: impl Fn(&T) -> String) -> Vec<Vec<String>> {
    items
        .chunks(per_row)
        .map(|row| row.iter().map(&label).collect())
        .collect()
}

pub fn candidate_list(candidates: &[Candidate]) -> Reply {
    let mut lines = vec![format!("*Found {} movies:*", candidates.len())];
    for c in candidates {
        let mut line = format!("*{}*) [{}]({})", c.ordinal, c.title, c.link());
        if let Some(year) = c.year {
            line.push_str(&format!(" - _{year}_"));
        }
        if let Some(rating) = &c.rating {
            line.push_str(&format!(" - _{rating}_"));
        }
        if let Some(runtime) = c.runtime {
            line.push_str(&format!(" - _{runtime}m_"));
        }
        lines.push(line);
    }
    lines.push("Please select from the menu below.".to_string());

    Reply::text(lines.join("\n"))
        .with_keyboard(Keyboard::Options(rows(candidates, 1, |c| c.display_label.clone())))
}

pub fn profile_list(profiles: &[Profile]) -> Reply {
    let mut lines = vec!["*Which quality profile should be used?*".to_string()];
    lines.extend(profiles.iter().map(|p| format!("*{}*) {}", p.ordinal, p.label)));
    lines.push("Please select from the menu below.".to_string());

    Reply::text(lines.join("\n"))
        .with_keyboard(Keyboard::Options(rows(profiles, 2, |p| p.label.clone())))
}

pub fn target_list(change: AccessChange, targets: &[Target]) -> Reply {
    let heading = match change {
        AccessChange::Revoke => "*Which user should be revoked?*",
        AccessChange::Unrevoke => "*Which user should be unrevoked?*",
    };
    let mut lines = vec![heading.to_string()];
    lines.extend(targets.iter().map(|t| format!("*{}*) {}", t.ordinal, t.display_name)));

    Reply::text(lines.join("\n"))
        .with_keyboard(Keyboard::Options(rows(targets, 2, |t| t.display_name.clone())))
}

pub fn no_targets(change: AccessChange) -> Reply {
    let text = match change {
        AccessChange::Revoke => "There are no allowed users to revoke.",
        AccessChange::Unrevoke => "There are no revoked users to unrevoke.",
    };
    Reply::text(text).with_keyboard(Keyboard::Remove)
}

pub fn confirm_prompt(change: AccessChange, display_name: &str) -> Reply {
    let verb = match change {
        AccessChange::Revoke => "revoke",
        AccessChange::Unrevoke => "unrevoke",
    };
    Reply::text(format!("Are you sure you want to {verb} access for *{display_name}*?"))
        .with_keyboard(Keyboard::Options(vec![
            vec!["NO".to_string()],
            vec!["yes".to_string()],
        ]))
}

pub fn access_changed(change: AccessChange, display_name: &str) -> Reply {
    Reply::text(format!("*{display_name}* has been {}.", change.verb()))
        .with_keyboard(Keyboard::Remove)
}

pub fn access_unchanged(change: AccessChange, display_name: &str) -> Reply {
    Reply::text(format!("*{display_name}* was NOT {}.", change.verb()))
        .with_keyboard(Keyboard::Remove)
}

pub fn title_added(candidate: &Candidate) -> Reply {
    let reply = match &candidate.thumbnail_url {
        Some(thumb) => Reply::text(format!("[Movie added!]({thumb})")).with_preview(),
        None => Reply::text(format!("Movie added: *{}*", candidate.display_label)),
    };
    reply.with_keyboard(Keyboard::Remove)
}

pub fn cleared() -> Reply {
    Reply::text("All previously sent commands have been cleared.").with_keyboard(Keyboard::Remove)
}

pub fn greeting(user: &User) -> Reply {
    Reply::text(format!(
        "Hello {}, use /q to search for a movie and /help for the list of commands.",
        user.display_name
    ))
}

pub fn help(is_owner: bool) -> Reply {
    let mut lines = vec![
        "*Commands:*",
        "/q `[movie]` search for a movie",
        "/library `[filter]` list tracked movies",
        "/clear clear the current conversation",
        "/auth `[password]` authorize yourself",
    ];
    if is_owner {
        lines.extend([
            "",
            "*Admin commands:*",
            "/wanted search for all wanted movies",
            "/users list allowed users",
            "/revoke revoke a user",
            "/unrevoke restore a revoked user",
        ]);
    }
    Reply::text(lines.join("\n"))
}

pub fn authorized() -> Reply {
    Reply::text("You are now authorized to use this bot.\nType /help for the list of commands.")
}

pub fn owner_setup(user_id: UserId) -> Reply {
    Reply::text(format!(
        "You are the first user of this bot. Set `BOT_OWNER={user_id}` and restart to become its owner."
    ))
}

pub fn access_granted_notice(entry: &AclEntry) -> Reply {
    Reply::text(format!(
        "*{}* (`{}`) has been granted access.",
        entry.display_name, entry.id
    ))
}

pub fn users_list(users: &[AclEntry]) -> Reply {
    if users.is_empty() {
        return Reply::text("There are no allowed users.");
    }
    let mut lines = vec!["*Allowed users:*".to_string()];
    lines.extend(
        users
            .iter()
            .enumerate()
            .map(|(i, u)| format!("*{}*) {} (`{}`)", i + 1, u.display_name, u.id)),
    );
    Reply::text(lines.join("\n"))
}

/// Sorted, filtered library listing split into messages of [`LIBRARY_CHUNK`] titles
pub fn library(titles: &[TrackedTitle], filter: Option<&str>) -> Option<Vec<Reply>> {
    let needle = filter.map(str::to_lowercase);
    let mut matching: Vec<&TrackedTitle> = titles
        .iter()
        .filter(|t| {
            needle
                .as_deref()
                .map_or(true, |n| t.title.to_lowercase().contains(n))
        })
        .collect();
    if matching.is_empty() {
        return None;
    }
    matching.sort_by_key(|t| t.title.to_lowercase());

    Some(
        matching
            .chunks(LIBRARY_CHUNK)
            .map(|chunk| {
                let lines: Vec<String> = chunk
                    .iter()
                    .map(|t| match t.link() {
                        Some(link) => format!("[{}]({link})", t.title),
                        None => t.title.clone(),
                    })
                    .collect();
                Reply::text(lines.join("\n"))
            })
            .collect(),
    )
}

pub fn full_search_started() -> Reply {
    Reply::text("Starting full search for all wanted movies.")
}
