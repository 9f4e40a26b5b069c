//! Pure state transition function

use super::{AccessChange, ConvContext, ConvState, Effect, Event, Target};
use crate::catalog::SearchOutcome;
use crate::error::BotError;
use crate::replies::{self, Reply};
use crate::session::SessionValue;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConvState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConvState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    /// Back to `Idle` with the session cleared and one reply
    fn reset(reply: Reply) -> Self {
        Self::new(ConvState::Idle)
            .with_effect(Effect::ClearSession)
            .with_effect(Effect::Reply(reply))
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("There is no active command, type /help for the list of commands.")]
    NoActiveFlow,
    #[error("Could not find {0}, please select from the menu.")]
    UnknownSelection(String),
    #[error("Something went wrong, try searching again")]
    StaleSession,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

impl FlowError {
    /// Whether the user's flow is abandoned (session cleared, back to `Idle`)
    pub fn resets_flow(&self) -> bool {
        matches!(self, FlowError::StaleSession | FlowError::InvalidTransition(_))
    }
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs; all I/O is
/// expressed as effects.
pub fn transition(
    state: &ConvState,
    context: &ConvContext,
    event: Event,
) -> Result<TransitionResult, FlowError> {
    let session = &context.session;

    match (state, event) {
        // ============================================================
        // Any state
        // ============================================================
        (_, Event::Clear) => Ok(TransitionResult::reset(replies::cleared())),

        (_, Event::Search { query }) => Ok(TransitionResult::new(ConvState::Idle)
            .with_effect(Effect::ClearSession)
            .with_effect(Effect::SearchCatalog { query })),

        (_, Event::BeginAccessChange { change, targets }) => {
            if targets.is_empty() {
                return Ok(TransitionResult::reset(replies::no_targets(change)));
            }
            let reply = replies::target_list(change, &targets);
            Ok(TransitionResult::new(change.target_state())
                .with_effect(Effect::ClearSession)
                .with_effect(Effect::remember(SessionValue::Targets(targets)))
                .with_effect(Effect::PersistState)
                .with_effect(Effect::reply(reply)))
        }

        (_, Event::UpstreamFailed { message }) => Ok(TransitionResult::reset(Reply::error(
            &BotError::UpstreamUnavailable(message),
        ))),

        // ============================================================
        // Add-title flow
        // ============================================================
        (ConvState::Idle, Event::SearchCompleted { query, outcome }) => match outcome {
            SearchOutcome::NotFound => Ok(TransitionResult::reset(Reply::error(
                &BotError::TitleNotFound(query),
            ))),
            SearchOutcome::Found(candidates) => {
                let reply = replies::candidate_list(&candidates);
                Ok(TransitionResult::new(ConvState::AwaitingMovieSelection)
                    .with_effect(Effect::remember(SessionValue::Candidates(candidates)))
                    .with_effect(Effect::PersistState)
                    .with_effect(Effect::reply(reply)))
            }
        },

        (ConvState::AwaitingMovieSelection, Event::Text { text }) => {
            let candidates = session.candidates.as_ref().ok_or(FlowError::StaleSession)?;
            let candidate = candidates
                .iter()
                .find(|c| c.display_label == text)
                .ok_or(FlowError::UnknownSelection(text))?;
            Ok(TransitionResult::new(ConvState::AwaitingMovieSelection).with_effect(
                Effect::CheckLibrary {
                    candidate: candidate.clone(),
                },
            ))
        }

        (ConvState::AwaitingMovieSelection, Event::LibraryChecked { ordinal, tracked }) => {
            if tracked {
                return Ok(TransitionResult::reset(Reply::error(&BotError::AlreadyTracked)));
            }
            Ok(TransitionResult::new(ConvState::AwaitingMovieSelection)
                .with_effect(Effect::remember(SessionValue::SelectedCandidate(ordinal)))
                .with_effect(Effect::FetchProfiles))
        }

        (ConvState::AwaitingMovieSelection, Event::ProfilesFetched { profiles }) => {
            if profiles.is_empty() {
                return Ok(TransitionResult::reset(Reply::error(&BotError::NoProfiles)));
            }
            let reply = replies::profile_list(&profiles);
            Ok(TransitionResult::new(ConvState::AwaitingProfileSelection)
                .with_effect(Effect::remember(SessionValue::Profiles(profiles)))
                .with_effect(Effect::PersistState)
                .with_effect(Effect::reply(reply)))
        }

        (ConvState::AwaitingProfileSelection, Event::Text { text }) => {
            let profiles = session.profiles.as_ref().ok_or(FlowError::StaleSession)?;
            let candidate = session.selected().ok_or(FlowError::StaleSession)?;
            let profile = profiles
                .iter()
                .find(|p| p.label == text)
                .ok_or(FlowError::UnknownSelection(text))?;
            Ok(
                TransitionResult::new(ConvState::AwaitingProfileSelection).with_effect(
                    Effect::AddTitle {
                        candidate: candidate.clone(),
                        profile: profile.clone(),
                    },
                ),
            )
        }

        (ConvState::AwaitingProfileSelection, Event::TitleAdded { candidate }) => {
            Ok(TransitionResult::reset(replies::title_added(&candidate)))
        }

        // ============================================================
        // Revoke / unrevoke flows
        // ============================================================
        (
            ConvState::AwaitingRevokeTarget | ConvState::AwaitingUnrevokeTarget,
            Event::Text { text },
        ) => {
            let change = change_for(state)?;
            let targets = session.targets.as_ref().ok_or(FlowError::StaleSession)?;
            let target = targets
                .iter()
                .find(|t| t.display_name == text)
                .ok_or(FlowError::UnknownSelection(text))?;
            let reply = replies::confirm_prompt(change, &target.display_name);
            Ok(TransitionResult::new(change.confirm_state())
                .with_effect(Effect::remember(SessionValue::PendingTarget(
                    target.display_name.clone(),
                )))
                .with_effect(Effect::PersistState)
                .with_effect(Effect::reply(reply)))
        }

        (
            ConvState::AwaitingRevokeConfirm | ConvState::AwaitingUnrevokeConfirm,
            Event::Text { text },
        ) => {
            let change = change_for(state)?;
            let target = pending_target(context)?;
            if !text.trim().eq_ignore_ascii_case("yes") {
                return Ok(TransitionResult::reset(replies::access_unchanged(
                    change,
                    &target.display_name,
                )));
            }
            Ok(TransitionResult::new(state.clone())
                .with_effect(Effect::ChangeAccess { change, target }))
        }

        (
            ConvState::AwaitingRevokeConfirm | ConvState::AwaitingUnrevokeConfirm,
            Event::AccessChanged {
                change,
                display_name,
                result,
            },
        ) => {
            let reply = match result {
                Ok(()) => replies::access_changed(change, &display_name),
                Err(e) => Reply::error(&BotError::from(e)),
            };
            Ok(TransitionResult::reset(reply))
        }

        // ============================================================
        // No flow
        // ============================================================
        (ConvState::Idle, Event::Text { .. }) => Err(FlowError::NoActiveFlow),

        (state, event) => Err(FlowError::InvalidTransition(format!(
            "No transition from {} with {}",
            state.name(),
            event_name(&event)
        ))),
    }
}

fn change_for(state: &ConvState) -> Result<AccessChange, FlowError> {
    match state {
        ConvState::AwaitingRevokeTarget | ConvState::AwaitingRevokeConfirm => {
            Ok(AccessChange::Revoke)
        }
        ConvState::AwaitingUnrevokeTarget | ConvState::AwaitingUnrevokeConfirm => {
            Ok(AccessChange::Unrevoke)
        }
        other => Err(FlowError::InvalidTransition(format!(
            "{} is not an access flow",
            other.name()
        ))),
    }
}

fn pending_target(context: &ConvContext) -> Result<Target, FlowError> {
    let name = context
        .session
        .pending_target
        .as_ref()
        .ok_or(FlowError::StaleSession)?;
    context
        .session
        .targets
        .as_ref()
        .and_then(|targets| targets.iter().find(|t| &t.display_name == name))
        .cloned()
        .ok_or(FlowError::StaleSession)
}

fn event_name(event: &Event) -> &'static str {
    match event {
        Event::Text { .. } => "text",
        Event::Search { .. } => "search",
        Event::BeginAccessChange { .. } => "begin_access_change",
        Event::Clear => "clear",
        Event::SearchCompleted { .. } => "search_completed",
        Event::LibraryChecked { .. } => "library_checked",
        Event::ProfilesFetched { .. } => "profiles_fetched",
        Event::TitleAdded { .. } => "title_added",
        Event::UpstreamFailed { .. } => "upstream_failed",
        Event::AccessChanged { .. } => "access_changed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::{AclError, User};
    use crate::catalog::{Candidate, CandidateSource, Profile};
    use crate::replies::Keyboard;
    use crate::session::SessionSnapshot;

    fn context(session: SessionSnapshot) -> ConvContext {
        ConvContext::new(User::new(7, "alice"), session)
    }

    fn candidate(ordinal: usize, title: &str) -> Candidate {
        Candidate {
            ordinal,
            title: title.to_string(),
            year: Some(2010),
            rating: None,
            runtime: None,
            external_id: format!("tt{ordinal}"),
            thumbnail_url: Some("http://img/poster.jpg".to_string()),
            source: CandidateSource::Imdb,
            display_label: Candidate::label_for(title, Some(2010)),
        }
    }

    fn profile(ordinal: usize, label: &str) -> Profile {
        Profile {
            ordinal,
            label: label.to_string(),
            handle: format!("p{ordinal}"),
        }
    }

    fn target(ordinal: usize, id: i64, name: &str) -> Target {
        Target {
            ordinal,
            user_id: id,
            display_name: name.to_string(),
        }
    }

    fn text(s: &str) -> Event {
        Event::Text {
            text: s.to_string(),
        }
    }

    fn reply_of(result: &TransitionResult) -> &Reply {
        result
            .effects
            .iter()
            .find_map(|e| match e {
                Effect::Reply(r) => Some(r),
                _ => None,
            })
            .expect("transition should reply")
    }

    fn clears_session(result: &TransitionResult) -> bool {
        result.effects.iter().any(|e| matches!(e, Effect::ClearSession))
    }

    #[test]
    fn search_clears_then_queries_catalog() {
        let result = transition(
            &ConvState::AwaitingProfileSelection,
            &context(SessionSnapshot::default()),
            Event::Search {
                query: "inception".to_string(),
            },
        )
        .unwrap();
        assert_eq!(result.new_state, ConvState::Idle);
        assert!(matches!(result.effects[0], Effect::ClearSession));
        assert!(matches!(&result.effects[1], Effect::SearchCatalog { query } if query == "inception"));
    }

    #[test]
    fn found_candidates_wait_for_selection() {
        let result = transition(
            &ConvState::Idle,
            &context(SessionSnapshot::default()),
            Event::SearchCompleted {
                query: "inception".to_string(),
                outcome: SearchOutcome::Found(vec![candidate(1, "Inception")]),
            },
        )
        .unwrap();
        assert_eq!(result.new_state, ConvState::AwaitingMovieSelection);
        assert!(result.effects.iter().any(|e| matches!(
            e,
            Effect::Remember(SessionValue::Candidates(list)) if list.len() == 1
        )));
        assert!(matches!(reply_of(&result).keyboard, Keyboard::Options(_)));
    }

    #[test]
    fn not_found_stays_idle() {
        let result = transition(
            &ConvState::Idle,
            &context(SessionSnapshot::default()),
            Event::SearchCompleted {
                query: "zzz".to_string(),
                outcome: SearchOutcome::NotFound,
            },
        )
        .unwrap();
        assert_eq!(result.new_state, ConvState::Idle);
        assert!(reply_of(&result).text.contains("Could not find zzz"));
    }

    #[test]
    fn movie_selection_checks_library() {
        let session = SessionSnapshot::default()
            .with(SessionValue::Candidates(vec![candidate(1, "Heat"), candidate(2, "Alien")]));
        let result = transition(
            &ConvState::AwaitingMovieSelection,
            &context(session),
            text("Alien - 2010"),
        )
        .unwrap();
        assert!(matches!(
            &result.effects[0],
            Effect::CheckLibrary { candidate } if candidate.ordinal == 2
        ));
    }

    #[test]
    fn unknown_movie_keeps_state() {
        let session = SessionSnapshot::default().with(SessionValue::Candidates(vec![candidate(1, "Heat")]));
        let err = transition(&ConvState::AwaitingMovieSelection, &context(session), text("Nope"))
            .unwrap_err();
        assert_eq!(err, FlowError::UnknownSelection("Nope".to_string()));
        assert!(!err.resets_flow());
    }

    #[test]
    fn missing_candidates_is_stale_session() {
        let err = transition(
            &ConvState::AwaitingMovieSelection,
            &context(SessionSnapshot::default()),
            text("Heat - 2010"),
        )
        .unwrap_err();
        assert_eq!(err, FlowError::StaleSession);
        assert!(err.resets_flow());
    }

    #[test]
    fn tracked_title_resets_flow() {
        let result = transition(
            &ConvState::AwaitingMovieSelection,
            &context(SessionSnapshot::default()),
            Event::LibraryChecked {
                ordinal: 1,
                tracked: true,
            },
        )
        .unwrap();
        assert_eq!(result.new_state, ConvState::Idle);
        assert!(clears_session(&result));
        assert!(reply_of(&result).text.contains("already being tracked"));
    }

    #[test]
    fn untracked_title_fetches_profiles() {
        let result = transition(
            &ConvState::AwaitingMovieSelection,
            &context(SessionSnapshot::default()),
            Event::LibraryChecked {
                ordinal: 3,
                tracked: false,
            },
        )
        .unwrap();
        assert!(matches!(
            result.effects[0],
            Effect::Remember(SessionValue::SelectedCandidate(3))
        ));
        assert!(matches!(result.effects[1], Effect::FetchProfiles));
    }

    #[test]
    fn no_enabled_profiles_resets_flow() {
        let result = transition(
            &ConvState::AwaitingMovieSelection,
            &context(SessionSnapshot::default()),
            Event::ProfilesFetched { profiles: vec![] },
        )
        .unwrap();
        assert_eq!(result.new_state, ConvState::Idle);
        assert!(reply_of(&result).is_error());
    }

    #[test]
    fn profile_selection_adds_selected_title() {
        let session = SessionSnapshot::default()
            .with(SessionValue::Candidates(vec![candidate(1, "Heat"), candidate(2, "Alien")]))
            .with(SessionValue::SelectedCandidate(2))
            .with(SessionValue::Profiles(vec![profile(1, "Best"), profile(2, "HD")]));
        let result = transition(&ConvState::AwaitingProfileSelection, &context(session), text("HD"))
            .unwrap();
        assert!(matches!(
            &result.effects[0],
            Effect::AddTitle { candidate, profile } if candidate.title == "Alien" && profile.handle == "p2"
        ));
    }

    #[test]
    fn title_added_confirms_and_resets() {
        let result = transition(
            &ConvState::AwaitingProfileSelection,
            &context(SessionSnapshot::default()),
            Event::TitleAdded {
                candidate: candidate(1, "Heat"),
            },
        )
        .unwrap();
        assert_eq!(result.new_state, ConvState::Idle);
        assert!(clears_session(&result));
        assert_eq!(reply_of(&result).text, "[Movie added!](http://img/poster.jpg)");
    }

    #[test]
    fn empty_targets_reply_without_entering_flow() {
        let result = transition(
            &ConvState::Idle,
            &context(SessionSnapshot::default()),
            Event::BeginAccessChange {
                change: AccessChange::Revoke,
                targets: vec![],
            },
        )
        .unwrap();
        assert_eq!(result.new_state, ConvState::Idle);
        assert!(reply_of(&result).text.contains("no allowed users"));
    }

    #[test]
    fn revoke_flow_confirms_before_changing_access() {
        let targets = vec![target(1, 10, "bob"), target(2, 11, "carol")];
        let result = transition(
            &ConvState::Idle,
            &context(SessionSnapshot::default()),
            Event::BeginAccessChange {
                change: AccessChange::Revoke,
                targets: targets.clone(),
            },
        )
        .unwrap();
        assert_eq!(result.new_state, ConvState::AwaitingRevokeTarget);

        let session = SessionSnapshot::default().with(SessionValue::Targets(targets));
        let result = transition(&ConvState::AwaitingRevokeTarget, &context(session.clone()), text("carol"))
            .unwrap();
        assert_eq!(result.new_state, ConvState::AwaitingRevokeConfirm);
        assert_eq!(
            reply_of(&result).keyboard,
            Keyboard::Options(vec![vec!["NO".to_string()], vec!["yes".to_string()]])
        );

        let session = session.with(SessionValue::PendingTarget("carol".to_string()));
        let result = transition(&ConvState::AwaitingRevokeConfirm, &context(session), text("YES"))
            .unwrap();
        assert!(matches!(
            &result.effects[0],
            Effect::ChangeAccess { change: AccessChange::Revoke, target } if target.user_id == 11
        ));
    }

    #[test]
    fn anything_but_yes_cancels() {
        let session = SessionSnapshot::default()
            .with(SessionValue::Targets(vec![target(1, 10, "bob")]))
            .with(SessionValue::PendingTarget("bob".to_string()));
        let result = transition(&ConvState::AwaitingUnrevokeConfirm, &context(session), text("NO"))
            .unwrap();
        assert_eq!(result.new_state, ConvState::Idle);
        assert!(clears_session(&result));
        assert_eq!(reply_of(&result).text, "*bob* was NOT unrevoked.");
        assert!(!result.effects.iter().any(|e| matches!(e, Effect::ChangeAccess { .. })));
    }

    #[test]
    fn access_change_failure_is_reported() {
        let result = transition(
            &ConvState::AwaitingRevokeConfirm,
            &context(SessionSnapshot::default()),
            Event::AccessChanged {
                change: AccessChange::Revoke,
                display_name: "bob".to_string(),
                result: Err(AclError::NotFound(10)),
            },
        )
        .unwrap();
        assert_eq!(result.new_state, ConvState::Idle);
        assert!(reply_of(&result).is_error());
    }

    #[test]
    fn free_text_when_idle_is_no_active_flow() {
        let err = transition(&ConvState::Idle, &context(SessionSnapshot::default()), text("hi"))
            .unwrap_err();
        assert_eq!(err, FlowError::NoActiveFlow);
    }

    #[test]
    fn unexpected_event_is_invalid_transition() {
        let err = transition(
            &ConvState::AwaitingRevokeTarget,
            &context(SessionSnapshot::default()),
            Event::TitleAdded {
                candidate: candidate(1, "Heat"),
            },
        )
        .unwrap_err();
        assert!(matches!(err, FlowError::InvalidTransition(_)));
        assert!(err.resets_flow());
    }

    #[test]
    fn upstream_failure_resets_any_state() {
        let result = transition(
            &ConvState::AwaitingProfileSelection,
            &context(SessionSnapshot::default()),
            Event::UpstreamFailed {
                message: "timeout".to_string(),
            },
        )
        .unwrap();
        assert_eq!(result.new_state, ConvState::Idle);
        assert!(clears_session(&result));
        assert!(reply_of(&result).text.contains("timeout"));
    }
}
