//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::transition::*;
use super::*;
use crate::acl::{AclError, User};
use crate::catalog::{Candidate, CandidateSource, Profile, SearchOutcome};
use crate::session::{SessionSnapshot, SessionValue};
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_state() -> impl Strategy<Value = ConvState> {
    prop_oneof![
        Just(ConvState::Idle),
        Just(ConvState::AwaitingMovieSelection),
        Just(ConvState::AwaitingProfileSelection),
        Just(ConvState::AwaitingRevokeTarget),
        Just(ConvState::AwaitingRevokeConfirm),
        Just(ConvState::AwaitingUnrevokeTarget),
        Just(ConvState::AwaitingUnrevokeConfirm),
    ]
}

fn arb_change() -> impl Strategy<Value = AccessChange> {
    prop_oneof![Just(AccessChange::Revoke), Just(AccessChange::Unrevoke)]
}

fn arb_candidate() -> impl Strategy<Value = Candidate> {
    (1usize..5, "[A-Za-z ]{1,12}", proptest::option::of(1950u32..2030)).prop_map(
        |(ordinal, title, year)| Candidate {
            ordinal,
            display_label: Candidate::label_for(&title, year),
            title,
            year,
            rating: None,
            runtime: None,
            external_id: format!("tt{ordinal}"),
            thumbnail_url: None,
            source: CandidateSource::Imdb,
        },
    )
}

fn arb_profile() -> impl Strategy<Value = Profile> {
    (1usize..5, "[A-Za-z]{1,8}").prop_map(|(ordinal, label)| Profile {
        ordinal,
        handle: label.to_lowercase(),
        label,
    })
}

fn arb_target() -> impl Strategy<Value = Target> {
    (1usize..5, 1i64..100, "[a-z]{1,8}").prop_map(|(ordinal, user_id, display_name)| Target {
        ordinal,
        user_id,
        display_name,
    })
}

fn arb_acl_result() -> impl Strategy<Value = Result<(), AclError>> {
    prop_oneof![
        Just(Ok(())),
        Just(Err(AclError::OwnerProtected)),
        (1i64..100).prop_map(|id| Err(AclError::NotFound(id))),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        "[a-zA-Z -]{0,20}".prop_map(|text| Event::Text { text }),
        "[a-z ]{1,20}".prop_map(|query| Event::Search { query }),
        (arb_change(), prop::collection::vec(arb_target(), 0..4))
            .prop_map(|(change, targets)| Event::BeginAccessChange { change, targets }),
        Just(Event::Clear),
        ("[a-z]{1,10}", prop::collection::vec(arb_candidate(), 0..4)).prop_map(
            |(query, list)| Event::SearchCompleted {
                query,
                outcome: if list.is_empty() {
                    SearchOutcome::NotFound
                } else {
                    SearchOutcome::Found(list)
                },
            }
        ),
        (1usize..5, any::<bool>())
            .prop_map(|(ordinal, tracked)| Event::LibraryChecked { ordinal, tracked }),
        prop::collection::vec(arb_profile(), 0..4)
            .prop_map(|profiles| Event::ProfilesFetched { profiles }),
        arb_candidate().prop_map(|candidate| Event::TitleAdded { candidate }),
        "[a-z ]{1,20}".prop_map(|message| Event::UpstreamFailed { message }),
        (arb_change(), "[a-z]{1,8}", arb_acl_result()).prop_map(
            |(change, display_name, result)| Event::AccessChanged {
                change,
                display_name,
                result,
            }
        ),
    ]
}

fn arb_session() -> impl Strategy<Value = SessionSnapshot> {
    (
        proptest::option::of(prop::collection::vec(arb_candidate(), 1..4)),
        proptest::option::of(1usize..5),
        proptest::option::of(prop::collection::vec(arb_profile(), 1..4)),
        proptest::option::of(prop::collection::vec(arb_target(), 1..4)),
        proptest::option::of("[a-z]{1,8}"),
    )
        .prop_map(|(candidates, selected, profiles, targets, pending)| {
            let mut session = SessionSnapshot::default();
            if let Some(list) = candidates {
                session = session.with(SessionValue::Candidates(list));
            }
            if let Some(ordinal) = selected {
                session = session.with(SessionValue::SelectedCandidate(ordinal));
            }
            if let Some(list) = profiles {
                session = session.with(SessionValue::Profiles(list));
            }
            if let Some(list) = targets {
                session = session.with(SessionValue::Targets(list));
            }
            if let Some(name) = pending {
                session = session.with(SessionValue::PendingTarget(name));
            }
            session
        })
}

fn context(session: SessionSnapshot) -> ConvContext {
    ConvContext::new(User::new(1, "tester"), session)
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn transition_never_panics(state in arb_state(), session in arb_session(), event in arb_event()) {
        let _ = transition(&state, &context(session), event);
    }

    #[test]
    fn clear_always_returns_to_idle(state in arb_state(), session in arb_session()) {
        let result = transition(&state, &context(session), Event::Clear).unwrap();
        prop_assert_eq!(result.new_state, ConvState::Idle);
        prop_assert!(result.effects.iter().any(|e| matches!(e, Effect::ClearSession)));
    }

    #[test]
    fn idle_free_text_is_no_active_flow(session in arb_session(), text in "[a-zA-Z ]{0,20}") {
        let result = transition(&ConvState::Idle, &context(session), Event::Text { text });
        prop_assert_eq!(result.unwrap_err(), FlowError::NoActiveFlow);
    }

    #[test]
    fn state_changes_are_persisted(state in arb_state(), session in arb_session(), event in arb_event()) {
        if let Ok(result) = transition(&state, &context(session), event) {
            if result.new_state != state {
                prop_assert!(result.effects.iter().any(|e| matches!(
                    e,
                    Effect::PersistState | Effect::ClearSession
                )));
            }
        }
    }

    #[test]
    fn upstream_failure_always_resets(state in arb_state(), session in arb_session(), message in "[a-z]{1,10}") {
        let result = transition(&state, &context(session), Event::UpstreamFailed { message }).unwrap();
        prop_assert_eq!(result.new_state, ConvState::Idle);
        prop_assert!(result.effects.iter().any(|e| matches!(e, Effect::Reply(r) if r.is_error())));
    }
}
