//! Bot executor: gate, commands, transitions, effects

use super::traits::{Catalog, Messenger};
use super::Inbound;

use crate::acl::{AclRegistry, User};
use crate::catalog::{enabled_profiles, CatalogError};
use crate::error::BotError;
use crate::replies::{self, Reply};
use crate::router::{self, Access, Command, Route};
use crate::session::SessionStore;
use crate::state_machine::{
    transition, AccessChange, ConvContext, ConvState, Effect, Event, Target,
};
use std::sync::Arc;

/// Generic executor that can work with any messenger and catalog implementations
pub struct BotExecutor<M, C>
where
    M: Messenger + 'static,
    C: Catalog + 'static,
{
    messenger: Arc<M>,
    catalog: Arc<C>,
    acl: Arc<AclRegistry>,
    sessions: Arc<SessionStore>,
}

impl<M, C> BotExecutor<M, C>
where
    M: Messenger + 'static,
    C: Catalog + 'static,
{
    pub fn new(
        messenger: Arc<M>,
        catalog: Arc<C>,
        acl: Arc<AclRegistry>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            messenger,
            catalog,
            acl,
            sessions,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn acl(&self) -> &Arc<AclRegistry> {
        &self.acl
    }

    /// Handle one inbound message; every failure becomes exactly one reply
    pub async fn handle(&self, inbound: Inbound) {
        let Inbound { user, text } = inbound;
        let route = router::classify(&text);

        if let Err(e) = self.process(&user, route).await {
            tracing::warn!(user_id = %user.id, error = %e, "Request failed");
            if matches!(e, BotError::UpstreamUnavailable(_)) {
                self.sessions.clear_user(user.id);
            }
            if let Err(send_err) = self.send(&user, &Reply::error(&e)).await {
                tracing::error!(user_id = %user.id, error = %send_err, "Failed to send error reply");
            }
        }
    }

    async fn process(&self, user: &User, route: Route) -> Result<(), BotError> {
        let state = self.sessions.snapshot(user.id).state;
        self.check_access(user, route.access(&state))?;

        if let Some(rejection) = route.rejection() {
            return Err(rejection);
        }
        match route {
            Route::Command(command) => self.run_command(user, command).await,
            Route::FreeText(text) => self.drive(user, Event::Text { text }).await,
            Route::Usage(_) | Route::Unknown(_) => Ok(()),
        }
    }

    fn check_access(&self, user: &User, required: Access) -> Result<(), BotError> {
        let granted = match required {
            Access::Anyone => true,
            Access::Allowed => self.acl.is_allowed(user.id),
            Access::Owner => self.acl.is_owner(user.id),
        };
        if granted {
            return Ok(());
        }

        tracing::info!(user_id = %user.id, name = %user.display_name, ?required, "Access denied");
        if required == Access::Owner && self.acl.is_allowed(user.id) {
            Err(BotError::AdminOnly)
        } else {
            Err(BotError::NotAuthorized)
        }
    }

    async fn run_command(&self, user: &User, command: Command) -> Result<(), BotError> {
        tracing::info!(user_id = %user.id, command = command.name(), "Command received");

        match command {
            Command::Start => self.send(user, &replies::greeting(user)).await,
            Command::Help => {
                self.send(user, &replies::help(self.acl.is_owner(user.id)))
                    .await
            }
            Command::Search { query } => self.drive(user, Event::Search { query }).await,
            Command::Clear => self.drive(user, Event::Clear).await,
            Command::Library { filter } => {
                let result = self.send_library(user, filter.as_deref()).await;
                self.sessions.clear_user(user.id);
                result
            }
            Command::Auth { password } => self.authorize(user, &password).await,
            Command::Wanted => {
                self.catalog.full_search().await?;
                self.send(user, &replies::full_search_started()).await
            }
            Command::Users => {
                self.send(user, &replies::users_list(&self.acl.allowed_users()))
                    .await
            }
            Command::Revoke => {
                let targets = Target::list(&self.acl.allowed_users(), self.acl.owner());
                self.drive(
                    user,
                    Event::BeginAccessChange {
                        change: AccessChange::Revoke,
                        targets,
                    },
                )
                .await
            }
            Command::Unrevoke => {
                let targets = Target::list(&self.acl.revoked_users(), self.acl.owner());
                self.drive(
                    user,
                    Event::BeginAccessChange {
                        change: AccessChange::Unrevoke,
                        targets,
                    },
                )
                .await
            }
        }
    }

    async fn send_library(&self, user: &User, filter: Option<&str>) -> Result<(), BotError> {
        let titles = self.catalog.list_catalog().await?;
        let chunks = replies::library(&titles, filter).ok_or_else(|| {
            BotError::LibraryEmpty(filter.map_or_else(|| "any movies".to_string(), str::to_string))
        })?;
        for chunk in &chunks {
            self.send(user, chunk).await?;
        }
        Ok(())
    }

    async fn authorize(&self, user: &User, password: &str) -> Result<(), BotError> {
        let authorized = self.acl.authorize(user, password)?;
        self.send(user, &replies::authorized()).await?;

        if authorized.needs_owner_setup {
            self.send(user, &replies::owner_setup(user.id)).await?;
        }
        if let Some(owner) = self.acl.owner() {
            let owner = User::new(owner, "owner");
            let notice = replies::access_granted_notice(&authorized.entry);
            if let Err(e) = self.send(&owner, &notice).await {
                tracing::warn!(owner_id = %owner.id, error = %e, "Failed to notify owner");
            }
        }
        Ok(())
    }

    /// Run an event through the state machine, feeding events produced by
    /// effects back in until none remain
    async fn drive(&self, user: &User, event: Event) -> Result<(), BotError> {
        let mut state = self.sessions.snapshot(user.id).state;
        let mut events = vec![event];

        while let Some(event) = events.pop() {
            let context = ConvContext::new(user.clone(), self.sessions.snapshot(user.id));
            let result = match transition(&state, &context, event) {
                Ok(r) => r,
                Err(e) => {
                    if e.resets_flow() {
                        tracing::warn!(user_id = %user.id, state = state.name(), error = %e, "Flow abandoned");
                        self.sessions.clear_user(user.id);
                    }
                    return Err(e.into());
                }
            };

            if result.new_state != state {
                tracing::debug!(
                    user_id = %user.id,
                    from = state.name(),
                    to = result.new_state.name(),
                    "State transition"
                );
            }
            state = result.new_state;

            for effect in result.effects {
                match self.execute_effect(user, &state, effect).await {
                    Ok(Some(generated)) => events.push(generated),
                    Ok(None) => {}
                    Err(e) => {
                        self.sessions.clear_user(user.id);
                        return Err(e);
                    }
                }
            }
        }

        Ok(())
    }

    async fn execute_effect(
        &self,
        user: &User,
        state: &ConvState,
        effect: Effect,
    ) -> Result<Option<Event>, BotError> {
        match effect {
            Effect::Reply(reply) => {
                self.send(user, &reply).await?;
                Ok(None)
            }

            Effect::PersistState => {
                self.sessions.set_state(user.id, state);
                Ok(None)
            }

            Effect::Remember(value) => {
                self.sessions.set(user.id, value);
                Ok(None)
            }

            Effect::ClearSession => {
                self.sessions.clear_user(user.id);
                Ok(None)
            }

            Effect::SearchCatalog { query } => {
                tracing::info!(user_id = %user.id, %query, "Searching catalog");
                let event = match self.catalog.search_titles(&query).await {
                    Ok(outcome) => Event::SearchCompleted { query, outcome },
                    Err(e) => upstream_failed(user, &e),
                };
                Ok(Some(event))
            }

            Effect::CheckLibrary { candidate } => {
                let event = match self.catalog.list_catalog().await {
                    Ok(titles) => Event::LibraryChecked {
                        ordinal: candidate.ordinal,
                        tracked: titles.iter().any(|t| t.matches(&candidate.external_id)),
                    },
                    Err(e) => upstream_failed(user, &e),
                };
                Ok(Some(event))
            }

            Effect::FetchProfiles => {
                let event = match self.catalog.list_profiles().await {
                    Ok(remote) => Event::ProfilesFetched {
                        profiles: enabled_profiles(remote),
                    },
                    Err(e) => upstream_failed(user, &e),
                };
                Ok(Some(event))
            }

            Effect::AddTitle { candidate, profile } => {
                let added = self
                    .catalog
                    .add_title(&candidate.external_id, &candidate.title, &profile.handle)
                    .await;
                let event = match added {
                    Ok(()) => {
                        tracing::info!(
                            user_id = %user.id,
                            title = %candidate.title,
                            profile = %profile.label,
                            "Title added"
                        );
                        Event::TitleAdded { candidate }
                    }
                    Err(e) => upstream_failed(user, &e),
                };
                Ok(Some(event))
            }

            Effect::ChangeAccess { change, target } => {
                let result = match change {
                    AccessChange::Revoke => self.acl.revoke(target.user_id),
                    AccessChange::Unrevoke => self.acl.unrevoke(target.user_id),
                };
                tracing::info!(
                    user_id = %user.id,
                    target_id = %target.user_id,
                    change = change.verb(),
                    ok = result.is_ok(),
                    "Access change"
                );
                Ok(Some(Event::AccessChanged {
                    change,
                    display_name: target.display_name,
                    result: result.map(|_| ()),
                }))
            }
        }
    }

    async fn send(&self, user: &User, reply: &Reply) -> Result<(), BotError> {
        self.messenger
            .send_message(user.id, reply)
            .await
            .map_err(BotError::from)
    }
}

fn upstream_failed(user: &User, err: &CatalogError) -> Event {
    tracing::warn!(user_id = %user.id, kind = ?err.kind, error = %err, "Catalog request failed");
    Event::UpstreamFailed {
        message: err.to_string(),
    }
}
