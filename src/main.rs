//! CouchPotato Telegram bot
//!
//! Lets authorized chat users search for movies and add them to a
//! CouchPotato instance through a per-user conversation state machine.

mod acl;
mod catalog;
mod config;
mod error;
mod replies;
mod router;
mod runtime;
mod session;
mod state_machine;
mod telegram;

use acl::store::{spawn_persister, JsonFileStore};
use acl::AclRegistry;
use catalog::CouchPotatoClient;
use config::BotConfig;
use runtime::{AclStore, BotExecutor, ProductionRuntime};
use session::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use telegram::TelegramClient;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const POLL_TIMEOUT_SECS: u64 = 30;
const ACL_RETRY_BASE: Duration = Duration::from_secs(1);
const MAX_POLL_BACKOFF: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "couchpotato_bot=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = BotConfig::from_env()?;
    let cancel = CancellationToken::new();

    // Access control
    let store = Arc::new(JsonFileStore::new(config.acl_path.clone()));
    let snapshot = store.load().await?;
    tracing::info!(
        path = %store.path().display(),
        allowed = snapshot.allowed_users.len(),
        revoked = snapshot.revoked_users.len(),
        "Loaded access control list"
    );
    let (persist_tx, persister) = spawn_persister(store, ACL_RETRY_BASE);
    let acl = Arc::new(
        AclRegistry::new(snapshot, config.owner, config.password.clone())
            .with_persistence(persist_tx),
    );
    if config.owner.is_none() {
        tracing::warn!("BOT_OWNER is not set; admin commands are disabled");
    }

    // Sessions
    let sessions = Arc::new(SessionStore::new(config.session_ttl));
    let sweeper = sessions.spawn_sweeper(config.sweep_interval, cancel.clone());

    // Upstream clients
    let telegram = Arc::new(TelegramClient::new(&config.telegram_token)?);
    let me = telegram.get_me().await?;
    tracing::info!(bot = %me.display_name(), "Connected to Telegram");

    let couchpotato = Arc::new(CouchPotatoClient::new(&config.couchpotato)?);

    let executor = BotExecutor::new(Arc::clone(&telegram), couchpotato, acl, sessions);
    let manager: ProductionRuntime = runtime::RuntimeManager::new(executor, cancel.clone());

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown requested");
                cancel.cancel();
            }
        });
    }

    poll_updates(&telegram, &manager, &cancel).await;

    // User tasks stop on cancellation; once they and the manager release the
    // registry, the persister drains and exits
    drop(manager);
    sweeper.await?;
    persister.await?;
    tracing::info!("Bot stopped");
    Ok(())
}

async fn poll_updates(
    telegram: &TelegramClient,
    manager: &ProductionRuntime,
    cancel: &CancellationToken,
) {
    let mut offset = 0;
    let mut backoff = Duration::from_secs(1);

    loop {
        let updates = tokio::select! {
            () = cancel.cancelled() => break,
            result = telegram.get_updates(offset, POLL_TIMEOUT_SECS) => result,
        };

        match updates {
            Ok(updates) => {
                backoff = Duration::from_secs(1);
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    if let Some(inbound) = update.into_inbound() {
                        manager.dispatch(inbound).await;
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, retry_in = ?backoff, "Polling for updates failed");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(backoff) => {}
                }
                backoff = (backoff * 2).min(MAX_POLL_BACKOFF);
            }
        }
    }
}
