//! Runtime for executing per-user conversations
//!
//! Each user gets a lightweight task fed by a channel, so one user's
//! messages are handled strictly in arrival order while different users
//! proceed independently.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::BotExecutor;
pub use traits::*;

use crate::acl::{User, UserId};
use crate::catalog::CouchPotatoClient;
use crate::telegram::TelegramClient;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

/// Type alias for production runtime with concrete implementations
pub type ProductionRuntime = RuntimeManager<TelegramClient, CouchPotatoClient>;

const USER_QUEUE_DEPTH: usize = 32;
const USER_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

type UserChannels = Arc<RwLock<HashMap<UserId, mpsc::Sender<Inbound>>>>;

/// An inbound chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub user: User,
    pub text: String,
}

/// Manager for all per-user tasks
pub struct RuntimeManager<M, C>
where
    M: Messenger + 'static,
    C: Catalog + 'static,
{
    executor: Arc<BotExecutor<M, C>>,
    users: UserChannels,
    idle_timeout: Duration,
    cancel: CancellationToken,
}

impl<M, C> RuntimeManager<M, C>
where
    M: Messenger + 'static,
    C: Catalog + 'static,
{
    pub fn new(executor: BotExecutor<M, C>, cancel: CancellationToken) -> Self {
        Self {
            executor: Arc::new(executor),
            users: Arc::new(RwLock::new(HashMap::new())),
            idle_timeout: USER_IDLE_TIMEOUT,
            cancel,
        }
    }

    /// Stop a user's task after this long without messages
    #[must_use]
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Queue a message on its user's task, starting the task if needed.
    ///
    /// Never waits for queue capacity: a user whose queue is full has the
    /// message dropped so other users keep flowing.
    pub async fn dispatch(&self, inbound: Inbound) {
        let user_id = inbound.user.id;
        let tx = self.get_or_create(user_id).await;

        match tx.try_send(inbound) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(user_id = %user_id, "User queue full, dropping message");
            }
            Err(TrySendError::Closed(inbound)) => {
                // Task ended between lookup and send; start a fresh one and retry once
                let tx = self.get_or_create(user_id).await;
                if tx.try_send(inbound).is_err() {
                    tracing::error!(user_id = %user_id, "Dropping message, user task unavailable");
                }
            }
        }
    }

    /// Number of users with a running task
    pub async fn active_users(&self) -> usize {
        self.users.read().await.len()
    }

    async fn get_or_create(&self, user_id: UserId) -> mpsc::Sender<Inbound> {
        if let Some(tx) = self.users.read().await.get(&user_id) {
            if !tx.is_closed() {
                return tx.clone();
            }
        }

        let mut users = self.users.write().await;
        // Another dispatch may have created it while we waited for the lock
        if let Some(tx) = users.get(&user_id).filter(|tx| !tx.is_closed()) {
            return tx.clone();
        }

        let (tx, rx) = mpsc::channel(USER_QUEUE_DEPTH);
        tokio::spawn(run_user(
            user_id,
            Arc::clone(&self.executor),
            rx,
            Arc::clone(&self.users),
            self.idle_timeout,
            self.cancel.clone(),
        ));
        users.insert(user_id, tx.clone());
        tx
    }
}

async fn run_user<M, C>(
    user_id: UserId,
    executor: Arc<BotExecutor<M, C>>,
    mut rx: mpsc::Receiver<Inbound>,
    users: UserChannels,
    idle_timeout: Duration,
    cancel: CancellationToken,
) where
    M: Messenger + 'static,
    C: Catalog + 'static,
{
    tracing::debug!(user_id = %user_id, "Starting user task");
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            inbound = rx.recv() => match inbound {
                Some(inbound) => executor.handle(inbound).await,
                None => break,
            },
            () = tokio::time::sleep(idle_timeout) => {
                // Refuse new messages, then finish whatever was already queued
                rx.close();
                while let Some(inbound) = rx.recv().await {
                    executor.handle(inbound).await;
                }
                break;
            }
        }
    }
    drop(rx);

    // Only forget the channel if it is still ours; a replacement is open
    let mut users = users.write().await;
    if users.get(&user_id).is_some_and(mpsc::Sender::is_closed) {
        users.remove(&user_id);
    }
    tracing::debug!(user_id = %user_id, "User task stopped");
}
