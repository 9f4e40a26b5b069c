//! Durable ACL storage and the background persister

use super::AclSnapshot;
use crate::runtime::AclStore;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const MAX_SAVE_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum AclStoreError {
    #[error("ACL file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ACL file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// ACL stored as a single JSON document, overwritten wholesale on save
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AclStore for JsonFileStore {
    async fn load(&self) -> Result<AclSnapshot, AclStoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No ACL file yet, starting empty");
                Ok(AclSnapshot::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, snapshot: &AclSnapshot) -> Result<(), AclStoreError> {
        let json = serde_json::to_vec_pretty(snapshot)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write then rename so a crash never leaves a truncated file behind
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Start the persister task. Returns the sender to hand to
/// [`AclRegistry::with_persistence`](super::AclRegistry::with_persistence).
pub fn spawn_persister<S>(
    store: Arc<S>,
    retry_base: Duration,
) -> (mpsc::UnboundedSender<AclSnapshot>, JoinHandle<()>)
where
    S: AclStore + ?Sized + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(run_persister(store, rx, retry_base));
    (tx, handle)
}

/// Save snapshots as they arrive, always writing the newest one queued.
///
/// A failed save is retried with exponential backoff; after the last
/// attempt the error is logged and the in-memory ACL stays as it is.
pub async fn run_persister<S>(
    store: Arc<S>,
    mut rx: mpsc::UnboundedReceiver<AclSnapshot>,
    retry_base: Duration,
) where
    S: AclStore + ?Sized,
{
    while let Some(mut snapshot) = rx.recv().await {
        drain_newest(&mut rx, &mut snapshot);

        let mut attempt = 1;
        loop {
            match store.save(&snapshot).await {
                Ok(()) => {
                    tracing::info!(
                        allowed = snapshot.allowed_users.len(),
                        revoked = snapshot.revoked_users.len(),
                        "The access control list was updated"
                    );
                    break;
                }
                Err(e) if attempt < MAX_SAVE_ATTEMPTS => {
                    tracing::warn!(error = %e, attempt, "Failed to save ACL, retrying");
                    tokio::time::sleep(retry_delay(retry_base, attempt)).await;
                    drain_newest(&mut rx, &mut snapshot);
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        attempts = attempt,
                        "Giving up saving ACL, changes are only in memory"
                    );
                    break;
                }
            }
        }
    }
    tracing::info!("ACL persister stopped");
}

fn drain_newest(rx: &mut mpsc::UnboundedReceiver<AclSnapshot>, snapshot: &mut AclSnapshot) {
    while let Ok(newer) = rx.try_recv() {
        *snapshot = newer;
    }
}

fn retry_delay(base: Duration, attempt: u32) -> Duration {
    // Exponential backoff: base, 2*base, ...
    base * (1 << (attempt - 1))
}
