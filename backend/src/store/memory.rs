use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use pairing_core::Pairing;
use tokio::sync::RwLock;
use tracing::debug;

use super::{PairingStore, StoreError};

/// Mutations apply to a copy that is written out before it is swapped in.
#[derive(Clone, Default)]
pub struct MemoryPairingStore {
    rows: Arc<RwLock<Vec<Pairing>>>,
    persist_path: Option<PathBuf>,
}

impl MemoryPairingStore {
    pub async fn with_persistence(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let rows = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let saved: Vec<Pairing> = serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::Corrupt(format!("{}: {e}", path.display())))?;
                debug!(rows = saved.len(), path = %path.display(), "loaded pairing snapshot");
                saved
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(StoreError::persistence("load snapshot", err)),
        };
        Ok(Self {
            rows: Arc::new(RwLock::new(rows)),
            persist_path: Some(path),
        })
    }

    async fn persist(&self, op: &'static str, rows: &[Pairing]) -> Result<(), StoreError> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(rows).map_err(|e| StoreError::persistence(op, e))?;
        let staging = path.with_extension("tmp");
        tokio::fs::write(&staging, json)
            .await
            .map_err(|e| StoreError::persistence(op, e))?;
        tokio::fs::rename(&staging, path)
            .await
            .map_err(|e| StoreError::persistence(op, e))
    }

    async fn commit<T, F>(&self, op: &'static str, apply: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Vec<Pairing>) -> T + Send,
        T: Send,
    {
        let mut rows = self.rows.write().await;
        let mut next = rows.clone();
        let out = apply(&mut next);
        self.persist(op, &next).await?;
        *rows = next;
        Ok(out)
    }
}

#[async_trait]
impl PairingStore for MemoryPairingStore {
    async fn replace_all(&self, pairings: Vec<Pairing>) -> Result<usize, StoreError> {
        let count = pairings.len();
        self.commit("replace_all", move |rows| *rows = pairings).await?;
        Ok(count)
    }

    async fn reset_all(&self) -> Result<(), StoreError> {
        self.commit("reset_all", |rows| rows.clear()).await
    }

    async fn override_receiver(&self, pairing: Pairing) -> Result<Option<Pairing>, StoreError> {
        self.commit("override_receiver", move |rows| {
            let replaced = rows
                .iter()
                .position(|row| row.receiver_id == pairing.receiver_id)
                .map(|index| rows.remove(index));
            rows.push(pairing);
            replaced
        })
        .await
    }

    async fn list(&self) -> Result<Vec<Pairing>, StoreError> {
        Ok(self.rows.read().await.clone())
    }

    async fn assignments_for(&self, giver_id: &str) -> Result<Vec<Pairing>, StoreError> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .filter(|row| row.giver_id == giver_id)
            .cloned()
            .collect())
    }
}
