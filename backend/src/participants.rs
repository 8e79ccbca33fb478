use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use pairing_core::{eligible_pool, Participant};
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("participant source unavailable: {0}")]
    Unavailable(String),
    #[error("participant roster malformed: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait ParticipantSource: Send + Sync {
    async fn load_eligible(&self) -> Result<Vec<Participant>, SourceError>;
}

#[derive(Clone, Default)]
pub struct StaticParticipantSource {
    roster: Arc<RwLock<Vec<Participant>>>,
}

impl StaticParticipantSource {
    pub fn new(roster: Vec<Participant>) -> Self {
        Self {
            roster: Arc::new(RwLock::new(roster)),
        }
    }

    pub async fn replace(&self, roster: Vec<Participant>) {
        *self.roster.write().await = roster;
    }
}

#[async_trait]
impl ParticipantSource for StaticParticipantSource {
    async fn load_eligible(&self) -> Result<Vec<Participant>, SourceError> {
        Ok(eligible_pool(self.roster.read().await.clone()))
    }
}

#[derive(Clone, Debug)]
pub struct FileParticipantSource {
    path: PathBuf,
}

impl FileParticipantSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ParticipantSource for FileParticipantSource {
    async fn load_eligible(&self) -> Result<Vec<Participant>, SourceError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| SourceError::Unavailable(format!("{}: {e}", self.path.display())))?;
        let roster: Vec<Participant> =
            serde_json::from_slice(&bytes).map_err(|e| SourceError::Malformed(e.to_string()))?;
        Ok(eligible_pool(roster))
    }
}
