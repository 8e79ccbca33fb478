use std::collections::HashSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use pairing_core::{
    analyze, bucketize, consistency_report, generate, validate_override, ConsistencyReport,
    FeasibilityReport, GenerationMode, GenerationOptions, Pairing, PairingError, ParticipantId,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::participants::{ParticipantSource, SourceError};
use crate::store::{PairingStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] PairingError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerateOutcome {
    pub count: usize,
    pub mode: GenerationMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violations: Option<usize>,
    pub attempts: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub at_risk: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManualPairRequest {
    /// Receiver.
    pub user_id: ParticipantId,
    /// Giver.
    pub secret_santa_id: ParticipantId,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManualPairOutcome {
    pub pairing: Pairing,
    pub replaced: Option<Pairing>,
    /// Receivers the giver now has; more than one after some overrides.
    pub giver_outgoing: usize,
}

#[derive(Clone)]
pub struct PairingEngine {
    source: Arc<dyn ParticipantSource>,
    store: Arc<dyn PairingStore>,
    config: EngineConfig,
    regeneration: Arc<Mutex<()>>,
}

impl PairingEngine {
    pub fn new(
        source: Arc<dyn ParticipantSource>,
        store: Arc<dyn PairingStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            source,
            store,
            config,
            regeneration: Arc::new(Mutex::new(())),
        }
    }

    pub async fn generate(
        &self,
        mode: GenerationMode,
        seed: Option<u64>,
    ) -> Result<GenerateOutcome, EngineError> {
        let _pairings_lock = self.regeneration.lock().await;
        let pool = self.source.load_eligible().await?;

        let at_risk = match mode {
            GenerationMode::Legacy => Vec::new(),
            GenerationMode::BucketAware => {
                let report = analyze(&bucketize(&pool), pool.len(), &self.config.feasibility);
                if !report.is_feasible() {
                    warn!(
                        at_risk = ?report.at_risk,
                        total = report.total,
                        "dominant classes, same-class pairs likely"
                    );
                }
                report.at_risk
            }
        };

        let options = GenerationOptions {
            mode,
            retry_budget: self.config.retry_budget,
        };
        let mut rng = seeded_rng(seed);
        let result = generate(&pool, &options, &mut rng);

        let created_at = now_millis();
        let rows = result
            .edges
            .into_iter()
            .map(|edge| Pairing::from_edge(edge, created_at))
            .collect();
        let count = self.store.replace_all(rows).await?;

        let (violations, warning) = match mode {
            GenerationMode::Legacy => (None, None),
            GenerationMode::BucketAware if result.violations > 0 => {
                warn!(
                    violations = result.violations,
                    attempts = result.attempts,
                    "same-class pairs remain after retry budget"
                );
                (
                    Some(result.violations),
                    Some(format!(
                        "{} pairing(s) share a class after {} attempt(s)",
                        result.violations, result.attempts
                    )),
                )
            }
            GenerationMode::BucketAware => (Some(0), None),
        };
        info!(?mode, count, attempts = result.attempts, "pairings regenerated");

        Ok(GenerateOutcome {
            count,
            mode,
            violations,
            attempts: result.attempts,
            at_risk,
            warning,
        })
    }

    pub async fn analyze(&self) -> Result<FeasibilityReport, EngineError> {
        let pool = self.source.load_eligible().await?;
        Ok(analyze(
            &bucketize(&pool),
            pool.len(),
            &self.config.feasibility,
        ))
    }

    pub async fn manual_pair(
        &self,
        request: ManualPairRequest,
    ) -> Result<ManualPairOutcome, EngineError> {
        let _pairings_lock = self.regeneration.lock().await;
        let known: HashSet<ParticipantId> = self
            .source
            .load_eligible()
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();
        validate_override(&request.user_id, &request.secret_santa_id, &known)?;

        let pairing = Pairing {
            giver_id: request.secret_santa_id.trim().to_string(),
            receiver_id: request.user_id.trim().to_string(),
            created_at: now_millis(),
        };
        let replaced = self.store.override_receiver(pairing.clone()).await?;
        let giver_outgoing = self.store.assignments_for(&pairing.giver_id).await?.len();
        if giver_outgoing > 1 {
            warn!(
                giver = %pairing.giver_id,
                receivers = giver_outgoing,
                "manual pairing left giver with several receivers"
            );
        }
        info!(
            giver = %pairing.giver_id,
            receiver = %pairing.receiver_id,
            superseded = replaced.is_some(),
            "manual pairing stored"
        );

        Ok(ManualPairOutcome {
            pairing,
            replaced,
            giver_outgoing,
        })
    }

    pub async fn reset_all(&self) -> Result<(), EngineError> {
        let _pairings_lock = self.regeneration.lock().await;
        self.store.reset_all().await?;
        info!("pairings reset");
        Ok(())
    }

    pub async fn pairings(&self) -> Result<Vec<Pairing>, EngineError> {
        Ok(self.store.list().await?)
    }

    pub async fn assignments_for(&self, giver_id: &str) -> Result<Vec<Pairing>, EngineError> {
        Ok(self.store.assignments_for(giver_id).await?)
    }

    pub async fn consistency(&self) -> Result<ConsistencyReport, EngineError> {
        let pool = self.source.load_eligible().await?;
        let rows = self.store.list().await?;
        Ok(consistency_report(&rows, &pool))
    }
}

fn seeded_rng(seed: Option<u64>) -> ChaCha8Rng {
    seed.map(ChaCha8Rng::seed_from_u64)
        .unwrap_or_else(ChaCha8Rng::from_entropy)
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
