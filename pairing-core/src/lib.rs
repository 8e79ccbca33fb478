mod consistency;
mod derangement;
mod feasibility;
mod manual;
mod model;
mod pool;

pub use consistency::{consistency_report, ConsistencyReport};
pub use derangement::{
    count_violations, generate, Derangement, GenerationMode, GenerationOptions,
    DEFAULT_RETRY_BUDGET,
};
pub use feasibility::{analyze, FeasibilityPolicy, FeasibilityReport};
pub use manual::validate_override;
pub use model::{
    bucket_key_from_identifier, normalize_bucket_key, Edge, Pairing, Participant, ParticipantId,
    CLASS_PREFIX_LEN,
};
pub use pool::{bucketize, eligible_pool, Buckets};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PairingError {
    #[error("a participant cannot be their own secret santa")]
    SelfPairing,
    #[error("participant id required")]
    MissingParticipant,
    #[error("unknown participant: {0}")]
    UnknownParticipant(ParticipantId),
}
