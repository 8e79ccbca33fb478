use serde::{Deserialize, Serialize};

pub type ParticipantId = String;

/// Leading characters of a student id that name the class, e.g. `10A`.
pub const CLASS_PREFIX_LEN: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    pub id: ParticipantId,
    /// Class or section. Blank means "derive from the id".
    #[serde(default)]
    pub bucket_key: String,
    #[serde(default = "default_eligible")]
    pub eligible: bool,
}

fn default_eligible() -> bool {
    true
}

impl Participant {
    pub fn new(id: impl Into<ParticipantId>, bucket_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            bucket_key: bucket_key.into(),
            eligible: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Edge {
    pub giver_id: ParticipantId,
    pub receiver_id: ParticipantId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pairing {
    pub giver_id: ParticipantId,
    pub receiver_id: ParticipantId,
    // unix millis
    pub created_at: u64,
}

impl Pairing {
    pub fn from_edge(edge: Edge, created_at: u64) -> Self {
        Self {
            giver_id: edge.giver_id,
            receiver_id: edge.receiver_id,
            created_at,
        }
    }
}

/// Derives a class code from the leading characters of an identifier,
/// e.g. `"10a-042"` with a prefix of 3 becomes `"10A"`.
pub fn bucket_key_from_identifier(identifier: &str, prefix_len: usize) -> String {
    let prefix: String = identifier.trim().chars().take(prefix_len).collect();
    normalize_bucket_key(&prefix)
}

/// Canonical form of a class code, so `"10a"` and `"10A "` compare equal.
pub fn normalize_bucket_key(raw: &str) -> String {
    raw.trim().to_uppercase()
}
