use std::collections::BTreeMap;

use crate::model::{
    bucket_key_from_identifier, normalize_bucket_key, Participant, ParticipantId, CLASS_PREFIX_LEN,
};

pub type Buckets = BTreeMap<String, Vec<ParticipantId>>;

/// Drops banned or opted-out participants, preserving order. Every
/// `bucket_key` is trimmed and uppercased; a blank one is filled from the
/// id's class prefix.
pub fn eligible_pool(participants: Vec<Participant>) -> Vec<Participant> {
    participants
        .into_iter()
        .filter(|p| p.eligible)
        .map(|mut p| {
            p.bucket_key = if p.bucket_key.trim().is_empty() {
                bucket_key_from_identifier(&p.id, CLASS_PREFIX_LEN)
            } else {
                normalize_bucket_key(&p.bucket_key)
            };
            p
        })
        .collect()
}

pub fn bucketize(participants: &[Participant]) -> Buckets {
    let mut buckets = Buckets::new();
    for participant in participants {
        buckets
            .entry(participant.bucket_key.clone())
            .or_default()
            .push(participant.id.clone());
    }
    buckets
}
