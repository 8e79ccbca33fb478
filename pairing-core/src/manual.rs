use std::collections::HashSet;

use crate::model::ParticipantId;
use crate::PairingError;

/// `user_id` receives, `secret_santa_id` gives. Does not look at whether the
/// giver already gifts someone else.
pub fn validate_override(
    user_id: &str,
    secret_santa_id: &str,
    known_ids: &HashSet<ParticipantId>,
) -> Result<(), PairingError> {
    let user_id = user_id.trim();
    let secret_santa_id = secret_santa_id.trim();
    if user_id.is_empty() || secret_santa_id.is_empty() {
        return Err(PairingError::MissingParticipant);
    }
    if user_id == secret_santa_id {
        return Err(PairingError::SelfPairing);
    }
    for id in [user_id, secret_santa_id] {
        if !known_ids.contains(id) {
            return Err(PairingError::UnknownParticipant(id.to_string()));
        }
    }
    Ok(())
}
