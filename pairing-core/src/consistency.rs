use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::derangement::count_violations;
use crate::model::{Edge, Pairing, Participant, ParticipantId};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsistencyReport {
    pub total_pairings: usize,
    pub self_pairings: usize,
    /// Givers with more than one receiver, and how many they have.
    pub duplicate_givers: BTreeMap<ParticipantId, usize>,
    pub unpaired_givers: Vec<ParticipantId>,
    pub unpaired_receivers: Vec<ParticipantId>,
    pub same_bucket: usize,
    pub unknown_ids: Vec<ParticipantId>,
}

impl ConsistencyReport {
    pub fn is_clean(&self) -> bool {
        self.self_pairings == 0
            && self.duplicate_givers.is_empty()
            && self.unpaired_givers.is_empty()
            && self.unpaired_receivers.is_empty()
            && self.unknown_ids.is_empty()
    }
}

pub fn consistency_report(pairings: &[Pairing], participants: &[Participant]) -> ConsistencyReport {
    let pool: HashSet<&str> = participants.iter().map(|p| p.id.as_str()).collect();

    let mut outgoing: BTreeMap<ParticipantId, usize> = BTreeMap::new();
    let mut receivers: HashSet<&str> = HashSet::new();
    let mut unknown: BTreeSet<ParticipantId> = BTreeSet::new();
    for pairing in pairings {
        *outgoing.entry(pairing.giver_id.clone()).or_insert(0) += 1;
        receivers.insert(pairing.receiver_id.as_str());
        for id in [&pairing.giver_id, &pairing.receiver_id] {
            if !pool.contains(id.as_str()) {
                unknown.insert(id.clone());
            }
        }
    }

    let unpaired_givers = participants
        .iter()
        .filter(|p| !outgoing.contains_key(&p.id))
        .map(|p| p.id.clone())
        .collect();
    let unpaired_receivers = participants
        .iter()
        .filter(|p| !receivers.contains(p.id.as_str()))
        .map(|p| p.id.clone())
        .collect();
    let edges: Vec<Edge> = pairings
        .iter()
        .map(|p| Edge {
            giver_id: p.giver_id.clone(),
            receiver_id: p.receiver_id.clone(),
        })
        .collect();

    ConsistencyReport {
        total_pairings: pairings.len(),
        self_pairings: pairings
            .iter()
            .filter(|p| p.giver_id == p.receiver_id)
            .count(),
        duplicate_givers: outgoing.into_iter().filter(|(_, n)| *n > 1).collect(),
        unpaired_givers,
        unpaired_receivers,
        same_bucket: count_violations(&edges, participants),
        unknown_ids: unknown.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairing(giver: &str, receiver: &str) -> Pairing {
        Pairing {
            giver_id: giver.into(),
            receiver_id: receiver.into(),
            created_at: 0,
        }
    }

    fn pool() -> Vec<Participant> {
        vec![
            Participant::new("a", "X"),
            Participant::new("b", "Y"),
            Participant::new("c", "X"),
        ]
    }

    #[test]
    fn full_cycle_is_clean() {
        let rows = vec![pairing("a", "b"), pairing("b", "c"), pairing("c", "a")];
        let report = consistency_report(&rows, &pool());
        assert!(report.is_clean());
        assert_eq!(report.total_pairings, 3);
        assert_eq!(report.same_bucket, 1);
    }

    #[test]
    fn override_that_doubles_a_giver_is_reported() {
        // c -> a was replaced by b -> a, so b now gifts twice and c nobody.
        let rows = vec![pairing("a", "b"), pairing("b", "c"), pairing("b", "a")];
        let report = consistency_report(&rows, &pool());
        assert!(!report.is_clean());
        assert_eq!(report.duplicate_givers.get("b"), Some(&2));
        assert_eq!(report.unpaired_givers, vec!["c".to_string()]);
        assert!(report.unpaired_receivers.is_empty());
    }

    #[test]
    fn rows_for_departed_participants_are_flagged() {
        let rows = vec![pairing("a", "gone")];
        let report = consistency_report(&rows, &pool());
        assert_eq!(report.unknown_ids, vec!["gone".to_string()]);
        assert_eq!(
            report.unpaired_receivers,
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }
}
