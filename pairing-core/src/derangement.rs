use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::model::{Edge, Participant};

pub const DEFAULT_RETRY_BUDGET: usize = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    Legacy,
    BucketAware,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationOptions {
    pub mode: GenerationMode,
    pub retry_budget: usize,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            mode: GenerationMode::BucketAware,
            retry_budget: DEFAULT_RETRY_BUDGET,
        }
    }
}

impl GenerationOptions {
    pub fn legacy() -> Self {
        Self {
            mode: GenerationMode::Legacy,
            ..Self::default()
        }
    }

    fn attempt_limit(&self) -> usize {
        match self.mode {
            GenerationMode::Legacy => 1,
            GenerationMode::BucketAware => self.retry_budget.max(1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Derangement {
    pub edges: Vec<Edge>,
    pub violations: usize,
    pub attempts: usize,
}

/// Shuffles and links each participant to the next, wrapping around. In
/// bucket-aware mode the lowest-violation cycle within the budget wins.
pub fn generate<R: Rng + ?Sized>(
    participants: &[Participant],
    options: &GenerationOptions,
    rng: &mut R,
) -> Derangement {
    if participants.len() < 2 {
        return Derangement::default();
    }

    let limit = options.attempt_limit();
    let mut order: Vec<&Participant> = participants.iter().collect();
    let mut best: Option<(Vec<&Participant>, usize)> = None;
    let mut attempts = 0;

    while attempts < limit {
        attempts += 1;
        order.shuffle(rng);
        let violations = cycle_violations(&order);
        let improved = best
            .as_ref()
            .map_or(true, |(_, fewest)| violations < *fewest);
        if improved {
            best = Some((order.clone(), violations));
        }
        if violations == 0 {
            break;
        }
    }

    let (order, violations) = best.unwrap_or_default();
    Derangement {
        edges: link_cycle(&order),
        violations,
        attempts,
    }
}

/// Number of edges whose giver and receiver share a class. Ids missing from
/// `participants` are not counted.
pub fn count_violations(edges: &[Edge], participants: &[Participant]) -> usize {
    let buckets: HashMap<&str, &str> = participants
        .iter()
        .map(|p| (p.id.as_str(), p.bucket_key.as_str()))
        .collect();
    edges
        .iter()
        .filter(|edge| {
            match (
                buckets.get(edge.giver_id.as_str()),
                buckets.get(edge.receiver_id.as_str()),
            ) {
                (Some(giver), Some(receiver)) => giver == receiver,
                _ => false,
            }
        })
        .count()
}

fn cycle_violations(order: &[&Participant]) -> usize {
    order
        .iter()
        .zip(order.iter().cycle().skip(1))
        .filter(|(giver, receiver)| giver.bucket_key == receiver.bucket_key)
        .count()
}

fn link_cycle(order: &[&Participant]) -> Vec<Edge> {
    order
        .iter()
        .zip(order.iter().cycle().skip(1))
        .map(|(giver, receiver)| Edge {
            giver_id: giver.id.clone(),
            receiver_id: receiver.id.clone(),
        })
        .collect()
}
