use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::pool::Buckets;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeasibilityPolicy {
    /// A bucket holding more than this share of the pool is at risk.
    pub max_bucket_share_percent: u8,
}

impl Default for FeasibilityPolicy {
    fn default() -> Self {
        // More than half the pool cannot be separated in any single cycle.
        Self {
            max_bucket_share_percent: 50,
        }
    }
}

impl FeasibilityPolicy {
    pub fn is_at_risk(&self, count: usize, total: usize) -> bool {
        count * 100 > total * usize::from(self.max_bucket_share_percent)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeasibilityReport {
    pub buckets: BTreeMap<String, usize>,
    pub total: usize,
    pub at_risk: Vec<String>,
}

impl FeasibilityReport {
    pub fn is_feasible(&self) -> bool {
        self.at_risk.is_empty()
    }
}

pub fn analyze(buckets: &Buckets, total: usize, policy: &FeasibilityPolicy) -> FeasibilityReport {
    let counts: BTreeMap<String, usize> = buckets
        .iter()
        .map(|(key, ids)| (key.clone(), ids.len()))
        .collect();
    let at_risk = counts
        .iter()
        .filter(|(_, count)| policy.is_at_risk(**count, total))
        .map(|(key, _)| key.clone())
        .collect();

    FeasibilityReport {
        buckets: counts,
        total,
        at_risk,
    }
}
