//! `replace_all` swaps the whole set in one step: readers see the previous
//! rows or the new ones, never an empty or half-written table.

mod memory;
mod sqlite;

pub use memory::MemoryPairingStore;
pub use sqlite::SqlitePairingStore;

use async_trait::async_trait;
use pairing_core::Pairing;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("persistence failed during {op}: {reason}")]
    Persistence { op: &'static str, reason: String },
    #[error("stored pairings are corrupt: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub(crate) fn persistence(op: &'static str, reason: impl ToString) -> Self {
        Self::Persistence {
            op,
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
pub trait PairingStore: Send + Sync {
    /// Deletes every row and inserts `pairings`, atomically.
    async fn replace_all(&self, pairings: Vec<Pairing>) -> Result<usize, StoreError>;

    async fn reset_all(&self) -> Result<(), StoreError>;

    /// Removes the row whose receiver matches `pairing.receiver_id`, if any,
    /// then inserts `pairing`. Returns the superseded row.
    async fn override_receiver(&self, pairing: Pairing) -> Result<Option<Pairing>, StoreError>;

    async fn list(&self) -> Result<Vec<Pairing>, StoreError>;

    /// Rows where `giver_id` gives. Normally one; more after manual edits.
    async fn assignments_for(&self, giver_id: &str) -> Result<Vec<Pairing>, StoreError>;
}
