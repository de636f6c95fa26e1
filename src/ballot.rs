//! Vote counts per candidate, kept in registration order

use crate::types::CandidateId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};

/// Insertion-ordered mapping from candidate to vote count
///
/// Loading rejects documents whose counts do not fit a `u64` total.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "IndexMap<CandidateId, u64>")]
pub struct BallotBox {
    counts: IndexMap<CandidateId, u64>,
}

impl BallotBox {
    /// Create an empty ballot box
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a zero entry for the candidate if none exists
    pub fn ensure_entry(&mut self, candidate: CandidateId) {
        self.counts.entry(candidate).or_insert(0);
    }

    /// Add one vote, creating the entry if the candidate is unknown
    pub fn increment(&mut self, candidate: CandidateId) -> u64 {
        let count = self.counts.entry(candidate).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Undo an `increment` whose commit could not be persisted
    pub(crate) fn retract(&mut self, candidate: &CandidateId) {
        if let Some(count) = self.counts.get_mut(candidate) {
            *count = count.saturating_sub(1);
        }
    }

    /// Votes counted for a candidate
    pub fn votes(&self, candidate: &CandidateId) -> Option<u64> {
        self.counts.get(candidate).copied()
    }

    /// Sum of all counts
    pub fn total(&self) -> u64 {
        self.counts
            .values()
            .fold(0u64, |total, count| total.saturating_add(*count))
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&CandidateId, u64)> {
        self.counts.iter().map(|(id, count)| (id, *count))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl TryFrom<IndexMap<CandidateId, u64>> for BallotBox {
    type Error = String;

    fn try_from(counts: IndexMap<CandidateId, u64>) -> Result<Self, Self::Error> {
        counts
            .values()
            .try_fold(0u64, |total, count| total.checked_add(*count))
            .ok_or_else(|| "vote counts overflow the ballot total".to_string())?;
        Ok(Self { counts })
    }
}

impl Serialize for BallotBox {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.counts.serialize(serializer)
    }
}
