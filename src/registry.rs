//! Registry of identities that have already voted
//!
//! Holds only [`IdentityDigest`] values. Entries are append-only; the one
//! removal path is crate-private and undoes an insertion whose commit failed.

use crate::crypto::IdentityDigest;
use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;

/// Set of identity digests that have cast a vote
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoterRegistry {
    voters: HashSet<IdentityDigest>,
}

impl VoterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether this identity has already voted
    pub fn has_voted(&self, digest: &IdentityDigest) -> bool {
        self.voters.contains(digest)
    }

    /// Record an identity as having voted
    pub fn record(&mut self, digest: IdentityDigest) -> Result<()> {
        if !self.voters.insert(digest) {
            return Err(Error::DuplicateVote);
        }
        Ok(())
    }

    /// Undo a `record` whose commit could not be persisted
    pub(crate) fn revoke(&mut self, digest: &IdentityDigest) -> bool {
        self.voters.remove(digest)
    }

    /// Number of identities recorded
    pub fn len(&self) -> usize {
        self.voters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voters.is_empty()
    }
}

impl Serialize for VoterRegistry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        // Sorted so the file does not churn between saves
        let mut digests: Vec<&IdentityDigest> = self.voters.iter().collect();
        digests.sort();
        serializer.collect_seq(digests)
    }
}

impl<'de> Deserialize<'de> for VoterRegistry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Vec::<String>::deserialize(deserializer)?;
        let mut voters = HashSet::with_capacity(raw.len());

        for entry in raw {
            match entry.parse::<IdentityDigest>() {
                Ok(digest) => {
                    if !voters.insert(digest) {
                        tracing::debug!("Duplicate voter digest {} collapsed on load", digest.short());
                    }
                }
                Err(e) => tracing::warn!("Skipping unreadable voter digest: {}", e),
            }
        }

        Ok(Self { voters })
    }
}
