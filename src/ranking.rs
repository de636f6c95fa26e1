//! Ranked results over a ballot box

use crate::ballot::BallotBox;
use crate::types::CandidateId;
use serde::Serialize;

/// One candidate's line in the results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Standing {
    pub candidate_id: CandidateId,
    pub votes: u64,
    /// Share of all votes, rounded to two decimals
    pub percentage: f64,
}

/// Non-empty ranking, highest vote count first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Standings {
    entries: Vec<Standing>,
    total: u64,
}

impl Standings {
    /// Winner is the first ranked entry
    pub fn winner(&self) -> &Standing {
        // Standings are only built with a positive total, so never empty
        &self.entries[0]
    }

    /// Every entry tied with the winner
    pub fn leaders(&self) -> &[Standing] {
        let top = self.winner().votes;
        let end = self
            .entries
            .iter()
            .position(|s| s.votes != top)
            .unwrap_or(self.entries.len());
        &self.entries[..end]
    }

    pub fn entries(&self) -> &[Standing] {
        &self.entries
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

/// Outcome of ranking a ballot box
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "standings", rename_all = "snake_case")]
pub enum Results {
    /// No vote has been cast
    NoVotes,
    Ranked(Standings),
}

impl Results {
    pub fn standings(&self) -> Option<&Standings> {
        match self {
            Self::NoVotes => None,
            Self::Ranked(standings) => Some(standings),
        }
    }
}

/// Produces deterministic rankings
pub struct ResultsRanker;

impl ResultsRanker {
    /// Rank candidates by vote count, descending
    ///
    /// Equal counts keep the ballot box's insertion order.
    pub fn rank(ballot: &BallotBox) -> Results {
        let total = ballot.total();
        if total == 0 {
            return Results::NoVotes;
        }

        let mut entries: Vec<Standing> = ballot
            .iter()
            .map(|(id, votes)| Standing {
                candidate_id: *id,
                votes,
                percentage: percentage(votes, total),
            })
            .collect();

        // sort_by is stable
        entries.sort_by(|a, b| b.votes.cmp(&a.votes));

        Results::Ranked(Standings { entries, total })
    }
}

fn percentage(votes: u64, total: u64) -> f64 {
    let raw = votes as f64 / total as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}
