use serde::{Deserialize, Serialize};

use crate::model::db::Candidate;

/// Vote totals for every candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    #[serde(rename = "totalVotes")]
    pub total_votes: u64,
    pub statistics: Vec<CandidateStatistics>,
}

/// One candidate's share of the vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateStatistics {
    pub name: String,
    pub party: Option<String>,
    pub votes: u32,
    /// Share of all votes cast, as a percentage rounded to two decimal places.
    pub percentage: f64,
}

impl Statistics {
    /// Summarise `candidates` against the total number of votes cast.
    pub fn new(total_votes: u64, candidates: Vec<Candidate>) -> Self {
        let statistics = candidates
            .into_iter()
            .map(|candidate| CandidateStatistics {
                percentage: percentage(candidate.votes, total_votes),
                name: candidate.name,
                party: candidate.party,
                votes: candidate.votes,
            })
            .collect();
        Self {
            total_votes,
            statistics,
        }
    }
}

/// `votes / total × 100`, rounded to two decimal places; zero if no votes
/// have been cast.
pub fn percentage(votes: u32, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = f64::from(votes) / total as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}
