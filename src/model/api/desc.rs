use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    db::{Candidate, Vote, Voter},
    pagination::Listed,
};

/// A voter as presented over the API: everything except the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterDesc {
    pub id: u32,
    pub name: String,
    pub email: String,
    pub has_voted: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Voter> for VoterDesc {
    fn from(voter: Voter) -> Self {
        Self {
            id: voter.id,
            name: voter.name,
            email: voter.email,
            has_voted: voter.has_voted,
            created_at: voter.created_at,
        }
    }
}

impl Listed for VoterDesc {
    type Source = Voter;
}

/// A candidate as presented over the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDesc {
    pub id: u32,
    pub name: String,
    pub party: Option<String>,
    pub votes: u32,
    pub created_at: DateTime<Utc>,
}

impl From<Candidate> for CandidateDesc {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id,
            name: candidate.name,
            party: candidate.party,
            votes: candidate.votes,
            created_at: candidate.created_at,
        }
    }
}

impl Listed for CandidateDesc {
    type Source = Candidate;
}

/// A ledger entry as presented over the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteDesc {
    pub id: u32,
    pub voter_id: u32,
    pub candidate_id: u32,
    pub created_at: DateTime<Utc>,
}

impl From<Vote> for VoteDesc {
    fn from(vote: Vote) -> Self {
        Self {
            id: vote.id,
            voter_id: vote.voter_id,
            candidate_id: vote.candidate_id,
            created_at: vote.created_at,
        }
    }
}

impl Listed for VoteDesc {
    type Source = Vote;
}

/// Acknowledgement of a request that has no other result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub message: String,
}

impl Ack {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
