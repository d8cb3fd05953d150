use serde::{Deserialize, Serialize};

/// A voter's choice of candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct VoteRequest {
    pub candidate_id: u32,
}
