use chrono::{DateTime, Utc};
use log::info;
use mongodb::{
    bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime},
    Client, ClientSession,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    model::{
        db::{Candidate, Voter},
        mongodb::{execute, u32_id_filter, Coll, Counter, Transaction, VOTE_COUNTER},
    },
};

/// An immutable ledger entry recording that a voter voted for a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: u32,
    pub voter_id: u32,
    pub candidate_id: u32,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

const NOT_ELIGIBLE: &str = "Voter not eligible";

fn unknown_candidate() -> Error {
    Error::UnknownReference("Candidate".to_string())
}

/// The collections a vote touches.
pub struct Ballot<'a> {
    pub voters: &'a Coll<Voter>,
    pub candidates: &'a Coll<Candidate>,
    pub votes: &'a Coll<Vote>,
    pub counters: &'a Coll<Counter>,
}

impl Vote {
    /// Record a vote by `voter_id` for `candidate_id`.
    ///
    /// Fails with [`Error::NotEligible`] if the voter does not exist or has
    /// already voted, and [`Error::UnknownReference`] if the candidate does
    /// not exist.
    /// The ledger entry, the voter's flag and the candidate's tally are
    /// written in a single transaction; of any number of concurrent casts by
    /// the same voter, exactly one succeeds.
    pub async fn cast(
        db_client: &Client,
        ballot: Ballot<'_>,
        voter_id: u32,
        candidate_id: u32,
    ) -> Result<Vote> {
        // Cheap rejections first; the transaction re-checks both conditions.
        match ballot.voters.find_by_id(voter_id).await? {
            Some(voter) if !voter.has_voted => {}
            _ => return Err(Error::NotEligible(NOT_ELIGIBLE.to_string())),
        }
        if ballot.candidates.find_by_id(candidate_id).await?.is_none() {
            return Err(unknown_candidate());
        }

        let vote = Vote {
            id: Counter::next(ballot.counters, VOTE_COUNTER).await?,
            voter_id,
            candidate_id,
            created_at: Utc::now(),
        };
        let cast = CastVote {
            vote: &vote,
            ballot: &ballot,
        };
        execute(db_client, &cast).await?;
        info!("Voter {voter_id} voted for candidate {candidate_id} (vote {})", vote.id);
        Ok(vote)
    }
}

struct CastVote<'a> {
    vote: &'a Vote,
    ballot: &'a Ballot<'a>,
}

#[rocket::async_trait]
impl Transaction for CastVote<'_> {
    type Output = ();

    fn name(&self) -> &'static str {
        "vote"
    }

    async fn run(&self, session: &mut ClientSession) -> Result<()> {
        // Flipping the flag only if it is still unset is the eligibility
        // check. Two racing casts both write this document, so one of them
        // aborts and sees the flag set when it is retried.
        let unvoted = doc! { "_id": self.vote.voter_id, "has_voted": false };
        let mark_voted = doc! { "$set": { "has_voted": true } };
        let result = self
            .ballot
            .voters
            .update_one_with_session(unvoted, mark_voted, None, session)
            .await?;
        if result.matched_count == 0 {
            return Err(Error::NotEligible(NOT_ELIGIBLE.to_string()));
        }

        let tally = doc! { "$inc": { "votes": 1_i32 } };
        let result = self
            .ballot
            .candidates
            .update_one_with_session(u32_id_filter(self.vote.candidate_id), tally, None, session)
            .await?;
        if result.matched_count == 0 {
            return Err(unknown_candidate());
        }

        self.ballot
            .votes
            .insert_one_with_session(self.vote, None, session)
            .await?;
        Ok(())
    }
}

/// Tallies.
impl Coll<Vote> {
    /// The number of votes cast so far.
    pub async fn total(&self) -> Result<u64> {
        Ok(self.count_documents(None, None).await?)
    }
}
