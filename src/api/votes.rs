use mongodb::Client;
use rocket::{
    http::Status,
    response::status,
    serde::json::{self, Json},
    Route, State,
};

use crate::{
    error::{Error, Result},
    model::{
        api::{Ack, Statistics, VoteDesc, VoteRequest},
        auth::AuthToken,
        db::{Ballot, Candidate, Vote, Voter},
        mongodb::{Coll, Counter},
        pagination::{Paginated, Pagination},
    },
};

pub fn routes() -> Vec<Route> {
    routes![cast_vote, list_votes, statistics]
}

#[post("/votes", data = "<request>", format = "json")]
async fn cast_vote(
    token: std::result::Result<AuthToken, Error>,
    request: std::result::Result<Json<VoteRequest>, json::Error<'_>>,
    voters: Coll<Voter>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
    counters: Coll<Counter>,
    db_client: &State<Client>,
) -> Result<status::Custom<Json<Ack>>> {
    let token = token?;
    let request = request?;

    let ballot = Ballot {
        voters: &voters,
        candidates: &candidates,
        votes: &votes,
        counters: &counters,
    };
    Vote::cast(db_client, ballot, token.voter_id, request.candidate_id).await?;

    Ok(status::Custom(
        Status::Created,
        Json(Ack::new("Vote cast successfully")),
    ))
}

#[get("/votes")]
async fn list_votes(
    pagination: Result<Pagination>,
    votes: Coll<Vote>,
) -> Result<Json<Paginated<VoteDesc>>> {
    let page = votes.find_page(pagination?).await?;
    Ok(Json(page.map(VoteDesc::from)))
}

#[get("/votes/statistics")]
async fn statistics(
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
) -> Result<Json<Statistics>> {
    let total = votes.total().await?;
    let candidates = candidates.find_all().await?;
    Ok(Json(Statistics::new(total, candidates)))
}
