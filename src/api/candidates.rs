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
        api::{Ack, CandidateDesc, CandidateSpec},
        db::{Candidate, NameClaim},
        mongodb::{Coll, Counter, CANDIDATE_COUNTER},
        pagination::{Paginated, Pagination},
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        create_candidate,
        list_candidates,
        get_candidate,
        delete_candidate,
    ]
}

#[post("/candidates", data = "<spec>", format = "json")]
pub async fn create_candidate(
    spec: std::result::Result<Json<CandidateSpec>, json::Error<'_>>,
    candidates: Coll<Candidate>,
    names: Coll<NameClaim>,
    counters: Coll<Counter>,
    db_client: &State<Client>,
) -> Result<status::Custom<Json<CandidateDesc>>> {
    let spec = spec?.into_inner().validated()?;

    let id = Counter::next(&counters, CANDIDATE_COUNTER).await?;
    let candidate = Candidate::new(id, spec);
    candidate.register(db_client, &candidates, &names).await?;

    Ok(status::Custom(Status::Created, Json(candidate.into())))
}

#[get("/candidates")]
async fn list_candidates(
    pagination: Result<Pagination>,
    candidates: Coll<Candidate>,
) -> Result<Json<Paginated<CandidateDesc>>> {
    let page = candidates.find_page(pagination?).await?;
    Ok(Json(page.map(CandidateDesc::from)))
}

#[get("/candidates/<candidate_id>")]
async fn get_candidate(
    candidate_id: u32,
    candidates: Coll<Candidate>,
) -> Result<Json<CandidateDesc>> {
    let candidate = candidates
        .find_by_id(candidate_id)
        .await?
        .ok_or_else(|| Error::not_found("Candidate"))?;
    Ok(Json(candidate.into()))
}

/// Delete a candidate and free their name.
///
/// Unlike voters, a candidate who has received any votes cannot be deleted
/// and the request fails with a 400.
#[delete("/candidates/<candidate_id>")]
pub async fn delete_candidate(
    candidate_id: u32,
    candidates: Coll<Candidate>,
    names: Coll<NameClaim>,
    db_client: &State<Client>,
) -> Result<Json<Ack>> {
    Candidate::delete(db_client, &candidates, &names, candidate_id).await?;
    Ok(Json(Ack::new("Candidate deleted successfully")))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::ContentType,
        local::asynchronous::Client,
        serde::json::{json, Value},
    };

    use super::*;
    use crate::error::ErrorBody;
    use crate::model::api::RegisterRequest;

    async fn create(client: &Client, spec: &CandidateSpec) -> Status {
        client
            .post(uri!(create_candidate))
            .header(ContentType::JSON)
            .body(json!(spec).to_string())
            .dispatch()
            .await
            .status()
    }

    #[backend_test]
    async fn create_and_get(client: Client) {
        assert_eq!(Status::Created, create(&client, &CandidateSpec::example()).await);
        assert_eq!(Status::Created, create(&client, &CandidateSpec::example2()).await);

        let response = client.get(uri!(get_candidate(2))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let desc = response.into_json::<CandidateDesc>().await.unwrap();
        assert_eq!(desc.name, CandidateSpec::example2().name);
        assert_eq!(desc.party, None);
        assert_eq!(desc.votes, 0);

        let response = client.get(uri!(get_candidate(3))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
        let body = response.into_json::<ErrorBody>().await.unwrap();
        assert_eq!(body.error, "Candidate not found");
    }

    #[backend_test]
    async fn duplicate_name(client: Client, candidates: Coll<Candidate>) {
        assert_eq!(Status::Created, create(&client, &CandidateSpec::example()).await);

        let response = client
            .post(uri!(create_candidate))
            .header(ContentType::JSON)
            .body(json!(CandidateSpec::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        let body = response.into_json::<ErrorBody>().await.unwrap();
        assert_eq!(body.error, "Candidate with this name already exists");
        assert_eq!(candidates.count_documents(None, None).await.unwrap(), 1);
    }

    #[backend_test(voter)]
    async fn candidate_name_taken_by_voter(client: Client, candidates: Coll<Candidate>) {
        let spec = CandidateSpec {
            name: RegisterRequest::example().name,
            party: Some("Independent".to_string()),
        };
        let response = client
            .post(uri!(create_candidate))
            .header(ContentType::JSON)
            .body(json!(spec).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        let body = response.into_json::<ErrorBody>().await.unwrap();
        assert_eq!(
            body.error,
            "This person is already registered as a voter and cannot be registered as candidate"
        );
        assert_eq!(candidates.count_documents(None, None).await.unwrap(), 0);
    }

    #[backend_test]
    async fn list_in_insertion_order(client: Client) {
        for n in 1..=15 {
            assert_eq!(Status::Created, create(&client, &CandidateSpec::numbered(n)).await);
        }

        let response = client.get("/candidates?page=2&limit=10").dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let body = response.into_json::<Value>().await.unwrap();
        assert_eq!(body["total"], 15);
        assert_eq!(body["page"], 2);
        let names: Vec<_> = body["candidates"]
            .as_array()
            .unwrap()
            .iter()
            .map(|candidate| candidate["name"].as_str().unwrap().to_string())
            .collect();
        let expected: Vec<_> = (11..=15).map(|n| format!("Candidate {n}")).collect();
        assert_eq!(names, expected);

        // Past the end is an empty page, not an error.
        let response = client.get("/candidates?page=3&limit=10").dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let body = response.into_json::<Value>().await.unwrap();
        assert_eq!(body["candidates"].as_array().unwrap().len(), 0);
    }

    #[backend_test]
    async fn delete_frees_name(client: Client) {
        assert_eq!(Status::Created, create(&client, &CandidateSpec::example()).await);

        let response = client.delete(uri!(delete_candidate(1))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let ack = response.into_json::<Ack>().await.unwrap();
        assert_eq!(ack.message, "Candidate deleted successfully");

        let response = client.delete(uri!(delete_candidate(1))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());

        // The name can now be used again, here by a voter.
        let voter = RegisterRequest {
            name: CandidateSpec::example().name,
            ..RegisterRequest::example()
        };
        let response = client
            .post(uri!(crate::api::auth::register))
            .header(ContentType::JSON)
            .body(json!(voter).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Created, response.status());
    }
}
