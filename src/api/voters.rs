use mongodb::Client;
use rocket::{serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{Ack, VoterDesc},
        db::{NameClaim, Voter},
        mongodb::Coll,
        pagination::{Paginated, Pagination},
    },
};

pub fn routes() -> Vec<Route> {
    routes![list_voters, get_voter, delete_voter]
}

#[get("/voters")]
async fn list_voters(
    pagination: Result<Pagination>,
    voters: Coll<Voter>,
) -> Result<Json<Paginated<VoterDesc>>> {
    let page = voters.find_page(pagination?).await?;
    Ok(Json(page.map(VoterDesc::from)))
}

#[get("/voters/<voter_id>")]
async fn get_voter(voter_id: u32, voters: Coll<Voter>) -> Result<Json<VoterDesc>> {
    let voter = voters
        .find_by_id(voter_id)
        .await?
        .ok_or_else(|| Error::not_found("Voter"))?;
    Ok(Json(voter.into()))
}

#[delete("/voters/<voter_id>")]
pub async fn delete_voter(
    voter_id: u32,
    voters: Coll<Voter>,
    names: Coll<NameClaim>,
    db_client: &State<Client>,
) -> Result<Json<Ack>> {
    Voter::delete(db_client, &voters, &names, voter_id).await?;
    Ok(Json(Ack::new("Voter deleted successfully")))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::{json, Value},
    };

    use super::*;
    use crate::error::ErrorBody;
    use crate::model::api::RegisterRequest;

    async fn register_many(client: &Client, count: usize) {
        for n in 1..=count {
            let response = client
                .post(uri!(crate::api::auth::register))
                .header(ContentType::JSON)
                .body(json!(RegisterRequest::numbered(n)).to_string())
                .dispatch()
                .await;
            assert_eq!(Status::Created, response.status());
        }
    }

    #[backend_test]
    async fn second_page(client: Client) {
        register_many(&client, 15).await;

        let response = client.get("/voters?limit=10&page=2").dispatch().await;
        assert_eq!(Status::Ok, response.status());

        let body = response.into_json::<Value>().await.unwrap();
        assert_eq!(body["total"], 15);
        assert_eq!(body["page"], 2);
        let page = body["voters"].as_array().unwrap();
        assert_eq!(page.len(), 5);
        assert_eq!(page[0]["id"], 11);
        assert!(page.iter().all(|voter| voter.get("password_hash").is_none()));
    }

    #[backend_test]
    async fn default_page(client: Client) {
        register_many(&client, 12).await;

        let response = client.get(uri!(list_voters)).dispatch().await;
        assert_eq!(Status::Ok, response.status());

        let body = response.into_json::<Value>().await.unwrap();
        assert_eq!(body["total"], 12);
        assert_eq!(body["page"], 1);
        assert_eq!(body["voters"].as_array().unwrap().len(), 10);
    }

    #[backend_test]
    async fn bad_pagination(client: Client) {
        for query in [
            "page=0",
            "limit=0",
            "page=-1",
            "limit=lots",
            "page=4294967295&limit=4294967295",
        ] {
            let response = client.get(format!("/voters?{query}")).dispatch().await;
            assert_eq!(Status::BadRequest, response.status(), "{query}");
            assert!(response.into_json::<ErrorBody>().await.is_some());
        }
    }

    #[backend_test(voter)]
    async fn get_and_delete(client: Client, voters: Coll<Voter>) {
        let response = client.get(uri!(get_voter(1))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let desc = response.into_json::<VoterDesc>().await.unwrap();
        assert_eq!(desc.email, RegisterRequest::example().email.to_string());

        let response = client.delete(uri!(delete_voter(1))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let ack = response.into_json::<Ack>().await.unwrap();
        assert_eq!(ack.message, "Voter deleted successfully");
        assert!(voters.find_by_id(1).await.unwrap().is_none());

        let response = client.get(uri!(get_voter(1))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
        let body = response.into_json::<ErrorBody>().await.unwrap();
        assert_eq!(body.error, "Voter not found");

        let response = client.delete(uri!(delete_voter(1))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }
}
