use log::{debug, info};
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
        api::{LoginRequest, RegisterRequest, TokenResponse, VoterDesc},
        auth::AuthToken,
        db::{NameClaim, Voter},
        mongodb::{Coll, Counter, VOTER_COUNTER},
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![register, login]
}

#[post("/register", data = "<registration>", format = "json")]
pub async fn register(
    registration: std::result::Result<Json<RegisterRequest>, json::Error<'_>>,
    voters: Coll<Voter>,
    names: Coll<NameClaim>,
    counters: Coll<Counter>,
    db_client: &State<Client>,
    config: &State<Config>,
) -> Result<status::Custom<Json<VoterDesc>>> {
    let registration = registration?.into_inner().validated()?;

    let id = Counter::next(&counters, VOTER_COUNTER).await?;
    let voter = Voter::new(id, registration, config)?;
    voter.register(db_client, &voters, &names).await?;

    Ok(status::Custom(Status::Created, Json(voter.into())))
}

#[post("/login", data = "<credentials>", format = "json")]
pub async fn login(
    credentials: std::result::Result<Json<LoginRequest>, json::Error<'_>>,
    voters: Coll<Voter>,
    config: &State<Config>,
) -> Result<Json<TokenResponse>> {
    let credentials = credentials?;

    // Unknown emails and wrong passwords are indistinguishable to the client.
    let voter = match voters.find_by_email(&credentials.email).await? {
        Some(voter) if voter.verify_password(&credentials.password)? => voter,
        _ => {
            debug!("Failed login for {}", credentials.email);
            return Err(Error::Auth("Invalid credentials".to_string()));
        }
    };

    let token = AuthToken::new(voter.id).issue(config)?;
    info!("Voter {} logged in", voter.id);
    Ok(Json(TokenResponse { token }))
}
