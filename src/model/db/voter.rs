use argon2::Config as Argon2Config;
use chrono::{DateTime, Utc};
use log::info;
use mongodb::{
    bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime},
    options::FindOneOptions,
    Client, ClientSession,
};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    model::{
        api::RegisterRequest,
        db::name_claim::{NameClaim, Role},
        mongodb::{
            case_insensitive, execute, is_duplicate_key_error, u32_id_filter, Coll, Transaction,
        },
    },
    Config,
};

/// Voter user data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: u32,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    /// Set exactly once, by the transaction that records the voter's vote.
    pub has_voted: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Voter {
    /// Create a new voter from a validated registration, hashing the password.
    pub fn new(id: u32, registration: RegisterRequest, config: &Config) -> Result<Self> {
        let password_hash = hash_password(&registration.password, config)?;
        Ok(Self {
            id,
            name: registration.name,
            email: registration.email.into(),
            password_hash,
            has_voted: false,
            created_at: Utc::now(),
        })
    }

    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> Result<bool> {
        Ok(argon2::verify_encoded(&self.password_hash, password.as_ref())?)
    }

    /// Insert this voter, claiming their name for the voter role.
    ///
    /// Fails with [`Error::Conflict`] if a candidate holds the name, or
    /// [`Error::Validation`] if the email is already registered.
    pub async fn register(
        &self,
        db_client: &Client,
        voters: &Coll<Voter>,
        names: &Coll<NameClaim>,
    ) -> Result<()> {
        let registration = RegisterVoter {
            voter: self,
            voters,
            names,
        };
        execute(db_client, &registration).await?;
        info!("Registered voter {} ({})", self.id, self.email);
        Ok(())
    }

    /// Delete the voter with the given ID, releasing their name.
    /// Any vote they cast stays in the ledger.
    pub async fn delete(
        db_client: &Client,
        voters: &Coll<Voter>,
        names: &Coll<NameClaim>,
        id: u32,
    ) -> Result<Voter> {
        let deletion = DeleteVoter { id, voters, names };
        let voter = execute(db_client, &deletion).await?;
        info!("Deleted voter {id}");
        Ok(voter)
    }
}

/// Voter lookups.
impl Coll<Voter> {
    /// Find the voter registered with `email`, in any letter case.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Voter>> {
        let options = FindOneOptions::builder()
            .collation(case_insensitive())
            .build();
        Ok(self.find_one(doc! { "email": email }, options).await?)
    }
}

/// Hash a password with a fresh random salt.
fn hash_password(password: &str, config: &Config) -> Result<String> {
    // 16 bytes is recommended for password hashing:
    //  https://en.wikipedia.org/wiki/Argon2
    let mut salt = [0_u8; 16];
    rand::thread_rng().fill(&mut salt);
    let argon2_config = Argon2Config {
        time_cost: config.password_work_factor(),
        ..Argon2Config::default()
    };
    Ok(argon2::hash_encoded(
        password.as_bytes(),
        &salt,
        &argon2_config,
    )?)
}

struct RegisterVoter<'a> {
    voter: &'a Voter,
    voters: &'a Coll<Voter>,
    names: &'a Coll<NameClaim>,
}

#[rocket::async_trait]
impl Transaction for RegisterVoter<'_> {
    type Output = ();

    fn name(&self) -> &'static str {
        "voter registration"
    }

    async fn run(&self, session: &mut ClientSession) -> Result<()> {
        NameClaim::claim(self.names, session, &self.voter.name, Role::Voter).await?;
        match self
            .voters
            .insert_one_with_session(self.voter, None, session)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key_error(&e) => Err(Error::Validation(format!(
                "Email {} is already registered",
                self.voter.email
            ))),
            Err(e) => Err(e.into()),
        }
    }
}

struct DeleteVoter<'a> {
    id: u32,
    voters: &'a Coll<Voter>,
    names: &'a Coll<NameClaim>,
}

#[rocket::async_trait]
impl Transaction for DeleteVoter<'_> {
    type Output = Voter;

    fn name(&self) -> &'static str {
        "voter deletion"
    }

    async fn run(&self, session: &mut ClientSession) -> Result<Voter> {
        let voter = self
            .voters
            .find_one_and_delete_with_session(u32_id_filter(self.id), None, session)
            .await?
            .ok_or_else(|| Error::not_found("Voter"))?;
        NameClaim::release(self.names, session, &voter.name, Role::Voter).await?;
        Ok(voter)
    }
}
