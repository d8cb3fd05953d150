use chrono::{DateTime, Utc};
use log::info;
use mongodb::{
    bson::serde_helpers::chrono_datetime_as_bson_datetime, Client, ClientSession,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    model::{
        api::CandidateSpec,
        db::name_claim::{NameClaim, Role},
        mongodb::{execute, is_duplicate_key_error, u32_id_filter, Coll, Transaction},
    },
};

/// A candidate and their running tally, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: u32,
    pub name: String,
    pub party: Option<String>,
    /// Only ever changed by `$inc`, in the same transaction as the vote it counts.
    pub votes: u32,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Candidate {
    /// Create a new candidate with no votes from a validated spec.
    pub fn new(id: u32, spec: CandidateSpec) -> Self {
        Self {
            id,
            name: spec.name,
            party: spec.party,
            votes: 0,
            created_at: Utc::now(),
        }
    }

    /// Insert this candidate, claiming their name for the candidate role.
    ///
    /// Fails with [`Error::Conflict`] if a voter or another candidate holds
    /// the name.
    pub async fn register(
        &self,
        db_client: &Client,
        candidates: &Coll<Candidate>,
        names: &Coll<NameClaim>,
    ) -> Result<()> {
        let registration = RegisterCandidate {
            candidate: self,
            candidates,
            names,
        };
        execute(db_client, &registration).await?;
        info!("Registered candidate {} ({})", self.id, self.name);
        Ok(())
    }

    /// Delete the candidate with the given ID, releasing their name.
    ///
    /// A candidate who has received votes cannot be deleted, since the ledger
    /// entries for those votes are permanent.
    pub async fn delete(
        db_client: &Client,
        candidates: &Coll<Candidate>,
        names: &Coll<NameClaim>,
        id: u32,
    ) -> Result<Candidate> {
        let deletion = DeleteCandidate {
            id,
            candidates,
            names,
        };
        let candidate = execute(db_client, &deletion).await?;
        info!("Deleted candidate {id}");
        Ok(candidate)
    }
}

struct RegisterCandidate<'a> {
    candidate: &'a Candidate,
    candidates: &'a Coll<Candidate>,
    names: &'a Coll<NameClaim>,
}

#[rocket::async_trait]
impl Transaction for RegisterCandidate<'_> {
    type Output = ();

    fn name(&self) -> &'static str {
        "candidate registration"
    }

    async fn run(&self, session: &mut ClientSession) -> Result<()> {
        NameClaim::claim(self.names, session, &self.candidate.name, Role::Candidate).await?;
        match self
            .candidates
            .insert_one_with_session(self.candidate, None, session)
            .await
        {
            Ok(_) => Ok(()),
            // Only reachable if the name registry was tampered with.
            Err(e) if is_duplicate_key_error(&e) => Err(Error::Conflict(
                "Candidate with this name already exists".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }
}

struct DeleteCandidate<'a> {
    id: u32,
    candidates: &'a Coll<Candidate>,
    names: &'a Coll<NameClaim>,
}

#[rocket::async_trait]
impl Transaction for DeleteCandidate<'_> {
    type Output = Candidate;

    fn name(&self) -> &'static str {
        "candidate deletion"
    }

    async fn run(&self, session: &mut ClientSession) -> Result<Candidate> {
        // A concurrent vote writes this same document, so it cannot commit
        // between this read and the delete below.
        let candidate = self
            .candidates
            .find_one_with_session(u32_id_filter(self.id), None, session)
            .await?
            .ok_or_else(|| Error::not_found("Candidate"))?;
        if candidate.votes > 0 {
            return Err(Error::Conflict(format!(
                "Candidate {} has received votes and cannot be deleted",
                self.id
            )));
        }
        self.candidates
            .delete_one_with_session(u32_id_filter(self.id), None, session)
            .await?;
        NameClaim::release(self.names, session, &candidate.name, Role::Candidate).await?;
        Ok(candidate)
    }
}


#[cfg(test)]
mod tests {
    use mongodb::{bson::doc, Client as DbClient};
    use rocket::local::asynchronous::Client;

    use super::*;

    fn db_client(client: &Client) -> &DbClient {
        client.rocket().state::<DbClient>().unwrap()
    }

    #[backend_test]
    async fn register_and_delete(
        client: Client,
        candidates: Coll<Candidate>,
        names: Coll<NameClaim>,
    ) {
        let candidate = Candidate::example(1);
        candidate
            .register(db_client(&client), &candidates, &names)
            .await
            .unwrap();
        assert_eq!(
            candidates.find_by_id(1).await.unwrap().unwrap().name,
            candidate.name
        );

        let deleted = Candidate::delete(db_client(&client), &candidates, &names, 1)
            .await
            .unwrap();
        assert_eq!(deleted.id, 1);
        assert!(candidates.find_by_id(1).await.unwrap().is_none());
        assert!(names
            .find_one(doc! { "_id": NameClaim::key(&candidate.name) }, None)
            .await
            .unwrap()
            .is_none());
    }

    #[backend_test]
    async fn names_are_unique(client: Client, candidates: Coll<Candidate>, names: Coll<NameClaim>) {
        Candidate::example(1)
            .register(db_client(&client), &candidates, &names)
            .await
            .unwrap();
        let result = Candidate::example(2)
            .register(db_client(&client), &candidates, &names)
            .await;
        assert!(matches!(result, Err(Error::Conflict(_))));
        assert_eq!(candidates.count_documents(None, None).await.unwrap(), 1);
    }

    #[backend_test]
    async fn cannot_delete_with_votes(
        client: Client,
        candidates: Coll<Candidate>,
        names: Coll<NameClaim>,
    ) {
        let mut candidate = Candidate::example(1);
        candidate.votes = 2;
        candidate
            .register(db_client(&client), &candidates, &names)
            .await
            .unwrap();

        let result = Candidate::delete(db_client(&client), &candidates, &names, 1).await;
        assert!(matches!(result, Err(Error::Conflict(_))));
        assert!(candidates.find_by_id(1).await.unwrap().is_some());

        let result = Candidate::delete(db_client(&client), &candidates, &names, 99).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
