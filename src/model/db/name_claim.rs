use std::fmt::{Display, Formatter};

use mongodb::{
    bson::{doc, Bson},
    options::UpdateOptions,
    ClientSession,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::mongodb::{is_duplicate_key_error, Coll};

/// The role a person's name is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Voter,
    Candidate,
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Voter => write!(f, "voter"),
            Self::Candidate => write!(f, "candidate"),
        }
    }
}

impl From<Role> for Bson {
    fn from(role: Role) -> Self {
        Bson::String(role.to_string())
    }
}

/// A person's name, claimed by exactly one role.
///
/// The name's [key](NameClaim::key) is the document's `_id`, so the database
/// itself guarantees that no name can be claimed by both roles at once, even
/// by racing registrations. Several voters may share a name; `holders`
/// counts them. A candidate name always has exactly one holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameClaim {
    #[serde(rename = "_id")]
    pub key: String,
    pub role: Role,
    pub holders: u32,
}

impl NameClaim {
    /// The registry key for `name`. Names that differ only in case are the
    /// same person.
    pub fn key(name: &str) -> String {
        name.to_lowercase()
    }

    /// Claim `name` for `role` as part of the session's transaction.
    ///
    /// Fails with [`Error::Conflict`] if the name belongs to the other role,
    /// or if `role` is [`Role::Candidate`] and a candidate already holds it.
    pub async fn claim(
        names: &Coll<NameClaim>,
        session: &mut ClientSession,
        name: &str,
        role: Role,
    ) -> Result<()> {
        let key = Self::key(name);
        let result = match role {
            Role::Voter => {
                // Upserting on (_id, role) inserts a fresh claim or joins an
                // existing voter claim; a candidate claim makes the implied
                // insert collide on `_id`.
                let filter = doc! { "_id": key.as_str(), "role": role };
                let update = doc! { "$inc": { "holders": 1_i32 } };
                let upsert = UpdateOptions::builder().upsert(true).build();
                names
                    .update_one_with_session(filter, update, upsert, session)
                    .await
                    .map(|_| ())
            }
            Role::Candidate => {
                let claim = NameClaim {
                    key: key.clone(),
                    role,
                    holders: 1,
                };
                names
                    .insert_one_with_session(claim, None, session)
                    .await
                    .map(|_| ())
            }
        };

        match result {
            Ok(()) => Ok(()),
            Err(e) if is_duplicate_key_error(&e) => {
                // The transaction is dead now, so look at what is committed.
                let holder = names
                    .find_one(doc! { "_id": key.as_str() }, None)
                    .await?
                    .map(|claim| claim.role);
                Err(Error::Conflict(conflict_message(role, holder)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Give up one hold on `name` for `role` as part of the session's
    /// transaction, removing the claim once nobody holds it.
    pub async fn release(
        names: &Coll<NameClaim>,
        session: &mut ClientSession,
        name: &str,
        role: Role,
    ) -> Result<()> {
        let key = Self::key(name);
        let filter = doc! { "_id": key.as_str(), "role": role };
        let update = doc! { "$inc": { "holders": -1_i32 } };
        names
            .update_one_with_session(filter, update, None, session)
            .await?;

        let unheld = doc! { "_id": key.as_str(), "role": role, "holders": { "$lte": 0_i32 } };
        names
            .delete_one_with_session(unheld, None, session)
            .await?;
        Ok(())
    }
}

/// Explain why `wanted` could not claim a name already held by `holder`.
fn conflict_message(wanted: Role, holder: Option<Role>) -> String {
    match (wanted, holder) {
        (Role::Voter, _) => {
            "This person is already registered as a candidate and cannot be registered as voter"
                .to_string()
        }
        (Role::Candidate, Some(Role::Voter)) => {
            "This person is already registered as a voter and cannot be registered as candidate"
                .to_string()
        }
        (Role::Candidate, _) => "Candidate with this name already exists".to_string(),
    }
}
