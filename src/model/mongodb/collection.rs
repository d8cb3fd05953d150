use std::ops::Deref;

use log::debug;
use mongodb::{
    bson::{doc, Document},
    error::Error as DbError,
    options::{Collation, CollationStrength, FindOptions, IndexOptions},
    Collection, Database, IndexModel,
};
use rocket::{
    futures::TryStreamExt,
    request::{self, FromRequest, Request},
    State,
};
use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::model::{
    db::{Candidate, NameClaim, Vote, Voter},
    pagination::{Paginated, Pagination},
};

use super::counter::Counter;

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from the managed state and wrap it in a collection.
    ///
    /// Panics iff the [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Coll::from_db(db))
    }
}

/// Data access shared by every collection keyed by a sequential integer ID.
impl<T> Coll<T>
where
    T: MongoCollection + DeserializeOwned + Unpin + Send + Sync,
{
    /// Find the document with the given ID.
    pub async fn find_by_id(&self, id: u32) -> Result<Option<T>> {
        Ok(self.find_one(u32_id_filter(id), None).await?)
    }

    /// Retrieve one page of documents in insertion order, along with the
    /// total number of documents in the collection.
    pub async fn find_page(&self, pagination: Pagination) -> Result<Paginated<T>> {
        let options = FindOptions::builder()
            .sort(doc! { "_id": 1 })
            .skip(pagination.skip())
            .limit(i64::from(pagination.limit()))
            .build();
        let items = self.find(None, options).await?.try_collect().await?;
        let total = self.count_documents(None, None).await?;
        Ok(pagination.to_paginated(total, items))
    }

    /// Retrieve every document in insertion order.
    pub async fn find_all(&self) -> Result<Vec<T>> {
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        Ok(self.find(None, options).await?.try_collect().await?)
    }
}

/// Compare strings ignoring case, as people expect names and email
/// addresses to be compared. Queries must use it to match its indexes.
pub fn case_insensitive() -> Collation {
    Collation::builder()
        .locale("en")
        .strength(CollationStrength::Secondary)
        .build()
}

/// A filter matching a document by its integer ID.
pub fn u32_id_filter(id: u32) -> Document {
    doc! { "_id": id }
}

// Voter collection
impl MongoCollection for Voter {
    const NAME: &'static str = "voters";
}

// Candidate collection
impl MongoCollection for Candidate {
    const NAME: &'static str = "candidates";
}

// Vote collection
impl MongoCollection for Vote {
    const NAME: &'static str = "votes";
}

// Name registry collection
impl MongoCollection for NameClaim {
    const NAME: &'static str = "names";
}

// Counter collection
impl MongoCollection for Counter {
    const NAME: &'static str = "counters";
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> std::result::Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder()
        .unique(true)
        .collation(case_insensitive())
        .build();

    // Voter collection.
    let voter_index = IndexModel::builder()
        .keys(doc! {"email": 1})
        .options(unique.clone())
        .build();
    Coll::<Voter>::from_db(db)
        .create_index(voter_index, None)
        .await?;

    // Candidate collection.
    let candidate_index = IndexModel::builder()
        .keys(doc! {"name": 1})
        .options(unique)
        .build();
    Coll::<Candidate>::from_db(db)
        .create_index(candidate_index, None)
        .await?;

    // Vote collection: lookups in both directions.
    let vote_indexes = vec![
        IndexModel::builder().keys(doc! {"voter_id": 1}).build(),
        IndexModel::builder().keys(doc! {"candidate_id": 1}).build(),
    ];
    Coll::<Vote>::from_db(db)
        .create_indexes(vote_indexes, None)
        .await?;

    Ok(())
}
