use log::debug;
use mongodb::{
    bson::doc,
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, ReturnDocument, UpdateOptions},
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::mongodb::Coll;

/// Counter that generates voter IDs.
pub const VOTER_COUNTER: &str = "voters";
/// Counter that generates candidate IDs.
pub const CANDIDATE_COUNTER: &str = "candidates";
/// Counter that generates vote IDs.
pub const VOTE_COUNTER: &str = "votes";

/// A counter object used to implement auto-increment fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "_id")]
    pub id: String,
    pub next: u32,
}

impl Counter {
    /// Create a new `Counter` with the given name, starting at the given value.
    pub fn new(id: impl Into<String>, start: u32) -> Self {
        Self {
            id: id.into(),
            next: start,
        }
    }

    /// Atomically retrieve the next value of the counter with the given ID.
    ///
    /// Values are never handed out twice, but a value whose enclosing
    /// operation later fails is not reused either, so IDs may have gaps.
    pub async fn next(counters: &Coll<Counter>, id: &str) -> Result<u32> {
        let update = doc! {
            "$inc": { "next": 1 }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();
        let counter = counters
            .find_one_and_update(doc! { "_id": id }, update, options)
            .await?
            .ok_or_else(|| Error::not_found(format!("Counter '{id}'")))?;
        Ok(counter.next)
    }
}

/// Ensure that every ID counter exists, starting from 1.
///
/// This operation is idempotent and never resets an existing counter.
pub async fn ensure_counters_exist(counters: &Coll<Counter>) -> std::result::Result<(), DbError> {
    debug!("Ensuring ID counters exist");
    let upsert = UpdateOptions::builder().upsert(true).build();
    for id in [VOTER_COUNTER, CANDIDATE_COUNTER, VOTE_COUNTER] {
        let update = doc! {
            "$setOnInsert": { "next": 1_u32 }
        };
        counters
            .update_one(doc! { "_id": id }, update, upsert.clone())
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use mongodb::Database;

    #[backend_test]
    async fn counter_increment(db: Database) {
        const START: u32 = 5;

        // Create a counter and insert it.
        let counters = Coll::<Counter>::from_db(&db);
        counters
            .insert_one(Counter::new("test", START), None)
            .await
            .unwrap();

        // Get the next value.
        let next = Counter::next(&counters, "test").await.unwrap();
        assert_eq!(next, START);

        // Check the counter was incremented.
        let counter = counters
            .find_one(doc! { "_id": "test" }, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(counter.next, START + 1);
    }

    #[backend_test]
    async fn counters_exist_and_survive_setup(counters: Coll<Counter>) {
        // The test database has already been prepared once.
        assert_eq!(Counter::next(&counters, VOTER_COUNTER).await.unwrap(), 1);
        assert_eq!(Counter::next(&counters, VOTER_COUNTER).await.unwrap(), 2);

        // Preparing again must not reset anything.
        ensure_counters_exist(&counters).await.unwrap();
        assert_eq!(Counter::next(&counters, VOTER_COUNTER).await.unwrap(), 3);
        assert_eq!(Counter::next(&counters, VOTE_COUNTER).await.unwrap(), 1);
    }

    #[backend_test]
    async fn missing_counter(counters: Coll<Counter>) {
        let result = Counter::next(&counters, "nonexistent").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
