mod collection;
mod counter;
mod errors;
mod transaction;

pub use collection::{case_insensitive, ensure_indexes_exist, u32_id_filter, Coll, MongoCollection};
pub use counter::{ensure_counters_exist, Counter, CANDIDATE_COUNTER, VOTER_COUNTER, VOTE_COUNTER};
pub use errors::{is_duplicate_key_error, DUPLICATE_KEY};
pub use transaction::{execute, Transaction, TRANSACTION_RETRY_BUDGET};
