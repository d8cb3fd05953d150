//! Types stored in the database, and the operations on them.
//!
//! IDs are sequential integers and datetimes use MongoDB's own format.
//! Anything that must change several documents at once does so inside a
//! [`Transaction`](crate::model::mongodb::Transaction).

mod candidate;
pub use candidate::Candidate;

pub mod name_claim;
pub use name_claim::{NameClaim, Role};

mod vote;
pub use vote::{Ballot, Vote};

mod voter;
pub use voter::Voter;
