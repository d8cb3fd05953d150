//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - Password hashes are never included.
//! - Datetimes are serialised as RFC 3339 strings.

pub mod candidate;
pub mod credentials;
pub mod desc;
pub mod email;
pub mod statistics;
pub mod vote;

pub use candidate::CandidateSpec;
pub use credentials::{LoginRequest, RegisterRequest, TokenResponse};
pub use desc::{Ack, CandidateDesc, VoteDesc, VoterDesc};
pub use email::Email;
pub use statistics::Statistics;
pub use vote::VoteRequest;
