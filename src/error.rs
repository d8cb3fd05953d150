use argon2::Error as Argon2Error;
use jsonwebtoken::errors::Error as JwtError;
use log::{debug, error};
use mongodb::error::{Error as DbError, TRANSIENT_TRANSACTION_ERROR};
use rocket::{
    http::{Status, StatusClass},
    response::{status, Responder},
    serde::json::{self, Json},
    Request,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    /// Malformed or missing input, or a uniqueness violation.
    #[error("{0}")]
    Validation(String),
    /// A name is already taken by a voter or candidate.
    #[error("{0}")]
    Conflict(String),
    /// No credentials were presented at all.
    #[error("Access denied")]
    AccessDenied,
    /// Credentials were presented but are wrong, malformed, or expired.
    #[error("{0}")]
    Auth(String),
    #[error("{0} not found")]
    NotFound(String),
    /// The request body refers to something that does not exist.
    #[error("{0} not found")]
    UnknownReference(String),
    #[error("{0}")]
    NotEligible(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::Validation(_)
            | Self::Conflict(_)
            | Self::NotEligible(_)
            | Self::Auth(_)
            | Self::UnknownReference(_) => Status::BadRequest,
            Self::AccessDenied => Status::Unauthorized,
            Self::NotFound(_) => Status::NotFound,
            Self::Db(_) | Self::Jwt(_) | Self::Argon2(_) => Status::InternalServerError,
        }
    }

    /// Did a database transaction fail in a way that makes it safe to retry from scratch?
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Db(err) => err.contains_label(TRANSIENT_TRANSACTION_ERROR),
            _ => false,
        }
    }
}

impl<'r> From<json::Error<'r>> for Error {
    fn from(err: json::Error<'r>) -> Self {
        match err {
            json::Error::Io(e) => Self::Validation(format!("Failed to read request body: {e}")),
            json::Error::Parse(_, e) => Self::Validation(format!("Invalid request body: {e}")),
        }
    }
}

/// The JSON body of every failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        let body = if status.class() == StatusClass::ServerError {
            // Internal details go to the log, not to the client.
            error!("{} {}: {self}", req.method(), req.uri());
            ErrorBody::new("Internal server error")
        } else {
            debug!("{} {}: {self}", req.method(), req.uri());
            ErrorBody::new(self.to_string())
        };
        status::Custom(status, Json(body)).respond_to(req)
    }
}
