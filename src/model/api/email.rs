use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest address permitted by RFC 5321.
pub const MAX_EMAIL_LENGTH: usize = 254;
/// Longest local part permitted by RFC 5321.
pub const MAX_LOCAL_PART_LENGTH: usize = 64;

/// A syntactically valid email address.
///
/// This accepts the everyday `local@domain.tld` form; quoted local parts and
/// IP-literal domains are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EmailError {
    #[error("email address is empty")]
    Empty,
    #[error("email address is longer than {MAX_EMAIL_LENGTH} characters")]
    TooLong,
    #[error("email address contains whitespace")]
    Whitespace,
    #[error("email address must contain exactly one '@'")]
    At,
    #[error("invalid local part '{0}'")]
    LocalPart(String),
    #[error("invalid domain '{0}'")]
    Domain(String),
}

impl Deref for Email {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Email {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(EmailError::Empty);
        }
        if s.len() > MAX_EMAIL_LENGTH {
            return Err(EmailError::TooLong);
        }
        if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(EmailError::Whitespace);
        }
        let (local, domain) = match s.split_once('@') {
            Some((local, domain)) if !domain.contains('@') => (local, domain),
            _ => return Err(EmailError::At),
        };
        if !valid_local_part(local) {
            return Err(EmailError::LocalPart(local.to_string()));
        }
        if !valid_domain(domain) {
            return Err(EmailError::Domain(domain.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

fn valid_local_part(local: &str) -> bool {
    const SPECIALS: &str = "!#$%&'*+/=?^_`{|}~.-";
    !local.is_empty()
        && local.len() <= MAX_LOCAL_PART_LENGTH
        && !local.starts_with('.')
        && !local.ends_with('.')
        && !local.contains("..")
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || SPECIALS.contains(c))
}

fn valid_domain(domain: &str) -> bool {
    let labels = domain.split('.').collect::<Vec<_>>();
    if labels.len() < 2 {
        return false;
    }
    let valid_labels = labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    });
    // Unwrap safe: `labels` has at least two entries.
    let tld = labels.last().unwrap();
    valid_labels && tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
}

impl TryFrom<String> for Email {
    type Error = EmailError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}
