use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A candidate registration request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CandidateSpec {
    pub name: String,
    #[serde(default)]
    pub party: Option<String>,
}

impl CandidateSpec {
    /// Enforce a non-blank name, trimming whitespace from both fields.
    /// A blank party is treated as no party.
    pub fn validated(self) -> Result<Self> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::Validation("Name must not be empty".to_string()));
        }
        let party = self
            .party
            .map(|party| party.trim().to_string())
            .filter(|party| !party.is_empty());
        Ok(Self { name, party })
    }
}
