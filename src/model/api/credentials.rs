use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::api::email::Email;

/// A voter registration request. The password is in plaintext and is never
/// stored directly.
#[derive(Clone, Deserialize, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: Email,
    pub password: String,
}

impl RegisterRequest {
    /// Enforce that the name is non-blank and a password was given,
    /// trimming surrounding whitespace from the name.
    pub fn validated(mut self) -> Result<Self> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(Error::Validation("Name must not be empty".to_string()));
        }
        if self.password.is_empty() {
            return Err(Error::Validation("Password must not be empty".to_string()));
        }
        Ok(self)
    }
}

/// Voter login credentials.
#[derive(Clone, Deserialize, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// A freshly issued bearer token.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub token: String,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_trims_name() {
        let request = RegisterRequest {
            name: "  Alice ".to_string(),
            ..RegisterRequest::example()
        };
        assert_eq!(request.validated().unwrap().name, "Alice");
    }

    #[test]
    fn validation_rejects_blanks() {
        let request = RegisterRequest {
            name: "   ".to_string(),
            ..RegisterRequest::example()
        };
        assert!(matches!(request.validated(), Err(Error::Validation(_))));

        let request = RegisterRequest {
            password: String::new(),
            ..RegisterRequest::example()
        };
        assert!(matches!(request.validated(), Err(Error::Validation(_))));
    }
}
