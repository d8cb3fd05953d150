use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use log::debug;
use rocket::{
    request::{FromRequest, Outcome},
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    Config,
};

/// Header carrying the bearer token.
pub const AUTHORIZATION: &str = "Authorization";

const BEARER: &str = "Bearer ";

/// Proof that the request was made by a logged-in voter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthToken {
    pub voter_id: u32,
}

/// Token claims: the voter plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(rename = "voterId")]
    voter_id: u32,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

impl AuthToken {
    pub fn new(voter_id: u32) -> Self {
        Self { voter_id }
    }

    /// Sign this token, valid for the configured lifetime from now.
    pub fn issue(&self, config: &Config) -> Result<String> {
        let claims = Claims {
            voter_id: self.voter_id,
            expire_at: Utc::now() + config.auth_ttl(),
        };
        Ok(jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?)
    }

    /// Verify the value of an `Authorization` header.
    pub fn authenticate(header: Option<&str>, config: &Config) -> Result<Self> {
        let header = header.ok_or(Error::AccessDenied)?;
        let token = header
            .strip_prefix(BEARER)
            .ok_or_else(|| Error::Auth("Invalid token".to_string()))?;
        let claims = jsonwebtoken::decode(
            token.trim(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|data: TokenData<Claims>| data.claims)
        .map_err(|e| {
            debug!("Rejected token: {e}");
            Error::Auth("Invalid token".to_string())
        })?;
        Ok(Self::new(claims.voter_id))
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthToken {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();
        match Self::authenticate(req.headers().get_one(AUTHORIZATION), config) {
            Ok(token) => Outcome::Success(token),
            Err(e) => Outcome::Failure((e.status(), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rocket::http::Status;

    use super::*;

    fn config() -> Config {
        Config::example()
    }

    fn bearer(token: &str) -> String {
        format!("{BEARER}{token}")
    }

    #[test]
    fn round_trip() {
        let config = config();
        let token = AuthToken::new(17).issue(&config).unwrap();
        let decoded = AuthToken::authenticate(Some(&bearer(&token)), &config).unwrap();
        assert_eq!(decoded.voter_id, 17);
    }

    #[test]
    fn missing_header() {
        let result = AuthToken::authenticate(None, &config());
        assert!(matches!(result, Err(Error::AccessDenied)));
        assert_eq!(result.unwrap_err().status(), Status::Unauthorized);
    }

    #[test]
    fn malformed_header() {
        let config = config();
        let token = AuthToken::new(1).issue(&config).unwrap();
        for header in [token.as_str(), "Bearer", "Bearer not-a-jwt", "Basic abc"] {
            let result = AuthToken::authenticate(Some(header), &config);
            assert!(matches!(result, Err(Error::Auth(_))), "{header}");
        }
    }

    #[test]
    fn wrong_secret() {
        let token = AuthToken::new(1).issue(&config()).unwrap();
        let other = Config::with_secret("a different secret");
        let result = AuthToken::authenticate(Some(&bearer(&token)), &other);
        assert!(matches!(result, Err(Error::Auth(_))));
    }

    #[test]
    fn expired() {
        let config = config();
        // Well beyond the decoder's default leeway.
        let claims = Claims {
            voter_id: 1,
            expire_at: Utc::now() - Duration::minutes(10),
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
        .unwrap();
        let result = AuthToken::authenticate(Some(&bearer(&token)), &config);
        assert!(matches!(result, Err(Error::Auth(_))));
        assert_eq!(result.unwrap_err().status(), Status::BadRequest);
    }
}
