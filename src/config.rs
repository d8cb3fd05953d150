use chrono::Duration;
use log::{error, info};
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::prepare_database;

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    #[serde(default = "default_auth_ttl")]
    auth_ttl: u32,
    #[serde(default = "default_password_work_factor")]
    password_work_factor: u32,
    // secrets
    jwt_secret: String,
}

fn default_auth_ttl() -> u32 {
    3600
}

fn default_password_work_factor() -> u32 {
    3
}

impl Config {
    /// Valid lifetime of bearer tokens.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Argon2 time cost used when hashing voter passwords.
    pub fn password_work_factor(&self) -> u32 {
        self.password_work_factor.max(1)
    }

    /// Secret key used to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }
}

/// A fairing that loads the application config and puts it in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    #[serde(default = "default_db_name")]
    db_name: String,
    // secrets
    db_uri: String,
}

fn default_db_name() -> String {
    "voting".to_string()
}

/// A fairing that loads the MongoDB config, connects to the database,
/// performs any setup necessary, and places both a `Client` and a `Database`
/// into managed state. The connection lives exactly as long as the server.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&config.db_name);

        // Indexes back the uniqueness rules; counters back the sequential IDs.
        if let Err(e) = prepare_database(&db).await {
            error!("Failed to prepare database {}: {e}", config.db_name);
            return Err(rocket);
        }
        info!("...database connection online!");

        rocket = rocket.manage(client).manage(db);
        Ok(rocket)
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Config {
        pub fn example() -> Self {
            Self::with_secret("test-secret")
        }

        pub fn with_secret(secret: &str) -> Self {
            Self {
                auth_ttl: default_auth_ttl(),
                password_work_factor: 1,
                jwt_secret: secret.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rocket::figment::{providers::Serialized, Figment};

    use super::*;

    #[test]
    fn defaults_apply() {
        let figment = Figment::new().merge(Serialized::default("jwt_secret", "shh"));
        let config: Config = figment.extract().unwrap();
        assert_eq!(config.auth_ttl(), Duration::hours(1));
        assert_eq!(config.password_work_factor(), 3);
        assert_eq!(config.jwt_secret(), b"shh");
    }

    #[test]
    fn secret_is_required() {
        let figment = Figment::new().merge(Serialized::default("auth_ttl", 60));
        assert!(figment.extract::<Config>().is_err());
    }
}
