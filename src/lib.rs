#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use log::info;
use mongodb::{error::Error as DbError, Database};
use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, DatabaseFairing};
use crate::logging::LoggerFairing;
use crate::model::mongodb::{ensure_counters_exist, ensure_indexes_exist, Coll};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;

pub use config::Config;

/// Build the server, connecting to the database configured in `Rocket.toml`
/// or the environment at ignition.
pub fn build() -> Rocket<Build> {
    assemble(rocket::build().attach(DatabaseFairing))
}

/// Everything except the database connection.
fn assemble(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(ConfigFairing)
        .attach(LoggerFairing)
}

/// Ensure indexes and ID counters exist. Safe to run against a live database.
pub async fn prepare_database(db: &Database) -> Result<(), DbError> {
    ensure_indexes_exist(db).await?;
    ensure_counters_exist(&Coll::from_db(db)).await?;
    info!("Database {} is ready", db.name());
    Ok(())
}

/// Connect to the database configured for this profile.
#[cfg(test)]
pub(crate) async fn db_client() -> mongodb::Client {
    let db_uri = rocket::Config::figment()
        .extract_inner::<String>("db_uri")
        .expect("`db_uri` not set");
    mongodb::Client::with_uri_str(&db_uri)
        .await
        .unwrap_or_else(|_| panic!("Could not connect to database with `db_uri` \"{db_uri}\""))
}

/// A fresh database name, so that tests never share state.
#[cfg(test)]
pub(crate) fn database() -> String {
    format!("test{}", rand::random::<u32>())
}

/// Build the server against the given database instead of the configured one.
#[cfg(test)]
pub(crate) async fn rocket_for_db(client: mongodb::Client, db_name: &str) -> Rocket<Build> {
    let db = client.database(db_name);
    prepare_database(&db).await.unwrap();
    assemble(rocket::build().manage(client).manage(db))
}
