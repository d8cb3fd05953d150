use rocket::{
    http::Status,
    response::status,
    serde::json::Json,
    Catcher, Request, Route,
};

use crate::error::ErrorBody;

pub mod auth;
pub mod candidates;
pub mod voters;
pub mod votes;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(voters::routes());
    routes.extend(candidates::routes());
    routes.extend(votes::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![default_catcher]
}

/// Give failures that never reach a handler, such as unknown routes or
/// unparsable path IDs, the same JSON body as every other error.
#[catch(default)]
fn default_catcher(status: Status, _req: &Request<'_>) -> status::Custom<Json<ErrorBody>> {
    let message = match status.code {
        404 => "Not found",
        500..=599 => "Internal server error",
        _ => status.reason().unwrap_or("Request failed"),
    };
    status::Custom(status, Json(ErrorBody::new(message)))
}
