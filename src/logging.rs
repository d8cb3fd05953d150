use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use log::{info, log, warn, Level};
use rocket::{
    fairing::{Fairing, Info, Kind},
    http::StatusClass,
    request::{FromRequest, Outcome},
    Data, Orbit, Request, Response, Rocket, Route,
};

/// Sequence number of a request, pairing its request and response log lines.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct RequestId(pub usize);

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl RequestId {
    /// The next unused ID. Wraps to zero on overflow.
    pub fn next() -> RequestId {
        static NEXT_REQUEST: AtomicUsize = AtomicUsize::new(0);
        RequestId(NEXT_REQUEST.fetch_add(1, Ordering::Relaxed))
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for &'r RequestId {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(req.local_cache(RequestId::next))
    }
}

/// When the request arrived.
struct Arrival(Instant);

/// Which log level a response with this status class is reported at.
fn response_level(class: StatusClass) -> Level {
    match class {
        StatusClass::ServerError => Level::Error,
        StatusClass::ClientError => Level::Warn,
        _ => Level::Info,
    }
}

fn describe_route(route: Option<&Route>) -> String {
    match route {
        Some(Route {
            name: Some(name),
            uri,
            ..
        }) => format!("{name} ({uri})"),
        Some(route) => route.uri.to_string(),
        None => "no route".to_string(),
    }
}

/// Logs server lifecycle events and every request/response pair.
#[derive(Debug, Copy, Clone)]
pub struct LoggerFairing;

#[rocket::async_trait]
impl Fairing for LoggerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Logger",
            kind: Kind::Liftoff | Kind::Request | Kind::Response | Kind::Shutdown,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let config = rocket.config();
        let scheme = if config.tls_enabled() { "https" } else { "http" };
        info!(
            "Voting API listening on {scheme}://{}:{} with {} routes",
            config.address,
            config.port,
            rocket.routes().count()
        );
    }

    async fn on_request(&self, req: &mut Request<'_>, _data: &mut Data<'_>) {
        let id = req.local_cache(RequestId::next);
        req.local_cache(|| Arrival(Instant::now()));
        info!("->req{id} {} {}", req.method(), req.uri());
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let id = req.local_cache(RequestId::next);
        let took = req.local_cache(|| Arrival(Instant::now())).0.elapsed();
        let status = res.status();
        log!(
            response_level(status.class()),
            "<-rsp{id} {status} {} in {}ms",
            describe_route(req.route()),
            took.as_millis()
        );
    }

    async fn on_shutdown(&self, _rocket: &Rocket<Orbit>) {
        warn!("Shutting down; in-flight requests will finish first");
    }
}
