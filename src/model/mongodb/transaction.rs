use std::time::{Duration, Instant};

use log::{debug, warn};
use mongodb::{Client, ClientSession};
use rand::Rng;
use rocket::tokio::time::sleep;

use crate::error::{Error, Result};

/// How long a transaction keeps retrying transient failures before the last
/// one is reported to the caller.
pub const TRANSACTION_RETRY_BUDGET: Duration = Duration::from_secs(120);

const INITIAL_BACKOFF: Duration = Duration::from_millis(5);
const MAX_BACKOFF: Duration = Duration::from_millis(500);

/// A unit of work that must take effect atomically.
///
/// `run` may be called more than once if the server aborts an attempt because
/// a concurrent transaction touched the same documents, so it must re-read
/// anything it depends on through the session it is given.
#[rocket::async_trait]
pub trait Transaction: Sync {
    type Output: Send;

    /// A short description for log messages.
    fn name(&self) -> &'static str;

    /// Perform the work. Returning an error aborts the transaction.
    async fn run(&self, session: &mut ClientSession) -> Result<Self::Output>;
}

/// Run `transaction` in a fresh session, committing on success and aborting
/// on failure.
///
/// Attempts that fail with a transient transaction error (write conflicts)
/// are retried after a jittered, exponentially growing pause, until
/// [`TRANSACTION_RETRY_BUDGET`] has elapsed.
pub async fn execute<T: Transaction>(db_client: &Client, transaction: &T) -> Result<T::Output> {
    let started = Instant::now();
    let mut backoff = INITIAL_BACKOFF;
    let mut attempt = 1;
    loop {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        let result = match transaction.run(&mut session).await {
            Ok(output) => session
                .commit_transaction()
                .await
                .map(|_| output)
                .map_err(Error::from),
            Err(e) => {
                if let Err(abort) = session.abort_transaction().await {
                    debug!("Abort of {} failed: {abort}", transaction.name());
                }
                Err(e)
            }
        };

        match result {
            Err(e) if e.is_transient() && started.elapsed() < TRANSACTION_RETRY_BUDGET => {
                let pause = jittered(backoff);
                debug!(
                    "{} attempt {attempt} hit a transient error, retrying in {}ms: {e}",
                    transaction.name(),
                    pause.as_millis()
                );
                sleep(pause).await;
                backoff = next_backoff(backoff);
                attempt += 1;
            }
            Err(e) if e.is_transient() => {
                warn!(
                    "{} gave up after {attempt} attempts in {}s: {e}",
                    transaction.name(),
                    started.elapsed().as_secs()
                );
                return Err(e);
            }
            result => return result,
        }
    }
}

/// Somewhere between half and one and a half times `backoff`, so that
/// transactions which conflicted once do not collide again in lockstep.
fn jittered(backoff: Duration) -> Duration {
    backoff.mul_f64(rand::thread_rng().gen_range(0.5..1.5))
}

fn next_backoff(backoff: Duration) -> Duration {
    (backoff * 2).min(MAX_BACKOFF)
}
