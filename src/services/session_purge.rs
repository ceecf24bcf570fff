use std::time::Duration;

use actix_web::rt::time;
use log::{debug, warn};

use super::UserService;
use crate::errors::ServiceError;

/// Consecutive failed sweeps tolerated before the task gives up.
const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Deletes expired sessions every `every`. Runs until the process stops; it
/// only returns when the data layer keeps failing, so that the supervisor can
/// treat it as a fault.
pub async fn purge_sessions_periodically(
    users: UserService,
    every: Duration,
) -> Result<(), ServiceError> {
    let mut ticker = time::interval(every);
    let mut failures = 0;

    loop {
        ticker.tick().await;
        match users.purge_expired_sessions().await {
            Ok(purged) => {
                failures = 0;
                if purged > 0 {
                    debug!("Purged {} expired session(s)", purged);
                }
            }
            Err(err) => {
                failures += 1;
                warn!(
                    "Session purge failed ({}/{}): {}",
                    failures, MAX_CONSECUTIVE_FAILURES, err
                );
                if failures >= MAX_CONSECUTIVE_FAILURES {
                    return Err(err);
                }
            }
        }
    }
}
