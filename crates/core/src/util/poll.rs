//! Caller-side polling loop.
//!
//! [`RecognizeJob`] does no I/O on its own; this drives it by calling
//! `refresh` on a backoff schedule until the job reports done.

use crate::job::{RecognizeJob, RefreshError};
use crate::util::RetryConfig;
use tokio::time::sleep;

const LOG_TARGET: &str = "poll";

#[derive(thiserror::Error, Debug)]
pub enum PollError {
    #[error(transparent)]
    Refresh(#[from] RefreshError),

    #[error("job {id} still pending after {refreshes} refreshes")]
    Timeout { id: String, refreshes: u32 },
}

/// Refreshes `job` until it is done, sleeping with backoff between attempts.
/// At most `backoff.max_attempts` refreshes are issued. Refresh errors are
/// returned immediately.
pub async fn wait_until_done(job: &mut RecognizeJob, backoff: &RetryConfig) -> Result<(), PollError> {
    let mut refreshes = 0;
    while !job.done() {
        if refreshes >= backoff.max_attempts {
            return Err(PollError::Timeout {
                id: job.id().to_owned(),
                refreshes,
            });
        }
        if refreshes > 0 {
            let delay = backoff.jittered_delay(refreshes);
            tracing::debug!(target: LOG_TARGET, job = %job.id(), ?delay, "job pending, waiting");
            sleep(delay).await;
        }
        job.refresh().await?;
        refreshes += 1;
    }
    tracing::info!(target: LOG_TARGET, job = %job.id(), state = ?job.state(), refreshes, "job finished");
    Ok(())
}
