//! Bounded readiness polling.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{NetworkError, Result};

/// Outcome of a single readiness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness<T> {
    Ready(T),
    /// Not ready yet, with the reason last reported by the backend.
    Pending(String),
}

/// Poll timing for one wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub interval: Duration,
}

/// Polls `check` until it reports ready, fails, the timeout elapses, or
/// `cancel` fires.
///
/// The first check runs immediately. A check error is terminal and returned
/// as-is. On timeout the last pending reason is carried in
/// [`NetworkError::NotReady`]; cancellation yields [`NetworkError::Cancelled`]
/// without waiting out the remaining time. A timeout too large to represent
/// as an instant never expires.
pub async fn wait_until_ready<T, F, Fut>(
    interface: &str,
    opts: WaitOptions,
    cancel: &CancellationToken,
    mut check: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Readiness<T>>>,
{
    let start = Instant::now();
    let deadline = start.checked_add(opts.timeout);
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(cancelled(interface));
        }

        attempt += 1;
        let reason = match check().await? {
            Readiness::Ready(value) => {
                debug!(interface, attempt, elapsed = ?start.elapsed(), "Interface ready");
                return Ok(value);
            }
            Readiness::Pending(reason) => reason,
        };

        let now = Instant::now();
        if deadline.is_some_and(|deadline| now >= deadline) {
            let elapsed = now - start;
            warn!(interface, attempt, ?elapsed, %reason, "Interface not ready before timeout");
            return Err(NetworkError::NotReady {
                interface: interface.to_string(),
                elapsed,
                reason,
            });
        }

        debug!(interface, attempt, %reason, "Interface not ready, polling again");
        let pause = match deadline {
            Some(deadline) => opts.interval.min(deadline - now),
            None => opts.interval,
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(interface)),
            _ = tokio::time::sleep(pause) => {}
        }
    }
}

fn cancelled(interface: &str) -> NetworkError {
    debug!(interface, "Wait cancelled");
    NetworkError::Cancelled {
        interface: interface.to_string(),
    }
}
