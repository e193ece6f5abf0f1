//! Retry discipline for remote lock calls
//!
//! Only transport failures are retried. A server decision embedded in a
//! response is final: retrying it would change its meaning, e.g. turn one
//! timed-out wait into several.

use std::future::Future;
use std::time::Duration;

use tonic::{Code, Status};
use tracing::{debug, warn};

use crate::classify::classify;
use crate::error::Result;
use crate::service::ServerReply;

/// Default delay between retries of a failed call
pub const DEFAULT_RETRY_INTERVAL_SECONDS: u64 = 5;

/// How failed transport calls are retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay between attempts
    pub interval: Duration,
    /// Maximum number of retries after the first attempt, 0 = retry forever
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_RETRY_INTERVAL_SECONDS),
            max_retries: 0,
        }
    }
}

impl RetryPolicy {
    /// Create a policy; an interval of zero seconds is raised to one.
    pub fn new(interval_seconds: u64, max_retries: u32) -> Self {
        Self {
            interval: Duration::from_secs(interval_seconds.max(1)),
            max_retries,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// True when failures are retried until the call succeeds.
    pub fn is_unbounded(&self) -> bool {
        self.max_retries == 0
    }

    fn exhausted(&self, retries: u32) -> bool {
        !self.is_unbounded() && retries >= self.max_retries
    }
}

/// Whether a failed call may be attempted again.
pub fn is_transient(status: &Status) -> bool {
    status.code() == Code::Unavailable
}

/// Run `call` with `request`, retrying transport failures according to `policy`.
///
/// A response carrying a server error is classified and returned as `Err`
/// after exactly one attempt.
pub async fn invoke<Req, Resp, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    request: Req,
    mut call: F,
) -> Result<Resp>
where
    Req: Clone,
    Resp: ServerReply,
    F: FnMut(Req) -> Fut,
    Fut: Future<Output = std::result::Result<Resp, Status>>,
{
    let mut retries: u32 = 0;

    loop {
        match call(request.clone()).await {
            Ok(response) => {
                if let Some(error) = response.server_error() {
                    debug!(
                        operation,
                        code = error.code,
                        message = %error.message,
                        "Server rejected request"
                    );
                    return Err(classify(error));
                }
                return Ok(response);
            }
            Err(status) if is_transient(&status) => {
                if policy.exhausted(retries) {
                    warn!(
                        operation,
                        retries,
                        error = %status,
                        "Giving up after exhausting retries"
                    );
                    return Err(status.into());
                }
                retries += 1;
                warn!(
                    operation,
                    retries,
                    error = %status,
                    "Transport failure, retrying in {:?}",
                    policy.interval
                );
                tokio::time::sleep(policy.interval).await;
            }
            Err(status) => return Err(status.into()),
        }
    }
}
