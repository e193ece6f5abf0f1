//! Background lease renewal for held locks
//!
//! A `LeaseRenewer` owns a tokio task that periodically calls RefreshLock
//! for one held lock. The task is cancelled through a watch channel and
//! joined by [`LeaseRenewer::stop`], so the owner can be sure no refresh is
//! running before it unlocks.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use ldlm_api::RefreshLockRequest;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::{ClientError, Result};
use crate::retry::{self, RetryPolicy};
use crate::service::LockService;

/// Lower bound of the refresh interval
pub const MIN_REFRESH_SECONDS: u32 = 10;

/// How long before lease expiry a refresh is sent
pub const REFRESH_MARGIN_SECONDS: u32 = 30;

/// Interval between refreshes of a lease of `lease_timeout_seconds`.
pub fn refresh_interval(lease_timeout_seconds: u32) -> Duration {
    let seconds = lease_timeout_seconds
        .saturating_sub(REFRESH_MARGIN_SECONDS)
        .max(MIN_REFRESH_SECONDS);
    Duration::from_secs(u64::from(seconds))
}

/// What the renewal task is doing right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenewalPhase {
    /// Sleeping until the next refresh
    Scheduled,
    /// A RefreshLock call is in flight
    Renewing,
    /// The task has exited
    Stopped,
}

pub struct LeaseRenewer {
    name: String,
    interval: Duration,
    cancel: watch::Sender<bool>,
    phase: watch::Receiver<RenewalPhase>,
    refreshes: Arc<AtomicU64>,
    /// Cleared once the task has been joined
    task: Option<JoinHandle<Result<()>>>,
}

impl LeaseRenewer {
    /// Spawn the renewal task on the current tokio runtime.
    pub fn start(
        service: Arc<dyn LockService>,
        policy: RetryPolicy,
        name: &str,
        key: &str,
        lease_timeout_seconds: u32,
    ) -> Self {
        let interval = refresh_interval(lease_timeout_seconds);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (phase_tx, phase_rx) = watch::channel(RenewalPhase::Scheduled);
        let refreshes = Arc::new(AtomicU64::new(0));

        let task = tokio::spawn(run_renewal(
            service,
            policy,
            RefreshLockRequest::new(name, key, lease_timeout_seconds),
            interval,
            cancel_rx,
            phase_tx,
            refreshes.clone(),
        ));

        debug!(name, interval_secs = interval.as_secs(), "Started lease renewer");

        Self {
            name: name.to_string(),
            interval,
            cancel: cancel_tx,
            phase: phase_rx,
            refreshes,
            task: Some(task),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn phase(&self) -> RenewalPhase {
        *self.phase.borrow()
    }

    /// Number of successful refreshes so far.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Cancel the task and wait for it to exit.
    ///
    /// Returns the error that ended the task early, if any. A pending sleep
    /// or refresh is interrupted; once this returns no refresh for the lock
    /// is running. If this future is dropped before completing, the task is
    /// still owned by the renewer and a later `stop` joins it.
    pub async fn stop(&mut self) -> Result<()> {
        let _ = self.cancel.send(true);

        let Some(task) = self.task.as_mut() else {
            return Ok(());
        };
        let joined = task.await;
        self.task = None;

        let outcome = match joined {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(ClientError::Other(anyhow::anyhow!(
                "lease renewer task for {} aborted: {}",
                self.name,
                e
            ))),
        };

        debug!(name = %self.name, "Stopped lease renewer");
        outcome
    }
}

async fn run_renewal(
    service: Arc<dyn LockService>,
    policy: RetryPolicy,
    request: RefreshLockRequest,
    interval: Duration,
    mut cancel: watch::Receiver<bool>,
    phase: watch::Sender<RenewalPhase>,
    refreshes: Arc<AtomicU64>,
) -> Result<()> {
    let result = loop {
        phase.send_replace(RenewalPhase::Scheduled);
        tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => break Ok(()),
            _ = tokio::time::sleep(interval) => {}
        }

        phase.send_replace(RenewalPhase::Renewing);
        let refresh = retry::invoke(&policy, "RefreshLock", request.clone(), |req| {
            service.refresh_lock(req)
        });

        tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => break Ok(()),
            outcome = refresh => match outcome {
                Ok(response) if response.locked => {
                    let count = refreshes.fetch_add(1, Ordering::SeqCst) + 1;
                    debug!(name = %request.name, count, "Refreshed lock lease");
                }
                Ok(_) => break Err(ClientError::NotLocked),
                Err(e) => break Err(e),
            }
        }
    };

    phase.send_replace(RenewalPhase::Stopped);

    if let Err(e) = &result {
        error!(name = %request.name, error = %e, "Lease renewal stopped");
    }
    result
}

/// Resolves once cancellation is requested or the owner is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    while !*cancel.borrow_and_update() {
        if cancel.changed().await.is_err() {
            return;
        }
    }
}
