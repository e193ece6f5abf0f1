//! Lock sessions: acquisition, renewal and guaranteed release of one lock
//!
//! A `LockSession` owns exactly one `LockHandle`. It moves through
//! `Idle -> Acquiring -> {Held, NotHeld}` and `Held -> Releasing -> Released`.
//! While `Held` with a lease, a [`LeaseRenewer`] keeps the lock alive; it is
//! always stopped before the Unlock call goes out.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ldlm_api::{LockRequest, LockResponse, TryLockRequest, UnlockRequest};
use tracing::{debug, error, warn};

use crate::error::{ClientError, Result};
use crate::renewer::{LeaseRenewer, RenewalPhase};
use crate::retry::{self, RetryPolicy};
use crate::service::LockService;

/// Lifecycle of a [`LockSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Acquiring,
    Held,
    NotHeld,
    Releasing,
    Released,
}

/// Options for acquiring a lock.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LockOptions {
    /// Seconds the server waits for the lock, 0 = wait indefinitely
    pub wait_timeout_seconds: u32,
    /// Lease lifetime in seconds, 0 = the lock never expires
    pub lease_timeout_seconds: u32,
    /// Lock size, 0 = server default
    pub size: u32,
    /// Return `LockWaitTimeout` instead of a non-locked handle
    pub raise_on_wait_timeout: bool,
}

impl LockOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wait_timeout(mut self, seconds: u32) -> Self {
        self.wait_timeout_seconds = seconds;
        self
    }

    pub fn with_lease_timeout(mut self, seconds: u32) -> Self {
        self.lease_timeout_seconds = seconds;
        self
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    pub fn raise_on_wait_timeout(mut self, raise: bool) -> Self {
        self.raise_on_wait_timeout = raise;
        self
    }
}

/// The outcome of an acquisition attempt.
///
/// The key is only readable while the lock is held.
#[derive(Debug, PartialEq, Eq)]
pub struct LockHandle {
    name: String,
    key: String,
    locked: bool,
    acquired_at: Option<DateTime<Utc>>,
}

impl LockHandle {
    fn held(name: &str, key: String) -> Self {
        Self {
            name: name.to_string(),
            key,
            locked: true,
            acquired_at: Some(Utc::now()),
        }
    }

    fn not_held(name: &str) -> Self {
        Self {
            name: name.to_string(),
            key: String::new(),
            locked: false,
            acquired_at: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> Option<&str> {
        self.locked.then_some(self.key.as_str())
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn acquired_at(&self) -> Option<DateTime<Utc>> {
        self.acquired_at
    }

    fn mark_released(&mut self) {
        self.locked = false;
        self.key.clear();
    }
}

/// Scoped owner of one distributed lock.
///
/// Dropping a session that still holds its lock schedules the release on the
/// current tokio runtime; call [`LockSession::release`] to observe its result.
pub struct LockSession {
    service: Arc<dyn LockService>,
    policy: RetryPolicy,
    auto_refresh: bool,
    state: SessionState,
    handle: Option<LockHandle>,
    renewer: Option<LeaseRenewer>,
}

impl LockSession {
    pub fn new(service: Arc<dyn LockService>, policy: RetryPolicy) -> Self {
        Self {
            service,
            policy,
            auto_refresh: true,
            state: SessionState::Idle,
            handle: None,
            renewer: None,
        }
    }

    /// Enable or disable background lease renewal.
    pub fn with_auto_refresh(mut self, enabled: bool) -> Self {
        self.auto_refresh = enabled;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn handle(&self) -> Option<&LockHandle> {
        self.handle.as_ref()
    }

    pub fn is_locked(&self) -> bool {
        self.handle.as_ref().is_some_and(LockHandle::is_locked)
    }

    pub fn renewal_phase(&self) -> Option<RenewalPhase> {
        self.renewer.as_ref().map(LeaseRenewer::phase)
    }

    /// True while a renewal task is alive for the held lock.
    pub fn is_renewing(&self) -> bool {
        self.renewer.as_ref().is_some_and(LeaseRenewer::is_running)
    }

    pub fn refresh_count(&self) -> u64 {
        self.renewer.as_ref().map_or(0, LeaseRenewer::refresh_count)
    }

    /// Wait for the lock, up to `wait_timeout_seconds` as enforced by the server.
    ///
    /// A wait timeout yields a non-locked handle unless
    /// `raise_on_wait_timeout` is set.
    pub async fn acquire(
        &mut self,
        name: &str,
        wait_timeout_seconds: u32,
        lease_timeout_seconds: u32,
        raise_on_wait_timeout: bool,
    ) -> Result<&LockHandle> {
        let options = LockOptions::new()
            .with_wait_timeout(wait_timeout_seconds)
            .with_lease_timeout(lease_timeout_seconds)
            .raise_on_wait_timeout(raise_on_wait_timeout);
        self.acquire_with_options(name, &options).await
    }

    pub async fn acquire_with_options(
        &mut self,
        name: &str,
        options: &LockOptions,
    ) -> Result<&LockHandle> {
        self.begin(name)?;

        let request = LockRequest::new(name)
            .with_wait_timeout(options.wait_timeout_seconds)
            .with_lock_timeout(options.lease_timeout_seconds)
            .with_size(options.size);

        let service = self.service.clone();
        let outcome = retry::invoke(&self.policy, "Lock", request, |req| service.lock(req)).await;

        let outcome = match outcome {
            Err(ClientError::LockWaitTimeout) if !options.raise_on_wait_timeout => {
                debug!(name, "Wait timeout exceeded, lock not acquired");
                Ok(LockResponse::not_locked(name))
            }
            other => other,
        };

        self.complete(name, options.lease_timeout_seconds, outcome)
    }

    /// Make a single attempt to take the lock without waiting.
    pub async fn try_acquire(
        &mut self,
        name: &str,
        lease_timeout_seconds: u32,
    ) -> Result<&LockHandle> {
        let options = LockOptions::new().with_lease_timeout(lease_timeout_seconds);
        self.try_acquire_with_options(name, &options).await
    }

    pub async fn try_acquire_with_options(
        &mut self,
        name: &str,
        options: &LockOptions,
    ) -> Result<&LockHandle> {
        if options.wait_timeout_seconds > 0 {
            return Err(ClientError::InvalidRequest(
                "wait timeout not supported for try_lock".to_string(),
            ));
        }
        self.begin(name)?;

        let request = TryLockRequest::new(name)
            .with_lock_timeout(options.lease_timeout_seconds)
            .with_size(options.size);

        let service = self.service.clone();
        let outcome =
            retry::invoke(&self.policy, "TryLock", request, |req| service.try_lock(req)).await;

        self.complete(name, options.lease_timeout_seconds, outcome)
    }

    /// Stop lease renewal, then unlock.
    ///
    /// Sends exactly one Unlock (modulo transport retries) for a held lock and
    /// none otherwise. Calling it again is a no-op. If the returned future is
    /// dropped before the Unlock completes, the lock stays owed: a later call
    /// or dropping the session finishes the release.
    pub async fn release(&mut self) -> Result<()> {
        if !self.owes_unlock() {
            return Ok(());
        }
        self.state = SessionState::Releasing;

        let renewal = match self.renewer.as_mut() {
            Some(renewer) => {
                let outcome = renewer.stop().await;
                self.renewer = None;
                outcome
            }
            None => Ok(()),
        };

        let Some(handle) = self.handle.as_ref() else {
            self.state = SessionState::Released;
            return Err(ClientError::InvalidState(
                "held session without a handle".to_string(),
            ));
        };
        let name = handle.name.clone();
        let request = UnlockRequest::new(name.as_str(), handle.key.as_str());

        let service = self.service.clone();
        let outcome = retry::invoke(&self.policy, "Unlock", request, |req| service.unlock(req)).await;

        if let Some(handle) = self.handle.as_mut() {
            handle.mark_released();
        }
        self.state = SessionState::Released;

        match outcome {
            Ok(response) if response.unlocked => {
                debug!(name = %name, "Released lock");
            }
            Ok(_) => {
                return Err(ClientError::ReleaseFailed {
                    name,
                    reason: "server reported unlocked=false".to_string(),
                });
            }
            Err(e) if e.is_server_decision() => {
                return Err(ClientError::ReleaseFailed {
                    name,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }

        renewal.map_err(|source| ClientError::RenewalFailed {
            name,
            source: Box::new(source),
        })
    }

    /// Held, or partway through a release that has not reached the server.
    fn owes_unlock(&self) -> bool {
        matches!(self.state, SessionState::Held | SessionState::Releasing) && self.is_locked()
    }

    fn begin(&mut self, name: &str) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(ClientError::InvalidState(format!(
                "session already used ({:?})",
                self.state
            )));
        }
        if name.is_empty() {
            return Err(ClientError::InvalidRequest(
                "lock name must not be empty".to_string(),
            ));
        }
        self.state = SessionState::Acquiring;
        Ok(())
    }

    fn complete(
        &mut self,
        name: &str,
        lease_timeout_seconds: u32,
        outcome: Result<LockResponse>,
    ) -> Result<&LockHandle> {
        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                self.state = SessionState::NotHeld;
                self.handle = Some(LockHandle::not_held(name));
                return Err(e);
            }
        };

        if !response.locked {
            self.state = SessionState::NotHeld;
            let handle: &LockHandle = self.handle.insert(LockHandle::not_held(name));
            return Ok(handle);
        }

        if lease_timeout_seconds > 0 && self.auto_refresh {
            self.renewer = Some(LeaseRenewer::start(
                self.service.clone(),
                self.policy,
                name,
                &response.key,
                lease_timeout_seconds,
            ));
        }

        debug!(name, lease_timeout_seconds, "Acquired lock");
        self.state = SessionState::Held;
        let handle: &LockHandle = self.handle.insert(LockHandle::held(name, response.key));
        Ok(handle)
    }
}

impl Drop for LockSession {
    fn drop(&mut self) {
        if !self.owes_unlock() {
            return;
        }
        self.state = SessionState::Releasing;

        let Some(mut handle) = self.handle.take() else {
            return;
        };
        let request = UnlockRequest::new(handle.name.as_str(), handle.key.as_str());
        handle.mark_released();
        let renewer = self.renewer.take();

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!(
                name = %handle.name,
                "Lock session dropped outside a tokio runtime, lock left to expire"
            );
            return;
        };

        warn!(name = %handle.name, "Lock session dropped while held, releasing in background");

        let service = self.service.clone();
        let policy = self.policy;
        runtime.spawn(async move {
            if let Some(mut renewer) = renewer
                && let Err(e) = renewer.stop().await
            {
                error!(name = %request.name, error = %e, "Lease renewal had failed");
            }

            let name = request.name.clone();
            match retry::invoke(&policy, "Unlock", request, |req| service.unlock(req)).await {
                Ok(response) if response.unlocked => debug!(name = %name, "Released lock"),
                Ok(_) => error!(name = %name, "Failed to unlock: server reported unlocked=false"),
                Err(e) => error!(name = %name, error = %e, "Failed to unlock"),
            }
        });
    }
}
