//! Client facade over the lock service
//!
//! `LockClient` creates [`LockSession`]s and offers scoped acquisition:
//! [`LockClient::with_lock`] runs a critical section and always releases
//! afterwards.

use std::sync::Arc;

use ldlm_api::{LockResponse, RefreshLockRequest, UnlockRequest};
use tracing::info;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::grpc::GrpcLockService;
use crate::retry::{self, RetryPolicy};
use crate::service::LockService;
use crate::session::{LockHandle, LockOptions, LockSession};

#[derive(Clone)]
pub struct LockClient {
    service: Arc<dyn LockService>,
    policy: RetryPolicy,
    auto_refresh: bool,
}

impl LockClient {
    /// Create a client talking gRPC to the server in `config`.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let service = GrpcLockService::connect_lazy(config)?;
        info!(address = %config.address, "LDLM client ready");
        Ok(Self::with_service(Arc::new(service), config.retry_policy())
            .with_auto_refresh(!config.no_auto_refresh))
    }

    /// Create a client over any [`LockService`] implementation.
    pub fn with_service(service: Arc<dyn LockService>, policy: RetryPolicy) -> Self {
        Self {
            service,
            policy,
            auto_refresh: true,
        }
    }

    pub fn with_auto_refresh(mut self, enabled: bool) -> Self {
        self.auto_refresh = enabled;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// A fresh, idle session.
    pub fn session(&self) -> LockSession {
        LockSession::new(self.service.clone(), self.policy).with_auto_refresh(self.auto_refresh)
    }

    /// Wait for `name` and return the session owning the outcome.
    pub async fn lock(&self, name: &str, options: &LockOptions) -> Result<LockSession> {
        let mut session = self.session();
        session.acquire_with_options(name, options).await?;
        Ok(session)
    }

    /// Try `name` once and return the session owning the outcome.
    pub async fn try_lock(&self, name: &str, options: &LockOptions) -> Result<LockSession> {
        let mut session = self.session();
        session.try_acquire_with_options(name, options).await?;
        Ok(session)
    }

    /// Acquire `name`, run `f` with the handle, then release.
    ///
    /// `f` runs whether or not the lock was obtained; check
    /// [`LockHandle::is_locked`]. A failed release is returned in place of
    /// `f`'s result.
    pub async fn with_lock<R>(
        &self,
        name: &str,
        options: &LockOptions,
        f: impl AsyncFnOnce(&LockHandle) -> R,
    ) -> Result<R> {
        let session = self.lock(name, options).await?;
        run_scoped(session, f).await
    }

    /// Like [`LockClient::with_lock`] with a single non-blocking attempt.
    pub async fn with_try_lock<R>(
        &self,
        name: &str,
        options: &LockOptions,
        f: impl AsyncFnOnce(&LockHandle) -> R,
    ) -> Result<R> {
        let session = self.try_lock(name, options).await?;
        run_scoped(session, f).await
    }

    /// Refresh a lease by hand.
    pub async fn refresh_lock(
        &self,
        name: &str,
        key: &str,
        lease_timeout_seconds: u32,
    ) -> Result<LockResponse> {
        if name.is_empty() || key.is_empty() {
            return Err(ClientError::InvalidRequest(
                "refresh requires a lock name and key".to_string(),
            ));
        }
        let request = RefreshLockRequest::new(name, key, lease_timeout_seconds);
        retry::invoke(&self.policy, "RefreshLock", request, |req| {
            self.service.refresh_lock(req)
        })
        .await
    }

    /// Release a lock by name and key, outside of any session.
    pub async fn unlock(&self, name: &str, key: &str) -> Result<bool> {
        if name.is_empty() || key.is_empty() {
            return Err(ClientError::InvalidRequest(
                "unlock requires a lock name and key".to_string(),
            ));
        }
        let request = UnlockRequest::new(name, key);
        let response =
            retry::invoke(&self.policy, "Unlock", request, |req| self.service.unlock(req)).await?;
        Ok(response.unlocked)
    }
}

async fn run_scoped<R>(mut session: LockSession, f: impl AsyncFnOnce(&LockHandle) -> R) -> Result<R> {
    let result = match session.handle() {
        Some(handle) => f(handle).await,
        None => {
            return Err(ClientError::InvalidState(
                "session finished acquiring without a handle".to_string(),
            ));
        }
    };
    session.release().await?;
    Ok(result)
}
