//! In-memory lock server used by the integration tests.
//!
//! Grants free locks, makes contended `Lock` calls wait out their wait
//! timeout (tokio time, so tests can pause the clock), records every call
//! and lets tests inject transport failures.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use ldlm_api::{
    ErrorCode, LockRequest, LockResponse, RefreshLockRequest, RpcError, TryLockRequest,
    UnlockRequest, UnlockResponse,
};
use ldlm_client::{LockClient, LockService, RetryPolicy};
use tokio::time::Instant;
use tonic::Status;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Lock,
    TryLock,
    RefreshLock,
    Unlock,
}

#[derive(Clone, Debug)]
pub struct Call {
    pub op: Op,
    pub name: String,
    pub key: String,
    pub at: Instant,
    /// Refresh calls in flight when this call arrived
    pub refreshes_in_flight: u64,
}

#[derive(Default)]
pub struct FakeLockServer {
    held: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashMap<Op, VecDeque<Status>>>,
    next_key: AtomicU64,
    refreshes_in_flight: AtomicU64,
    refresh_delay: Mutex<Option<Duration>>,
    reject_unlock: AtomicBool,
}

impl FakeLockServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mark `name` as held by someone else.
    pub fn hold(&self, name: &str, key: &str) {
        self.held
            .lock()
            .unwrap()
            .insert(name.to_string(), key.to_string());
    }

    /// Forget `name` server-side, as if its lease expired.
    pub fn expire(&self, name: &str) {
        self.held.lock().unwrap().remove(name);
    }

    pub fn is_held(&self, name: &str) -> bool {
        self.held.lock().unwrap().contains_key(name)
    }

    /// Fail the next `count` calls of `op` with `status`.
    pub fn fail_next(&self, op: Op, count: usize, status: Status) {
        let mut failures = self.failures.lock().unwrap();
        let queue = failures.entry(op).or_default();
        for _ in 0..count {
            queue.push_back(status.clone());
        }
    }

    /// Answer every Unlock with `unlocked = false` and no error.
    pub fn reject_unlocks(&self) {
        self.reject_unlock.store(true, Ordering::SeqCst);
    }

    pub fn delay_refreshes(&self, delay: Duration) {
        *self.refresh_delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_of(&self, op: Op) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call.op == op)
            .collect()
    }

    pub fn count(&self, op: Op) -> usize {
        self.calls_of(op).len()
    }

    pub fn client(self: &Arc<Self>, policy: RetryPolicy) -> LockClient {
        LockClient::with_service(self.clone(), policy)
    }

    fn record(&self, op: Op, name: &str, key: &str) -> Result<(), Status> {
        self.calls.lock().unwrap().push(Call {
            op: op.clone(),
            name: name.to_string(),
            key: key.to_string(),
            at: Instant::now(),
            refreshes_in_flight: self.refreshes_in_flight.load(Ordering::SeqCst),
        });

        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(status) => Err(status),
            None => Ok(()),
        }
    }

    fn grant(&self, name: &str) -> Option<String> {
        let mut held = self.held.lock().unwrap();
        if held.contains_key(name) {
            return None;
        }
        let key = format!("key-{}", self.next_key.fetch_add(1, Ordering::SeqCst) + 1);
        held.insert(name.to_string(), key.clone());
        Some(key)
    }
}

struct InFlight<'a>(&'a AtomicU64);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicU64) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Fast retry policy for tests.
pub fn policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy::default()
        .with_interval(Duration::from_millis(100))
        .with_max_retries(max_retries)
}

#[async_trait]
impl LockService for FakeLockServer {
    async fn lock(&self, request: LockRequest) -> Result<LockResponse, Status> {
        self.record(Op::Lock, &request.name, "")?;

        if let Some(key) = self.grant(&request.name) {
            return Ok(LockResponse::locked(request.name, key));
        }

        match request.wait_timeout_seconds {
            Some(seconds) => {
                tokio::time::sleep(Duration::from_secs(seconds as u64)).await;
                match self.grant(&request.name) {
                    Some(key) => Ok(LockResponse::locked(request.name, key)),
                    None => Ok(LockResponse::not_locked(request.name).with_error(
                        RpcError::new(ErrorCode::LockWaitTimeout, "lock wait timeout exceeded"),
                    )),
                }
            }
            None => loop {
                tokio::time::sleep(Duration::from_millis(50)).await;
                if let Some(key) = self.grant(&request.name) {
                    return Ok(LockResponse::locked(request.name, key));
                }
            },
        }
    }

    async fn try_lock(&self, request: TryLockRequest) -> Result<LockResponse, Status> {
        self.record(Op::TryLock, &request.name, "")?;

        Ok(match self.grant(&request.name) {
            Some(key) => LockResponse::locked(request.name, key),
            None => LockResponse::not_locked(request.name),
        })
    }

    async fn refresh_lock(&self, request: RefreshLockRequest) -> Result<LockResponse, Status> {
        self.record(Op::RefreshLock, &request.name, &request.key)?;

        {
            // Decrements on drop, including when the caller abandons the call
            let _in_flight = InFlight::enter(&self.refreshes_in_flight);
            let delay = *self.refresh_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
        }

        let held = self.held.lock().unwrap();
        Ok(match held.get(&request.name) {
            Some(key) if *key == request.key => LockResponse::locked(request.name, request.key),
            Some(_) => LockResponse::not_locked(request.name)
                .with_error(RpcError::new(ErrorCode::InvalidLockKey, "invalid lock key")),
            None => LockResponse::not_locked(request.name)
                .with_error(RpcError::new(ErrorCode::LockDoesNotExist, "lock does not exist")),
        })
    }

    async fn unlock(&self, request: UnlockRequest) -> Result<UnlockResponse, Status> {
        self.record(Op::Unlock, &request.name, &request.key)?;

        if self.reject_unlock.load(Ordering::SeqCst) {
            return Ok(UnlockResponse::new(request.name, false));
        }

        let mut held = self.held.lock().unwrap();
        Ok(match held.get(&request.name) {
            Some(key) if *key == request.key => {
                held.remove(&request.name);
                UnlockResponse::new(request.name, true)
            }
            Some(_) => UnlockResponse::new(request.name, false)
                .with_error(RpcError::new(ErrorCode::InvalidLockKey, "invalid lock key")),
            None => UnlockResponse::new(request.name, false)
                .with_error(RpcError::new(ErrorCode::NotLocked, "not locked")),
        })
    }
}
