//! The remote lock service as seen by the client core

use async_trait::async_trait;
use ldlm_api::{
    LockRequest, LockResponse, RefreshLockRequest, RpcError, TryLockRequest, UnlockRequest,
    UnlockResponse,
};
use tonic::Status;

/// The four remote operations the client core consumes.
///
/// An `Err` is a transport-level failure. Server decisions travel inside the
/// response's `error` field.
#[async_trait]
pub trait LockService: Send + Sync + 'static {
    async fn lock(&self, request: LockRequest) -> Result<LockResponse, Status>;

    async fn try_lock(&self, request: TryLockRequest) -> Result<LockResponse, Status>;

    async fn refresh_lock(&self, request: RefreshLockRequest) -> Result<LockResponse, Status>;

    async fn unlock(&self, request: UnlockRequest) -> Result<UnlockResponse, Status>;
}

/// Response that may carry a server-signaled error.
pub trait ServerReply {
    fn server_error(&self) -> Option<&RpcError>;
}

impl ServerReply for LockResponse {
    fn server_error(&self) -> Option<&RpcError> {
        self.error.as_ref()
    }
}

impl ServerReply for UnlockResponse {
    fn server_error(&self) -> Option<&RpcError> {
        self.error.as_ref()
    }
}
