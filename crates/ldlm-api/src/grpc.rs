//! Unary gRPC stub for the `ldlm.LDLM` service

use http::uri::PathAndQuery;
use tonic::{
    GrpcMethod, IntoRequest, Response, Status, client::Grpc, transport::Channel,
};
use tonic_prost::ProstCodec;

use crate::model::{
    LockRequest, LockResponse, RefreshLockRequest, TryLockRequest, UnlockRequest, UnlockResponse,
};

pub const SERVICE_NAME: &str = "ldlm.LDLM";

/// Client for the four lock operations of the LDLM server.
#[derive(Debug, Clone)]
pub struct LdlmClient {
    inner: Grpc<Channel>,
}

impl LdlmClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: Grpc::new(channel),
        }
    }

    pub async fn lock(
        &mut self,
        request: impl IntoRequest<LockRequest>,
    ) -> Result<Response<LockResponse>, Status> {
        self.unary(request, "Lock", PathAndQuery::from_static("/ldlm.LDLM/Lock"))
            .await
    }

    pub async fn try_lock(
        &mut self,
        request: impl IntoRequest<TryLockRequest>,
    ) -> Result<Response<LockResponse>, Status> {
        self.unary(
            request,
            "TryLock",
            PathAndQuery::from_static("/ldlm.LDLM/TryLock"),
        )
        .await
    }

    pub async fn refresh_lock(
        &mut self,
        request: impl IntoRequest<RefreshLockRequest>,
    ) -> Result<Response<LockResponse>, Status> {
        self.unary(
            request,
            "RefreshLock",
            PathAndQuery::from_static("/ldlm.LDLM/RefreshLock"),
        )
        .await
    }

    pub async fn unlock(
        &mut self,
        request: impl IntoRequest<UnlockRequest>,
    ) -> Result<Response<UnlockResponse>, Status> {
        self.unary(
            request,
            "Unlock",
            PathAndQuery::from_static("/ldlm.LDLM/Unlock"),
        )
        .await
    }

    async fn unary<Req, Resp>(
        &mut self,
        request: impl IntoRequest<Req>,
        method: &'static str,
        path: PathAndQuery,
    ) -> Result<Response<Resp>, Status>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        self.inner
            .ready()
            .await
            .map_err(|e| Status::unavailable(format!("Service was not ready: {}", e)))?;

        let mut req = request.into_request();
        req.extensions_mut()
            .insert(GrpcMethod::new(SERVICE_NAME, method));

        self.inner
            .unary(req, path, ProstCodec::<Req, Resp>::default())
            .await
    }
}
