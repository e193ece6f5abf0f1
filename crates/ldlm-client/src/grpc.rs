//! gRPC transport for the lock service
//!
//! Wraps the `ldlm-api` stub behind the [`LockService`] seam. The channel is
//! connected lazily, so an unreachable server surfaces as `Unavailable` on
//! the first call and is handled by the retry layer.

use anyhow::Context;
use async_trait::async_trait;
use ldlm_api::{
    LdlmClient, LockRequest, LockResponse, RefreshLockRequest, TryLockRequest, UnlockRequest,
    UnlockResponse,
};
use tonic::{
    Request, Status,
    metadata::AsciiMetadataValue,
    transport::{Certificate, ClientTlsConfig, Endpoint, Identity},
};
use tracing::info;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::service::LockService;

const AUTHORIZATION_HEADER: &str = "authorization";

/// [`LockService`] backed by a tonic channel.
#[derive(Clone, Debug)]
pub struct GrpcLockService {
    client: LdlmClient,
    authorization: Option<AsciiMetadataValue>,
}

impl GrpcLockService {
    /// Build the channel described by `config` without connecting yet.
    ///
    /// Must be called within a tokio runtime.
    pub fn connect_lazy(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let uri = server_uri(&config.address, config.uses_tls());
        let mut endpoint = Endpoint::from_shared(uri.clone())?;
        if config.uses_tls() {
            endpoint = endpoint.tls_config(tls_config(config)?)?;
        }

        let authorization = match config.password.as_deref() {
            Some(password) if !password.is_empty() => {
                Some(AsciiMetadataValue::try_from(password).map_err(|_| {
                    ClientError::InvalidRequest(
                        "password contains characters not allowed in metadata".to_string(),
                    )
                })?)
            }
            _ => None,
        };

        info!(server = %uri, tls = config.uses_tls(), "Created LDLM channel");

        Ok(Self {
            client: LdlmClient::new(endpoint.connect_lazy()),
            authorization,
        })
    }

    fn request<T>(&self, message: T) -> Request<T> {
        let mut request = Request::new(message);
        if let Some(value) = &self.authorization {
            request
                .metadata_mut()
                .insert(AUTHORIZATION_HEADER, value.clone());
        }
        request
    }
}

#[async_trait]
impl LockService for GrpcLockService {
    async fn lock(&self, request: LockRequest) -> std::result::Result<LockResponse, Status> {
        let mut client = self.client.clone();
        Ok(client.lock(self.request(request)).await?.into_inner())
    }

    async fn try_lock(&self, request: TryLockRequest) -> std::result::Result<LockResponse, Status> {
        let mut client = self.client.clone();
        Ok(client.try_lock(self.request(request)).await?.into_inner())
    }

    async fn refresh_lock(
        &self,
        request: RefreshLockRequest,
    ) -> std::result::Result<LockResponse, Status> {
        let mut client = self.client.clone();
        Ok(client.refresh_lock(self.request(request)).await?.into_inner())
    }

    async fn unlock(&self, request: UnlockRequest) -> std::result::Result<UnlockResponse, Status> {
        let mut client = self.client.clone();
        Ok(client.unlock(self.request(request)).await?.into_inner())
    }
}

/// Build the endpoint URI, keeping an explicit scheme if one was given.
fn server_uri(address: &str, tls: bool) -> String {
    if address.starts_with("http://") || address.starts_with("https://") {
        return address.to_string();
    }
    let scheme = if tls { "https" } else { "http" };
    format!("{}://{}", scheme, address)
}

/// Host part of a `host:port` address, used as the TLS server name.
fn server_host(address: &str) -> &str {
    let addr = address
        .trim_start_matches("http://")
        .trim_start_matches("https://");
    addr.rsplit_once(':').map_or(addr, |(host, _)| host)
}

fn tls_config(config: &ClientConfig) -> Result<ClientTlsConfig> {
    let mut tls = ClientTlsConfig::new()
        .with_native_roots()
        .domain_name(server_host(&config.address));

    if let Some(ca_file) = &config.ca_file {
        let pem = std::fs::read(ca_file)
            .with_context(|| format!("failed to read CA certificate {}", ca_file.display()))?;
        tls = tls.ca_certificate(Certificate::from_pem(pem));
    }

    if let (Some(cert), Some(key)) = (&config.tls_cert, &config.tls_key) {
        let cert_pem = std::fs::read(cert)
            .with_context(|| format!("failed to read TLS certificate {}", cert.display()))?;
        let key_pem = std::fs::read(key)
            .with_context(|| format!("failed to read TLS key {}", key.display()))?;
        tls = tls.identity(Identity::from_pem(cert_pem, key_pem));
    }

    Ok(tls)
}
