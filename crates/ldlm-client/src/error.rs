//! Client error types for the LDLM SDK

/// Error type for LDLM client operations
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A gRPC call failed at the transport level. `Unavailable` is retried by
    /// the invoker; reaching the caller means the retry budget is spent or the
    /// status is not retryable.
    #[error("gRPC error: {0}")]
    Rpc(#[from] tonic::Status),

    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("lock does not exist")]
    LockDoesNotExist,

    #[error("invalid lock key")]
    InvalidLockKey,

    #[error("lock wait timeout exceeded")]
    LockWaitTimeout,

    #[error("lock is not locked")]
    NotLocked,

    #[error("lock does not exist or invalid key")]
    LockDoesNotExistOrInvalidKey,

    #[error("lock size mismatch")]
    LockSizeMismatch,

    #[error("invalid lock size")]
    InvalidLockSize,

    #[error("server returned error: code={code}, message={message}")]
    Server { code: i32, message: String },

    /// The server refused to release a lock this client believed it held.
    #[error("failed to unlock {name}: {reason}")]
    ReleaseFailed { name: String, reason: String },

    /// The lease of a held lock could not be renewed.
    #[error("lease renewal for {name} failed: {source}")]
    RenewalFailed {
        name: String,
        #[source]
        source: Box<ClientError>,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid session state: {0}")]
    InvalidState(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl ClientError {
    /// True for authoritative decisions reported by the server.
    pub fn is_server_decision(&self) -> bool {
        matches!(
            self,
            Self::LockDoesNotExist
                | Self::InvalidLockKey
                | Self::LockWaitTimeout
                | Self::NotLocked
                | Self::LockDoesNotExistOrInvalidKey
                | Self::LockSizeMismatch
                | Self::InvalidLockSize
                | Self::Server { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
