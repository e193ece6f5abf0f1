//! Protobuf messages of the `ldlm` package
//!
//! Optional numeric fields follow the server's convention: a missing field
//! means "use the server default", so the builders below leave them unset
//! when given zero.

/// Error codes the server embeds in otherwise successful responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ErrorCode {
    Unknown = 0,
    LockDoesNotExist = 1,
    InvalidLockKey = 2,
    LockWaitTimeout = 3,
    NotLocked = 4,
    LockDoesNotExistOrInvalidKey = 5,
    LockSizeMismatch = 6,
    InvalidLockSize = 7,
}

impl ErrorCode {
    pub fn as_str_name(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::LockDoesNotExist => "LockDoesNotExist",
            Self::InvalidLockKey => "InvalidLockKey",
            Self::LockWaitTimeout => "LockWaitTimeout",
            Self::NotLocked => "NotLocked",
            Self::LockDoesNotExistOrInvalidKey => "LockDoesNotExistOrInvalidKey",
            Self::LockSizeMismatch => "LockSizeMismatch",
            Self::InvalidLockSize => "InvalidLockSize",
        }
    }
}

/// Server decision attached to a response.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RpcError {
    #[prost(enumeration = "ErrorCode", tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
}

impl RpcError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code as i32,
            message: message.into(),
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LockRequest {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(int32, optional, tag = "2")]
    pub wait_timeout_seconds: Option<i32>,
    #[prost(int32, optional, tag = "3")]
    pub lock_timeout_seconds: Option<i32>,
    #[prost(int32, optional, tag = "4")]
    pub size: Option<i32>,
}

impl LockRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_wait_timeout(mut self, seconds: u32) -> Self {
        self.wait_timeout_seconds = non_zero(seconds);
        self
    }

    pub fn with_lock_timeout(mut self, seconds: u32) -> Self {
        self.lock_timeout_seconds = non_zero(seconds);
        self
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = non_zero(size);
        self
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TryLockRequest {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(int32, optional, tag = "2")]
    pub lock_timeout_seconds: Option<i32>,
    #[prost(int32, optional, tag = "3")]
    pub size: Option<i32>,
}

impl TryLockRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_lock_timeout(mut self, seconds: u32) -> Self {
        self.lock_timeout_seconds = non_zero(seconds);
        self
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = non_zero(size);
        self
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RefreshLockRequest {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub key: String,
    #[prost(int32, tag = "3")]
    pub lock_timeout_seconds: i32,
}

impl RefreshLockRequest {
    pub fn new(name: impl Into<String>, key: impl Into<String>, lock_timeout_seconds: u32) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            lock_timeout_seconds: clamp_i32(lock_timeout_seconds),
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UnlockRequest {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub key: String,
}

impl UnlockRequest {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
        }
    }
}

/// Response to Lock, TryLock and RefreshLock.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LockResponse {
    #[prost(bool, tag = "1")]
    pub locked: bool,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub key: String,
    #[prost(message, optional, tag = "4")]
    pub error: Option<RpcError>,
}

impl LockResponse {
    pub fn locked(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            locked: true,
            name: name.into(),
            key: key.into(),
            error: None,
        }
    }

    pub fn not_locked(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_error(mut self, error: RpcError) -> Self {
        self.error = Some(error);
        self
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UnlockResponse {
    #[prost(bool, tag = "1")]
    pub unlocked: bool,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(message, optional, tag = "3")]
    pub error: Option<RpcError>,
}

impl UnlockResponse {
    pub fn new(name: impl Into<String>, unlocked: bool) -> Self {
        Self {
            unlocked,
            name: name.into(),
            error: None,
        }
    }

    pub fn with_error(mut self, error: RpcError) -> Self {
        self.error = Some(error);
        self
    }
}

fn non_zero(value: u32) -> Option<i32> {
    (value > 0).then(|| clamp_i32(value))
}

fn clamp_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
