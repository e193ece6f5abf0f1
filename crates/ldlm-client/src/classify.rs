//! Mapping of server-reported error codes to typed client errors

use ldlm_api::{ErrorCode, RpcError};

use crate::error::ClientError;

/// Convert the error embedded in a server response into a `ClientError`.
///
/// `Unknown` and codes this client does not know keep the raw code and
/// message for diagnostics.
pub fn classify(error: &RpcError) -> ClientError {
    match ErrorCode::try_from(error.code) {
        Ok(ErrorCode::LockDoesNotExist) => ClientError::LockDoesNotExist,
        Ok(ErrorCode::InvalidLockKey) => ClientError::InvalidLockKey,
        Ok(ErrorCode::LockWaitTimeout) => ClientError::LockWaitTimeout,
        Ok(ErrorCode::NotLocked) => ClientError::NotLocked,
        Ok(ErrorCode::LockDoesNotExistOrInvalidKey) => ClientError::LockDoesNotExistOrInvalidKey,
        Ok(ErrorCode::LockSizeMismatch) => ClientError::LockSizeMismatch,
        Ok(ErrorCode::InvalidLockSize) => ClientError::InvalidLockSize,
        Ok(ErrorCode::Unknown) | Err(_) => ClientError::Server {
            code: error.code,
            message: error.message.clone(),
        },
    }
}
