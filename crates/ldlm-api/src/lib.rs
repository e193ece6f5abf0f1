//! LDLM API - wire definitions for the lock service
//!
//! This crate provides:
//! - Protobuf messages exchanged with the lock server
//! - The `ldlm.LDLM` unary gRPC stub

pub mod grpc;
pub mod model;

pub use grpc::LdlmClient;
pub use model::*;
