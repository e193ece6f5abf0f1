//! LDLM Client - Rust SDK for the LDLM distributed lock manager
//!
//! This crate provides:
//! - `LockSession`: acquire, hold and release one lock, with guaranteed release
//! - Background lease renewal for locks taken with a lease timeout
//! - Retry of transport failures; server decisions are never retried
//! - Typed errors for the server's error codes
//! - A gRPC transport and a `LockClient` facade with scoped acquisition

pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod grpc;
pub mod renewer;
pub mod retry;
pub mod service;
pub mod session;

pub use client::LockClient;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use grpc::GrpcLockService;
pub use renewer::{LeaseRenewer, RenewalPhase, refresh_interval};
pub use retry::RetryPolicy;
pub use service::{LockService, ServerReply};
pub use session::{LockHandle, LockOptions, LockSession, SessionState};
