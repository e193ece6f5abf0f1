//! Client configuration
//!
//! Values can be built in code or loaded from a file and `LDLM_*`
//! environment variables, environment taking precedence.

use std::path::{Path, PathBuf};

use config::{Config, Environment};
use serde::Deserialize;

use crate::error::{ClientError, Result};
use crate::retry::{DEFAULT_RETRY_INTERVAL_SECONDS, RetryPolicy};

pub const DEFAULT_ADDRESS: &str = "localhost:3144";

/// Environment variable prefix, e.g. `LDLM_ADDRESS`, `LDLM_MAX_RETRIES`
pub const ENV_PREFIX: &str = "LDLM";

/// Configuration for connecting to an LDLM server.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    /// host:port of the lock server
    pub address: String,
    /// Password sent as `authorization` metadata
    pub password: Option<String>,
    /// Connect over TLS
    pub use_tls: bool,
    /// CA certificate (PEM) used to verify the server
    pub ca_file: Option<PathBuf>,
    /// Client certificate (PEM) for mutual TLS
    pub tls_cert: Option<PathBuf>,
    /// Client key (PEM) for mutual TLS
    pub tls_key: Option<PathBuf>,
    /// Don't renew leases in the background
    pub no_auto_refresh: bool,
    /// Retries on transport failure, 0 = retry forever
    pub max_retries: u32,
    /// Delay between retries in seconds
    pub retry_interval_seconds: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            password: None,
            use_tls: false,
            ca_file: None,
            tls_cert: None,
            tls_key: None,
            no_auto_refresh: false,
            max_retries: 0,
            retry_interval_seconds: DEFAULT_RETRY_INTERVAL_SECONDS,
        }
    }
}

impl ClientConfig {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            ..Default::default()
        }
    }

    /// Load from `LDLM_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Load from a config file (format picked by extension), then apply
    /// `LDLM_*` environment overrides.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::load(Some(path.as_ref()))
    }

    fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let config: ClientConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn with_tls(mut self, ca_file: Option<PathBuf>) -> Self {
        self.use_tls = true;
        self.ca_file = ca_file;
        self
    }

    pub fn with_client_identity(mut self, cert: PathBuf, key: PathBuf) -> Self {
        self.tls_cert = Some(cert);
        self.tls_key = Some(key);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_interval(mut self, seconds: u64) -> Self {
        self.retry_interval_seconds = seconds;
        self
    }

    pub fn without_auto_refresh(mut self) -> Self {
        self.no_auto_refresh = true;
        self
    }

    /// TLS is used when requested explicitly or when a client certificate is set.
    pub fn uses_tls(&self) -> bool {
        self.use_tls || self.tls_cert.is_some()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_interval_seconds, self.max_retries)
    }

    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(ClientError::InvalidRequest(
                "server address must not be empty".to_string(),
            ));
        }
        if self.tls_cert.is_some() != self.tls_key.is_some() {
            return Err(ClientError::InvalidRequest(
                "tls_cert and tls_key must be set together".to_string(),
            ));
        }
        Ok(())
    }
}
