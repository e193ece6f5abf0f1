//! Take a lock once, do some work while the lease is renewed, release it.
//!
//! ```text
//! LDLM_ADDRESS=localhost:3144 RUST_LOG=debug cargo run -p ldlm-client --example try_lock
//! ```

use std::time::Duration;

use ldlm_client::{ClientConfig, LockClient, LockOptions};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let config = ClientConfig::from_env()?;
    let client = LockClient::connect(&config)?;
    let options = LockOptions::new().with_lease_timeout(20);

    client
        .with_try_lock("work-item-aio1", &options, async |lock| {
            if !lock.is_locked() {
                info!(name = lock.name(), "Lock is held elsewhere, skipping");
                return;
            }
            info!(name = lock.name(), "Got lock, working");
            tokio::time::sleep(Duration::from_secs(30)).await;
        })
        .await?;

    Ok(())
}
