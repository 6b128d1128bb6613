//! The Gridlock server binary.
//!
//! Bootstraps logging, verifies the shared store is reachable, and runs
//! the WebSocket server until interrupted. Bootstrap failures are fatal;
//! everything after that is handled and logged.

use gridlock::prelude::*;
use gridlock::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init();

    let config = ServerConfig::from_env();
    tracing::info!(
        redis_url = %config.redis_url,
        listen_addr = %config.listen_addr,
        "starting gridlock server"
    );

    let client = redis::Client::open(config.redis_url.as_str())
        .map_err(gridlock_store::StoreError::from)?;

    // Fail fast when the store is unreachable — a session server
    // without its store can only mislead clients.
    let mut probe = client
        .get_multiplexed_async_connection()
        .await
        .map_err(gridlock_store::StoreError::from)?;
    redis::cmd("PING")
        .query_async::<_, String>(&mut probe)
        .await
        .map_err(gridlock_store::StoreError::from)?;
    tracing::info!("store reachable");

    let server = GridlockServerBuilder::new()
        .bind(&config.listen_addr)
        .build(Stores::redis(client))
        .await?;
    tracing::info!(addr = %server.local_addr()?, "accepting connections");

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received, shutting down");
        }
    }

    Ok(())
}
