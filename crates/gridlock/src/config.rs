//! Environment configuration.
//!
//! The server reads exactly two knobs from the environment; everything
//! else is builder defaults. `RUST_LOG` additionally drives the log
//! filter (see [`crate::telemetry`]).

/// Runtime configuration for the binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Redis connection string. `REDIS_CONNSTRING`; a bare `host:port`
    /// is accepted and given the `redis://` scheme.
    pub redis_url: String,

    /// Listen address for the WebSocket endpoint. `LISTEN_ADDR`,
    /// default `0.0.0.0:8080`.
    pub listen_addr: String,
}

impl ServerConfig {
    pub fn from_env() -> ServerConfig {
        ServerConfig {
            redis_url: normalize_redis_url(
                std::env::var("REDIS_CONNSTRING").unwrap_or_default(),
            ),
            listen_addr: std::env::var("LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        }
    }
}

fn normalize_redis_url(raw: String) -> String {
    if raw.is_empty() {
        "redis://127.0.0.1:6379".to_string()
    } else if raw.contains("://") {
        raw
    } else {
        format!("redis://{raw}")
    }
}
