//! Transport configuration.
//!
//! # Example
//!
//! ```
//! use arnelify_uds::UdsConfig;
//! use serde_json::json;
//!
//! let config = UdsConfig::from_opts(&json!({
//!     "SERVER_SOCKET_PATH": "/tmp/app.sock",
//!     "SERVER_BLOCK_SIZE_KB": 16,
//!     "SERVER_PORT": 3001
//! }));
//!
//! assert_eq!(config.socket_path.to_str(), Some("/tmp/app.sock"));
//! assert_eq!(config.block_size(), 16 * 1024);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::protocol::DEFAULT_MAX_PAYLOAD_SIZE;

/// Default socket path shared with the engine.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/arnelify.sock";

/// Default read block size in kilobytes.
pub const DEFAULT_BLOCK_SIZE_KB: usize = 64;

/// Largest read block size in kilobytes. Larger settings are clamped.
pub const MAX_BLOCK_SIZE_KB: usize = 64 * 1024;

/// First delay between checks for the peer's socket file.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Upper bound for the poll delay.
pub const DEFAULT_MAX_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default per-connection writer channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Settings shared by the connector and the listener.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UdsConfig {
    /// Filesystem path of the stream socket.
    pub socket_path: PathBuf,
    /// Size of each socket read, in kilobytes.
    pub block_size_kb: usize,
    /// First delay while waiting for the socket file.
    #[serde(with = "millis")]
    pub poll_interval: Duration,
    /// Cap for the doubling poll delay.
    #[serde(with = "millis")]
    pub max_poll_interval: Duration,
    /// Largest frame payload accepted from the peer.
    pub max_payload_size: usize,
    /// Outbound frames queued per connection.
    pub channel_capacity: usize,
}

impl UdsConfig {
    /// Build a config from the engine's option object.
    ///
    /// Reads `SERVER_SOCKET_PATH` and `SERVER_BLOCK_SIZE_KB`; other keys
    /// belong to the engine and are ignored. Missing or mistyped keys keep
    /// their defaults.
    pub fn from_opts(opts: &Value) -> Self {
        let mut config = Self::default();

        if let Some(path) = opts.get("SERVER_SOCKET_PATH").and_then(Value::as_str) {
            config.socket_path = PathBuf::from(path);
        }
        if let Some(kb) = opts.get("SERVER_BLOCK_SIZE_KB").and_then(Value::as_u64) {
            if kb > 0 {
                config.block_size_kb = usize::try_from(kb).unwrap_or(usize::MAX);
            }
        }

        config
    }

    /// Read block size in bytes, between 1 KiB and [`MAX_BLOCK_SIZE_KB`].
    pub fn block_size(&self) -> usize {
        self.block_size_kb.clamp(1, MAX_BLOCK_SIZE_KB) * 1024
    }

    /// Delay before the next existence check, doubling up to the cap.
    pub(crate) fn next_poll_delay(&self, current: Duration) -> Duration {
        (current * 2).min(self.max_poll_interval)
    }
}

impl Default for UdsConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            block_size_kb: DEFAULT_BLOCK_SIZE_KB,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_interval: DEFAULT_MAX_POLL_INTERVAL,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
