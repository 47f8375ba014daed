//! Network configuration consumed by the transport, client, and server.

use serde::{Deserialize, Serialize};

/// Transport-level tuning: packet size, per-exchange timeout, and retry
/// budget. Messages exceeding `packet_size` are fragmented into ordered
/// DATA frames by the session client (see `crate::protocol::client`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub packet_size: usize,
    pub timeout_ms: u64,
    pub max_retries: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            packet_size: 1400,
            timeout_ms: 5000,
            max_retries: 3,
        }
    }
}

impl NetworkConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}
