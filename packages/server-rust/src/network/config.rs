//! HTTP listener configuration.

use std::time::Duration;

/// Default cap on a webhook body. Chainhook deliveries with many blocks can
/// be large.
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub host: String,
    /// 0 means OS-assigned.
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub request_timeout: Duration,
    /// Requests larger than this are rejected with 413.
    pub max_body_bytes: usize,
    /// How long shutdown waits for in-flight requests.
    pub drain_timeout: Duration,
    /// Bearer token required on `POST /chainhook` when set.
    pub auth_token: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            request_timeout: Duration::from_secs(30),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            drain_timeout: Duration::from_secs(30),
            auth_token: None,
        }
    }
}
