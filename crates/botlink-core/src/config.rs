// ── Runtime connection configuration ──
//
// These types describe *how* to reach the device and how the sync core
// behaves. They carry credential data and tuning, but never touch disk.
// The CLI (via botlink-config) constructs a `SessionConfig` and hands it in.

use std::time::Duration;

use botlink_api::{ApiClient, TransportConfig};
use secrecy::SecretString;
use url::Url;

use crate::backoff::{ReconnectSchedule, SubmitBackoff};
use crate::error::CoreError;

/// Where the device API lives and how to authenticate.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, e.g. `http://robot.local:8000`.
    pub base_url: Url,
    /// Optional bearer token.
    pub token: Option<SecretString>,
    /// Request timeout for command and status calls.
    pub timeout: Duration,
    /// Connect timeout, also applied to the event stream.
    pub connect_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            token: None,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            token: self.token.clone(),
        }
    }

    /// Build an [`ApiClient`] for this configuration.
    pub fn build_client(&self) -> Result<ApiClient, CoreError> {
        Ok(ApiClient::new(self.base_url.clone(), &self.transport())?)
    }
}

/// Transport selection and timing for the sync coordinator.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Try the SSE stream first. When `false`, `connect()` goes straight
    /// to polling.
    pub push_enabled: bool,
    /// Poll period in fallback mode.
    pub poll_interval: Duration,
    /// Delays between push reconnection attempts.
    pub reconnect: ReconnectSchedule,
    /// Consecutive push failures before falling back to polling.
    pub failure_threshold: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            push_enabled: true,
            poll_interval: Duration::from_millis(500),
            reconnect: ReconnectSchedule::default(),
            failure_threshold: 3,
        }
    }
}

/// Busy-retry budget for command submission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubmitPolicy {
    pub backoff: SubmitBackoff,
    /// Total submission attempts, including the first.
    pub max_attempts: u32,
    /// Cumulative time spent waiting between attempts.
    pub max_wait: Duration,
}

impl Default for SubmitPolicy {
    fn default() -> Self {
        Self {
            backoff: SubmitBackoff::default(),
            max_attempts: 10,
            max_wait: Duration::from_secs(30),
        }
    }
}

/// Everything a [`Session`](crate::Session) needs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub client: ClientConfig,
    pub sync: SyncConfig,
    pub submit: SubmitPolicy,
}

impl SessionConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            client: ClientConfig::new(base_url),
            sync: SyncConfig::default(),
            submit: SubmitPolicy::default(),
        }
    }
}
