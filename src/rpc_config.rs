//! Public, transport-agnostic RPC configuration.
//!
//! This type contains no broker-specific concepts. Transport layers
//! interpret it into concrete connection settings.

use std::time::Duration;

use crate::subject::{SubjectScheme, DEFAULT_PREFIX};
use crate::TransportConfig;

/// Default per-call deadline when the caller supplies none.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound on how long `stop()` waits for in-flight handlers.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Client and server configuration.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    // ---
    /// Transport connection URI.
    ///
    /// For broker transports this is the broker address (e.g.
    /// `"mqtt://localhost:1883"`). `None` selects the in-memory transport.
    pub transport_uri: Option<String>,

    /// Broker connection keep-alive interval in seconds.
    pub keep_alive_secs: Option<u16>,

    /// Unique identifier for this transport instance. Scopes reply inboxes
    /// and prefixes log lines.
    pub transport_id: String,

    /// Namespace prefix for request subjects. Client and server must agree.
    ///
    /// Default: `"rpc"`
    pub prefix: String,

    /// Deadline applied to a call whose context carries none.
    ///
    /// Default: 30 seconds
    pub request_timeout: Duration,

    /// Upper bound on the in-flight drain during `stop()`. Handlers still
    /// running afterwards are aborted.
    ///
    /// Default: 10 seconds
    pub stop_timeout: Duration,
}

impl RpcConfig {
    /// Create a config for a broker-backed transport.
    pub fn with_broker(transport_uri: impl Into<String>, transport_id: impl Into<String>) -> Self {
        Self {
            transport_uri: Some(transport_uri.into()),
            ..Self::memory(transport_id)
        }
    }

    /// Create a memory transport config (no broker).
    pub fn memory(transport_id: impl Into<String>) -> Self {
        Self {
            transport_uri: None,
            keep_alive_secs: None,
            transport_id: transport_id.into(),
            prefix: DEFAULT_PREFIX.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    /// Set an explicit keep-alive interval.
    pub fn with_keep_alive_secs(mut self, secs: u16) -> Self {
        self.keep_alive_secs = Some(secs);
        self
    }

    /// Set the request subject namespace.
    ///
    /// # Example
    ///
    /// ```
    /// use pubsub_rpc::RpcConfig;
    ///
    /// let config = RpcConfig::memory("client").with_prefix("test-prefix");
    /// assert_eq!(config.subject_scheme().prefix(), "test-prefix");
    /// ```
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the default per-call deadline.
    ///
    /// ```
    /// use pubsub_rpc::RpcConfig;
    /// use std::time::Duration;
    ///
    /// let config = RpcConfig::with_broker("mqtt://localhost:1883", "client")
    ///     .with_request_timeout(Duration::from_secs(10));
    /// ```
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn subject_scheme(&self) -> SubjectScheme {
        SubjectScheme::new(self.prefix.as_str())
    }

    /// Transport settings derived from this config.
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            uri: self
                .transport_uri
                .clone()
                .unwrap_or_else(|| "memory://".to_string()),
            node_id: self.transport_id.clone(),
            transport_type: None,
            keep_alive_secs: self.keep_alive_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_defaults() {
        // ---
        let config = RpcConfig::memory("node");
        assert_eq!(config.prefix, "rpc");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.stop_timeout, Duration::from_secs(10));
        assert_eq!(config.transport_config().uri, "memory://");
    }

    #[test]
    fn test_broker_keeps_defaults() {
        // ---
        let config = RpcConfig::with_broker("mqtt://localhost:1883", "node")
            .with_keep_alive_secs(5)
            .with_stop_timeout(Duration::from_millis(250));
        let transport = config.transport_config();
        assert_eq!(transport.uri, "mqtt://localhost:1883");
        assert_eq!(transport.node_id, "node");
        assert_eq!(transport.keep_alive_secs, Some(5));
        assert_eq!(config.stop_timeout, Duration::from_millis(250));
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }
}
