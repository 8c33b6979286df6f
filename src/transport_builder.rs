//! Transport builder for creating transport instances.
//!
//! Provides a fluent builder API with required fields checked at `build()`.

use crate::{Result, RpcConfig, RpcError, TransportConfig, TransportPtr};

/// Builder for creating transport instances.
///
/// # Examples
///
/// ```no_run
/// use pubsub_rpc::TransportBuilder;
///
/// # async fn example() -> pubsub_rpc::Result<()> {
/// let transport = TransportBuilder::new()
///     .uri("mqtt://localhost:1883")
///     .node_id("sensor-client")
///     .keep_alive_secs(30)
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct TransportBuilder {
    uri: Option<String>,
    node_id: Option<String>,
    transport_type: Option<String>,
    keep_alive_secs: Option<u16>,
}

impl TransportBuilder {
    /// Create a new transport builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the transport settings of an [`RpcConfig`].
    pub fn from_config(config: &RpcConfig) -> Self {
        let transport = config.transport_config();
        Self {
            uri: Some(transport.uri),
            node_id: Some(transport.node_id),
            transport_type: transport.transport_type,
            keep_alive_secs: transport.keep_alive_secs,
        }
    }

    /// Set the transport URI (required).
    ///
    /// Examples: `"memory://"`, `"mqtt://localhost:1883"`.
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Set the node ID (required). Scopes reply inboxes.
    pub fn node_id(mut self, id: impl Into<String>) -> Self {
        self.node_id = Some(id.into());
        self
    }

    /// Set explicit transport type.
    ///
    /// Valid values: `"memory"`, `"rumqttc"`. If not specified, the type is
    /// inferred from the URI scheme.
    pub fn transport_type(mut self, flag: impl Into<String>) -> Self {
        self.transport_type = Some(flag.into());
        self
    }

    /// Set broker keep-alive interval in seconds.
    pub fn keep_alive_secs(mut self, secs: u16) -> Self {
        self.keep_alive_secs = Some(secs);
        self
    }

    /// Build the transport (consumes self).
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::MissingConfig`] when `uri` or `node_id` is
    /// missing, and [`RpcError::Transport`] for an unknown or disabled
    /// transport type or a failed connection.
    pub async fn build(self) -> Result<TransportPtr> {
        let uri = self
            .uri
            .ok_or_else(|| RpcError::MissingConfig("uri".into()))?;
        let node_id = self
            .node_id
            .ok_or_else(|| RpcError::MissingConfig("node_id".into()))?;

        let transport_type = match self.transport_type {
            Some(explicit) => explicit,
            None => infer_transport_type(&uri)?.to_string(),
        };

        let config = TransportConfig {
            uri,
            node_id,
            transport_type: Some(transport_type.clone()),
            keep_alive_secs: self.keep_alive_secs,
        };

        match transport_type.as_str() {
            "memory" => crate::create_memory_transport(config).await,
            "rumqttc" => create_rumqttc(config).await,
            other => Err(RpcError::Transport(format!(
                "unrecognized transport_type: {other}, valid values: memory, rumqttc"
            ))),
        }
    }
}

fn infer_transport_type(uri: &str) -> Result<&'static str> {
    let scheme = uri.split_once("://").map_or(uri, |(scheme, _)| scheme);
    match scheme {
        "memory" | "" => Ok("memory"),
        "mqtt" | "tcp" => Ok("rumqttc"),
        other => Err(RpcError::Transport(format!(
            "cannot infer transport from uri scheme: {other}"
        ))),
    }
}

#[cfg(feature = "transport_rumqttc")]
async fn create_rumqttc(config: TransportConfig) -> Result<TransportPtr> {
    crate::create_rumqttc_transport(config).await
}

#[cfg(not(feature = "transport_rumqttc"))]
async fn create_rumqttc(_config: TransportConfig) -> Result<TransportPtr> {
    Err(RpcError::Transport(
        "rumqttc transport requires the `transport_rumqttc` feature".into(),
    ))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[tokio::test]
    async fn test_missing_fields() {
        // ---
        let Err(err) = TransportBuilder::new().node_id("n").build().await else {
            panic!("expected missing uri");
        };
        assert!(matches!(err, RpcError::MissingConfig(ref f) if f == "uri"));

        let Err(err) = TransportBuilder::new().uri("memory://").build().await else {
            panic!("expected missing node_id");
        };
        assert!(matches!(err, RpcError::MissingConfig(ref f) if f == "node_id"));
    }

    #[tokio::test]
    async fn test_builds_memory_transport() {
        // ---
        let transport = TransportBuilder::from_config(&RpcConfig::memory("node"))
            .build()
            .await
            .unwrap();
        assert_eq!(transport.transport_id(), "node");
    }

    #[tokio::test]
    async fn test_unknown_transport_type() {
        // ---
        let result = TransportBuilder::new()
            .uri("memory://")
            .node_id("n")
            .transport_type("carrier-pigeon")
            .build()
            .await;
        let Err(err) = result else {
            panic!("expected unknown transport type");
        };
        assert!(matches!(err, RpcError::Transport(_)));
    }

    #[test]
    fn test_infer_transport_type() {
        // ---
        assert_eq!(infer_transport_type("memory://").unwrap(), "memory");
        assert_eq!(infer_transport_type("mqtt://localhost:1883").unwrap(), "rumqttc");
        assert!(infer_transport_type("amqp://x").is_err());
    }
}
