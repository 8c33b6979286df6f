// src/domain/transport.rs

//! Transport domain abstractions.
//!
//! This module defines the transport interface the client and server
//! layers use to exchange messages. It avoids any reference to concrete
//! brokers or client libraries; implementations live under
//! `src/transport/`.
//!
//! A transport only moves opaque envelopes between subjects. Encoding,
//! subject naming, correlation and deadlines are handled above it.
use crate::correlation::InboxId;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

/// Shared base state for all transport implementations.
///
/// Each concrete transport embeds this as a field named `base` and returns
/// it from [`Transport::base`], so default trait methods can use it.
pub struct TransportBase {
    /// Unique identifier for this transport instance (the node_id).
    pub transport_id: String,
}

impl TransportBase {
    pub fn new(transport_id: impl Into<String>) -> Self {
        Self {
            transport_id: transport_id.into(),
        }
    }
}

impl From<&TransportConfig> for TransportBase {
    fn from(config: &TransportConfig) -> Self {
        // ---
        Self::new(config.node_id.clone())
    }
}

/// Configuration for creating a transport instance.
///
/// Passed to the `create_*_transport()` factories, usually through
/// [`TransportBuilder`](crate::TransportBuilder).
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Broker URI (e.g. `"mqtt://localhost:1883"`, `"memory://"`).
    pub uri: String,
    /// Node ID for this transport instance. Scopes reply inboxes.
    pub node_id: String,
    /// Optional transport type override (`"memory"`, `"rumqttc"`).
    /// If `None`, the type is inferred from the URI scheme.
    pub transport_type: Option<String>,
    /// Broker keep-alive interval in seconds.
    pub keep_alive_secs: Option<u16>,
}

impl TransportConfig {
    pub fn memory(node_id: impl Into<String>) -> Self {
        Self {
            uri: "memory://".to_string(),
            node_id: node_id.into(),
            transport_type: Some("memory".to_string()),
            keep_alive_secs: None,
        }
    }
}

/// A subject messages are published to.
///
/// Addresses are opaque at this level; the subject scheme that gives them
/// structure lives in [`crate::subject`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Address(pub Arc<str>);

impl Address {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T> From<T> for Address
where
    T: Into<Arc<str>>,
{
    fn from(value: T) -> Self {
        // ---
        Address(value.into())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A subject to receive messages from.
///
/// Matching is exact string equality; no wildcards. The in-memory
/// transport defines these reference semantics.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Subscription(pub Arc<str>);

impl Subscription {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<Address> for Subscription {
    fn from(address: Address) -> Self {
        // ---
        Subscription(address.0)
    }
}

impl From<&Address> for Subscription {
    fn from(address: &Address) -> Self {
        // ---
        Subscription(address.0.clone())
    }
}

impl<T> From<T> for Subscription
where
    T: Into<Arc<str>>,
{
    fn from(value: T) -> Self {
        // ---
        Subscription(value.into())
    }
}

/// Identifies one live subscription within a transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// The unit of transport.
///
/// Carries an opaque payload plus the routing metadata the RPC layer needs:
/// an optional reply subject and an optional protocol-error header.
///
/// # Examples
///
/// ```
/// # use pubsub_rpc::{Address, Envelope};
/// # use bytes::Bytes;
/// let request = Envelope::request(
///     Address::from("rpc.rpc.0.1.foo.f"),
///     Bytes::from_static(b"\x01"),
///     Address::from("_INBOX.client.1234"),
/// );
/// assert!(request.reply_to.is_some());
///
/// let failure = Envelope::error_reply(Address::from("_INBOX.client.1234"), "bad params");
/// assert!(failure.is_error());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    // ---
    /// Subject the envelope is published to.
    pub address: Address,

    /// Encoded parameter or result tuple. Empty on error replies.
    pub payload: Bytes,

    /// Where the response must be sent. Present on requests only.
    pub reply_to: Option<Address>,

    /// Protocol-level failure reported by the responder.
    ///
    /// Set only on replies to requests the server could not process. It is
    /// never used for application errors, which travel inside the payload.
    pub error: Option<Arc<str>>,
}

impl Envelope {
    // ---
    /// A one-way message with no reply subject.
    pub fn message(address: Address, payload: Bytes) -> Self {
        Self {
            address,
            payload,
            reply_to: None,
            error: None,
        }
    }

    /// A request expecting a reply on `reply_to`.
    pub fn request(address: Address, payload: Bytes, reply_to: Address) -> Self {
        Self {
            address,
            payload,
            reply_to: Some(reply_to),
            error: None,
        }
    }

    /// A successful reply carrying encoded results.
    pub fn reply(address: Address, payload: Bytes) -> Self {
        Self::message(address, payload)
    }

    /// A reply reporting that the request could not be processed.
    pub fn error_reply(address: Address, message: impl Into<Arc<str>>) -> Self {
        Self {
            address,
            payload: Bytes::new(),
            reply_to: None,
            error: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Handle returned from a successful subscription.
///
/// The subscription stays active until the handle is passed to
/// [`Transport::unsubscribe`], the handle is dropped, or the transport is
/// closed. A dropped handle no longer counts as active.
///
/// # Example
///
/// ```no_run
/// # use pubsub_rpc::{TransportBuilder, Subscription};
/// # async fn example() -> pubsub_rpc::Result<()> {
/// let transport = TransportBuilder::new()
///     .uri("memory://")
///     .node_id("app")
///     .build()
///     .await?;
///
/// let mut handle = transport.subscribe(Subscription::from("notifications")).await?;
/// while let Some(envelope) = handle.inbox.recv().await {
///     println!("received {} bytes", envelope.payload.len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct SubscriptionHandle {
    // ---
    pub id: SubscriptionId,

    pub subject: Subscription,

    /// Receiver channel for envelopes delivered to `subject`.
    pub inbox: mpsc::Receiver<Envelope>,
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

/// Transport abstraction.
///
/// Implementations must ensure that:
/// - Once `subscribe()` returns successfully, messages published *after* that
///   point to the same subject are deliverable to the handle.
/// - Publishing a request (an envelope with `reply_to`) to a subject with no
///   live subscriber fails with [`RpcError::NoResponders`](crate::RpcError)
///   when the transport can tell; otherwise the caller's deadline applies.
/// - After `unsubscribe()` returns, nothing more is delivered to that handle
///   and it no longer counts towards `active_subscription_count()`.
///
/// The in-memory transport is the reference implementation.
///
/// # Notes
///
/// This trait uses `async_trait`; consumers should treat its methods as
/// normal `async fn`s.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    // ---
    /// Returns a reference to the shared base state.
    fn base(&self) -> &TransportBase;

    /// Returns the transport_id of the transport.
    fn transport_id(&self) -> &str {
        &self.base().transport_id
    }

    /// Publish an envelope to its address.
    async fn publish(&self, env: Envelope) -> Result<()>;

    /// Register a subscription and return a handle for receiving messages.
    async fn subscribe(&self, sub: Subscription) -> Result<SubscriptionHandle>;

    /// Release a subscription.
    ///
    /// Idempotent with respect to subscriptions already released by drop
    /// or by `close()`.
    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<()>;

    /// Number of live subscriptions created through this transport.
    async fn active_subscription_count(&self) -> usize;

    /// A fresh, unique reply subject for this transport.
    fn new_inbox(&self) -> Address {
        InboxId::generate().subject(self.transport_id())
    }

    /// Close the transport and release any associated resources.
    async fn close(&self) -> Result<()>;
}

/// Shared transport pointer.
///
/// `.clone()` is cheap and every clone shares the same connection.
pub type TransportPtr = Arc<dyn Transport>;
