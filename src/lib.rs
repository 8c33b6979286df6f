//! Typed request/response RPC over publish/subscribe transports.
//!
//! A caller and a handler that share nothing but a message bus exchange
//! structured values (records, variants, lists, options, results, flags and
//! tuples) encoded by a compact, schema-driven codec. The crate provides:
//!
//! - [`codec`]: the value codec and the [`Wire`] bindings for Rust types
//! - [`subject`]: request subject naming shared by both ends
//! - [`RpcClient`]: per-call reply inboxes with deadline and cancellation
//! - [`RpcServer`]: one subscription and dispatch loop per exported
//!   function, with an explicit `serve` / `stop` lifecycle
//! - transports: an in-memory reference implementation and, behind the
//!   `transport_rumqttc` feature, MQTT via rumqttc
//!
//! # Example
//!
//! ```
//! use pubsub_rpc::{Context, Export, RpcClient, RpcConfig, RpcServer, TransportBuilder};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> pubsub_rpc::Result<()> {
//! let config = RpcConfig::memory("doc-node").with_prefix("doc");
//! let transport = TransportBuilder::from_config(&config).build().await?;
//!
//! let server = RpcServer::new(transport.clone(), &config);
//! server
//!     .serve(vec![Export::typed("math", "add", |(a, b): (u32, u32)| async move {
//!         Ok((a + b,))
//!     })])
//!     .await?;
//!
//! let client = RpcClient::new(transport, &config);
//! let (sum,): (u32,) = client.call(&Context::background(), "math", "add", (2u32, 40u32)).await?;
//! assert_eq!(sum, 42);
//!
//! server.stop().await?;
//! # Ok(())
//! # }
//! ```

mod macros;
pub(crate) use macros::{log_debug, log_error, log_info, log_trace, log_warn};

pub mod codec;
pub mod subject;

mod client;
mod domain;
mod server;
mod transport;

mod correlation;
mod error;
mod rpc_config;
mod transport_builder;

// Re-export main types
pub use client::{Context, RpcClient};
pub use server::{BoxFuture, Export, Handler, RpcServer, ServerState};

pub use codec::{DecodeError, EncodeError, Kind, Signature, Value, Wire, WireTuple};
pub use correlation::{InboxId, INBOX_PREFIX};
pub use error::{Result, RpcError};
pub use rpc_config::RpcConfig;
pub use subject::SubjectScheme;
pub use transport_builder::TransportBuilder;

pub use transport::{create_memory_transport, create_memory_transport_with_hub, MemoryHub};

#[cfg(feature = "transport_rumqttc")]
pub use transport::create_rumqttc_transport;

// --- public re-exports
pub use domain::{
    //
    Address,
    Envelope,
    Subscription,
    SubscriptionHandle,
    SubscriptionId,
    Transport,
    TransportBase,
    TransportConfig,
    TransportPtr,
};
