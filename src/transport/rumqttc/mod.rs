//! MQTT transport implementation based on rumqttc.
//!
//! This module adapts the rumqttc API to the domain-level `Transport` trait
//! without leaking MQTT concepts upward.
//!
//! # Features
//!
//! - Actor-based concurrency model with single EventLoop ownership
//! - SUBACK confirmation before returning from subscribe()
//! - Broker UNSUBSCRIBE when the last local subscriber of a topic leaves
//! - Re-subscription after reconnect
//!
//! # Usage
//!
//! Enable the `transport_rumqttc` feature in your Cargo.toml:
//!
//! ```toml
//! [dependencies]
//! pubsub-rpc = { version = "0.1", features = ["transport_rumqttc"] }
//! ```
//!
//! Subjects are used as MQTT topic names unchanged. Request subjects never
//! contain `+` or `#`; node IDs must not either, since they appear in reply
//! inbox subjects.

mod transport;
pub use transport::create_transport;
