//! Transport implementations.
//!
//! Concrete implementations of the domain-level `Transport` trait. Broker
//! transports sit behind feature flags and are exposed only through
//! constructor functions.
//!
//! Domain code must not depend on transport-specific types.

mod memory;

#[cfg(feature = "transport_rumqttc")]
mod rumqttc;

#[cfg(feature = "transport_rumqttc")]
pub use rumqttc::create_transport as create_rumqttc_transport;

pub use memory::create_transport as create_memory_transport;
pub use memory::create_transport_with_hub as create_memory_transport_with_hub;
pub use memory::MemoryHub;
