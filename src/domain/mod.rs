//! Domain layer public interface.
//!
//! Abstractions here are independent of any broker or client library.
//! Consumers import symbols via this module, not by referencing
//! individual files directly.

mod transport;

// --- Transport domain re-exports ---

pub use transport::{
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
