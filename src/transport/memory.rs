//! In-memory transport implementation.
//!
//! A pure in-process implementation of the domain-level `Transport` trait,
//! used for tests, local execution, and as the reference for transport
//! semantics.
//!
//! ## Reference Semantics
//!
//! - Once `subscribe()` returns, envelopes published afterwards to the same
//!   subject are deliverable to the handle.
//! - Subject matching is exact string equality.
//! - Delivery is in publish order per subscriber; publishing awaits channel
//!   capacity rather than dropping.
//! - A request (envelope with `reply_to`) published to a subject with no
//!   live subscriber fails fast with `RpcError::NoResponders`. Other
//!   envelopes with no subscriber are discarded.
//! - A subscription stops counting as active once it is unsubscribed, its
//!   handle is dropped, or its transport is closed.
//! - Entries for dropped handles are swept on the next `subscribe()`, so
//!   abandoned reply inboxes do not accumulate in the hub.
//!
//! ## Non-Goals
//!
//! This transport does not emulate the failure modes, persistence, or
//! delivery guarantees of any specific broker.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::sync::{mpsc, RwLock};

use crate::{
    // ---
    log_debug,
    log_trace,
    Envelope,
    Result,
    RpcError,
    Subscription,
    SubscriptionHandle,
    SubscriptionId,
    Transport,
    TransportBase,
    TransportConfig,
    TransportPtr,
};

/// Per-subscriber channel depth.
const CHANNEL_CAPACITY: usize = 16;

struct Subscriber {
    id: SubscriptionId,
    owner: u64,
    tx: mpsc::Sender<Envelope>,
}

impl Subscriber {
    fn is_live(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Shared message bus for the in-memory transport.
///
/// Simulates a broker within a single process. All memory transports that
/// share a hub can publish and receive each other's messages, exactly as
/// nodes connected to a real broker would.
///
/// # Usage in Integration Tests
///
/// Construct a hub per test for isolation and pass it to
/// [`create_memory_transport_with_hub`](crate::create_memory_transport_with_hub):
///
/// ```
/// # use pubsub_rpc::{MemoryHub, TransportConfig};
/// # async fn example() -> pubsub_rpc::Result<()> {
/// let hub = MemoryHub::new();
///
/// let server = pubsub_rpc::create_memory_transport_with_hub(
///     TransportConfig::memory("server"),
///     hub.clone(),
/// ).await?;
/// let client = pubsub_rpc::create_memory_transport_with_hub(
///     TransportConfig::memory("client"),
///     hub.clone(),
/// ).await?;
/// assert_eq!(hub.active_subscription_count().await, 0);
/// # Ok(())
/// # }
/// ```
pub struct MemoryHub {
    // ---
    subscriptions: RwLock<HashMap<Subscription, Vec<Subscriber>>>,
    next_id: AtomicU64,
}

impl MemoryHub {
    /// Create a new, empty hub.
    pub fn new() -> Arc<Self> {
        // ---
        Arc::new(Self::default())
    }

    /// Number of live subscriptions across every transport on this hub.
    pub async fn active_subscription_count(&self) -> usize {
        self.count_live(None).await
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn count_live(&self, owner: Option<u64>) -> usize {
        // ---
        let subs = self.subscriptions.read().await;
        subs.values()
            .flatten()
            .filter(|s| s.is_live() && owner.map_or(true, |o| s.owner == o))
            .count()
    }

    async fn publish(&self, transport_id: &str, env: Envelope) -> Result<()> {
        // ---
        let key = Subscription::from(&env.address);

        // Snapshot the senders so no lock is held while awaiting capacity.
        let senders: Vec<mpsc::Sender<Envelope>> = {
            let subs = self.subscriptions.read().await;
            subs.get(&key)
                .map(|entry| {
                    entry
                        .iter()
                        .filter(|s| s.is_live())
                        .map(|s| s.tx.clone())
                        .collect()
                })
                .unwrap_or_default()
        };

        if senders.is_empty() {
            if env.reply_to.is_some() {
                log_debug!("{transport_id}: no responders on {}", env.address);
                return Err(RpcError::NoResponders(env.address.to_string()));
            }
            log_trace!("{transport_id}: discarding message to {}", env.address);
            return Ok(());
        }

        log_trace!(
            "{transport_id}: publish to {} ({} subscriber(s))",
            env.address,
            senders.len()
        );
        for sender in senders {
            // A closed channel means the handle was dropped after the snapshot.
            if sender.send(env.clone()).await.is_err() {
                log_trace!("{transport_id}: subscriber on {} went away", env.address);
            }
        }

        Ok(())
    }

    async fn subscribe(
        &self,
        transport_id: &str,
        owner: u64,
        sub: Subscription,
    ) -> Result<SubscriptionHandle> {
        // ---
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let id = SubscriptionId(self.next_id());

        let mut subs = self.subscriptions.write().await;
        subs.retain(|_, entry| {
            entry.retain(Subscriber::is_live);
            !entry.is_empty()
        });
        subs.entry(sub.clone())
            .or_default()
            .push(Subscriber { id, owner, tx });

        log_debug!("{transport_id}: subscribed {id} to {}", sub.as_str());
        Ok(SubscriptionHandle {
            id,
            subject: sub,
            inbox: rx,
        })
    }

    async fn unsubscribe(&self, transport_id: &str, handle: SubscriptionHandle) -> Result<()> {
        // ---
        let mut subs = self.subscriptions.write().await;
        if let Some(entry) = subs.get_mut(&handle.subject) {
            entry.retain(|s| s.id != handle.id && s.is_live());
            if entry.is_empty() {
                subs.remove(&handle.subject);
            }
        }
        log_debug!(
            "{transport_id}: unsubscribed {} from {}",
            handle.id,
            handle.subject.as_str()
        );
        Ok(())
    }

    async fn close(&self, transport_id: &str, owner: u64) -> Result<()> {
        // ---
        log_debug!("{transport_id}: closing transport");

        let mut subs = self.subscriptions.write().await;
        subs.retain(|_, entry| {
            entry.retain(|s| s.owner != owner && s.is_live());
            !entry.is_empty()
        });
        Ok(())
    }
}

impl Default for MemoryHub {
    fn default() -> Self {
        // ---
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

/// Process-global hub used by [`create_transport`].
static GLOBAL_HUB: OnceLock<Arc<MemoryHub>> = OnceLock::new();

fn global_hub() -> Arc<MemoryHub> {
    GLOBAL_HUB.get_or_init(MemoryHub::new).clone()
}

/// In-memory transport.
///
/// Routes messages through a shared [`MemoryHub`]. Subscriptions are tagged
/// with this transport's owner key so counting and `close()` only touch its
/// own entries.
struct MemoryTransport {
    // ---
    base: TransportBase,
    hub: Arc<MemoryHub>,
    owner: u64,
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    // ---
    fn base(&self) -> &TransportBase {
        &self.base
    }

    async fn publish(&self, env: Envelope) -> Result<()> {
        self.hub.publish(self.transport_id(), env).await
    }

    async fn subscribe(&self, sub: Subscription) -> Result<SubscriptionHandle> {
        self.hub.subscribe(self.transport_id(), self.owner, sub).await
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<()> {
        self.hub.unsubscribe(self.transport_id(), handle).await
    }

    async fn active_subscription_count(&self) -> usize {
        self.hub.count_live(Some(self.owner)).await
    }

    /// Drop every subscription this transport created. Other transports on
    /// the same hub are unaffected.
    async fn close(&self) -> Result<()> {
        self.hub.close(self.transport_id(), self.owner).await
    }
}

/// Create a new in-memory transport using the process-global hub.
///
/// All transports created with this function share a single bus. For
/// isolated parallel testing, use [`create_transport_with_hub`].
///
/// # Errors
///
/// Currently infallible.
pub async fn create_transport(config: TransportConfig) -> Result<TransportPtr> {
    // ---
    create_transport_with_hub(config, global_hub()).await
}

/// Create a new in-memory transport on the provided hub.
///
/// # Errors
///
/// Currently infallible.
pub async fn create_transport_with_hub(
    config: TransportConfig,
    hub: Arc<MemoryHub>,
) -> Result<TransportPtr> {
    // ---
    let owner = hub.next_id();
    log_debug!("{}: create memory transport", config.node_id);

    let transport = MemoryTransport {
        base: TransportBase::from(&config),
        hub,
        owner,
    };

    Ok(Arc::new(transport))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use bytes::Bytes;

    use crate::Address;

    async fn pair(hub: &Arc<MemoryHub>) -> (TransportPtr, TransportPtr) {
        let a = create_transport_with_hub(TransportConfig::memory("a"), hub.clone())
            .await
            .unwrap();
        let b = create_transport_with_hub(TransportConfig::memory("b"), hub.clone())
            .await
            .unwrap();
        (a, b)
    }

    #[tokio::test]
    async fn test_request_without_subscriber_fails_fast() {
        // ---
        let hub = MemoryHub::new();
        let (a, _b) = pair(&hub).await;

        let env = Envelope::request(
            Address::from("rpc.rpc.0.1.foo.f"),
            Bytes::new(),
            a.new_inbox(),
        );
        let err = a.publish(env).await.unwrap_err();
        assert!(matches!(err, RpcError::NoResponders(_)));

        let env = Envelope::message(Address::from("nobody"), Bytes::new());
        assert!(a.publish(env).await.is_ok());
    }

    #[tokio::test]
    async fn test_counts_are_per_transport() {
        // ---
        let hub = MemoryHub::new();
        let (a, b) = pair(&hub).await;

        let h1 = a.subscribe(Subscription::from("x")).await.unwrap();
        let _h2 = b.subscribe(Subscription::from("x")).await.unwrap();
        assert_eq!(a.active_subscription_count().await, 1);
        assert_eq!(b.active_subscription_count().await, 1);
        assert_eq!(hub.active_subscription_count().await, 2);

        a.unsubscribe(h1).await.unwrap();
        assert_eq!(a.active_subscription_count().await, 0);
        assert_eq!(hub.active_subscription_count().await, 1);
    }

    #[tokio::test]
    async fn test_dropped_handle_is_not_active() {
        // ---
        let hub = MemoryHub::new();
        let (a, _b) = pair(&hub).await;

        let handle = a.subscribe(Subscription::from("x")).await.unwrap();
        assert_eq!(a.active_subscription_count().await, 1);
        drop(handle);
        assert_eq!(a.active_subscription_count().await, 0);

        let env = Envelope::request(Address::from("x"), Bytes::new(), a.new_inbox());
        assert!(matches!(
            a.publish(env).await,
            Err(RpcError::NoResponders(_))
        ));
    }

    #[tokio::test]
    async fn test_dropped_handles_are_swept() {
        // ---
        let hub = MemoryHub::new();
        let (a, b) = pair(&hub).await;

        for _ in 0..100 {
            let inbox = a.new_inbox();
            drop(a.subscribe(Subscription::from(&inbox)).await.unwrap());
        }
        let kept = b.subscribe(Subscription::from("x")).await.unwrap();

        assert_eq!(hub.subscriptions.read().await.len(), 1);
        assert_eq!(hub.active_subscription_count().await, 1);

        b.unsubscribe(kept).await.unwrap();
        assert!(hub.subscriptions.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_close_only_affects_own_subscriptions() {
        // ---
        let hub = MemoryHub::new();
        let (a, b) = pair(&hub).await;

        let _ha = a.subscribe(Subscription::from("x")).await.unwrap();
        let mut hb = b.subscribe(Subscription::from("x")).await.unwrap();

        a.close().await.unwrap();
        assert_eq!(a.active_subscription_count().await, 0);
        assert_eq!(b.active_subscription_count().await, 1);

        a.publish(Envelope::message(Address::from("x"), Bytes::from_static(b"hi")))
            .await
            .unwrap();
        let got = hb.inbox.recv().await.unwrap();
        assert_eq!(got.payload.as_ref(), b"hi");
    }

    #[tokio::test]
    async fn test_inboxes_are_unique_and_scoped() {
        // ---
        let hub = MemoryHub::new();
        let (a, _b) = pair(&hub).await;

        let i1 = a.new_inbox();
        let i2 = a.new_inbox();
        assert_ne!(i1, i2);
        assert!(i1.as_str().starts_with("_INBOX.a."));
    }
}
