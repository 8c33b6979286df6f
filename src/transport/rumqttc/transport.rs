//! MQTT transport implementation using `rumqttc`.
//!
//! ## Concurrency model
//!
//! A single background **actor task** owns the MQTT `EventLoop` and the
//! `AsyncClient`. It publishes outbound envelopes, registers and releases
//! broker subscriptions, and polls the event loop for incoming publishes.
//! Every other task talks to it through a command channel.
//!
//! ## Subscriptions
//!
//! Local subscriptions are tracked per topic. The broker SUBSCRIBE goes out
//! when the first local subscriber for a topic appears, and `subscribe()`
//! returns only after the matching SUBACK. The broker UNSUBSCRIBE goes out
//! when the last local subscriber leaves, whether by `unsubscribe()`, a
//! dropped handle noticed during fanout, or `close()`.
//!
//! rumqttc's `SubAck` carries only a packet ID, so pending SUBSCRIBEs are
//! matched to SUBACKs in the order they were sent.
//!
//! ## Delivery
//!
//! Envelopes are framed as JSON. Incoming publishes are fanned out to every
//! local subscriber of the topic without blocking the actor: a full inbox
//! drops that one delivery, a closed inbox is evicted.
//!
//! MQTT cannot report that a topic has no subscribers, so a request to an
//! unserved subject is not answered with `NoResponders`; the caller's
//! deadline applies instead.
//!
//! ## Connection behavior
//!
//! Connection is lazy: it happens when the event loop first polls. After a
//! disconnect the actor retries every `RECONNECT_DELAY` and re-subscribes
//! every topic with live local subscribers.

use rumqttc::{
    //
    AsyncClient,
    ConnectReturnCode,
    Event,
    EventLoop,
    MqttOptions,
    Packet,
    Publish,
    QoS,
};

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;

use crate::{
    //
    log_debug,
    log_error,
    log_info,
    log_trace,
    log_warn,
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

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Per-subscriber channel depth.
const CHANNEL_CAPACITY: usize = 16;

const DEFAULT_PORT: u16 = 1883;

struct Subscriber {
    id: SubscriptionId,
    tx: mpsc::Sender<Envelope>,
}

type SubscriberMap = Arc<RwLock<HashMap<String, Vec<Subscriber>>>>;

type Responder = oneshot::Sender<Result<()>>;

//
// Actor commands
//

enum Cmd {
    //
    Publish { env: Envelope, resp: Responder },
    Subscribe { topic: String, resp: Responder },
    Unsubscribe { topic: String },
    Close { resp: Responder },
}

enum ActorStep {
    //
    Continue,
    Stop,
}

impl Cmd {
    // ---

    /// Dispatches an actor command to the correct handler on the actor
    async fn handle(self, actor: &mut MqttActor) -> ActorStep {
        // ---

        match self {
            Cmd::Publish { env, resp } => {
                let result = actor.handle_publish(env).await;
                let _ = resp.send(result);
                ActorStep::Continue
            }
            Cmd::Subscribe { topic, resp } => {
                actor.handle_subscribe(topic, resp).await;
                ActorStep::Continue
            }
            Cmd::Unsubscribe { topic } => {
                actor.handle_unsubscribe(&topic).await;
                ActorStep::Continue
            }
            Cmd::Close { resp } => {
                actor.handle_close().await;
                let _ = resp.send(Ok(()));
                ActorStep::Stop
            }
        }
    }
}

/// MQTT-based implementation of the `Transport` trait.
///
/// One instance is one broker connection.
struct RumqttcTransport {
    // ---
    base: TransportBase,
    cmd_tx: mpsc::Sender<Cmd>,
    subscribers: SubscriberMap,
    next_id: AtomicU64,
    actor: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl RumqttcTransport {
    // ---

    fn create(base: TransportBase, client: AsyncClient, event_loop: EventLoop) -> TransportPtr {
        // ---

        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let subscribers: SubscriberMap = Arc::new(RwLock::new(HashMap::new()));

        let actor = MqttActor {
            transport_id: base.transport_id.clone(),
            client,
            event_loop,
            cmd_rx,
            subscribers: Arc::clone(&subscribers),
            pending_subscribes: VecDeque::new(),
            resubscribe_acks: 0,
            reconnect: false,
        };

        let handle = tokio::spawn(actor.run());

        Arc::new(Self {
            base,
            cmd_tx,
            subscribers,
            next_id: AtomicU64::new(1),
            actor: tokio::sync::Mutex::new(Some(handle)),
        })
    }

    async fn send(&self, cmd: Cmd) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| RpcError::Transport("mqtt actor stopped".into()))
    }

    async fn request(&self, cmd: impl FnOnce(Responder) -> Cmd) -> Result<()> {
        // ---
        let (tx, rx) = oneshot::channel();
        self.send(cmd(tx)).await?;
        rx.await
            .map_err(|_| RpcError::Transport("mqtt actor dropped request".into()))?
    }

    /// Removes one local subscriber. Returns true when it was the last one
    /// for its topic.
    async fn remove_local(&self, topic: &str, id: SubscriptionId) -> bool {
        // ---
        let mut map = self.subscribers.write().await;
        let Some(entry) = map.get_mut(topic) else {
            return false;
        };
        entry.retain(|s| s.id != id && !s.tx.is_closed());
        if entry.is_empty() {
            map.remove(topic);
            return true;
        }
        false
    }
}

struct MqttActor {
    // ---
    transport_id: String, // for logging only
    client: AsyncClient,
    event_loop: EventLoop,
    cmd_rx: mpsc::Receiver<Cmd>,
    subscribers: SubscriberMap,
    pending_subscribes: VecDeque<(String, Responder)>,
    resubscribe_acks: usize,
    reconnect: bool,
}

impl MqttActor {
    // ---

    async fn run(mut self) {
        // ---

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) => {
                            if matches!(cmd.handle(&mut self).await, ActorStep::Stop) {
                                break;
                            }
                        }
                        None => break,
                    }
                }

                event = self.event_loop.poll() => {
                    match event {
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            self.handle_incoming(publish).await;
                        }
                        Ok(Event::Incoming(Packet::SubAck(suback))) => {
                            self.handle_suback(suback);
                        }
                        Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                            self.handle_connack(connack).await;
                        }
                        Ok(_event) => {
                            log_trace!("{}: mqtt event (ignored): {:?}", self.transport_id, _event);
                        }
                        Err(err) => {
                            if is_disconnect(&err) {
                                self.reconnect = true;
                                log_error!("{}: broker disconnected: {err}", self.transport_id);
                            } else {
                                log_error!("{}: mqtt error: {err}", self.transport_id);
                            }
                            self.fail_pending("connection lost");
                            tokio::time::sleep(RECONNECT_DELAY).await;
                        }
                    }
                }
            }
        }
    }

    /// Publishes an envelope to the broker with QoS 0 (at most once).
    async fn handle_publish(&mut self, env: Envelope) -> Result<()> {
        // ---

        let payload = serde_json::to_vec(&env)?;
        let topic = env.address.as_str();

        self.client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .await
            .map_err(|err| {
                log_error!("{}: publish failed for topic {topic}: {err}", self.transport_id);
                RpcError::Transport(err.to_string())
            })
    }

    /// Sends SUBSCRIBE and queues the responder for the matching SUBACK.
    async fn handle_subscribe(&mut self, topic: String, resp: Responder) {
        // ---

        if let Err(err) = self.client.subscribe(&topic, QoS::AtMostOnce).await {
            log_error!("{}: failed to send subscribe for {topic}: {err}", self.transport_id);
            let _ = resp.send(Err(RpcError::Transport(err.to_string())));
            return;
        }
        self.pending_subscribes.push_back((topic, resp));
    }

    async fn handle_unsubscribe(&mut self, topic: &str) {
        // ---

        // A subscriber may have arrived for the topic since the command was queued.
        if self.subscribers.read().await.contains_key(topic) {
            return;
        }
        if let Err(_err) = self.client.unsubscribe(topic).await {
            log_warn!("{}: failed to send unsubscribe for {topic}: {_err}", self.transport_id);
        } else {
            log_debug!("{}: unsubscribed from topic {topic}", self.transport_id);
        }
    }

    fn handle_suback(&mut self, suback: rumqttc::SubAck) {
        // ---

        if self.resubscribe_acks > 0 {
            self.resubscribe_acks -= 1;
            log_debug!("{}: SUBACK received for re-subscribe", self.transport_id);
            return;
        }

        let Some((topic, responder)) = self.pending_subscribes.pop_front() else {
            log_debug!("{}: unexpected SUBACK {}", self.transport_id, suback.pkid);
            return;
        };

        let success = suback
            .return_codes
            .iter()
            .all(|code| !matches!(code, rumqttc::SubscribeReasonCode::Failure));

        if success {
            log_info!("{}: subscribed to topic {topic}", self.transport_id);
            let _ = responder.send(Ok(()));
        } else {
            log_error!(
                "{}: subscription refused for topic {topic}: {:?}",
                self.transport_id,
                suback.return_codes
            );
            let _ = responder.send(Err(RpcError::Transport(format!(
                "broker refused subscription to {topic}"
            ))));
        }
    }

    /// Logs the connection result and restores broker subscriptions after a
    /// reconnect.
    async fn handle_connack(&mut self, connack: rumqttc::ConnAck) {
        // ---

        if connack.code != ConnectReturnCode::Success {
            log_error!("{}: connection failed: {:?}", self.transport_id, connack.code);
            return;
        }
        log_info!("{}: connected to broker", self.transport_id);

        if !std::mem::take(&mut self.reconnect) {
            return;
        }

        let topics: Vec<String> = {
            let map = self.subscribers.read().await;
            map.keys().cloned().collect()
        };

        for topic in topics {
            match self.client.subscribe(&topic, QoS::AtMostOnce).await {
                Ok(()) => {
                    self.resubscribe_acks += 1;
                    log_info!("{}: re-subscribing to {topic}", self.transport_id);
                }
                Err(_err) => {
                    log_error!("{}: re-subscribe failed for {topic}: {_err}", self.transport_id);
                }
            }
        }
    }

    fn fail_pending(&mut self, reason: &str) {
        // ---
        self.resubscribe_acks = 0;
        for (topic, responder) in self.pending_subscribes.drain(..) {
            let _ = responder.send(Err(RpcError::Transport(format!(
                "subscribe to {topic} failed: {reason}"
            ))));
        }
    }

    async fn handle_close(&mut self) {
        // ---

        log_debug!("{}: disconnecting mqtt client", self.transport_id);
        self.fail_pending("transport closed");
        self.subscribers.write().await.clear();

        if let Err(_err) = self.client.disconnect().await {
            log_debug!("{}: mqtt disconnect failed: {_err}", self.transport_id);
        }
    }

    /// Decodes an incoming publish and fans it out to local subscribers.
    async fn handle_incoming(&mut self, publish: Publish) {
        // ---

        let topic = publish.topic;

        let env = match serde_json::from_slice::<Envelope>(&publish.payload) {
            Ok(env) => env,
            Err(_err) => {
                log_debug!("{}: invalid envelope on topic {topic}: {_err}", self.transport_id);
                return;
            }
        };

        let emptied = {
            let mut map = self.subscribers.write().await;
            let Some(entry) = map.get_mut(&topic) else {
                return;
            };

            entry.retain(|s| match s.tx.try_send(env.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    log_warn!("{}: inbox {} full, dropping message on {topic}", self.transport_id, s.id);
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            });

            if entry.is_empty() {
                map.remove(&topic);
                true
            } else {
                false
            }
        };

        if emptied {
            self.handle_unsubscribe(&topic).await;
        }
    }
} // MqttActor

fn is_disconnect(err: &rumqttc::ConnectionError) -> bool {
    // ---
    matches!(
        err,
        rumqttc::ConnectionError::Io(_) | rumqttc::ConnectionError::MqttState(_)
    )
}

#[async_trait::async_trait]
impl Transport for RumqttcTransport {
    // ---

    fn base(&self) -> &TransportBase {
        &self.base
    }

    async fn publish(&self, env: Envelope) -> Result<()> {
        self.request(|resp| Cmd::Publish { env, resp }).await
    }

    async fn subscribe(&self, sub: Subscription) -> Result<SubscriptionHandle> {
        // ---

        let topic = sub.as_str().to_string();
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        let first = {
            let mut map = self.subscribers.write().await;
            let entry = map.entry(topic.clone()).or_default();
            entry.retain(|s| !s.tx.is_closed());
            entry.push(Subscriber { id, tx });
            entry.len() == 1
        };

        if first {
            let confirmed = self
                .request(|resp| Cmd::Subscribe {
                    topic: topic.clone(),
                    resp,
                })
                .await;

            if let Err(err) = confirmed {
                self.remove_local(&topic, id).await;
                return Err(err);
            }
        }

        log_debug!("{}: subscribed {id} to {topic}", self.transport_id());
        Ok(SubscriptionHandle {
            id,
            subject: sub,
            inbox: rx,
        })
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<()> {
        // ---

        let topic = handle.subject.as_str();
        if self.remove_local(topic, handle.id).await {
            self.send(Cmd::Unsubscribe {
                topic: topic.to_string(),
            })
            .await?;
        }
        log_debug!("{}: unsubscribed {} from {topic}", self.transport_id(), handle.id);
        Ok(())
    }

    async fn active_subscription_count(&self) -> usize {
        let map = self.subscribers.read().await;
        map.values().flatten().filter(|s| !s.tx.is_closed()).count()
    }

    async fn close(&self) -> Result<()> {
        // ---

        let Some(handle) = self.actor.lock().await.take() else {
            return Ok(());
        };

        // The actor may already be gone; close is still complete.
        let _ = self.request(|resp| Cmd::Close { resp }).await;
        if let Err(_err) = handle.await {
            log_error!("{}: mqtt actor failed: {_err}", self.transport_id());
        }
        Ok(())
    }
}

/// Creates a rumqttc-based MQTT transport from the given configuration.
///
/// # Errors
///
/// Returns [`RpcError::Transport`] if the broker URI cannot be parsed.
///
/// # Connection Behavior
///
/// The actual connection to the broker happens lazily when the event loop
/// starts polling in the background actor task.
pub async fn create_transport(config: TransportConfig) -> Result<TransportPtr> {
    // ---

    let (client, event_loop) = create_mqtt_client(&config)?;
    log_debug!("{}: create rumqttc transport for {}", config.node_id, config.uri);
    Ok(RumqttcTransport::create(
        TransportBase::from(&config),
        client,
        event_loop,
    ))
}

fn create_mqtt_client(config: &TransportConfig) -> Result<(AsyncClient, EventLoop)> {
    // ---

    let (host, port) = parse_broker_uri(&config.uri)?;
    let mut mqtt_options = MqttOptions::new(&config.node_id, host, port);

    if let Some(keep_alive_secs) = config.keep_alive_secs {
        mqtt_options.set_keep_alive(Duration::from_secs(u64::from(keep_alive_secs)));
    }

    Ok(AsyncClient::new(mqtt_options, 10))
}

/// Splits `mqtt://host:port` (or `tcp://`, or a bare `host[:port]`).
fn parse_broker_uri(uri: &str) -> Result<(String, u16)> {
    // ---

    let addr = uri
        .strip_prefix("mqtt://")
        .or_else(|| uri.strip_prefix("tcp://"))
        .unwrap_or(uri)
        .trim_end_matches('/');

    match addr.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse().map_err(|err| {
                log_error!("rumqttc: invalid port in broker URI {uri}: {err}");
                RpcError::Transport(format!("invalid port in broker uri {uri}: {err}"))
            })?;
            Ok((host.to_string(), port))
        }
        None => Ok((addr.to_string(), DEFAULT_PORT)),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_parse_broker_uri() {
        // ---
        assert_eq!(
            parse_broker_uri("mqtt://localhost:1883").unwrap(),
            ("localhost".to_string(), 1883)
        );
        assert_eq!(
            parse_broker_uri("tcp://broker.local").unwrap(),
            ("broker.local".to_string(), DEFAULT_PORT)
        );
        assert_eq!(
            parse_broker_uri("10.0.0.5:2883/").unwrap(),
            ("10.0.0.5".to_string(), 2883)
        );
        assert!(parse_broker_uri("mqtt://localhost:nope").is_err());
    }

    #[test]
    fn test_envelope_json_framing() {
        // ---
        let env = Envelope::error_reply(crate::Address::from("_INBOX.a.b"), "bad params");
        let bytes = serde_json::to_vec(&env).unwrap();
        let back: Envelope = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back.address.as_str(), "_INBOX.a.b");
        assert_eq!(back.error.as_deref(), Some("bad params"));
        assert!(back.payload.is_empty());
    }

    #[tokio::test]
    async fn test_lazy_connect_and_close() {
        // ---
        // Nothing listens on port 1; creation still succeeds and close
        // returns without waiting for a connection.
        let mut config = TransportConfig::memory("mqtt-test");
        config.uri = "mqtt://127.0.0.1:1".to_string();
        let transport = create_transport(config).await.unwrap();
        assert_eq!(transport.transport_id(), "mqtt-test");
        assert_eq!(transport.active_subscription_count().await, 0);
        transport.close().await.unwrap();
        transport.close().await.unwrap();
    }
}
