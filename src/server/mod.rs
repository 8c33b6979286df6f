//! Invocation server.
//!
//! `serve()` subscribes one request subject per exported function and runs
//! one dispatch loop per subscription. Each inbound request is decoded,
//! handed to its handler, and answered on the request's reply subject in a
//! task of its own, so a slow handler never blocks its loop.
//!
//! `stop()` cancels the loops. Each loop closes its inbox, dispatches the
//! requests already buffered there, and unsubscribes its subject. It then
//! waits up to `stop_timeout` for its in-flight invocations and aborts the
//! rest. When `stop()` returns, the server holds no subscriptions.
//!
//! A handler that panics is answered like one that fails: the caller gets a
//! protocol-error reply and the loop keeps serving.

mod handler;

pub use handler::{BoxFuture, Export, Handler};

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use futures::FutureExt;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::codec::{decode_tuple, encode_tuple};
use crate::subject::SubjectScheme;
use crate::{
    // ---
    log_debug,
    log_error,
    log_info,
    log_warn,
    Address,
    Envelope,
    Result,
    RpcConfig,
    RpcError,
    Subscription,
    SubscriptionHandle,
    TransportPtr,
};

/// Lifecycle state of an [`RpcServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Idle,
    Serving,
    Stopping,
}

struct Running {
    shutdown: CancellationToken,
    loops: Vec<JoinHandle<Result<()>>>,
}

/// Serves a set of exported functions over a transport.
///
/// # Example
///
/// ```no_run
/// use pubsub_rpc::{Export, RpcConfig, RpcServer, TransportBuilder};
///
/// # async fn example() -> pubsub_rpc::Result<()> {
/// let config = RpcConfig::memory("server");
/// let transport = TransportBuilder::from_config(&config).build().await?;
/// let server = RpcServer::new(transport, &config);
///
/// server
///     .serve(vec![Export::typed("foo", "f", |(x,): (String,)| async move {
///         Ok((x.len() as u32,))
///     })])
///     .await?;
///
/// // ... later
/// server.stop().await?;
/// # Ok(())
/// # }
/// ```
pub struct RpcServer {
    // ---
    transport: TransportPtr,
    scheme: SubjectScheme,
    stop_timeout: Duration,
    running: tokio::sync::Mutex<Option<Running>>,
    state: Mutex<ServerState>,
}

/// Acquire mutex guard, ignoring poisoning
fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl RpcServer {
    pub fn new(transport: TransportPtr, config: &RpcConfig) -> Self {
        Self {
            transport,
            scheme: config.subject_scheme(),
            stop_timeout: config.stop_timeout,
            running: tokio::sync::Mutex::new(None),
            state: Mutex::new(ServerState::Idle),
        }
    }

    pub fn state(&self) -> ServerState {
        *lock_ignore_poison(&self.state)
    }

    fn set_state(&self, state: ServerState) {
        *lock_ignore_poison(&self.state) = state;
    }

    /// Subscribe every export and start dispatching (Idle → Serving).
    ///
    /// # Errors
    ///
    /// - [`RpcError::AlreadyServing`] unless the server is idle.
    /// - [`RpcError::DuplicateExport`] if two exports map to one subject.
    /// - Any subscribe failure; subscriptions made so far are released and
    ///   the server stays idle.
    pub async fn serve(&self, exports: Vec<Export>) -> Result<()> {
        // ---
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(RpcError::AlreadyServing);
        }

        let mut seen = HashSet::new();
        let mut bound = Vec::with_capacity(exports.len());
        for export in exports {
            let subject = self
                .scheme
                .request_subject(&export.interface, &export.function);
            if !seen.insert(subject.clone()) {
                return Err(RpcError::DuplicateExport(subject.to_string()));
            }
            bound.push((subject, export));
        }

        let mut handles = Vec::with_capacity(bound.len());
        for (subject, _) in &bound {
            match self.transport.subscribe(Subscription::from(subject)).await {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    log_error!(
                        "{}: failed to subscribe {subject}: {e}",
                        self.transport.transport_id()
                    );
                    for handle in handles {
                        if let Err(e) = self.transport.unsubscribe(handle).await {
                            log_warn!("rollback unsubscribe failed: {e}");
                        }
                    }
                    return Err(e);
                }
            }
        }

        let shutdown = CancellationToken::new();
        let loops = bound
            .into_iter()
            .zip(handles)
            .map(|((subject, export), handle)| {
                let dispatch = Arc::new(Dispatch {
                    transport: self.transport.clone(),
                    subject,
                    export,
                });
                tokio::spawn(dispatch_loop(
                    dispatch,
                    handle,
                    shutdown.child_token(),
                    self.stop_timeout,
                ))
            })
            .collect::<Vec<_>>();

        log_info!(
            "{}: serving {} function(s)",
            self.transport.transport_id(),
            loops.len()
        );
        *running = Some(Running { shutdown, loops });
        self.set_state(ServerState::Serving);
        Ok(())
    }

    /// Unsubscribe everything and wait for in-flight invocations
    /// (Serving → Stopping → Idle). A no-op when idle.
    ///
    /// # Errors
    ///
    /// Returns the first unsubscribe failure. The server is idle afterwards
    /// either way.
    pub async fn stop(&self) -> Result<()> {
        // ---
        let mut running = self.running.lock().await;
        let Some(Running { shutdown, loops }) = running.take() else {
            return Ok(());
        };

        self.set_state(ServerState::Stopping);
        shutdown.cancel();

        let mut outcome = Ok(());
        for handle in loops {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if outcome.is_ok() {
                        outcome = Err(e);
                    }
                }
                Err(e) => log_error!("dispatch loop failed: {e}"),
            }
        }

        self.set_state(ServerState::Idle);
        log_info!("{}: stopped", self.transport.transport_id());
        outcome
    }
}

impl Drop for RpcServer {
    fn drop(&mut self) {
        // Loops see the cancellation and release their subscriptions.
        if let Some(running) = self.running.get_mut() {
            running.shutdown.cancel();
        }
    }
}

struct Dispatch {
    transport: TransportPtr,
    subject: Address,
    export: Export,
}

impl Dispatch {
    async fn invoke(&self, env: Envelope) {
        // ---
        let Some(reply_to) = env.reply_to else {
            log_warn!("{}: request without reply subject dropped", self.subject);
            return;
        };

        let outcome = AssertUnwindSafe(self.process(env.payload))
            .catch_unwind()
            .await;
        let reply = match outcome {
            Ok(Ok(bytes)) => Envelope::reply(reply_to, bytes),
            Ok(Err(e)) => {
                log_warn!("{}: replying with protocol error: {e}", self.subject);
                Envelope::error_reply(reply_to, e.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                log_error!("{}: handler panicked: {message}", self.subject);
                Envelope::error_reply(reply_to, format!("handler panicked: {message}"))
            }
        };

        if let Err(e) = self.transport.publish(reply).await {
            log_warn!("{}: failed to publish reply: {e}", self.subject);
        }
    }

    async fn process(&self, payload: Bytes) -> Result<Bytes> {
        let signature = &self.export.signature;
        let params = decode_tuple(&payload, &signature.params)?;
        let results = self.export.handler.call(params).await?;
        Ok(encode_tuple(&results, &signature.results)?)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

async fn dispatch_loop(
    dispatch: Arc<Dispatch>,
    mut handle: SubscriptionHandle,
    shutdown: CancellationToken,
    stop_timeout: Duration,
) -> Result<()> {
    // ---
    log_debug!("dispatch loop started for {}", dispatch.subject);
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => break,

            msg = handle.inbox.recv() => match msg {
                Some(env) => {
                    let dispatch = dispatch.clone();
                    in_flight.spawn(async move { dispatch.invoke(env).await });
                }
                None => {
                    log_warn!("subscription for {} closed by transport", dispatch.subject);
                    break;
                }
            },

            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = joined {
                    log_error!("{}: handler task failed: {e}", dispatch.subject);
                }
            }
        }
    }

    // Accepted before shutdown: answer them, refuse anything newer.
    handle.inbox.close();
    let mut buffered = 0usize;
    while let Some(env) = handle.inbox.recv().await {
        let dispatch = dispatch.clone();
        in_flight.spawn(async move { dispatch.invoke(env).await });
        buffered += 1;
    }
    if buffered > 0 {
        log_debug!(
            "{}: dispatched {buffered} buffered request(s) on stop",
            dispatch.subject
        );
    }

    let unsubscribed = dispatch.transport.unsubscribe(handle).await;

    let drained = tokio::time::timeout(stop_timeout, async {
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                log_error!("{}: handler task failed: {e}", dispatch.subject);
            }
        }
    })
    .await;

    if drained.is_err() {
        log_warn!(
            "{}: aborting {} handler(s) still running after {:?}",
            dispatch.subject,
            in_flight.len(),
            stop_timeout
        );
        in_flight.abort_all();
        while in_flight.join_next().await.is_some() {}
    }

    log_debug!("dispatch loop stopped for {}", dispatch.subject);
    unsubscribed
}
