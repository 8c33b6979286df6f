//! Invocation client.
//!
//! Every call gets a private reply inbox: the client subscribes it, publishes
//! the encoded parameters to the function's request subject with the inbox
//! as `reply_to`, and waits for exactly one of reply, deadline, or
//! cancellation. The inbox is released on every path.

mod context;

pub use context::Context;

use bytes::Bytes;

use crate::codec::{decode_tuple, encode_tuple, Signature, Value, WireTuple};
use crate::subject::SubjectScheme;
use crate::{
    // ---
    log_debug,
    log_trace,
    Envelope,
    Result,
    RpcConfig,
    RpcError,
    Subscription,
    TransportPtr,
};

/// Calls functions exported by an [`RpcServer`](crate::RpcServer).
///
/// Cheap to clone; clones share the transport. Any number of calls may be
/// in flight concurrently.
///
/// # Example
///
/// ```no_run
/// use pubsub_rpc::{Context, RpcClient, RpcConfig, TransportBuilder};
/// use std::time::Duration;
///
/// # async fn example() -> pubsub_rpc::Result<()> {
/// let config = RpcConfig::memory("client");
/// let transport = TransportBuilder::from_config(&config).build().await?;
/// let client = RpcClient::new(transport, &config);
///
/// let cx = Context::with_timeout(Duration::from_secs(5));
/// let (len,): (u32,) = client.call(&cx, "foo", "f", ("hello".to_string(),)).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RpcClient {
    // ---
    transport: TransportPtr,
    scheme: SubjectScheme,
    request_timeout: std::time::Duration,
}

impl RpcClient {
    pub fn new(transport: TransportPtr, config: &RpcConfig) -> Self {
        Self {
            transport,
            scheme: config.subject_scheme(),
            request_timeout: config.request_timeout,
        }
    }

    pub fn transport(&self) -> &TransportPtr {
        &self.transport
    }

    /// Call a function with typed parameter and result tuples.
    ///
    /// # Errors
    ///
    /// See [`invoke`](Self::invoke).
    pub async fn call<P, R>(&self, cx: &Context, interface: &str, function: &str, params: P) -> Result<R>
    where
        P: WireTuple,
        R: WireTuple,
    {
        // ---
        let signature = Signature::of::<P, R>();
        let results = self
            .invoke(cx, interface, function, &params.into_values(), &signature)
            .await?;
        Ok(R::from_values(results)?)
    }

    /// Call a function with dynamic values.
    ///
    /// `params` must match `signature.params`; the reply is decoded against
    /// `signature.results`. An application-level failure comes back as a
    /// `result` value inside `Ok`.
    ///
    /// # Errors
    ///
    /// - [`RpcError::Encode`] if `params` do not conform to the signature.
    /// - [`RpcError::Transport`] or [`RpcError::NoResponders`] if the
    ///   request cannot be delivered.
    /// - [`RpcError::Timeout`] if no reply arrives by the deadline.
    /// - [`RpcError::Cancelled`] if the context is cancelled first.
    /// - [`RpcError::Remote`] if the server could not process the request.
    /// - [`RpcError::Decode`] if the reply does not parse as the results.
    pub async fn invoke(
        &self,
        cx: &Context,
        interface: &str,
        function: &str,
        params: &[Value],
        signature: &Signature,
    ) -> Result<Vec<Value>> {
        // ---
        let payload = encode_tuple(params, &signature.params)?;
        let reply = self.request(cx, interface, function, payload).await?;

        if let Some(message) = reply.error {
            return Err(RpcError::Remote(message.to_string()));
        }
        Ok(decode_tuple(&reply.payload, &signature.results)?)
    }

    async fn request(&self, cx: &Context, interface: &str, function: &str, payload: Bytes) -> Result<Envelope> {
        // ---
        if cx.is_cancelled() {
            return Err(RpcError::Cancelled);
        }
        let deadline = cx.deadline_or(self.request_timeout);

        let subject = self.scheme.request_subject(interface, function);
        let inbox = self.transport.new_inbox();
        let mut handle = self.transport.subscribe(Subscription::from(&inbox)).await?;

        log_trace!("request to {subject}, reply on {inbox}");
        let request = Envelope::request(subject, payload, inbox);

        let exchange = async {
            self.transport.publish(request).await?;
            handle
                .inbox
                .recv()
                .await
                .ok_or_else(|| RpcError::Transport("reply subscription closed".into()))
        };

        let outcome = tokio::select! {
            reply = exchange => reply,
            _ = cx.cancelled() => Err(RpcError::Cancelled),
            _ = tokio::time::sleep_until(deadline) => Err(RpcError::Timeout),
        };

        if let Err(e) = self.transport.unsubscribe(handle).await {
            log_debug!("failed to release reply inbox: {e}");
        }
        outcome
    }
}
