use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use crate::codec::{Signature, Value, WireTuple};
use crate::Result;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Type-erased function implementation.
///
/// Receives the decoded parameter tuple and returns the result tuple, which
/// the server encodes against the export's signature. Returning `Err` is a
/// protocol failure reported to the caller as a remote error; application
/// failures belong in a `result` value inside `Ok`.
pub trait Handler: Send + Sync {
    fn call(&self, params: Vec<Value>) -> BoxFuture<'static, Result<Vec<Value>>>;
}

/// Adapter for closures over dynamic values.
struct FnHandler<F> {
    func: F,
}

impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<Value>>> + Send + 'static,
{
    fn call(&self, params: Vec<Value>) -> BoxFuture<'static, Result<Vec<Value>>> {
        Box::pin((self.func)(params))
    }
}

/// Adapter for closures over typed parameter and result tuples.
struct TypedHandler<F, Fut, P, R>
where
    F: Fn(P) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R>> + Send,
    P: WireTuple,
    R: WireTuple,
{
    func: F,
    _phantom: PhantomData<fn(P, R, Fut)>,
}

impl<F, Fut, P, R> Handler for TypedHandler<F, Fut, P, R>
where
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
    P: WireTuple + Send + 'static,
    R: WireTuple + Send + 'static,
{
    fn call(&self, params: Vec<Value>) -> BoxFuture<'static, Result<Vec<Value>>> {
        let params = match P::from_values(params) {
            Ok(p) => p,
            Err(e) => return Box::pin(async move { Err(e.into()) }),
        };

        let fut = (self.func)(params);

        Box::pin(async move {
            let results = fut.await?;
            Ok(results.into_values())
        })
    }
}

/// One function a server exposes.
///
/// Binds an interface and function name to the signature both ends agree on
/// and the handler that implements it.
#[derive(Clone)]
pub struct Export {
    pub(crate) interface: String,
    pub(crate) function: String,
    pub(crate) signature: Signature,
    pub(crate) handler: Arc<dyn Handler>,
}

impl Export {
    pub fn new(
        interface: impl Into<String>,
        function: impl Into<String>,
        signature: Signature,
        handler: Arc<dyn Handler>,
    ) -> Self {
        Self {
            interface: interface.into(),
            function: function.into(),
            signature,
            handler,
        }
    }

    /// Export a closure over dynamic values.
    pub fn dynamic<F, Fut>(
        interface: impl Into<String>,
        function: impl Into<String>,
        signature: Signature,
        func: F,
    ) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Value>>> + Send + 'static,
    {
        Self::new(interface, function, signature, Arc::new(FnHandler { func }))
    }

    /// Export a closure over typed tuples. The signature is derived from
    /// `P` and `R`.
    ///
    /// ```
    /// use pubsub_rpc::Export;
    ///
    /// let export = Export::typed("foo", "f", |(x,): (String,)| async move {
    ///     Ok((x.len() as u32,))
    /// });
    /// assert_eq!(export.function(), "f");
    /// ```
    pub fn typed<P, R, F, Fut>(
        interface: impl Into<String>,
        function: impl Into<String>,
        func: F,
    ) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
        P: WireTuple + Send + 'static,
        R: WireTuple + Send + 'static,
    {
        let handler = TypedHandler {
            func,
            _phantom: PhantomData,
        };
        Self::new(
            interface,
            function,
            Signature::of::<P, R>(),
            Arc::new(handler),
        )
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}

impl std::fmt::Debug for Export {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Export")
            .field("interface", &self.interface)
            .field("function", &self.function)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}
