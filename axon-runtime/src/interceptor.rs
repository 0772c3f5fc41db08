//! Interceptor middleware chain
//!
//! Generated resolvers run two operations through an ordered chain of
//! wrappers: argument resolution and the outbound service call. Each
//! interceptor sees the stage, the call context, and a [`Next`] handle; it
//! may act before and after delegating, short-circuit by not delegating at
//! all, or rewrite the result.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::Error;

/// Boxed future alias used across the chain.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The terminal operation a chain wraps.
pub type Terminal<'a> = Box<dyn FnOnce(&CallContext) -> BoxFuture<'a, Result<Value, Error>> + Send + 'a>;

/// Which extension point is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Resolving a field's arguments into the request message.
    ResolveArgs,
    /// Executing the outbound RPC/HTTP call.
    Execute,
}

/// Per-call state shared down the chain: identity of the call plus the
/// out-of-band values that context-key bound fields read instead of
/// GraphQL arguments.
#[derive(Debug, Default)]
pub struct CallContext {
    /// Service the call targets.
    pub service: String,
    /// Method being invoked.
    pub method: String,
    values: HashMap<String, Value>,
}

impl CallContext {
    /// A context for one call.
    pub fn new(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
            values: HashMap::new(),
        }
    }

    /// Inject an out-of-band value, typically from auth middleware.
    pub fn set_value(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Read an injected value.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Read an injected value, failing the way generated resolvers expect
    /// when the middleware never provided it.
    pub fn require_value(&self, key: &str) -> Result<&Value, Error> {
        self.value(key)
            .ok_or_else(|| Error::MissingContext(key.to_string()))
    }
}

/// One middleware layer.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Handle a stage, usually delegating to `next.run(ctx)` somewhere in
    /// the middle.
    async fn call(
        &self,
        stage: Stage,
        ctx: &CallContext,
        next: Next<'_>,
    ) -> Result<Value, Error>;
}

/// Remaining chain, handed to each interceptor.
pub struct Next<'a> {
    rest: &'a [Arc<dyn Interceptor>],
    stage: Stage,
    terminal: Terminal<'a>,
}

impl<'a> Next<'a> {
    /// Run the rest of the chain and, last, the terminal operation.
    pub async fn run(self, ctx: &CallContext) -> Result<Value, Error> {
        match self.rest.split_first() {
            Some((head, tail)) => {
                let next = Next {
                    rest: tail,
                    stage: self.stage,
                    terminal: self.terminal,
                };
                head.call(self.stage, ctx, next).await
            }
            None => (self.terminal)(ctx).await,
        }
    }
}

/// An ordered interceptor chain; cheap to clone and share.
#[derive(Clone, Default)]
pub struct Chain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl Chain {
    /// An empty chain: running it just runs the terminal operation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer; layers run in insertion order, outermost first.
    pub fn with(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    /// Whether the chain has no layers.
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Run a stage through every layer down to the terminal operation.
    pub async fn run<'a>(
        &'a self,
        stage: Stage,
        ctx: &'a CallContext,
        terminal: Terminal<'a>,
    ) -> Result<Value, Error> {
        tracing::trace!(
            ?stage,
            service = %ctx.service,
            method = %ctx.method,
            layers = self.interceptors.len(),
            "running interceptor chain"
        );
        Next {
            rest: &self.interceptors,
            stage,
            terminal,
        }
        .run(ctx)
        .await
    }
}
