//! Onion-style middleware around an async call.
//!
//! Middlewares run in registration order on the way in and in reverse order
//! on the way out. Each receives a [`Next`] continuation; awaiting
//! `next.run()` proceeds to the next layer (or the core call), and not
//! calling it short-circuits the chain.
//!
//! # Example
//!
//! ```rust
//! use onex_engine::pipeline::MiddlewareComposer;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut composer = MiddlewareComposer::<i32>::new();
//! composer.use_middleware(|next| async move { next.run().await * 10 });
//!
//! let call = composer.compose(|| async { 4 });
//! assert_eq!(call.call().await, 40);
//! # }
//! ```

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;

/// A single layer of the chain.
pub type Middleware<T> = Arc<dyn Fn(Next<T>) -> BoxFuture<'static, T> + Send + Sync>;

type Core<T> = Arc<dyn Fn() -> BoxFuture<'static, T> + Send + Sync>;

/// Continuation handed to a middleware: the rest of the chain.
pub struct Next<T> {
    chain: Arc<[Middleware<T>]>,
    position: usize,
    core: Core<T>,
}

impl<T: Send + 'static> Next<T> {
    /// Run the remaining layers and the core call.
    pub fn run(self) -> BoxFuture<'static, T> {
        match self.chain.get(self.position).cloned() {
            Some(middleware) => middleware(Next {
                chain: self.chain,
                position: self.position + 1,
                core: self.core,
            }),
            None => (self.core)(),
        }
    }
}

/// Ordered collection of middlewares.
pub struct MiddlewareComposer<T> {
    middlewares: Vec<Middleware<T>>,
}

impl<T: Send + 'static> Default for MiddlewareComposer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> MiddlewareComposer<T> {
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    /// Append a middleware; it wraps everything registered after it.
    pub fn use_middleware<F, Fut>(&mut self, middleware: F) -> &mut Self
    where
        F: Fn(Next<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        self.middlewares
            .push(Arc::new(move |next: Next<T>| -> BoxFuture<'static, T> {
                middleware(next).boxed()
            }));
        self
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Wrap `core` in the current chain. Later registrations do not affect
    /// the returned call.
    pub fn compose<F, Fut>(&self, core: F) -> ComposedCall<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        ComposedCall {
            chain: self.middlewares.clone().into(),
            core: Arc::new(move || -> BoxFuture<'static, T> { core().boxed() }),
        }
    }
}

/// A core call wrapped in middleware; may be invoked any number of times.
pub struct ComposedCall<T> {
    chain: Arc<[Middleware<T>]>,
    core: Core<T>,
}

impl<T> Clone for ComposedCall<T> {
    fn clone(&self) -> Self {
        Self {
            chain: Arc::clone(&self.chain),
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: Send + 'static> ComposedCall<T> {
    pub fn call(&self) -> BoxFuture<'static, T> {
        Next {
            chain: Arc::clone(&self.chain),
            position: 0,
            core: Arc::clone(&self.core),
        }
        .run()
    }
}
