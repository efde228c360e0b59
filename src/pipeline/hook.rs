//! Hook descriptors and the handler contract.

use super::context::PipelineContext;
use super::error::BoxError;
use super::phase::PipelinePhase;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Declarative description of one unit of pipeline logic.
///
/// The hook names its implementation through `callable_ref`; the host maps
/// that key to a [`HookHandler`] when building the runner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineHook {
    pub hook_id: String,
    pub phase: PipelinePhase,
    pub callable_ref: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub timeout_seconds: Option<f64>,
    #[serde(default)]
    pub handler_type_category: Option<String>,
}

impl PipelineHook {
    /// A hook whose `callable_ref` equals its id.
    pub fn new(hook_id: impl Into<String>, phase: PipelinePhase) -> Self {
        let hook_id = hook_id.into();
        Self {
            callable_ref: hook_id.clone(),
            hook_id,
            phase,
            priority: 0,
            dependencies: Vec::new(),
            timeout_seconds: None,
            handler_type_category: None,
        }
    }

    pub fn callable(mut self, callable_ref: impl Into<String>) -> Self {
        self.callable_ref = callable_ref.into();
        self
    }

    /// Lower values run first among unconstrained hooks.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn depends_on(mut self, hook_id: impl Into<String>) -> Self {
        self.dependencies.push(hook_id.into());
        self
    }

    pub fn timeout_seconds(mut self, seconds: f64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.handler_type_category = Some(category.into());
        self
    }
}

/// Future returned by a hook invocation.
pub type HookFuture = BoxFuture<'static, Result<(), BoxError>>;

/// Executable hook body. Every handler is async; synchronous functions are
/// adapted with [`sync_handler`].
pub type HookHandler = Arc<dyn Fn(PipelineContext) -> HookFuture + Send + Sync>;

/// Host-supplied mapping from `callable_ref` to handler.
pub type CallableRegistry = HashMap<String, HookHandler>;

/// Wrap an async function as a [`HookHandler`].
pub fn async_handler<F, Fut>(f: F) -> HookHandler
where
    F: Fn(PipelineContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Arc::new(move |ctx: PipelineContext| -> HookFuture { f(ctx).boxed() })
}

/// Wrap a synchronous function as a [`HookHandler`].
///
/// The function runs on tokio's blocking pool once the returned future is
/// first polled, so a hook timeout can fire while it is still running. A
/// timed-out function is not interrupted; it finishes in the background and
/// its result is discarded. Panics are re-raised on the awaiting task.
pub fn sync_handler<F>(f: F) -> HookHandler
where
    F: Fn(&PipelineContext) -> Result<(), BoxError> + Send + Sync + 'static,
{
    let f = Arc::new(f);
    Arc::new(move |ctx: PipelineContext| -> HookFuture {
        let f = Arc::clone(&f);
        async move {
            match tokio::task::spawn_blocking(move || f(&ctx)).await {
                Ok(outcome) => outcome,
                Err(join) if join.is_panic() => std::panic::resume_unwind(join.into_panic()),
                Err(join) => Err(Box::new(join) as BoxError),
            }
        }
        .boxed()
    })
}
