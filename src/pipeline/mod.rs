//! Phased hook pipelines.
//!
//! Hooks are registered declaratively, frozen, planned and then executed:
//!
//! 1. [`HookRegistry`] collects [`PipelineHook`]s and rejects duplicate ids.
//! 2. [`HookRegistry::freeze`] yields an immutable [`FrozenHookRegistry`].
//! 3. [`PlanBuilder`] validates dependencies, rejects cycles and orders each
//!    phase into an [`ExecutionPlan`].
//! 4. [`PipelineRunner`] executes the plan against host-supplied handlers,
//!    applying each phase's [`FailurePolicy`] and per-hook timeouts.
//! 5. [`MiddlewareComposer`] optionally wraps the run in onion-style layers.
//!
//! # Example
//!
//! ```rust
//! use onex_engine::pipeline::{
//!     sync_handler, CallableRegistry, HookRegistry, PipelineHook, PipelinePhase,
//!     PipelineRunner, PlanBuilder,
//! };
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut registry = HookRegistry::new();
//! registry.register(PipelineHook::new("load", PipelinePhase::Before)).unwrap();
//! registry
//!     .register(PipelineHook::new("process", PipelinePhase::Execute).depends_on("load"))
//!     .unwrap();
//! let registry = registry.freeze();
//!
//! let plan = PlanBuilder::new(&registry).build().unwrap();
//!
//! let mut callables = CallableRegistry::new();
//! callables.insert(
//!     "load".to_string(),
//!     sync_handler(|ctx| {
//!         ctx.insert("rows", json!(3));
//!         Ok(())
//!     }),
//! );
//! callables.insert("process".to_string(), sync_handler(|_ctx| Ok(())));
//!
//! let runner = PipelineRunner::new(plan, &callables).unwrap();
//! let result = runner.run().await.unwrap();
//! assert!(result.success);
//! assert_eq!(result.context.get("rows"), Some(json!(3)));
//! # }
//! ```

mod config;
mod context;
mod error;
mod hook;
mod middleware;
mod phase;
mod plan;
mod registry;
mod runner;

pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use error::{BoxError, HookError, PlanError, RegistryError, RunnerError};
pub use hook::{async_handler, sync_handler, CallableRegistry, HookFuture, HookHandler, PipelineHook};
pub use middleware::{ComposedCall, Middleware, MiddlewareComposer, Next};
pub use phase::{FailurePolicy, PipelinePhase};
pub use plan::{ExecutionPlan, PlanBuilder, PlanWarning};
pub use registry::{FrozenHookRegistry, HookRegistry};
pub use runner::{PipelineResult, PipelineRunner};
