//! Phase-by-phase execution of a plan.

use super::context::PipelineContext;
use super::error::{HookError, RunnerError};
use super::hook::{CallableRegistry, HookHandler, PipelineHook};
use super::phase::{FailurePolicy, PipelinePhase};
use super::plan::ExecutionPlan;
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

/// Outcome of a pipeline run that was not aborted.
#[derive(Debug)]
pub struct PipelineResult {
    /// True when no hook failed.
    pub success: bool,
    /// Failures from continue-on-error phases, in execution order.
    pub errors: Vec<HookError>,
    pub context: PipelineContext,
}

impl PipelineResult {
    pub fn failed_hooks(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.hook_id()).collect()
    }
}

/// Executes an [`ExecutionPlan`] against host-supplied handlers.
///
/// Hooks run strictly one at a time in plan order. In `preflight`, `before`
/// and `execute` the first failure aborts the run: remaining hooks and
/// phases are skipped, `finalize` still runs, and then the failure is
/// returned as `Err`. In `after`, `emit` and `finalize` every hook runs and
/// failures are collected in [`PipelineResult::errors`].
///
/// Timeouts and panics are failures like any other: they surface as
/// [`HookError::Timeout`] and [`HookError::Panicked`] and follow the same
/// phase policy.
pub struct PipelineRunner {
    plan: ExecutionPlan,
    handlers: HashMap<String, HookHandler>,
}

impl PipelineRunner {
    /// Resolve every hook's `callable_ref` up front.
    pub fn new(plan: ExecutionPlan, callables: &CallableRegistry) -> Result<Self, RunnerError> {
        let mut handlers = HashMap::with_capacity(plan.total_hooks());
        for (_, hooks) in plan.iter() {
            for hook in hooks {
                let handler = callables.get(&hook.callable_ref).ok_or_else(|| {
                    RunnerError::UnresolvedCallable {
                        hook_id: hook.hook_id.clone(),
                        callable_ref: hook.callable_ref.clone(),
                    }
                })?;
                handlers.insert(hook.hook_id.clone(), handler.clone());
            }
        }
        Ok(Self { plan, handlers })
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    /// Run with a fresh, empty context.
    pub async fn run(&self) -> Result<PipelineResult, HookError> {
        self.run_with_context(PipelineContext::new()).await
    }

    pub async fn run_with_context(
        &self,
        context: PipelineContext,
    ) -> Result<PipelineResult, HookError> {
        let run_id = context.run_id();
        tracing::info!(%run_id, hooks = self.plan.total_hooks(), "pipeline run started");

        let mut errors = Vec::new();
        let mut aborted: Option<HookError> = None;

        for phase in PipelinePhase::ALL {
            if phase == PipelinePhase::Finalize {
                continue;
            }
            if let Some(err) = self.run_phase(phase, &context, &mut errors).await {
                tracing::warn!(%run_id, %phase, hook_id = err.hook_id(), "aborting pipeline");
                aborted = Some(err);
                break;
            }
        }

        let mut finalize_errors = Vec::new();
        if let Some(err) = self
            .run_phase(PipelinePhase::Finalize, &context, &mut finalize_errors)
            .await
        {
            // Finalize is continue-on-error; keep the error if that ever changes.
            debug_assert!(!PipelinePhase::Finalize.is_fail_fast());
            finalize_errors.push(err);
        }

        if let Some(err) = aborted {
            for dropped in &finalize_errors {
                tracing::error!(%run_id, hook_id = dropped.hook_id(), error = %dropped, "finalize hook failed during abort");
            }
            return Err(err);
        }

        errors.extend(finalize_errors);
        tracing::info!(%run_id, errors = errors.len(), "pipeline run finished");
        Ok(PipelineResult {
            success: errors.is_empty(),
            errors,
            context,
        })
    }

    /// Run one phase. Returns the aborting error for fail-fast phases;
    /// otherwise failures are pushed onto `errors`.
    async fn run_phase(
        &self,
        phase: PipelinePhase,
        context: &PipelineContext,
        errors: &mut Vec<HookError>,
    ) -> Option<HookError> {
        let hooks = self.plan.hooks_for(phase);
        if hooks.is_empty() {
            return None;
        }
        tracing::debug!(%phase, hooks = hooks.len(), "phase started");

        for hook in hooks {
            let Err(err) = self.invoke(hook, context).await else {
                continue;
            };
            match phase.failure_policy() {
                FailurePolicy::FailFast => return Some(err),
                FailurePolicy::ContinueOnError => {
                    tracing::warn!(%phase, hook_id = %hook.hook_id, error = %err, "hook failed, continuing");
                    errors.push(err);
                }
            }
        }
        None
    }

    async fn invoke(&self, hook: &PipelineHook, context: &PipelineContext) -> Result<(), HookError> {
        let Some(handler) = self.handlers.get(&hook.hook_id).cloned() else {
            return Err(HookError::Failed {
                hook_id: hook.hook_id.clone(),
                phase: hook.phase,
                source: format!("no handler resolved for callable '{}'", hook.callable_ref).into(),
            });
        };
        let context = context.clone();
        // Calling the handler happens inside the guarded future so a panic in
        // its synchronous prologue is caught as well.
        let future = AssertUnwindSafe(async move { handler(context).await }).catch_unwind();
        let timeout_seconds = hook
            .timeout_seconds
            .or(self.plan.config().default_hook_timeout_seconds);

        // Infinite or unrepresentable deadlines mean no deadline.
        let deadline = timeout_seconds
            .and_then(|s| Duration::try_from_secs_f64(s.max(0.0)).ok().map(|d| (s, d)));

        let outcome = match deadline {
            Some((seconds, duration)) => match tokio::time::timeout(duration, future).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return Err(HookError::Timeout {
                        hook_id: hook.hook_id.clone(),
                        phase: hook.phase,
                        timeout_seconds: seconds,
                    })
                }
            },
            None => future.await,
        };

        match outcome {
            Ok(result) => result.map_err(|source| HookError::Failed {
                hook_id: hook.hook_id.clone(),
                phase: hook.phase,
                source,
            }),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(hook_id = %hook.hook_id, phase = %hook.phase, %message, "hook panicked");
                Err(HookError::Panicked {
                    hook_id: hook.hook_id.clone(),
                    phase: hook.phase,
                    message,
                })
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::config::PipelineConfig;
    use crate::pipeline::error::BoxError;
    use crate::pipeline::hook::{async_handler, sync_handler};
    use crate::pipeline::plan::PlanBuilder;
    use crate::pipeline::registry::HookRegistry;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder(log: &Log, name: &str) -> HookHandler {
        let log = Arc::clone(log);
        let name = name.to_string();
        sync_handler(move |_ctx| {
            log.lock().unwrap().push(name.clone());
            Ok(())
        })
    }

    fn failing(log: &Log, name: &str) -> HookHandler {
        let log = Arc::clone(log);
        let name = name.to_string();
        sync_handler(move |_ctx| {
            log.lock().unwrap().push(name.clone());
            Err(format!("{name} exploded").into())
        })
    }

    fn runner(
        hooks: Vec<PipelineHook>,
        callables: CallableRegistry,
        config: PipelineConfig,
    ) -> PipelineRunner {
        let mut registry = HookRegistry::new();
        for hook in hooks {
            registry.register(hook).unwrap();
        }
        let frozen = registry.freeze();
        let plan = PlanBuilder::new(&frozen).config(config).build().unwrap();
        PipelineRunner::new(plan, &callables).unwrap()
    }

    #[tokio::test]
    async fn runs_phases_in_order() {
        let log: Log = Arc::default();
        let hooks: Vec<_> = PipelinePhase::ALL
            .iter()
            .rev()
            .map(|p| PipelineHook::new(p.as_str(), *p))
            .collect();
        let callables = PipelinePhase::ALL
            .iter()
            .map(|p| (p.as_str().to_string(), recorder(&log, p.as_str())))
            .collect();

        let result = runner(hooks, callables, PipelineConfig::default())
            .run()
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["preflight", "before", "execute", "after", "emit", "finalize"]
        );
    }

    #[tokio::test]
    async fn fail_fast_phase_aborts_but_finalize_runs() {
        let log: Log = Arc::default();
        let hooks = vec![
            PipelineHook::new("check", PipelinePhase::Before),
            PipelineHook::new("work", PipelinePhase::Execute),
            PipelineHook::new("notify", PipelinePhase::Emit),
            PipelineHook::new("cleanup", PipelinePhase::Finalize),
        ];
        let callables = CallableRegistry::from([
            ("check".to_string(), failing(&log, "check")),
            ("work".to_string(), recorder(&log, "work")),
            ("notify".to_string(), recorder(&log, "notify")),
            ("cleanup".to_string(), recorder(&log, "cleanup")),
        ]);

        let err = runner(hooks, callables, PipelineConfig::default())
            .run()
            .await
            .unwrap_err();

        assert_eq!(err.hook_id(), "check");
        assert_eq!(err.phase(), PipelinePhase::Before);
        assert!(err.to_string().contains("check exploded"));
        assert_eq!(*log.lock().unwrap(), vec!["check", "cleanup"]);
    }

    #[tokio::test]
    async fn finalize_sees_data_written_before_abort() {
        let seen: Arc<Mutex<Option<serde_json::Value>>> = Arc::default();
        let seen_by_finalize = Arc::clone(&seen);
        let hooks = vec![
            PipelineHook::new("work", PipelinePhase::Execute),
            PipelineHook::new("cleanup", PipelinePhase::Finalize),
        ];
        let callables = CallableRegistry::from([
            (
                "work".to_string(),
                sync_handler(|ctx| {
                    ctx.insert("partial", json!(42));
                    Err("failed after writing".into())
                }),
            ),
            (
                "cleanup".to_string(),
                sync_handler(move |ctx| {
                    *seen_by_finalize.lock().unwrap() = ctx.get("partial");
                    Ok(())
                }),
            ),
        ]);

        let result = runner(hooks, callables, PipelineConfig::default()).run().await;

        assert!(result.is_err());
        assert_eq!(*seen.lock().unwrap(), Some(json!(42)));
    }

    #[tokio::test]
    async fn continue_phase_collects_every_error() {
        let log: Log = Arc::default();
        let hooks = vec![
            PipelineHook::new("after_1", PipelinePhase::After).priority(1),
            PipelineHook::new("after_2", PipelinePhase::After).priority(2),
            PipelineHook::new("after_3", PipelinePhase::After).priority(3),
            PipelineHook::new("emit", PipelinePhase::Emit),
        ];
        let callables = CallableRegistry::from([
            ("after_1".to_string(), failing(&log, "after_1")),
            ("after_2".to_string(), recorder(&log, "after_2")),
            ("after_3".to_string(), failing(&log, "after_3")),
            ("emit".to_string(), recorder(&log, "emit")),
        ]);

        let result = runner(hooks, callables, PipelineConfig::default())
            .run()
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.failed_hooks(), vec!["after_1", "after_3"]);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["after_1", "after_2", "after_3", "emit"]
        );
    }

    #[tokio::test]
    async fn finalize_errors_are_recorded_on_normal_runs() {
        let log: Log = Arc::default();
        let hooks = vec![PipelineHook::new("cleanup", PipelinePhase::Finalize)];
        let callables = CallableRegistry::from([("cleanup".to_string(), failing(&log, "cleanup"))]);

        let result = runner(hooks, callables, PipelineConfig::default())
            .run()
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.failed_hooks(), vec!["cleanup"]);
    }

    #[tokio::test]
    async fn timeout_in_fail_fast_phase_aborts() {
        let log: Log = Arc::default();
        let hooks = vec![
            PipelineHook::new("slow", PipelinePhase::Execute).timeout_seconds(0.01),
            PipelineHook::new("cleanup", PipelinePhase::Finalize),
        ];
        let callables = CallableRegistry::from([
            (
                "slow".to_string(),
                async_handler(|_ctx| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok::<(), BoxError>(())
                }),
            ),
            ("cleanup".to_string(), recorder(&log, "cleanup")),
        ]);

        let err = runner(hooks, callables, PipelineConfig::default())
            .run()
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(matches!(
            err,
            HookError::Timeout { ref hook_id, timeout_seconds, .. }
                if hook_id == "slow" && timeout_seconds == 0.01
        ));
        assert_eq!(*log.lock().unwrap(), vec!["cleanup"]);
    }

    #[tokio::test]
    async fn timeout_in_continue_phase_is_recorded() {
        let log: Log = Arc::default();
        let hooks = vec![
            PipelineHook::new("slow_emit", PipelinePhase::Emit),
            PipelineHook::new("next_emit", PipelinePhase::Emit).depends_on("slow_emit"),
        ];
        let callables = CallableRegistry::from([
            (
                "slow_emit".to_string(),
                async_handler(|_ctx| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok::<(), BoxError>(())
                }),
            ),
            ("next_emit".to_string(), recorder(&log, "next_emit")),
        ]);
        let config = PipelineConfig::new().default_hook_timeout_seconds(0.01);

        let result = runner(hooks, callables, config).run().await.unwrap();

        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].is_timeout());
        assert_eq!(*log.lock().unwrap(), vec!["next_emit"]);
    }

    #[tokio::test]
    async fn mixed_sync_and_async_hooks_follow_plan_order() {
        let log: Log = Arc::default();
        let async_log = Arc::clone(&log);
        let hooks = vec![
            PipelineHook::new("first", PipelinePhase::Execute).priority(1),
            PipelineHook::new("second", PipelinePhase::Execute).priority(2),
            PipelineHook::new("third", PipelinePhase::Execute).priority(3),
        ];
        let callables = CallableRegistry::from([
            ("first".to_string(), recorder(&log, "first")),
            (
                "second".to_string(),
                async_handler(move |_ctx| {
                    let log = Arc::clone(&async_log);
                    async move {
                        tokio::task::yield_now().await;
                        log.lock().unwrap().push("second".to_string());
                        Ok::<(), BoxError>(())
                    }
                }),
            ),
            ("third".to_string(), recorder(&log, "third")),
        ]);

        runner(hooks, callables, PipelineConfig::default())
            .run()
            .await
            .unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn context_is_shared_and_returned() {
        let hooks = vec![
            PipelineHook::new("write", PipelinePhase::Before),
            PipelineHook::new("read", PipelinePhase::After),
        ];
        let callables = CallableRegistry::from([
            (
                "write".to_string(),
                sync_handler(|ctx| {
                    ctx.insert("count", json!(1));
                    Ok(())
                }),
            ),
            (
                "read".to_string(),
                sync_handler(|ctx| {
                    let count = ctx.get("count").and_then(|v| v.as_i64()).unwrap_or(0);
                    ctx.insert("count", json!(count + 1));
                    Ok(())
                }),
            ),
        ]);
        let mut seed = serde_json::Map::new();
        seed.insert("request".to_string(), json!("r-9"));

        let result = runner(hooks, callables, PipelineConfig::default())
            .run_with_context(PipelineContext::with_data(seed))
            .await
            .unwrap();

        assert_eq!(result.context.get("count"), Some(json!(2)));
        assert_eq!(result.context.get("request"), Some(json!("r-9")));
    }

    #[tokio::test]
    async fn blocking_sync_hook_is_bounded_by_its_timeout() {
        let log: Log = Arc::default();
        let hooks = vec![
            PipelineHook::new("crunch", PipelinePhase::Execute).timeout_seconds(0.01),
            PipelineHook::new("cleanup", PipelinePhase::Finalize),
        ];
        let callables = CallableRegistry::from([
            (
                "crunch".to_string(),
                sync_handler(|_ctx| {
                    std::thread::sleep(Duration::from_millis(300));
                    Ok(())
                }),
            ),
            ("cleanup".to_string(), recorder(&log, "cleanup")),
        ]);

        let err = runner(hooks, callables, PipelineConfig::default())
            .run()
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(err.hook_id(), "crunch");
        assert_eq!(*log.lock().unwrap(), vec!["cleanup"]);
    }

    #[tokio::test]
    async fn panicking_hook_aborts_but_finalize_runs() {
        let log: Log = Arc::default();
        let hooks = vec![
            PipelineHook::new("boom", PipelinePhase::Execute),
            PipelineHook::new("notify", PipelinePhase::Emit),
            PipelineHook::new("cleanup", PipelinePhase::Finalize),
        ];
        let callables = CallableRegistry::from([
            (
                "boom".to_string(),
                sync_handler(|_ctx| panic!("handler blew up")),
            ),
            ("notify".to_string(), recorder(&log, "notify")),
            ("cleanup".to_string(), recorder(&log, "cleanup")),
        ]);

        let err = runner(hooks, callables, PipelineConfig::default())
            .run()
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            HookError::Panicked { ref hook_id, phase: PipelinePhase::Execute, ref message }
                if hook_id == "boom" && message == "handler blew up"
        ));
        assert_eq!(*log.lock().unwrap(), vec!["cleanup"]);
    }

    #[tokio::test]
    async fn async_panic_in_continue_phase_is_recorded() {
        let log: Log = Arc::default();
        let hooks = vec![
            PipelineHook::new("flaky_emit", PipelinePhase::Emit).priority(1),
            PipelineHook::new("steady_emit", PipelinePhase::Emit).priority(2),
        ];
        let callables = CallableRegistry::from([
            (
                "flaky_emit".to_string(),
                async_handler(|ctx| async move {
                    if !ctx.contains_key("never_set") {
                        panic!("emitter lost connection");
                    }
                    Ok::<(), BoxError>(())
                }),
            ),
            ("steady_emit".to_string(), recorder(&log, "steady_emit")),
        ]);

        let result = runner(hooks, callables, PipelineConfig::default())
            .run()
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.failed_hooks(), vec!["flaky_emit"]);
        assert!(result.errors[0].to_string().contains("emitter lost connection"));
        assert_eq!(*log.lock().unwrap(), vec!["steady_emit"]);
    }

    #[tokio::test]
    async fn every_finalize_hook_runs_after_a_finalize_failure() {
        let log: Log = Arc::default();
        let hooks = vec![
            PipelineHook::new("release_lock", PipelinePhase::Finalize).priority(1),
            PipelineHook::new("close_files", PipelinePhase::Finalize).priority(2),
        ];
        let callables = CallableRegistry::from([
            ("release_lock".to_string(), failing(&log, "release_lock")),
            ("close_files".to_string(), recorder(&log, "close_files")),
        ]);

        let result = runner(hooks, callables, PipelineConfig::default())
            .run()
            .await
            .unwrap();

        assert!(!PipelinePhase::Finalize.is_fail_fast());
        assert_eq!(result.failed_hooks(), vec!["release_lock"]);
        assert_eq!(*log.lock().unwrap(), vec!["release_lock", "close_files"]);
    }

    #[tokio::test]
    async fn hook_without_handler_fails_instead_of_succeeding() {
        let frozen = HookRegistry::new()
            .with_hook(PipelineHook::new("orphan", PipelinePhase::Before).callable("gone"))
            .unwrap()
            .freeze();
        let plan = PlanBuilder::new(&frozen).build().unwrap();
        let runner = PipelineRunner {
            plan,
            handlers: HashMap::new(),
        };

        let err = runner.run().await.unwrap_err();

        assert!(matches!(err, HookError::Failed { ref hook_id, .. } if hook_id == "orphan"));
        assert!(err.to_string().contains("no handler resolved for callable 'gone'"));
    }

    #[test]
    fn unresolved_callable_is_rejected() {
        let frozen = HookRegistry::new()
            .with_hook(PipelineHook::new("a", PipelinePhase::Before).callable("missing.fn"))
            .unwrap()
            .freeze();
        let plan = PlanBuilder::new(&frozen).build().unwrap();

        let err = PipelineRunner::new(plan, &CallableRegistry::new()).err();
        assert_eq!(
            err,
            Some(RunnerError::UnresolvedCallable {
                hook_id: "a".to_string(),
                callable_ref: "missing.fn".to_string(),
            })
        );
    }
}
