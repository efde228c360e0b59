//! Hook Pipeline
//!
//! This demo registers hooks across every phase, plans them and runs the
//! plan twice: once cleanly and once with a failing validation hook.
//!
//! Key concepts:
//! - Registration, freezing and planning as separate steps
//! - Dependencies and priorities ordering hooks within a phase
//! - Fail-fast phases vs. continue-on-error phases
//! - Finalize hooks that always run
//! - Timing middleware wrapped around a whole run
//!
//! Run with: cargo run --example hook_pipeline

use onex_engine::pipeline::{
    async_handler, sync_handler, BoxError, CallableRegistry, HookError, HookRegistry,
    MiddlewareComposer, PipelineConfig, PipelineContext, PipelineHook, PipelinePhase,
    PipelineResult, PipelineRunner, PlanBuilder,
};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn hooks() -> Vec<PipelineHook> {
    vec![
        PipelineHook::new("check_quota", PipelinePhase::Preflight),
        PipelineHook::new("validate_input", PipelinePhase::Before).callable("validate"),
        PipelineHook::new("enrich", PipelinePhase::Execute).depends_on("fetch"),
        PipelineHook::new("fetch", PipelinePhase::Execute).timeout_seconds(1.0),
        PipelineHook::new("audit", PipelinePhase::After).priority(5),
        PipelineHook::new("metrics", PipelinePhase::After).priority(1),
        PipelineHook::new("publish", PipelinePhase::Emit),
        PipelineHook::new("release_lock", PipelinePhase::Finalize),
    ]
}

fn callables(reject_input: bool) -> CallableRegistry {
    let noted = |name: &'static str| {
        sync_handler(move |_ctx: &PipelineContext| {
            println!("  {name}");
            Ok(())
        })
    };

    CallableRegistry::from([
        ("check_quota".to_string(), noted("check_quota")),
        (
            "validate".to_string(),
            sync_handler(move |ctx: &PipelineContext| {
                println!("  validate");
                if reject_input {
                    return Err("input rejected".into());
                }
                ctx.insert("validated", json!(true));
                Ok(())
            }),
        ),
        (
            "fetch".to_string(),
            async_handler(|ctx: PipelineContext| async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                println!("  fetch");
                ctx.insert("records", json!([1, 2, 3]));
                Ok::<(), BoxError>(())
            }),
        ),
        (
            "enrich".to_string(),
            sync_handler(|ctx: &PipelineContext| {
                println!("  enrich");
                ctx.update("records", |records| {
                    if let Some(items) = records.as_array_mut() {
                        items.push(json!(4));
                    }
                });
                Ok(())
            }),
        ),
        (
            "audit".to_string(),
            sync_handler(|_ctx: &PipelineContext| {
                println!("  audit (fails, run continues)");
                Err("audit store unavailable".into())
            }),
        ),
        ("metrics".to_string(), noted("metrics")),
        ("publish".to_string(), noted("publish")),
        ("release_lock".to_string(), noted("release_lock")),
    ])
}

fn report(outcome: &Result<PipelineResult, HookError>) {
    match outcome {
        Ok(result) => {
            println!("  success: {}", result.success);
            println!("  failed hooks: {:?}", result.failed_hooks());
            println!("  records: {:?}", result.context.get("records"));
        }
        Err(err) => println!("  aborted: {err}"),
    }
}

#[tokio::main]
async fn main() {
    println!("=== Hook Pipeline ===\n");

    let mut registry = HookRegistry::new();
    for hook in hooks() {
        registry.register(hook).expect("hook ids are unique");
    }
    let registry = registry.freeze();

    let config = PipelineConfig::new().default_hook_timeout_seconds(5.0);
    let plan = PlanBuilder::new(&registry)
        .config(config)
        .build()
        .expect("hooks form a valid plan");
    println!("Execution order: {:?}\n", plan.execution_order());

    let mut composer = MiddlewareComposer::<Result<PipelineResult, HookError>>::new();
    composer.use_middleware(|next| async move {
        let started = Instant::now();
        let outcome = next.run().await;
        println!("  (run took {:?})", started.elapsed());
        outcome
    });

    for reject_input in [false, true] {
        println!("Run with reject_input = {reject_input}");
        let runner = Arc::new(
            PipelineRunner::new(plan.clone(), &callables(reject_input))
                .expect("every callable is registered"),
        );
        let call = composer.compose(move || {
            let runner = Arc::clone(&runner);
            async move { runner.run().await }
        });
        report(&call.call().await);
        println!();
    }
}
