//! End-to-end pipeline scenarios: register, freeze, plan, run.

use onex_engine::pipeline::{
    sync_handler, CallableRegistry, HookError, HookHandler, HookRegistry, MiddlewareComposer,
    PipelineConfig, PipelineHook, PipelinePhase, PipelineResult, PipelineRunner, PlanBuilder,
    PlanError,
};
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
        Err(format!("{name} failed").into())
    })
}

fn registry_of(hooks: Vec<PipelineHook>) -> HookRegistry {
    let mut registry = HookRegistry::new();
    for hook in hooks {
        registry.register(hook).unwrap();
    }
    registry
}

#[tokio::test]
async fn dependencies_override_registration_order() {
    let log: Log = Arc::default();
    // Registered in reverse: C needs B, B needs A.
    let registry = registry_of(vec![
        PipelineHook::new("C", PipelinePhase::Execute).depends_on("B"),
        PipelineHook::new("B", PipelinePhase::Execute).depends_on("A"),
        PipelineHook::new("A", PipelinePhase::Execute),
    ])
    .freeze();

    let plan = PlanBuilder::new(&registry).build().unwrap();
    assert_eq!(plan.execution_order(), vec!["A", "B", "C"]);

    let callables: CallableRegistry = ["A", "B", "C"]
        .iter()
        .map(|id| (id.to_string(), recorder(&log, id)))
        .collect();
    let result = PipelineRunner::new(plan, &callables)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(*log.lock().unwrap(), vec!["A", "B", "C"]);
}

#[test]
fn three_hook_cycle_is_rejected() {
    let registry = registry_of(vec![
        PipelineHook::new("a", PipelinePhase::Before).depends_on("c"),
        PipelineHook::new("b", PipelinePhase::Before).depends_on("a"),
        PipelineHook::new("c", PipelinePhase::Before).depends_on("b"),
    ])
    .freeze();

    let err = PlanBuilder::new(&registry).build().unwrap_err();

    let PlanError::DependencyCycle { cycle } = &err else {
        panic!("expected a dependency cycle, got {err:?}");
    };
    assert_eq!(cycle.len(), 3);
    for id in ["a", "b", "c"] {
        assert!(cycle.iter().any(|c| c == id), "{id} missing from {cycle:?}");
    }
}

#[test]
fn enforced_category_mismatch_fails_planning() {
    let registry = registry_of(vec![
        PipelineHook::new("fetch", PipelinePhase::Before).category("effect"),
        PipelineHook::new("score", PipelinePhase::Execute).category("compute"),
    ])
    .freeze();

    let lenient = PlanBuilder::new(&registry)
        .config(PipelineConfig::new().contract_category("compute"))
        .build()
        .unwrap();
    assert_eq!(lenient.warnings().len(), 1);
    assert_eq!(lenient.warnings()[0].hook_id, "fetch");

    let err = PlanBuilder::new(&registry)
        .config(
            PipelineConfig::new()
                .contract_category("compute")
                .enforce_hook_typing(true),
        )
        .build()
        .unwrap_err();
    assert_eq!(
        err,
        PlanError::HookTypeMismatch {
            hook_id: "fetch".to_string(),
            expected: "compute".to_string(),
            actual: "effect".to_string(),
        }
    );
}

#[tokio::test]
async fn before_failure_skips_execute_but_runs_finalize() {
    let log: Log = Arc::default();
    let registry = registry_of(vec![
        PipelineHook::new("validate", PipelinePhase::Before),
        PipelineHook::new("work", PipelinePhase::Execute),
        PipelineHook::new("report", PipelinePhase::After),
        PipelineHook::new("release", PipelinePhase::Finalize),
    ])
    .freeze();
    let callables = CallableRegistry::from([
        ("validate".to_string(), failing(&log, "validate")),
        ("work".to_string(), recorder(&log, "work")),
        ("report".to_string(), recorder(&log, "report")),
        ("release".to_string(), recorder(&log, "release")),
    ]);

    let plan = PlanBuilder::new(&registry).build().unwrap();
    let err = PipelineRunner::new(plan, &callables)
        .unwrap()
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, HookError::Failed { ref hook_id, .. } if hook_id == "validate"));
    assert_eq!(*log.lock().unwrap(), vec!["validate", "release"]);
}

#[tokio::test]
async fn after_phase_errors_are_collected() {
    let log: Log = Arc::default();
    let registry = registry_of(vec![
        PipelineHook::new("work", PipelinePhase::Execute),
        PipelineHook::new("audit", PipelinePhase::After).priority(1),
        PipelineHook::new("index", PipelinePhase::After).priority(2),
        PipelineHook::new("publish", PipelinePhase::Emit),
        PipelineHook::new("release", PipelinePhase::Finalize),
    ])
    .freeze();
    let callables = CallableRegistry::from([
        ("work".to_string(), recorder(&log, "work")),
        ("audit".to_string(), failing(&log, "audit")),
        ("index".to_string(), recorder(&log, "index")),
        ("publish".to_string(), failing(&log, "publish")),
        ("release".to_string(), recorder(&log, "release")),
    ]);

    let plan = PlanBuilder::new(&registry).build().unwrap();
    let result = PipelineRunner::new(plan, &callables)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.failed_hooks(), vec!["audit", "publish"]);
    assert_eq!(
        *log.lock().unwrap(),
        vec!["work", "audit", "index", "publish", "release"]
    );
}

#[tokio::test]
async fn middleware_wraps_a_pipeline_run() {
    let log: Log = Arc::default();
    let registry = registry_of(vec![PipelineHook::new("work", PipelinePhase::Execute)]).freeze();
    let callables = CallableRegistry::from([(
        "work".to_string(),
        sync_handler(|ctx| {
            ctx.insert("answer", json!(42));
            Ok(())
        }),
    )]);
    let plan = PlanBuilder::new(&registry).build().unwrap();
    let runner = Arc::new(PipelineRunner::new(plan, &callables).unwrap());

    type RunOutcome = Result<PipelineResult, HookError>;
    let mut composer = MiddlewareComposer::<RunOutcome>::new();
    let layer_log = Arc::clone(&log);
    composer.use_middleware(move |next| {
        let log = Arc::clone(&layer_log);
        async move {
            log.lock().unwrap().push("start".to_string());
            let outcome = next.run().await;
            log.lock().unwrap().push("end".to_string());
            outcome
        }
    });

    let call = composer.compose(move || {
        let runner = Arc::clone(&runner);
        async move { runner.run().await }
    });
    let result = call.call().await.unwrap();

    assert!(result.success);
    assert_eq!(result.context.get("answer"), Some(json!(42)));
    assert_eq!(*log.lock().unwrap(), vec!["start", "end"]);
}
