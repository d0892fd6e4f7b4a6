// crates/flownodes/tests/nodes_test.rs
use flowcore::{BuildError, ExecutionContext, FlowDefinition, FlowError, StepDefinition, Value};
use flownodes::{register_all, standard_registry};
use flowruntime::{Flow, FlowBuilder, MemoryConfigReader};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Initialize tracing for tests
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

fn build(definition: &FlowDefinition) -> Result<Flow, BuildError> {
    let mut reader = MemoryConfigReader::new();
    reader.insert_definition(definition).unwrap();
    FlowBuilder::new(Arc::new(standard_registry().unwrap()), reader).build(&definition.name)
}

fn root(next: &[&str]) -> StepDefinition {
    next.iter().fold(
        StepDefinition::new("start", "default_root").with_hyper_param("delay_ms", 1),
        |step, n| step.with_next(*n),
    )
}

fn constant(name: &str, value: serde_json::Value, output: &str) -> StepDefinition {
    StepDefinition::new(name, "transform.constant")
        .with_hyper_param("value", value)
        .with_output(output)
}

#[test]
fn test_register_all() {
    let registry = standard_registry().unwrap();
    assert_eq!(
        registry.list_operator_types(),
        vec![
            "debug.log",
            "default_root",
            "time.delay",
            "transform.collect",
            "transform.constant",
            "transform.json_parse",
            "transform.json_stringify",
        ]
    );
    assert_eq!(
        registry.get_metadata("time.delay").unwrap().category,
        "time"
    );

    let mut registry = registry;
    assert!(matches!(
        register_all(&mut registry),
        Err(BuildError::DuplicateOperator(_))
    ));
}

#[tokio::test]
async fn test_parse_then_stringify() {
    init_tracing();
    let definition = FlowDefinition::new("json", "start")
        .with_step(root(&["text"]))
        .with_step(constant("text", json!("{\"a\": [1, 2]}"), "raw").with_next("parse"))
        .with_step(
            StepDefinition::new("parse", "transform.json_parse")
                .with_param("raw")
                .with_output("doc")
                .with_next("dump"),
        )
        .with_step(
            StepDefinition::new("dump", "transform.json_stringify")
                .with_param("doc")
                .with_output("out"),
        );
    let flow = build(&definition).unwrap();

    let summary = flow.run(ExecutionContext::new()).await.unwrap();
    assert!(summary.is_success(), "{:?}", summary.failed);

    assert_eq!(flow.get("doc").await, Some(Value::Json(json!({"a": [1, 2]}))));
    assert_eq!(flow.get("out").await, Some(Value::from("{\"a\":[1,2]}")));
}

#[tokio::test]
async fn test_collect_fans_in() {
    let definition = FlowDefinition::new("fan_in", "start")
        .with_step(root(&["one", "two"]))
        .with_step(constant("one", json!(1), "x").with_next("gather"))
        .with_step(constant("two", json!("two"), "y").with_next("gather"))
        .with_step(
            StepDefinition::new("gather", "transform.collect")
                .with_param("x")
                .with_param("y")
                .with_param("never_set")
                .with_output("all"),
        );
    let flow = build(&definition).unwrap();

    flow.run(ExecutionContext::new()).await.unwrap();

    assert_eq!(
        flow.get("all").await,
        Some(Value::Array(vec![
            Value::Number(1.0),
            Value::from("two"),
            Value::Null
        ]))
    );
}

#[tokio::test]
async fn test_delay_passes_first_param_through() {
    let definition = FlowDefinition::new("delay", "start")
        .with_step(root(&["seed"]))
        .with_step(constant("seed", json!(true), "flag").with_next("wait"))
        .with_step(
            StepDefinition::new("wait", "time.delay")
                .with_hyper_param("delay_ms", 5)
                .with_param("flag")
                .with_output("after"),
        );
    let flow = build(&definition).unwrap();

    flow.run(ExecutionContext::new()).await.unwrap();
    assert_eq!(flow.get("after").await, Some(Value::Bool(true)));
}

#[tokio::test]
async fn test_delay_honours_cancellation() {
    let definition = FlowDefinition::new("slow", "wait")
        .with_step(StepDefinition::new("wait", "time.delay").with_hyper_param("delay_ms", 60_000));
    let flow = build(&definition).unwrap();

    let ctx = ExecutionContext::new();
    let token = ctx.cancellation.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });

    let summary = tokio::time::timeout(Duration::from_secs(5), flow.run(ctx))
        .await
        .expect("cancelled delay should return promptly")
        .unwrap();
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].error, "Cancelled");
}

#[tokio::test]
async fn test_delay_without_duration_waits_a_second() {
    let definition = FlowDefinition::new("default_wait", "wait")
        .with_step(StepDefinition::new("wait", "time.delay").with_output("after"));
    let flow = build(&definition).unwrap();

    let ctx = ExecutionContext::new();
    let token = ctx.cancellation.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
    });

    let summary = flow.run(ctx).await.unwrap();
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].error, "Cancelled");
}

#[tokio::test]
async fn test_debug_log_returns_message() {
    let definition = FlowDefinition::new("debug", "start")
        .with_step(root(&["log"]))
        .with_step(
            StepDefinition::new("log", "debug.log")
                .with_hyper_param("message", "hello")
                .with_param("missing")
                .with_output("said"),
        );
    let flow = build(&definition).unwrap();

    flow.run(ExecutionContext::new()).await.unwrap();
    assert_eq!(flow.get("said").await, Some(Value::from("hello")));
}

#[tokio::test]
async fn test_json_parse_rejects_non_string() {
    let definition = FlowDefinition::new("bad", "start")
        .with_step(root(&["num"]))
        .with_step(constant("num", json!(5), "n").with_next("parse"))
        .with_step(StepDefinition::new("parse", "transform.json_parse").with_param("n"));
    let flow = build(&definition).unwrap();

    let summary = flow.run(ExecutionContext::new()).await.unwrap();
    assert_eq!(summary.failed[0].operator, "parse");
    assert!(
        summary.failed[0].error.contains("expected string, got number"),
        "{}",
        summary.failed[0].error
    );
}

#[test]
fn test_step_configuration_is_checked_at_build() {
    let cases = [
        StepDefinition::new("a", "transform.constant"),
        StepDefinition::new("a", "transform.json_parse"),
        StepDefinition::new("a", "transform.json_stringify"),
        StepDefinition::new("a", "time.delay").with_hyper_param("delay_ms", "soon"),
    ];

    for step in cases {
        let op = step.op_name.clone();
        let definition = FlowDefinition::new("invalid", "a").with_step(step);
        assert!(
            matches!(build(&definition), Err(BuildError::InvalidStep { .. })),
            "{} should be rejected",
            op
        );
    }
}

#[tokio::test]
async fn test_strict_run_surfaces_operator_error() {
    let definition = FlowDefinition::new("strict", "parse")
        .with_step(StepDefinition::new("parse", "transform.json_parse").with_param("absent"));
    let mut reader = MemoryConfigReader::new();
    reader.insert_definition(&definition).unwrap();
    let flow = FlowBuilder::new(Arc::new(standard_registry().unwrap()), reader)
        .with_settings(flowruntime::ExecutionSettings {
            on_error: flowcore::ErrorHandling::StopFlow,
            ..Default::default()
        })
        .build("strict")
        .unwrap();

    match flow.run(ExecutionContext::new()).await {
        Err(FlowError::Execution(message)) => {
            assert!(message.contains("Missing required input: absent"), "{}", message)
        }
        other => panic!("expected execution error, got {:?}", other),
    }
}
