// crates/flowruntime/tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use flowcore::{FlowDefinition, NodeError, Operator, OperatorContext, StepDefinition, Value};
use flowruntime::{ExecutionSettings, FlowBuilder, MemoryConfigReader, OperatorRegistry};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Ordered record of operator starts and ends
#[derive(Clone, Default)]
pub struct EventLog {
    entries: Arc<Mutex<Vec<(String, &'static str)>>>,
}

impl EventLog {
    pub fn push(&self, name: &str, what: &'static str) {
        self.entries.lock().unwrap().push((name.to_string(), what));
    }

    pub fn entries(&self) -> Vec<(String, &'static str)> {
        self.entries.lock().unwrap().clone()
    }

    pub fn position(&self, name: &str, what: &str) -> usize {
        self.entries()
            .iter()
            .position(|(n, w)| n == name && *w == what)
            .unwrap_or_else(|| panic!("no `{}` entry for {}", what, name))
    }

    pub fn count(&self, what: &str) -> usize {
        self.entries().iter().filter(|(_, w)| *w == what).count()
    }
}

/// Records start/end, sleeps `delay_ms` and returns `hyperParams.value`
pub struct Recorder {
    log: EventLog,
}

#[async_trait]
impl Operator for Recorder {
    fn operator_type(&self) -> &str {
        "record"
    }

    async fn execute(&self, ctx: OperatorContext) -> Result<Value, NodeError> {
        self.log.push(&ctx.node_name, "start");
        let delay = ctx
            .hyper_param("delay_ms")
            .and_then(|v| v.as_u64())
            .unwrap_or(20);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        self.log.push(&ctx.node_name, "end");
        Ok(ctx
            .hyper_param("value")
            .cloned()
            .map(Value::from_json)
            .unwrap_or(Value::Null))
    }
}

pub struct Panicking;

#[async_trait]
impl Operator for Panicking {
    fn operator_type(&self) -> &str {
        "panic"
    }

    async fn execute(&self, ctx: OperatorContext) -> Result<Value, NodeError> {
        panic!("operator {} blew up", ctx.node_name);
    }
}

pub struct Failing;

#[async_trait]
impl Operator for Failing {
    fn operator_type(&self) -> &str {
        "fail"
    }

    async fn execute(&self, _ctx: OperatorContext) -> Result<Value, NodeError> {
        Err(NodeError::ExecutionFailed("boom".to_string()))
    }
}

/// Returns the first param resolved from the store
pub struct CopyInput;

#[async_trait]
impl Operator for CopyInput {
    fn operator_type(&self) -> &str {
        "copy"
    }

    async fn execute(&self, ctx: OperatorContext) -> Result<Value, NodeError> {
        ctx.require_input(0).await
    }
}

/// `set_global(hyperParams.key, hyperParams.value)` on its flow's store
pub struct Publish;

#[async_trait]
impl Operator for Publish {
    fn operator_type(&self) -> &str {
        "publish"
    }

    async fn execute(&self, ctx: OperatorContext) -> Result<Value, NodeError> {
        let key = ctx
            .require_hyper_param("key")?
            .as_str()
            .ok_or_else(|| NodeError::Configuration("key must be a string".to_string()))?
            .to_string();
        let value = Value::from_json(ctx.require_hyper_param("value")?.clone());
        ctx.store.set_global(&key, value).await;
        Ok(Value::Null)
    }
}

/// Sleeps until cancelled
pub struct Hang;

#[async_trait]
impl Operator for Hang {
    fn operator_type(&self) -> &str {
        "hang"
    }

    async fn execute(&self, ctx: OperatorContext) -> Result<Value, NodeError> {
        ctx.execution.cancellation.cancelled().await;
        Err(NodeError::Cancelled)
    }
}

/// Rejects steps without an output key
pub struct NeedsOutput;

#[async_trait]
impl Operator for NeedsOutput {
    fn operator_type(&self) -> &str {
        "needs_output"
    }

    async fn execute(&self, _ctx: OperatorContext) -> Result<Value, NodeError> {
        Ok(Value::Null)
    }

    fn validate_config(&self, step: &StepDefinition) -> Result<(), NodeError> {
        if step.output.is_empty() {
            return Err(NodeError::Configuration("output is required".to_string()));
        }
        Ok(())
    }
}

pub fn registry(log: &EventLog) -> OperatorRegistry {
    let mut registry = OperatorRegistry::new();
    let recorder_log = log.clone();
    registry
        .register_fn("record", move || {
            Box::new(Recorder {
                log: recorder_log.clone(),
            }) as Box<dyn Operator>
        })
        .unwrap();
    registry
        .register_fn("panic", || Box::new(Panicking) as Box<dyn Operator>)
        .unwrap();
    registry
        .register_fn("fail", || Box::new(Failing) as Box<dyn Operator>)
        .unwrap();
    registry
        .register_fn("copy", || Box::new(CopyInput) as Box<dyn Operator>)
        .unwrap();
    registry
        .register_fn("publish", || Box::new(Publish) as Box<dyn Operator>)
        .unwrap();
    registry
        .register_fn("hang", || Box::new(Hang) as Box<dyn Operator>)
        .unwrap();
    registry
        .register_fn("needs_output", || Box::new(NeedsOutput) as Box<dyn Operator>)
        .unwrap();
    registry
}

pub fn reader(definitions: &[FlowDefinition]) -> MemoryConfigReader {
    let mut reader = MemoryConfigReader::new();
    for definition in definitions {
        reader.insert_definition(definition).unwrap();
    }
    reader
}

pub fn builder(log: &EventLog, definitions: &[FlowDefinition]) -> FlowBuilder {
    FlowBuilder::new(Arc::new(registry(log)), reader(definitions))
}

pub fn builder_with(
    log: &EventLog,
    definitions: &[FlowDefinition],
    settings: ExecutionSettings,
) -> FlowBuilder {
    builder(log, definitions).with_settings(settings)
}

/// `record` step with the given successors
pub fn record(name: &str, next: &[&str]) -> StepDefinition {
    next.iter()
        .fold(StepDefinition::new(name, "record"), |step, n| step.with_next(*n))
}

/// `{A -> [B, C], B -> D, C -> D}`
pub fn diamond() -> FlowDefinition {
    FlowDefinition::new("diamond", "A")
        .with_step(record("A", &["B", "C"]))
        .with_step(record("B", &["D"]))
        .with_step(record("C", &["D"]))
        .with_step(record("D", &[]))
}
