use crate::{
    events::EventEmitter, ExecutionContext, NodeError, ScopedStore, StepDefinition, Value,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Core trait that every executable operator implements
#[async_trait]
pub trait Operator: Send + Sync {
    /// Type identifier (e.g., "debug.log", "transform.json_parse")
    fn operator_type(&self) -> &str;

    /// Run the operator once.
    ///
    /// The returned value becomes the node's result and, when the step
    /// declares an output key, is stored in the flow under that key.
    async fn execute(&self, ctx: OperatorContext) -> Result<Value, NodeError>;

    /// Optional: reject a step at build time
    fn validate_config(&self, _step: &StepDefinition) -> Result<(), NodeError> {
        Ok(())
    }
}

/// Everything an operator can see while it runs
#[derive(Clone)]
pub struct OperatorContext {
    /// Name of the node being executed
    pub node_name: String,

    /// Depth of the node in its flow
    pub depth: usize,

    /// Step definition the node was built from
    pub step: Arc<StepDefinition>,

    /// Store of the flow the node belongs to
    pub store: Arc<ScopedStore>,

    /// Context of the current run
    pub execution: ExecutionContext,

    /// Event emitter for real-time updates
    pub events: EventEmitter,
}

impl OperatorContext {
    pub fn new(
        node_name: impl Into<String>,
        step: Arc<StepDefinition>,
        store: Arc<ScopedStore>,
        execution: ExecutionContext,
    ) -> Self {
        let node_name = node_name.into();
        let events = execution.emitter(store.name(), &node_name);
        Self {
            node_name,
            depth: 0,
            step,
            store,
            execution,
            events,
        }
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn hyper_param(&self, name: &str) -> Option<&serde_json::Value> {
        self.step.hyper_params.get(name)
    }

    /// Get hyper parameter or return error
    pub fn require_hyper_param(&self, name: &str) -> Result<&serde_json::Value, NodeError> {
        self.hyper_param(name)
            .ok_or_else(|| NodeError::Configuration(format!("Missing hyperParam: {}", name)))
    }

    /// Store keys listed in the step's `param`
    pub fn params(&self) -> &[String] {
        &self.step.params
    }

    /// Resolve the `index`-th param from the store
    pub async fn input(&self, index: usize) -> Option<Value> {
        let key = self.step.params.get(index)?;
        self.store.get(key).await
    }

    /// Get the `index`-th param or return error
    pub async fn require_input(&self, index: usize) -> Result<Value, NodeError> {
        let key = self
            .step
            .params
            .get(index)
            .ok_or_else(|| NodeError::Configuration(format!("Missing param #{}", index)))?;
        self.store
            .get(key)
            .await
            .ok_or_else(|| NodeError::MissingInput(key.clone()))
    }

    /// Resolve every param, in declaration order
    pub async fn inputs(&self) -> Vec<(String, Option<Value>)> {
        let mut resolved = Vec::with_capacity(self.step.params.len());
        for key in &self.step.params {
            resolved.push((key.clone(), self.store.get(key).await));
        }
        resolved
    }

    pub fn output_key(&self) -> Option<&str> {
        self.step.output_key()
    }

    pub fn is_cancelled(&self) -> bool {
        self.execution.is_cancelled()
    }
}
