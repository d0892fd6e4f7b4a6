use crate::Flow;
use flowcore::{Operator, StepDefinition, Value};
use std::sync::Arc;
use tokio::sync::RwLock;

/// What runs when a node's wave comes up
pub enum Executable {
    Leaf(Arc<dyn Operator>),
    SubFlow(Arc<Flow>),
}

impl Executable {
    pub fn operator(&self) -> Arc<dyn Operator> {
        match self {
            Executable::Leaf(op) => Arc::clone(op),
            Executable::SubFlow(flow) => Arc::clone(flow) as Arc<dyn Operator>,
        }
    }
}

/// One node of a built flow.
///
/// Edges live in the owning flow's graph; see `Flow::successors` and
/// `Flow::predecessors`. Everything except the result slot is fixed once the
/// builder hands the flow out.
pub struct OperatorNode {
    pub(crate) name: String,
    pub(crate) operator_type: String,
    pub(crate) flow: String,
    pub(crate) step: Arc<StepDefinition>,
    pub(crate) depth: usize,
    pub(crate) is_terminal: bool,
    pub(crate) executable: Executable,
    pub(crate) result: RwLock<Option<Value>>,
}

impl OperatorNode {
    pub(crate) fn new(
        flow: impl Into<String>,
        step: Arc<StepDefinition>,
        operator_type: impl Into<String>,
        executable: Executable,
    ) -> Self {
        Self {
            name: step.node_name.clone(),
            operator_type: operator_type.into(),
            flow: flow.into(),
            step,
            depth: 0,
            is_terminal: false,
            executable,
            result: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registered operator type, or the nested conf name for sub-flows
    pub fn operator_type(&self) -> &str {
        &self.operator_type
    }

    /// Name of the flow owning this node
    pub fn flow_name(&self) -> &str {
        &self.flow
    }

    pub fn step(&self) -> &StepDefinition {
        &self.step
    }

    /// Longest distance from the flow's root
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_terminal(&self) -> bool {
        self.is_terminal
    }

    pub fn output_key(&self) -> Option<&str> {
        self.step.output_key()
    }

    pub fn executable(&self) -> &Executable {
        &self.executable
    }

    pub fn sub_flow(&self) -> Option<&Flow> {
        match &self.executable {
            Executable::SubFlow(flow) => Some(flow),
            Executable::Leaf(_) => None,
        }
    }

    pub fn is_sub_flow(&self) -> bool {
        matches!(self.executable, Executable::SubFlow(_))
    }

    /// Value produced by the last successful execution
    pub async fn result(&self) -> Option<Value> {
        self.result.read().await.clone()
    }

    pub(crate) async fn set_result(&self, value: Value) {
        *self.result.write().await = Some(value);
    }
}

impl std::fmt::Debug for OperatorNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorNode")
            .field("name", &self.name)
            .field("operator_type", &self.operator_type)
            .field("flow", &self.flow)
            .field("depth", &self.depth)
            .field("is_terminal", &self.is_terminal)
            .field("sub_flow", &self.is_sub_flow())
            .finish()
    }
}
