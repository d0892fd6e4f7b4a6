use crate::node::OperatorNode;
use async_trait::async_trait;
use chrono::{Local, Utc};
use flowcore::{
    ErrorHandling, ExecutionContext, ExecutionEvent, ExecutionId, FlowError, NodeError, Operator,
    OperatorContext, ScopedStore, Value,
};
use futures::FutureExt;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// How a flow treats its operators while running
#[derive(Debug, Clone, Default)]
pub struct ExecutionSettings {
    pub on_error: ErrorHandling,
    /// Upper bound on operators running at once inside one wave
    pub max_parallel_nodes: Option<usize>,
    /// Per-operator time limit; expiry counts as a failure
    pub operator_timeout: Option<Duration>,
}

/// A built, validated flow: the operator graph, its store and its scheduler.
///
/// Nodes run in waves by depth. Every operator of a wave is spawned as its
/// own task and the wave is joined before the next one starts, so a node
/// never starts before all of its predecessors have finished.
pub struct Flow {
    pub(crate) name: String,
    pub(crate) definition: String,
    pub(crate) description: String,
    pub(crate) depth: usize,
    pub(crate) is_sub_flow: bool,
    pub(crate) graph: Arc<DiGraph<OperatorNode, ()>>,
    pub(crate) index: HashMap<String, NodeIndex>,
    pub(crate) root: NodeIndex,
    pub(crate) terminal: NodeIndex,
    pub(crate) in_degree: HashMap<String, usize>,
    pub(crate) store: Arc<ScopedStore>,
    pub(crate) settings: ExecutionSettings,
}

/// A failed operator of a run
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorFailure {
    pub operator: String,
    pub error: String,
}

/// Result of one flow run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub execution_id: ExecutionId,
    /// Operators that finished successfully, in completion order
    pub completed: Vec<String>,
    /// Operators that failed or panicked (lenient mode only)
    pub failed: Vec<OperatorFailure>,
    pub waves: usize,
    pub duration_ms: u64,
}

impl RunSummary {
    fn new(execution_id: ExecutionId) -> Self {
        Self {
            execution_id,
            completed: Vec::new(),
            failed: Vec::new(),
            waves: 0,
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

struct NodeOutcome {
    name: String,
    error: Option<String>,
}

impl Flow {
    /// Flow name; for a sub-flow, the name of the node embedding it
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the conf this flow was built from
    pub fn definition_name(&self) -> &str {
        &self.definition
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Depth of the terminal node
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_sub_flow(&self) -> bool {
        self.is_sub_flow
    }

    pub fn settings(&self) -> &ExecutionSettings {
        &self.settings
    }

    pub fn root(&self) -> &OperatorNode {
        &self.graph[self.root]
    }

    pub fn terminal(&self) -> &OperatorNode {
        &self.graph[self.terminal]
    }

    pub fn node(&self, name: &str) -> Option<&OperatorNode> {
        self.index.get(name).map(|&i| &self.graph[i])
    }

    /// Nodes in the order the builder discovered them
    pub fn nodes(&self) -> impl Iterator<Item = &OperatorNode> {
        self.graph.node_weights()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn successors(&self, name: &str) -> Vec<&OperatorNode> {
        self.neighbors(name, Direction::Outgoing)
    }

    pub fn predecessors(&self, name: &str) -> Vec<&OperatorNode> {
        self.neighbors(name, Direction::Incoming)
    }

    /// Predecessor count recorded by the cycle check
    pub fn in_degree(&self, name: &str) -> Option<usize> {
        self.in_degree.get(name).copied()
    }

    /// Every edge as `(from, to)` node names
    pub fn edges(&self) -> Vec<(&str, &str)> {
        self.graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .map(|(a, b)| (self.graph[a].name(), self.graph[b].name()))
            .collect()
    }

    /// Node names grouped by the wave they run in
    pub fn waves(&self) -> Vec<Vec<&str>> {
        let mut waves = vec![Vec::new(); self.depth + 1];
        for node in self.graph.node_weights() {
            waves[node.depth()].push(node.name());
        }
        waves
    }

    pub fn store(&self) -> &Arc<ScopedStore> {
        &self.store
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.store.get(key).await
    }

    pub async fn set_local(&self, key: &str, value: Value) {
        self.store.set_local(key, value).await
    }

    pub async fn set_global(&self, key: &str, value: Value) {
        self.store.set_global(key, value).await
    }

    fn neighbors(&self, name: &str, direction: Direction) -> Vec<&OperatorNode> {
        let Some(&index) = self.index.get(name) else {
            return Vec::new();
        };
        self.sorted_neighbors(index, direction)
            .into_iter()
            .map(|i| &self.graph[i])
            .collect()
    }

    fn sorted_neighbors(&self, index: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
        let mut neighbors: Vec<NodeIndex> =
            self.graph.neighbors_directed(index, direction).collect();
        neighbors.sort();
        neighbors
    }

    /// Run every node of the flow, wave by wave.
    ///
    /// With `ErrorHandling::ContinueOnError` operator failures and panics are
    /// logged, listed in the summary and do not fail the run. With
    /// `ErrorHandling::StopFlow` the first failure aborts the wave and is
    /// returned. Cancellation is checked before each wave.
    pub async fn run(&self, ctx: ExecutionContext) -> Result<RunSummary, FlowError> {
        let start = Instant::now();
        ctx.events.emit(ExecutionEvent::FlowStarted {
            execution_id: ctx.execution_id,
            flow: self.name.clone(),
            timestamp: Utc::now(),
        });
        tracing::info!(
            "Starting flow {} (execution {}, depth {})",
            self.name,
            ctx.execution_id,
            self.depth
        );

        let mut result = self.run_waves(&ctx).await;
        let duration_ms = start.elapsed().as_millis() as u64;
        if let Ok(summary) = &mut result {
            summary.duration_ms = duration_ms;
        }

        match &result {
            Ok(summary) => tracing::info!(
                "Flow {} finished in {}ms: {} completed, {} failed",
                self.name,
                duration_ms,
                summary.completed.len(),
                summary.failed.len()
            ),
            Err(e) => tracing::error!("Flow {} aborted after {}ms: {}", self.name, duration_ms, e),
        }

        ctx.events.emit(ExecutionEvent::FlowCompleted {
            execution_id: ctx.execution_id,
            flow: self.name.clone(),
            success: result.as_ref().map(RunSummary::is_success).unwrap_or(false),
            duration_ms,
            timestamp: Utc::now(),
        });

        result
    }

    async fn run_waves(&self, ctx: &ExecutionContext) -> Result<RunSummary, FlowError> {
        let semaphore = self
            .settings
            .max_parallel_nodes
            .map(|n| Arc::new(Semaphore::new(n.max(1))));
        let mut summary = RunSummary::new(ctx.execution_id);
        let mut scheduled = HashSet::from([self.root]);
        let mut frontier = vec![self.root];
        let mut depth = 0;

        while !frontier.is_empty() {
            if ctx.is_cancelled() {
                tracing::warn!("Flow {} cancelled before wave {}", self.name, depth);
                return Err(FlowError::Cancelled);
            }

            let operators: Vec<String> = frontier
                .iter()
                .map(|&i| self.graph[i].name().to_string())
                .collect();
            tracing::debug!("Flow {} wave {}: {:?}", self.name, depth, operators);
            ctx.events.emit(ExecutionEvent::WaveStarted {
                execution_id: ctx.execution_id,
                flow: self.name.clone(),
                depth,
                operators,
                timestamp: Utc::now(),
            });

            let mut tasks = JoinSet::new();
            for &index in &frontier {
                tasks.spawn(self.operator_task(index, ctx.clone(), semaphore.clone()));
            }

            // Barrier: the whole wave finishes before the next one is planned
            while let Some(joined) = tasks.join_next().await {
                let outcome = joined.map_err(|e| {
                    FlowError::Execution(format!("wave {} of {} join failed: {}", depth, self.name, e))
                })?;
                match outcome.error {
                    None => summary.completed.push(outcome.name),
                    Some(error) if self.settings.on_error == ErrorHandling::StopFlow => {
                        tasks.abort_all();
                        return Err(FlowError::Execution(format!(
                            "operator {} failed: {}",
                            outcome.name, error
                        )));
                    }
                    Some(error) => summary.failed.push(OperatorFailure {
                        operator: outcome.name,
                        error,
                    }),
                }
            }
            summary.waves += 1;

            // A successor joins the wave matching its depth, reached through
            // whichever of its predecessors sits one level above it
            let mut next = Vec::new();
            for &index in &frontier {
                for succ in self.graph.neighbors_directed(index, Direction::Outgoing) {
                    if self.graph[succ].depth() == depth + 1 && scheduled.insert(succ) {
                        next.push(succ);
                    }
                }
            }
            next.sort();
            frontier = next;
            depth += 1;
        }

        Ok(summary)
    }

    /// Task running one node, insulated from the operator's failures
    fn operator_task(
        &self,
        index: NodeIndex,
        ctx: ExecutionContext,
        semaphore: Option<Arc<Semaphore>>,
    ) -> impl Future<Output = NodeOutcome> + Send + 'static {
        let graph = Arc::clone(&self.graph);
        let store = Arc::clone(&self.store);
        let timeout = self.settings.operator_timeout;
        let flow = self.name.clone();

        async move {
            let node = &graph[index];
            let _permit = match semaphore {
                Some(semaphore) => semaphore.acquire_owned().await.ok(),
                None => None,
            };

            let started = Instant::now();
            tracing::info!(
                "operator `{}` start at {}",
                node.name(),
                Local::now().format("%Y-%m-%d %H:%M:%S")
            );
            ctx.events.emit(ExecutionEvent::OperatorStarted {
                execution_id: ctx.execution_id,
                flow: flow.clone(),
                operator: node.name().to_string(),
                operator_type: node.operator_type().to_string(),
                timestamp: Utc::now(),
            });

            let operator = node.executable().operator();
            let op_ctx = OperatorContext::new(
                node.name(),
                Arc::clone(&node.step),
                Arc::clone(&store),
                ctx.clone(),
            )
            .with_depth(node.depth());

            let execution = async {
                match timeout {
                    Some(limit) => tokio::time::timeout(limit, operator.execute(op_ctx))
                        .await
                        .unwrap_or_else(|_| {
                            Err(NodeError::Timeout {
                                millis: limit.as_millis() as u64,
                            })
                        }),
                    None => operator.execute(op_ctx).await,
                }
            };
            let result = match AssertUnwindSafe(execution).catch_unwind().await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(panic) => Err(format!("panic: {}", panic_message(panic.as_ref()))),
            };
            let duration_ms = started.elapsed().as_millis() as u64;

            let error = match result {
                Ok(value) => {
                    if let Some(key) = node.output_key() {
                        if !value.is_null() {
                            store.set_local(key, value.clone()).await;
                        }
                    }
                    node.set_result(value).await;
                    tracing::info!("operator `{}` end cost[{} ms]", node.name(), duration_ms);
                    ctx.events.emit(ExecutionEvent::OperatorCompleted {
                        execution_id: ctx.execution_id,
                        flow,
                        operator: node.name().to_string(),
                        duration_ms,
                        timestamp: Utc::now(),
                    });
                    None
                }
                Err(error) => {
                    tracing::error!(
                        "operator `{}` failed after {}ms: {}",
                        node.name(),
                        duration_ms,
                        error
                    );
                    ctx.events.emit(ExecutionEvent::OperatorFailed {
                        execution_id: ctx.execution_id,
                        flow,
                        operator: node.name().to_string(),
                        error: error.clone(),
                        timestamp: Utc::now(),
                    });
                    Some(error)
                }
            };

            NodeOutcome {
                name: node.name().to_string(),
                error,
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// A flow embedded as a step of another flow.
///
/// It runs under the context of the enclosing run, then republishes the
/// terminal step's output into the enclosing store with `set_global`.
#[async_trait]
impl Operator for Flow {
    fn operator_type(&self) -> &str {
        &self.definition
    }

    async fn execute(&self, ctx: OperatorContext) -> Result<Value, NodeError> {
        let summary = self
            .run(ctx.execution.clone())
            .await
            .map_err(|e| NodeError::ExecutionFailed(e.to_string()))?;
        if !summary.is_success() {
            tracing::warn!(
                "Sub flow {} finished with {} failed operators",
                self.name,
                summary.failed.len()
            );
        }

        let Some(key) = self.terminal().output_key() else {
            return Ok(Value::Null);
        };
        match self.store.get(key).await {
            Some(value) => {
                ctx.store.set_global(key, value.clone()).await;
                Ok(value)
            }
            None => Ok(Value::Null),
        }
    }
}

impl std::fmt::Debug for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flow")
            .field("name", &self.name)
            .field("definition", &self.definition)
            .field("depth", &self.depth)
            .field("is_sub_flow", &self.is_sub_flow)
            .field("root", &self.root().name())
            .field("terminal", &self.terminal().name())
            .field("nodes", &self.graph.node_count())
            .finish()
    }
}
