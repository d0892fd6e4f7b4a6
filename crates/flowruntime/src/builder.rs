use crate::diagnose::diagnose;
use crate::flow::{ExecutionSettings, Flow};
use crate::node::{Executable, OperatorNode};
use crate::registry::OperatorRegistry;
use crate::source::{ConfigCache, ConfigReader};
use flowcore::{BuildError, FlowDefinition, ScopedStore, StepDefinition};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Turns flow conf into validated, runnable flows
pub struct FlowBuilder {
    registry: Arc<OperatorRegistry>,
    reader: Box<dyn ConfigReader>,
    cache: Option<Box<dyn ConfigCache>>,
    settings: ExecutionSettings,
}

/// Where a flow being built sits: top level, or inside a node of another flow
struct Embedding<'a> {
    node: &'a str,
    parent: &'a Arc<ScopedStore>,
}

impl FlowBuilder {
    pub fn new(registry: Arc<OperatorRegistry>, reader: impl ConfigReader + 'static) -> Self {
        Self {
            registry,
            reader: Box::new(reader),
            cache: None,
            settings: ExecutionSettings::default(),
        }
    }

    pub fn with_cache(mut self, cache: impl ConfigCache + 'static) -> Self {
        self.cache = Some(Box::new(cache));
        self
    }

    /// Settings stamped on every flow this builder produces, sub-flows included
    pub fn with_settings(mut self, settings: ExecutionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn registry(&self) -> &Arc<OperatorRegistry> {
        &self.registry
    }

    /// Build the flow defined by conf `name`
    pub fn build(&self, name: &str) -> Result<Flow, BuildError> {
        let definition = self.load_definition(name)?;
        self.build_scoped(name, &definition, None, &mut Vec::new())
    }

    /// Build from a definition already in memory. Sub-flows it references
    /// are still loaded through the reader.
    pub fn build_definition(&self, definition: &FlowDefinition) -> Result<Flow, BuildError> {
        self.build_scoped(&definition.name, definition, None, &mut Vec::new())
    }

    /// Fetch, parse and validate conf `name`, going through the cache first
    pub fn load_definition(&self, name: &str) -> Result<FlowDefinition, BuildError> {
        let cached = self
            .cache
            .as_ref()
            .and_then(|cache| cache.get(name))
            .filter(|bytes| !bytes.is_empty());

        let bytes = match cached {
            Some(bytes) => {
                tracing::debug!("Flow conf {} served from cache", name);
                bytes
            }
            None => {
                let bytes = self.reader.read(name).map_err(|source| BuildError::Load {
                    name: name.to_string(),
                    source,
                })?;
                if let Some(cache) = &self.cache {
                    cache.set_default(name, bytes.clone());
                }
                bytes
            }
        };

        let definition = FlowDefinition::from_slice(name, &bytes)?;
        definition.validate()?;
        Ok(definition)
    }

    fn build_scoped(
        &self,
        conf: &str,
        definition: &FlowDefinition,
        embedding: Option<Embedding<'_>>,
        ancestry: &mut Vec<String>,
    ) -> Result<Flow, BuildError> {
        let steps = definition.validate()?;

        let (name, store, is_sub_flow) = match embedding {
            Some(Embedding { node, parent }) => {
                (node.to_string(), ScopedStore::child(node, parent), true)
            }
            None => (
                definition.name.clone(),
                ScopedStore::root(definition.name.as_str()),
                false,
            ),
        };

        ancestry.push(conf.to_string());
        let mut graph: DiGraph<OperatorNode, ()> = DiGraph::new();
        let mut index: HashMap<String, NodeIndex> = HashMap::with_capacity(steps.len());

        // Breadth-first from the root: one node per distinct reachable step
        let root_step = steps[definition.root.as_str()];
        let root = graph.add_node(self.create_node(root_step, &name, &store, ancestry)?);
        index.insert(root_step.node_name.clone(), root);

        let mut queue = VecDeque::from([root_step]);
        while let Some(step) = queue.pop_front() {
            let from = index[&step.node_name];
            for next in &step.next {
                let next_step = *steps
                    .get(next.as_str())
                    .ok_or_else(|| BuildError::UndefinedSuccessor(next.clone()))?;
                let to = match index.get(next) {
                    Some(&to) => to,
                    None => {
                        let node = self.create_node(next_step, &name, &store, ancestry)?;
                        let to = graph.add_node(node);
                        index.insert(next.clone(), to);
                        queue.push_back(next_step);
                        to
                    }
                };
                if graph.find_edge(from, to).is_none() {
                    graph.add_edge(from, to, ());
                }
            }
        }
        ancestry.pop();

        if index.len() < definition.steps.len() {
            let unreachable = definition
                .steps
                .iter()
                .filter(|s| !index.contains_key(&s.node_name))
                .map(|s| s.node_name.clone())
                .collect();
            return Err(BuildError::Unreachable(unreachable));
        }

        let diagnosis = diagnose(&graph, root, |node: &OperatorNode| node.name().to_string())?;
        let depth = assign_depths(&mut graph)?;
        let terminal = find_terminal(&mut graph, depth)?;

        let in_degree = diagnosis
            .in_degree
            .into_iter()
            .map(|(i, degree)| (graph[i].name().to_string(), degree))
            .collect();

        tracing::info!(
            "Built flow {} from {}: {} operators, depth {}, terminal {}",
            name,
            conf,
            graph.node_count(),
            depth,
            graph[terminal].name()
        );

        Ok(Flow {
            name,
            definition: conf.to_string(),
            description: definition.description.clone(),
            depth,
            is_sub_flow,
            graph: Arc::new(graph),
            index,
            root,
            terminal,
            in_degree,
            store,
            settings: self.settings.clone(),
        })
    }

    fn create_node(
        &self,
        step: &StepDefinition,
        flow: &str,
        store: &Arc<ScopedStore>,
        ancestry: &mut Vec<String>,
    ) -> Result<OperatorNode, BuildError> {
        if step.is_sub_flow {
            let conf = step.sub_flow_conf.as_str();
            if ancestry.iter().any(|a| a == conf) {
                return Err(BuildError::RecursiveSubFlow(conf.to_string()));
            }
            let definition = self.load_definition(conf)?;
            let embedding = Embedding {
                node: &step.node_name,
                parent: store,
            };
            let sub_flow = self.build_scoped(conf, &definition, Some(embedding), ancestry)?;
            return Ok(OperatorNode::new(
                flow,
                Arc::new(step.clone()),
                conf,
                Executable::SubFlow(Arc::new(sub_flow)),
            ));
        }

        let operator = self
            .registry
            .create_operator(&step.node_name, &step.op_name)?;
        operator
            .validate_config(step)
            .map_err(|e| BuildError::InvalidStep {
                node: step.node_name.clone(),
                reason: e.to_string(),
            })?;

        Ok(OperatorNode::new(
            flow,
            Arc::new(step.clone()),
            step.op_name.as_str(),
            Executable::Leaf(Arc::from(operator)),
        ))
    }
}

/// Longest-path depth of every node, relaxed in topological order.
/// Returns the largest depth.
fn assign_depths(graph: &mut DiGraph<OperatorNode, ()>) -> Result<usize, BuildError> {
    let order = toposort(&*graph, None).map_err(|cycle| BuildError::Cycle {
        node: graph[cycle.node_id()].name().to_string(),
    })?;

    let mut max_depth = 0;
    for index in order {
        let depth = graph[index].depth;
        max_depth = max_depth.max(depth);
        let successors: Vec<NodeIndex> = graph
            .neighbors_directed(index, Direction::Outgoing)
            .collect();
        for succ in successors {
            let node = &mut graph[succ];
            node.depth = node.depth.max(depth + 1);
        }
    }
    Ok(max_depth)
}

/// Mark the single node at `depth` as terminal
fn find_terminal(
    graph: &mut DiGraph<OperatorNode, ()>,
    depth: usize,
) -> Result<NodeIndex, BuildError> {
    let candidates: Vec<NodeIndex> = graph
        .node_indices()
        .filter(|&i| graph[i].depth == depth)
        .collect();

    match candidates.as_slice() {
        [] => Err(BuildError::NoTerminal),
        [terminal] => {
            graph[*terminal].is_terminal = true;
            Ok(*terminal)
        }
        _ => {
            let mut names: Vec<String> = candidates
                .iter()
                .map(|&i| graph[i].name().to_string())
                .collect();
            names.sort();
            Err(BuildError::MultipleTerminals(names))
        }
    }
}
