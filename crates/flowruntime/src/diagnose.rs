//! Structural checks over a wired flow graph.

use flowcore::BuildError;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Grey,
    Black,
}

/// Facts gathered while walking a graph that turned out acyclic
#[derive(Debug, Default, Clone)]
pub struct Diagnosis {
    /// Predecessor count of every node visited from the root
    pub in_degree: HashMap<NodeIndex, usize>,
}

/// Three-color depth-first search from `root`.
///
/// A grey node met again is on the current path, so the graph has a cycle
/// through it; that node is reported. `name` maps a node to its display name.
pub fn diagnose<N, E>(
    graph: &DiGraph<N, E>,
    root: NodeIndex,
    name: impl Fn(&N) -> String,
) -> Result<Diagnosis, BuildError> {
    let mut colors = vec![Color::White; graph.node_count()];
    let mut diagnosis = Diagnosis::default();

    // Each frame is a grey node and the successors it has yet to visit
    colors[root.index()] = Color::Grey;
    let mut stack = vec![(root, graph.neighbors_directed(root, Direction::Outgoing))];

    while let Some((node, successors)) = stack.last_mut() {
        let node = *node;
        match successors.next() {
            Some(next) => match colors[next.index()] {
                Color::Black => {}
                Color::Grey => {
                    return Err(BuildError::Cycle {
                        node: name(&graph[next]),
                    })
                }
                Color::White => {
                    colors[next.index()] = Color::Grey;
                    stack.push((next, graph.neighbors_directed(next, Direction::Outgoing)));
                }
            },
            None => {
                diagnosis.in_degree.insert(
                    node,
                    graph.neighbors_directed(node, Direction::Incoming).count(),
                );
                colors[node.index()] = Color::Black;
                stack.pop();
            }
        }
    }

    Ok(diagnosis)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(u32, u32)], nodes: usize) -> DiGraph<String, ()> {
        let mut g = DiGraph::new();
        for i in 0..nodes {
            g.add_node(format!("n{}", i));
        }
        g.extend_with_edges(edges.iter().copied());
        g
    }

    #[test]
    fn acyclic_graph_reports_in_degree() {
        let g = graph(&[(0, 1), (0, 2), (1, 3), (2, 3)], 4);
        let diagnosis = diagnose(&g, NodeIndex::new(0), |n| n.clone()).unwrap();
        assert_eq!(diagnosis.in_degree[&NodeIndex::new(0)], 0);
        assert_eq!(diagnosis.in_degree[&NodeIndex::new(3)], 2);
    }

    #[test]
    fn back_edge_is_reported() {
        let g = graph(&[(0, 1), (1, 2), (2, 1)], 3);
        let err = diagnose(&g, NodeIndex::new(0), |n| n.clone()).unwrap_err();
        match err {
            BuildError::Cycle { node } => assert!(node == "n1" || node == "n2"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn long_chain_does_not_exhaust_the_stack() {
        let len = 200_000u32;
        let edges: Vec<(u32, u32)> = (0..len - 1).map(|i| (i, i + 1)).collect();
        let g = graph(&edges, len as usize);
        let diagnosis = diagnose(&g, NodeIndex::new(0), |n| n.clone()).unwrap();
        assert_eq!(diagnosis.in_degree.len(), len as usize);

        let mut g = g;
        g.add_edge(NodeIndex::new(len as usize - 1), NodeIndex::new(0), ());
        assert!(matches!(
            diagnose(&g, NodeIndex::new(0), |n| n.clone()),
            Err(BuildError::Cycle { node }) if node == "n0"
        ));
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let g = graph(&[(0, 0)], 1);
        assert!(diagnose(&g, NodeIndex::new(0), |n| n.clone()).is_err());
    }
}
