//! Text renderings of a built flow.
//!
//! Nodes are labelled `name[depth]`. Sub-flows are drawn inline: edges into
//! a sub-flow node point at its root, edges out of it leave from its
//! terminal.

use crate::flow::Flow;
use crate::node::OperatorNode;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    /// Wave-by-wave listing
    Text,
    /// Graphviz DOT
    Dot,
    /// Mermaid flowchart
    Mermaid,
}

pub fn render(flow: &Flow, format: GraphFormat) -> String {
    match format {
        GraphFormat::Text => to_text(flow),
        GraphFormat::Dot => to_dot(flow),
        GraphFormat::Mermaid => to_mermaid(flow),
    }
}

pub fn to_text(flow: &Flow) -> String {
    let mut out = String::new();
    write_text(&mut out, flow, 0);
    out
}

fn write_text(out: &mut String, flow: &Flow, indent: usize) {
    let pad = "  ".repeat(indent);
    for (depth, wave) in flow.waves().iter().enumerate() {
        let _ = writeln!(out, "{}wave {}: {}", pad, depth, wave.join(", "));
        for name in wave {
            if let Some(sub) = flow.node(name).and_then(OperatorNode::sub_flow) {
                let _ = writeln!(out, "{}  {} -> sub flow {}", pad, name, sub.definition_name());
                write_text(out, sub, indent + 2);
            }
        }
    }
}

pub fn to_dot(flow: &Flow) -> String {
    let mut out = format!("digraph \"{}\" {{\n", flow.name());
    out.push_str("    rankdir=TB;\n");
    out.push_str("    node [shape=box, style=rounded];\n\n");
    write_dot(&mut out, flow, flow.name(), 1);
    out.push_str("}\n");
    out
}

fn write_dot(out: &mut String, flow: &Flow, scope: &str, indent: usize) {
    let pad = "    ".repeat(indent);
    for node in flow.nodes() {
        let id = node_id(scope, node.name());
        match node.sub_flow() {
            Some(sub) => {
                let _ = writeln!(out, "{}subgraph \"cluster_{}\" {{", pad, id);
                let _ = writeln!(
                    out,
                    "{}    label=\"{}[{}] ({})\";",
                    pad,
                    node.name(),
                    node.depth(),
                    sub.definition_name()
                );
                write_dot(out, sub, &id, indent + 1);
                let _ = writeln!(out, "{}}}", pad);
            }
            None => {
                let shape = if node.is_terminal() { ", peripheries=2" } else { "" };
                let _ = writeln!(
                    out,
                    "{}\"{}\" [label=\"{}[{}]\"{}];",
                    pad,
                    id,
                    node.name(),
                    node.depth(),
                    shape
                );
            }
        }
    }
    for (from, to) in flow.edges() {
        let _ = writeln!(
            out,
            "{}\"{}\" -> \"{}\";",
            pad,
            exit_id(flow, scope, from),
            entry_id(flow, scope, to)
        );
    }
}

pub fn to_mermaid(flow: &Flow) -> String {
    let mut out = String::from("graph TD\n");
    write_mermaid(&mut out, flow, &mermaid_safe(flow.name()), 1);
    out
}

fn write_mermaid(out: &mut String, flow: &Flow, scope: &str, indent: usize) {
    let pad = "    ".repeat(indent);
    for node in flow.nodes() {
        let id = mermaid_safe(&node_id(scope, node.name()));
        match node.sub_flow() {
            Some(sub) => {
                let _ = writeln!(
                    out,
                    "{}subgraph {}[\"{}[{}] ({})\"]",
                    pad,
                    id,
                    node.name(),
                    node.depth(),
                    sub.definition_name()
                );
                write_mermaid(out, sub, &id, indent + 1);
                let _ = writeln!(out, "{}end", pad);
            }
            None => {
                let _ = writeln!(out, "{}{}[\"{}[{}]\"]", pad, id, node.name(), node.depth());
            }
        }
    }
    for (from, to) in flow.edges() {
        let _ = writeln!(
            out,
            "{}{} --> {}",
            pad,
            mermaid_safe(&exit_id(flow, scope, from)),
            mermaid_safe(&entry_id(flow, scope, to))
        );
    }
}

fn node_id(scope: &str, name: &str) -> String {
    format!("{}/{}", scope, name)
}

/// Id an incoming edge should point at: the node, or its sub-flow's root
fn entry_id(flow: &Flow, scope: &str, name: &str) -> String {
    let id = node_id(scope, name);
    match flow.node(name).and_then(OperatorNode::sub_flow) {
        Some(sub) => entry_id(sub, &id, sub.root().name()),
        None => id,
    }
}

/// Id an outgoing edge should leave from: the node, or its sub-flow's terminal
fn exit_id(flow: &Flow, scope: &str, name: &str) -> String {
    let id = node_id(scope, name);
    match flow.node(name).and_then(OperatorNode::sub_flow) {
        Some(sub) => exit_id(sub, &id, sub.terminal().name()),
        None => id,
    }
}

fn mermaid_safe(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
