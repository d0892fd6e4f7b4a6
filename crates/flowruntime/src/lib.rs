//! Flow execution runtime
//!
//! This crate turns flow conf into validated operator graphs and runs them:
//! the operator registry, the graph builder, the wave scheduler, cycle
//! diagnostics and graph rendering.

mod builder;
mod diagnose;
mod flow;
mod node;
mod registry;
pub mod render;
mod runtime;
mod source;

pub use builder::FlowBuilder;
pub use diagnose::{diagnose, Diagnosis};
pub use flow::{ExecutionSettings, Flow, OperatorFailure, RunSummary};
pub use node::{Executable, OperatorNode};
pub use registry::{OperatorFactory, OperatorMetadata, OperatorRegistry};
pub use render::GraphFormat;
pub use runtime::{FlowRuntime, RuntimeConfig};
pub use source::{
    ConfigCache, ConfigReader, FileConfigReader, MemoryConfigCache, MemoryConfigReader,
    DEFAULT_CACHE_TTL,
};
