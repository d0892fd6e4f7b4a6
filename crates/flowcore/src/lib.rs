//! Core abstractions for the flow engine
//!
//! This crate provides the fundamental types and traits that all other
//! components depend on: values, flow definitions, the operator trait,
//! the scoped store and execution events.

mod context;
mod definition;
mod error;
pub mod events;
mod operator;
mod store;
mod value;

pub use context::{ErrorHandling, ExecutionContext};
pub use definition::{FlowDefinition, StepDefinition};
pub use error::{BuildError, FlowError, NodeError};
pub use events::*;
pub use operator::{Operator, OperatorContext};
pub use store::{ScopedStore, QUALIFIED_KEY_SEPARATOR};
pub use value::Value;

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
