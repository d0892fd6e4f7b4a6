//! Standard operator library
//!
//! Collection of built-in operators for common flow steps

mod debug;
mod root;
mod time;
mod transform;

pub use debug::DebugOperator;
pub use root::DefaultRootOperator;
pub use time::DelayOperator;
pub use transform::{
    CollectOperator, ConstantOperator, JsonParseOperator, JsonStringifyOperator,
};

use flowcore::BuildError;
use flowruntime::OperatorRegistry;
use std::sync::Arc;

/// Register all standard operators with a registry
pub fn register_all(registry: &mut OperatorRegistry) -> Result<(), BuildError> {
    registry.register(Arc::new(root::DefaultRootFactory))?;
    registry.register(Arc::new(debug::DebugFactory))?;
    registry.register(Arc::new(time::DelayFactory))?;
    registry.register(Arc::new(transform::ConstantFactory))?;
    registry.register(Arc::new(transform::JsonParseFactory))?;
    registry.register(Arc::new(transform::JsonStringifyFactory))?;
    registry.register(Arc::new(transform::CollectFactory))?;
    Ok(())
}

/// A registry holding just the standard operators
pub fn standard_registry() -> Result<OperatorRegistry, BuildError> {
    let mut registry = OperatorRegistry::new();
    register_all(&mut registry)?;
    Ok(registry)
}
