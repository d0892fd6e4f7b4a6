use flowcore::{BuildError, NodeError, Operator};
use std::collections::HashMap;
use std::sync::Arc;

/// Factory trait for creating operator instances
pub trait OperatorFactory: Send + Sync {
    /// Create a fresh instance of the operator
    fn create(&self) -> Result<Box<dyn Operator>, NodeError>;

    /// Get operator type identifier
    fn operator_type(&self) -> &str;

    /// Optional: Get operator metadata (description, category, ...)
    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata::default()
    }
}

/// Metadata about an operator type
#[derive(Debug, Clone)]
pub struct OperatorMetadata {
    pub description: String,
    pub category: String,
}

impl Default for OperatorMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
        }
    }
}

/// Factory backed by a closure, for operators registered inline
struct FnFactory<F> {
    operator_type: String,
    make: F,
}

impl<F> OperatorFactory for FnFactory<F>
where
    F: Fn() -> Box<dyn Operator> + Send + Sync,
{
    fn create(&self) -> Result<Box<dyn Operator>, NodeError> {
        Ok((self.make)())
    }

    fn operator_type(&self) -> &str {
        &self.operator_type
    }
}

/// Registry of available operator types.
///
/// Filled once at startup and then shared read-only with the builder.
pub struct OperatorRegistry {
    factories: HashMap<String, Arc<dyn OperatorFactory>>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register an operator factory. A type can be registered once.
    pub fn register(&mut self, factory: Arc<dyn OperatorFactory>) -> Result<(), BuildError> {
        let operator_type = factory.operator_type().to_string();
        if self.factories.contains_key(&operator_type) {
            return Err(BuildError::DuplicateOperator(operator_type));
        }
        tracing::info!("Registering operator type: {}", operator_type);
        self.factories.insert(operator_type, factory);
        Ok(())
    }

    /// Register a closure producing fresh operator instances
    pub fn register_fn<F>(
        &mut self,
        operator_type: impl Into<String>,
        make: F,
    ) -> Result<(), BuildError>
    where
        F: Fn() -> Box<dyn Operator> + Send + Sync + 'static,
    {
        self.register(Arc::new(FnFactory {
            operator_type: operator_type.into(),
            make,
        }))
    }

    /// Create an operator instance for a step
    pub fn create_operator(
        &self,
        node_name: &str,
        operator_type: &str,
    ) -> Result<Box<dyn Operator>, BuildError> {
        let factory = self
            .factories
            .get(operator_type)
            .ok_or_else(|| BuildError::UnknownOperatorType(operator_type.to_string()))?;

        factory.create().map_err(|e| BuildError::InvalidStep {
            node: node_name.to_string(),
            reason: format!("Failed to create operator: {}", e),
        })
    }

    pub fn contains(&self, operator_type: &str) -> bool {
        self.factories.contains_key(operator_type)
    }

    /// Get all registered operator types, sorted
    pub fn list_operator_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }

    /// Get metadata for an operator type
    pub fn get_metadata(&self, operator_type: &str) -> Option<OperatorMetadata> {
        self.factories.get(operator_type).map(|f| f.metadata())
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
