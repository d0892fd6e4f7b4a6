use async_trait::async_trait;
use flowcore::{NodeError, Operator, OperatorContext, Value};
use flowruntime::{OperatorFactory, OperatorMetadata};

/// Simple debug operator that logs its inputs
pub struct DebugOperator;

#[async_trait]
impl Operator for DebugOperator {
    fn operator_type(&self) -> &str {
        "debug.log"
    }

    async fn execute(&self, ctx: OperatorContext) -> Result<Value, NodeError> {
        let message = ctx
            .hyper_param("message")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        if let Some(message) = &message {
            tracing::info!("DEBUG [{}]: {}", ctx.node_name, message);
            ctx.events.info(format!("DEBUG: {}", message));
        }

        // Also log all inputs for visibility
        for (key, value) in ctx.inputs().await {
            match value {
                Some(value) => {
                    tracing::info!("  {} = {:?}", key, value);
                    ctx.events.info(format!("  {}: {:?}", key, value));
                }
                None => {
                    tracing::warn!("  {} is not set", key);
                    ctx.events.warn(format!("  {}: <unset>", key));
                }
            }
        }

        Ok(message.map(Value::String).unwrap_or(Value::Null))
    }
}

pub struct DebugFactory;

impl OperatorFactory for DebugFactory {
    fn create(&self) -> Result<Box<dyn Operator>, NodeError> {
        Ok(Box::new(DebugOperator))
    }

    fn operator_type(&self) -> &str {
        "debug.log"
    }

    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata {
            description: "Logs input values for debugging".to_string(),
            category: "debug".to_string(),
        }
    }
}
