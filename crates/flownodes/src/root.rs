use async_trait::async_trait;
use flowcore::{NodeError, Operator, OperatorContext, Value};
use flowruntime::{OperatorFactory, OperatorMetadata};
use tokio::time::{sleep, Duration};

const DEFAULT_DELAY_MS: u64 = 50;

/// Placeholder entry step: logs that the flow started and pauses briefly
pub struct DefaultRootOperator;

#[async_trait]
impl Operator for DefaultRootOperator {
    fn operator_type(&self) -> &str {
        "default_root"
    }

    async fn execute(&self, ctx: OperatorContext) -> Result<Value, NodeError> {
        let delay_ms = ctx
            .hyper_param("delay_ms")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_DELAY_MS);

        tracing::info!("flow {} entered at {}", ctx.store.name(), ctx.node_name);
        ctx.events.info(format!("root {} started", ctx.node_name));

        tokio::select! {
            _ = sleep(Duration::from_millis(delay_ms)) => Ok(Value::Null),
            _ = ctx.execution.cancellation.cancelled() => Err(NodeError::Cancelled),
        }
    }
}

pub struct DefaultRootFactory;

impl OperatorFactory for DefaultRootFactory {
    fn create(&self) -> Result<Box<dyn Operator>, NodeError> {
        Ok(Box::new(DefaultRootOperator))
    }

    fn operator_type(&self) -> &str {
        "default_root"
    }

    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata {
            description: "Flow entry point that waits briefly".to_string(),
            category: "control".to_string(),
        }
    }
}
