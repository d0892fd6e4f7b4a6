use async_trait::async_trait;
use flowcore::{NodeError, Operator, OperatorContext, StepDefinition, Value};
use flowruntime::{OperatorFactory, OperatorMetadata};
use tokio::time::{sleep, Duration};

const DEFAULT_DELAY_MS: u64 = 1000;

/// Delay execution for a specified duration
pub struct DelayOperator;

#[async_trait]
impl Operator for DelayOperator {
    fn operator_type(&self) -> &str {
        "time.delay"
    }

    async fn execute(&self, ctx: OperatorContext) -> Result<Value, NodeError> {
        let delay_ms = ctx
            .hyper_param("delay_ms")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_DELAY_MS);

        ctx.events.info(format!("Delaying for {}ms", delay_ms));

        tokio::select! {
            _ = sleep(Duration::from_millis(delay_ms)) => {}
            _ = ctx.execution.cancellation.cancelled() => return Err(NodeError::Cancelled),
        }

        // Pass through the first input
        Ok(ctx.input(0).await.unwrap_or_default())
    }

    fn validate_config(&self, step: &StepDefinition) -> Result<(), NodeError> {
        match step.hyper_params.get("delay_ms") {
            Some(v) if v.as_u64().is_none() => Err(NodeError::Configuration(format!(
                "delay_ms must be a non-negative integer, got {}",
                v
            ))),
            _ => Ok(()),
        }
    }
}

pub struct DelayFactory;

impl OperatorFactory for DelayFactory {
    fn create(&self) -> Result<Box<dyn Operator>, NodeError> {
        Ok(Box::new(DelayOperator))
    }

    fn operator_type(&self) -> &str {
        "time.delay"
    }

    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata {
            description: "Delay execution for specified milliseconds".to_string(),
            category: "time".to_string(),
        }
    }
}
