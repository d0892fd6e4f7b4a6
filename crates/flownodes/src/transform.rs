use async_trait::async_trait;
use flowcore::{NodeError, Operator, OperatorContext, StepDefinition, Value};
use flowruntime::{OperatorFactory, OperatorMetadata};

fn require_params(step: &StepDefinition, count: usize) -> Result<(), NodeError> {
    if step.params.len() < count {
        return Err(NodeError::Configuration(format!(
            "{} expects at least {} param, got {}",
            step.op_name,
            count,
            step.params.len()
        )));
    }
    Ok(())
}

/// Emit a fixed value from `hyperParams.value`
pub struct ConstantOperator;

#[async_trait]
impl Operator for ConstantOperator {
    fn operator_type(&self) -> &str {
        "transform.constant"
    }

    async fn execute(&self, ctx: OperatorContext) -> Result<Value, NodeError> {
        let value = ctx.require_hyper_param("value")?;
        Ok(Value::from_json(value.clone()))
    }

    fn validate_config(&self, step: &StepDefinition) -> Result<(), NodeError> {
        if !step.hyper_params.contains_key("value") {
            return Err(NodeError::Configuration(
                "Missing hyperParam: value".to_string(),
            ));
        }
        Ok(())
    }
}

pub struct ConstantFactory;

impl OperatorFactory for ConstantFactory {
    fn create(&self) -> Result<Box<dyn Operator>, NodeError> {
        Ok(Box::new(ConstantOperator))
    }

    fn operator_type(&self) -> &str {
        "transform.constant"
    }

    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata {
            description: "Emit a constant value".to_string(),
            category: "transform".to_string(),
        }
    }
}

/// Parse JSON string to Value
pub struct JsonParseOperator;

#[async_trait]
impl Operator for JsonParseOperator {
    fn operator_type(&self) -> &str {
        "transform.json_parse"
    }

    async fn execute(&self, ctx: OperatorContext) -> Result<Value, NodeError> {
        let input = ctx.require_input(0).await?;
        let text = input.as_str().ok_or_else(|| NodeError::InvalidInputType {
            field: ctx.params()[0].clone(),
            expected: "string".to_string(),
            actual: input.type_name().to_string(),
        })?;

        let parsed: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| NodeError::ExecutionFailed(format!("JSON parse error: {}", e)))?;

        Ok(Value::Json(parsed))
    }

    fn validate_config(&self, step: &StepDefinition) -> Result<(), NodeError> {
        require_params(step, 1)
    }
}

pub struct JsonParseFactory;

impl OperatorFactory for JsonParseFactory {
    fn create(&self) -> Result<Box<dyn Operator>, NodeError> {
        Ok(Box::new(JsonParseOperator))
    }

    fn operator_type(&self) -> &str {
        "transform.json_parse"
    }

    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata {
            description: "Parse JSON string".to_string(),
            category: "transform".to_string(),
        }
    }
}

/// Stringify Value to JSON
pub struct JsonStringifyOperator;

#[async_trait]
impl Operator for JsonStringifyOperator {
    fn operator_type(&self) -> &str {
        "transform.json_stringify"
    }

    async fn execute(&self, ctx: OperatorContext) -> Result<Value, NodeError> {
        let value = ctx.require_input(0).await?.to_json();
        let pretty = ctx
            .hyper_param("pretty")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let json_str = if pretty {
            serde_json::to_string_pretty(&value)
        } else {
            serde_json::to_string(&value)
        }
        .map_err(|e| NodeError::ExecutionFailed(format!("JSON stringify error: {}", e)))?;

        Ok(Value::String(json_str))
    }

    fn validate_config(&self, step: &StepDefinition) -> Result<(), NodeError> {
        require_params(step, 1)
    }
}

pub struct JsonStringifyFactory;

impl OperatorFactory for JsonStringifyFactory {
    fn create(&self) -> Result<Box<dyn Operator>, NodeError> {
        Ok(Box::new(JsonStringifyOperator))
    }

    fn operator_type(&self) -> &str {
        "transform.json_stringify"
    }

    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata {
            description: "Convert value to JSON string".to_string(),
            category: "transform".to_string(),
        }
    }
}

/// Gather every param into one array, `Null` where a key is unset
pub struct CollectOperator;

#[async_trait]
impl Operator for CollectOperator {
    fn operator_type(&self) -> &str {
        "transform.collect"
    }

    async fn execute(&self, ctx: OperatorContext) -> Result<Value, NodeError> {
        let mut items = Vec::with_capacity(ctx.params().len());
        for (key, value) in ctx.inputs().await {
            if value.is_none() {
                ctx.events.warn(format!("{} is not set", key));
            }
            items.push(value.unwrap_or_default());
        }
        Ok(Value::Array(items))
    }
}

pub struct CollectFactory;

impl OperatorFactory for CollectFactory {
    fn create(&self) -> Result<Box<dyn Operator>, NodeError> {
        Ok(Box::new(CollectOperator))
    }

    fn operator_type(&self) -> &str {
        "transform.collect"
    }

    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata {
            description: "Collect params into an array".to_string(),
            category: "transform".to_string(),
        }
    }
}
