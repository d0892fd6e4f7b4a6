use crate::BuildError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Declarative flow definition as persisted in flow conf files
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FlowDefinition {
    pub name: String,
    #[serde(default, rename = "desc")]
    pub description: String,
    pub root: String,
    #[serde(default, rename = "flow")]
    pub steps: Vec<StepDefinition>,
}

impl FlowDefinition {
    pub fn new(name: impl Into<String>, root: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            root: root.into(),
            steps: Vec::new(),
        }
    }

    /// Parse a definition from raw conf bytes
    pub fn from_slice(name: &str, bytes: &[u8]) -> Result<Self, BuildError> {
        serde_json::from_slice(bytes).map_err(|source| BuildError::Parse {
            name: name.to_string(),
            source,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_step(mut self, step: StepDefinition) -> Self {
        self.steps.push(step);
        self
    }

    pub fn add_step(&mut self, step: StepDefinition) {
        self.steps.push(step);
    }

    pub fn find_step(&self, name: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.node_name == name)
    }

    /// Index of steps by node name, after checking the definition is well formed.
    ///
    /// Checks: name and root present, node names unique, root defined,
    /// every successor defined, sub-flow steps name their nested conf.
    pub fn validate(&self) -> Result<HashMap<&str, &StepDefinition>, BuildError> {
        if self.name.is_empty() {
            return Err(BuildError::Invalid("flow name must required".to_string()));
        }
        if self.root.is_empty() {
            return Err(BuildError::Invalid(
                "root operator name must required".to_string(),
            ));
        }

        let mut index = HashMap::with_capacity(self.steps.len());
        for step in &self.steps {
            if step.node_name.is_empty() {
                return Err(BuildError::Invalid(format!(
                    "flow {} has a step without nodeName",
                    self.name
                )));
            }
            if index.insert(step.node_name.as_str(), step).is_some() {
                return Err(BuildError::DuplicateStep(step.node_name.clone()));
            }
        }

        if !index.contains_key(self.root.as_str()) {
            return Err(BuildError::UndefinedRoot(self.root.clone()));
        }

        for step in &self.steps {
            for next in &step.next {
                if !index.contains_key(next.as_str()) {
                    return Err(BuildError::UndefinedSuccessor(next.clone()));
                }
            }
            if step.is_sub_flow && step.sub_flow_conf.is_empty() {
                return Err(BuildError::InvalidStep {
                    node: step.node_name.clone(),
                    reason: "sub flow step requires subFlowConf".to_string(),
                });
            }
            if !step.is_sub_flow && step.op_name.is_empty() {
                return Err(BuildError::InvalidStep {
                    node: step.node_name.clone(),
                    reason: "opName is required".to_string(),
                });
            }
        }

        Ok(index)
    }
}

/// One step of a flow definition
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StepDefinition {
    #[serde(rename = "nodeName")]
    pub node_name: String,
    #[serde(default, rename = "desc")]
    pub description: String,
    #[serde(default, rename = "opName")]
    pub op_name: String,
    /// Free-form parameters handed to the operator untouched
    #[serde(default, rename = "hyperParams")]
    pub hyper_params: HashMap<String, serde_json::Value>,
    /// Store keys the operator resolves at run time
    #[serde(default, rename = "param")]
    pub params: Vec<String>,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub next: Vec<String>,
    #[serde(default, rename = "isSubFlow")]
    pub is_sub_flow: bool,
    #[serde(default, rename = "subFlowConf")]
    pub sub_flow_conf: String,
}

impl StepDefinition {
    pub fn new(node_name: impl Into<String>, op_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            op_name: op_name.into(),
            ..Default::default()
        }
    }

    /// A step whose behavior is the nested flow definition `conf`
    pub fn sub_flow(node_name: impl Into<String>, conf: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            is_sub_flow: true,
            sub_flow_conf: conf.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_hyper_param(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.hyper_params.insert(key.into(), value.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>) -> Self {
        self.params.push(key.into());
        self
    }

    pub fn with_output(mut self, key: impl Into<String>) -> Self {
        self.output = key.into();
        self
    }

    pub fn with_next(mut self, next: impl Into<String>) -> Self {
        self.next.push(next.into());
        self
    }

    /// Output key, if the step declares one
    pub fn output_key(&self) -> Option<&str> {
        (!self.output.is_empty()).then_some(self.output.as_str())
    }
}
