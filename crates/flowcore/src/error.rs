use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    #[error("Operator error: {0}")]
    Node(#[from] NodeError),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Flow run cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Timeout after {millis}ms")]
    Timeout { millis: u64 },

    #[error("Cancelled")]
    Cancelled,
}

/// Structural defects found while turning a definition into a flow.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("read flow conf {name} failed: {source}")]
    Load {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse flow conf {name} failed: {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid flow definition: {0}")]
    Invalid(String),

    #[error("root operator {0} is not defined")]
    UndefinedRoot(String),

    #[error("operator conf {0} required")]
    UndefinedSuccessor(String),

    #[error("operator conf {0} is defined more than once")]
    DuplicateStep(String),

    #[error("Unknown operator type: {0}")]
    UnknownOperatorType(String),

    #[error("operator {0} has been registered")]
    DuplicateOperator(String),

    #[error("Invalid step {node}: {reason}")]
    InvalidStep { node: String, reason: String },

    #[error("flow has circle, errNode: {node}")]
    Cycle { node: String },

    #[error("flow has no end operator")]
    NoTerminal,

    #[error("more than one end operator: {}", .0.join(", "))]
    MultipleTerminals(Vec<String>),

    #[error("operators not reachable from root: {}", .0.join(", "))]
    Unreachable(Vec<String>),

    #[error("sub flow {0} embeds itself")]
    RecursiveSubFlow(String),
}
