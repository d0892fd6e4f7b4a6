use crate::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

pub type ExecutionId = Uuid;

/// Events emitted while a flow runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExecutionEvent {
    FlowStarted {
        execution_id: ExecutionId,
        flow: String,
        timestamp: DateTime<Utc>,
    },
    FlowCompleted {
        execution_id: ExecutionId,
        flow: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    WaveStarted {
        execution_id: ExecutionId,
        flow: String,
        depth: usize,
        operators: Vec<String>,
        timestamp: DateTime<Utc>,
    },
    OperatorStarted {
        execution_id: ExecutionId,
        flow: String,
        operator: String,
        operator_type: String,
        timestamp: DateTime<Utc>,
    },
    OperatorCompleted {
        execution_id: ExecutionId,
        flow: String,
        operator: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    OperatorFailed {
        execution_id: ExecutionId,
        flow: String,
        operator: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    Message {
        execution_id: ExecutionId,
        flow: String,
        operator: String,
        event: OperatorEvent,
        timestamp: DateTime<Utc>,
    },
}

/// Events an operator reports about its own work
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum OperatorEvent {
    Info { message: String },
    Warning { message: String },
    Progress { percent: f64, message: Option<String> },
    Data { key: String, value: Value },
}

/// Event emitter handed to one operator
#[derive(Clone)]
pub struct EventEmitter {
    execution_id: ExecutionId,
    flow: String,
    operator: String,
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventEmitter {
    pub fn new(
        execution_id: ExecutionId,
        flow: impl Into<String>,
        operator: impl Into<String>,
        sender: broadcast::Sender<ExecutionEvent>,
    ) -> Self {
        Self {
            execution_id,
            flow: flow.into(),
            operator: operator.into(),
            sender,
        }
    }

    /// Emit an operator-specific event
    pub fn emit(&self, event: OperatorEvent) {
        let _ = self.sender.send(ExecutionEvent::Message {
            execution_id: self.execution_id,
            flow: self.flow.clone(),
            operator: self.operator.clone(),
            event,
            timestamp: Utc::now(),
        });
    }

    /// Emit info message
    pub fn info(&self, message: impl Into<String>) {
        self.emit(OperatorEvent::Info {
            message: message.into(),
        });
    }

    /// Emit warning message
    pub fn warn(&self, message: impl Into<String>) {
        self.emit(OperatorEvent::Warning {
            message: message.into(),
        });
    }

    /// Emit progress update
    pub fn progress(&self, percent: f64, message: Option<String>) {
        self.emit(OperatorEvent::Progress { percent, message });
    }

    /// Emit an intermediate value under a key
    pub fn data(&self, key: impl Into<String>, value: Value) {
        self.emit(OperatorEvent::Data {
            key: key.into(),
            value,
        });
    }
}

/// Broadcast bus shared by every flow of one execution
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventBus {
    /// Bus keeping up to `capacity` undelivered events per subscriber; at least one
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: ExecutionEvent) {
        let _ = self.sender.send(event);
    }

    pub fn create_emitter(
        &self,
        execution_id: ExecutionId,
        flow: impl Into<String>,
        operator: impl Into<String>,
    ) -> EventEmitter {
        EventEmitter::new(execution_id, flow, operator, self.sender.clone())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}
