use crate::events::{EventBus, EventEmitter, ExecutionId};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Context a flow run executes under.
///
/// Cloning shares the cancellation token and event bus, which is how
/// sub-flows inherit the context of the flow embedding them.
#[derive(Clone)]
pub struct ExecutionContext {
    pub execution_id: ExecutionId,
    pub cancellation: CancellationToken,
    pub events: EventBus,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::with_events(EventBus::default())
    }

    pub fn with_events(events: EventBus) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            cancellation: CancellationToken::new(),
            events,
        }
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn emitter(&self, flow: &str, operator: &str) -> EventEmitter {
        self.events.create_emitter(self.execution_id, flow, operator)
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

/// What a flow does when one of its operators fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorHandling {
    /// Log the failure and keep running the rest of the flow
    #[default]
    ContinueOnError,
    /// Abort the run and return the failure from `run`
    StopFlow,
}
