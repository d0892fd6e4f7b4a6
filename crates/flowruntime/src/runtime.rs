use crate::builder::FlowBuilder;
use crate::flow::{ExecutionSettings, Flow, RunSummary};
use crate::registry::OperatorRegistry;
use crate::source::{ConfigReader, FileConfigReader, MemoryConfigCache};
use flowcore::{ErrorHandling, EventBus, ExecutionContext, FlowError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Main runtime: builds flows from conf and runs them on a shared event bus
pub struct FlowRuntime {
    builder: FlowBuilder,
    event_bus: EventBus,
}

impl FlowRuntime {
    /// Runtime reading conf files from `config.conf_dir`
    pub fn with_config(registry: Arc<OperatorRegistry>, config: RuntimeConfig) -> Self {
        let reader = FileConfigReader::new(config.conf_dir.clone());
        Self::with_reader(registry, reader, config)
    }

    /// Runtime reading conf through a custom reader
    pub fn with_reader(
        registry: Arc<OperatorRegistry>,
        reader: impl ConfigReader + 'static,
        config: RuntimeConfig,
    ) -> Self {
        let mut builder =
            FlowBuilder::new(registry, reader).with_settings(config.execution_settings());
        if config.cache_ttl_secs > 0 {
            builder = builder.with_cache(MemoryConfigCache::new(Duration::from_secs(
                config.cache_ttl_secs,
            )));
        }

        Self {
            builder,
            event_bus: EventBus::new(config.event_buffer_size),
        }
    }

    /// Get access to the operator registry
    pub fn registry(&self) -> &Arc<OperatorRegistry> {
        self.builder.registry()
    }

    pub fn builder(&self) -> &FlowBuilder {
        &self.builder
    }

    /// Build the flow defined by conf `name`
    pub fn build(&self, name: &str) -> Result<Flow, FlowError> {
        Ok(self.builder.build(name)?)
    }

    /// Build and run conf `name` under a fresh execution context
    pub async fn run(&self, name: &str) -> Result<(Flow, RunSummary), FlowError> {
        let flow = self.build(name)?;
        let summary = flow.run(self.context()).await?;
        Ok((flow, summary))
    }

    /// Fresh execution context publishing on this runtime's bus
    pub fn context(&self) -> ExecutionContext {
        ExecutionContext::with_events(self.event_bus.clone())
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<flowcore::ExecutionEvent> {
        self.event_bus.subscribe()
    }

    /// Get the event bus for direct access
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Directory flow conf files are read from
    pub conf_dir: PathBuf,
    /// Lifetime of cached conf bytes; 0 disables the cache
    pub cache_ttl_secs: u64,
    pub max_parallel_nodes: Option<usize>,
    pub operator_timeout_ms: Option<u64>,
    pub on_error: ErrorHandling,
    pub event_buffer_size: usize,
}

impl RuntimeConfig {
    /// Load from a JSON file; missing fields keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FlowError> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn execution_settings(&self) -> ExecutionSettings {
        ExecutionSettings {
            on_error: self.on_error,
            max_parallel_nodes: self.max_parallel_nodes,
            operator_timeout: self.operator_timeout_ms.map(Duration::from_millis),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            conf_dir: PathBuf::from("./conf"),
            cache_ttl_secs: 5 * 60,
            max_parallel_nodes: None,
            operator_timeout_ms: None,
            on_error: ErrorHandling::ContinueOnError,
            event_buffer_size: 1000,
        }
    }
}
