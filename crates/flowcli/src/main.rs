// crates/flowcli/src/main.rs

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use flowcore::{
    ErrorHandling, ExecutionEvent, FlowDefinition, OperatorEvent, StepDefinition, Value,
};
use flowruntime::render::render;
use flowruntime::{Flow, FlowRuntime, GraphFormat, RuntimeConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "flow")]
#[command(about = "Flow Engine CLI", long_about = None)]
struct Cli {
    /// Show verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where flow conf comes from and how it runs
#[derive(clap::Args)]
struct ConfArgs {
    /// Runtime config JSON file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding flow conf files (overrides the config file)
    #[arg(short = 'd', long)]
    conf_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and run a flow
    Run {
        /// Flow conf name, looked up in the conf directory
        name: String,

        #[command(flatten)]
        conf: ConfArgs,

        /// Seed values for the root store as a JSON object
        #[arg(short, long)]
        input: Option<String>,

        /// Abort on the first operator failure
        #[arg(long)]
        strict: bool,

        /// Per-operator timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Maximum operators running at once within a wave
        #[arg(long)]
        max_parallel: Option<usize>,
    },

    /// Build a flow without running it
    Validate {
        name: String,

        #[command(flatten)]
        conf: ConfArgs,
    },

    /// Print the operator graph of a flow
    Graph {
        name: String,

        #[command(flatten)]
        conf: ConfArgs,

        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List available operator types
    Operators,

    /// Write example flow conf files
    Init {
        /// Output directory
        #[arg(short, long, default_value = "conf")]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Dot,
    Mermaid,
}

impl From<Format> for GraphFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => GraphFormat::Text,
            Format::Dot => GraphFormat::Dot,
            Format::Mermaid => GraphFormat::Mermaid,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    match cli.command {
        Commands::Run {
            name,
            conf,
            input,
            strict,
            timeout_ms,
            max_parallel,
        } => {
            let mut config = load_config(&conf)?;
            if strict {
                config.on_error = ErrorHandling::StopFlow;
            }
            if timeout_ms.is_some() {
                config.operator_timeout_ms = timeout_ms;
            }
            if max_parallel.is_some() {
                config.max_parallel_nodes = max_parallel;
            }
            run_flow(&name, config, input).await?;
        }

        Commands::Validate { name, conf } => {
            validate_flow(&name, load_config(&conf)?)?;
        }

        Commands::Graph {
            name,
            conf,
            format,
            output,
        } => {
            let runtime = runtime(load_config(&conf)?)?;
            let flow = runtime.build(&name)?;
            let graph = render(&flow, format.into());
            match output {
                Some(path) => {
                    std::fs::write(&path, graph)?;
                    println!("✨ Wrote graph of {} to {}", name, path.display());
                }
                None => print!("{}", graph),
            }
        }

        Commands::Operators => {
            list_operators()?;
        }

        Commands::Init { output } => {
            create_example_conf(&output)?;
        }
    }

    Ok(())
}

fn load_config(args: &ConfArgs) -> Result<RuntimeConfig> {
    let mut config = match &args.config {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("reading runtime config {}", path.display()))?,
        None => RuntimeConfig::default(),
    };
    if let Some(dir) = &args.conf_dir {
        config.conf_dir = dir.clone();
    }
    Ok(config)
}

fn runtime(config: RuntimeConfig) -> Result<FlowRuntime> {
    let registry = flownodes::standard_registry()?;
    Ok(FlowRuntime::with_config(Arc::new(registry), config))
}

async fn run_flow(name: &str, config: RuntimeConfig, input: Option<String>) -> Result<()> {
    println!("🚀 Loading flow {} from: {}", name, config.conf_dir.display());

    let runtime = runtime(config)?;
    let flow = runtime.build(name)?;

    println!("📋 Flow: {}", flow.name());
    if !flow.description().is_empty() {
        println!("   {}", flow.description());
    }
    println!("   Operators: {}", flow.len());
    println!("   Waves: {}", flow.depth() + 1);
    println!();

    // Parse input data into the root store
    if let Some(input_str) = input {
        let json: serde_json::Value = serde_json::from_str(&input_str)?;
        let serde_json::Value::Object(obj) = json else {
            return Err(anyhow!("Input must be a JSON object"));
        };
        for (key, value) in obj {
            flow.set_local(&key, Value::from_json(value)).await;
        }
    }

    // Subscribe to events for real-time output
    let mut events = runtime.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            print_event(event);
        }
    });

    let ctx = runtime.context();
    let cancel = ctx.cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("🛑 Interrupted, stopping after the current wave");
            cancel.cancel();
        }
    });

    let result = flow.run(ctx).await;

    // Wait for events to finish printing
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    event_task.abort();

    let summary = result?;
    println!();
    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", summary.execution_id);
    println!("   Completed: {}/{} operators", summary.completed.len(), flow.len());
    println!("   Waves: {}", summary.waves);
    println!("   Duration: {}ms", summary.duration_ms);

    print_outputs(&flow).await;

    if !summary.is_success() {
        for failure in &summary.failed {
            println!("   ❌ {}: {}", failure.operator, failure.error);
        }
        return Err(anyhow!(
            "{} of {} operators failed",
            summary.failed.len(),
            flow.len()
        ));
    }

    Ok(())
}

fn print_event(event: ExecutionEvent) {
    match event {
        ExecutionEvent::FlowStarted { flow, .. } => {
            println!("▶️  Flow {} started", flow);
        }
        ExecutionEvent::WaveStarted {
            flow,
            depth,
            operators,
            ..
        } => {
            println!("  🌊 [{}] wave {}: {}", flow, depth, operators.join(", "));
        }
        ExecutionEvent::OperatorStarted {
            operator,
            operator_type,
            ..
        } => {
            println!("  ⚡ Starting operator: {} ({})", operator, operator_type);
        }
        ExecutionEvent::OperatorCompleted {
            operator,
            duration_ms,
            ..
        } => {
            println!("  ✅ Operator {} completed in {}ms", operator, duration_ms);
        }
        ExecutionEvent::OperatorFailed {
            operator, error, ..
        } => {
            println!("  ❌ Operator {} failed: {}", operator, error);
        }
        ExecutionEvent::Message {
            operator, event, ..
        } => match event {
            OperatorEvent::Info { message } => {
                println!("     ℹ️  [{}] {}", operator, message);
            }
            OperatorEvent::Warning { message } => {
                println!("     ⚠️  [{}] {}", operator, message);
            }
            OperatorEvent::Progress { percent, message } => {
                if let Some(msg) = message {
                    println!("     📊 [{}] {}% - {}", operator, percent, msg);
                } else {
                    println!("     📊 [{}] {}%", operator, percent);
                }
            }
            OperatorEvent::Data { .. } => {}
        },
        ExecutionEvent::FlowCompleted {
            flow,
            success,
            duration_ms,
            ..
        } => {
            if success {
                println!("✨ Flow {} completed successfully in {}ms", flow, duration_ms);
            } else {
                println!("💥 Flow {} finished with failures after {}ms", flow, duration_ms);
            }
        }
    }
}

async fn print_outputs(flow: &Flow) {
    let mut values: Vec<(String, Value)> = flow.store().snapshot().await.into_iter().collect();
    if values.is_empty() {
        return;
    }
    values.sort_by(|a, b| a.0.cmp(&b.0));

    println!();
    println!("📤 Outputs:");
    for (key, value) in values {
        println!("   {}: {}", key, value.to_json());
    }
}

fn validate_flow(name: &str, config: RuntimeConfig) -> Result<()> {
    println!("🔍 Validating flow: {}", name);

    let flow = runtime(config)?.build(name)?;

    println!("✅ Flow is valid:");
    println!("   Name: {}", flow.name());
    println!("   Operators: {}", flow.len());
    println!("   Root: {}", flow.root().name());
    println!("   Terminal: {} (depth {})", flow.terminal().name(), flow.depth());
    let sub_flows: Vec<&str> = flow
        .nodes()
        .filter_map(|node| node.sub_flow())
        .map(Flow::definition_name)
        .collect();
    if !sub_flows.is_empty() {
        println!("   Sub flows: {}", sub_flows.join(", "));
    }

    Ok(())
}

fn list_operators() -> Result<()> {
    println!("📦 Available Operator Types:");
    println!();

    let registry = flownodes::standard_registry()?;
    for operator_type in registry.list_operator_types() {
        if let Some(metadata) = registry.get_metadata(&operator_type) {
            println!("  • {} ({})", operator_type, metadata.category);
            println!("    {}", metadata.description);
        } else {
            println!("  • {}", operator_type);
        }
    }

    Ok(())
}

fn create_example_conf(output: &Path) -> Result<()> {
    let child = FlowDefinition::new("greeting", "compose")
        .with_description("Builds a greeting from the caller's name")
        .with_step(
            StepDefinition::new("compose", "transform.collect")
                .with_param("user")
                .with_output("parts")
                .with_next("render"),
        )
        .with_step(
            StepDefinition::new("render", "transform.json_stringify")
                .with_param("parts")
                .with_output("greeting"),
        );

    let main = FlowDefinition::new("example", "start")
        .with_description("Seeds a value, greets it in a sub flow and logs the result")
        .with_step(StepDefinition::new("start", "default_root").with_next("user"))
        .with_step(
            StepDefinition::new("user", "transform.constant")
                .with_hyper_param("value", "world")
                .with_output("user")
                .with_next("greet"),
        )
        .with_step(
            StepDefinition::sub_flow("greet", "greeting")
                .with_output("greeting")
                .with_next("log"),
        )
        .with_step(
            StepDefinition::new("log", "debug.log")
                .with_hyper_param("message", "greeting ready")
                .with_param("greeting"),
        );

    std::fs::create_dir_all(output)?;
    for definition in [&main, &child] {
        let path = output.join(format!("{}.json", definition.name));
        std::fs::write(&path, serde_json::to_string_pretty(definition)?)?;
        println!("✨ Created flow conf: {}", path.display());
    }

    println!();
    println!("Run it with:");
    println!("  flow run example --conf-dir {}", output.display());

    Ok(())
}
