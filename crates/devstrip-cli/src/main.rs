//! devstrip - reserved-concurrency removal for development stages
//!
//! ## Commands
//!
//! - `classify`: tell whether a stage is development-like
//! - `hooks`: list the extension points the plugin registers for a descriptor
//! - `strip`: remove reserved concurrency from a descriptor file
//! - `reconcile`: remove reserved concurrency from deployed functions
//! - `run`: stand in for the host pipeline and fire the hooks of a command

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use devstrip_core::{
    is_development_like, strip_reserved_concurrency, ConcurrencyPlugin, DeploymentDescriptor,
    FunctionOutcome, HostCommand, PluginOptions, ReconcilerConfig, ReconciliationReport,
    RemoteReconciler, ServiceScope, StageClass, TracingLog,
};
use function_api::{FunctionApi, FunctionApiConfig, HttpFunctionApi};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "devstrip")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Remove reserved concurrency when deploying to development stages", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tell whether a stage is development-like
    Classify {
        /// Stage name
        stage: String,
    },

    /// List the extension points the plugin registers for a descriptor
    Hooks {
        /// Deployment descriptor (.json, .yml/.yaml or .toml)
        #[arg(short, long)]
        descriptor: PathBuf,

        /// Stage override
        #[arg(short, long)]
        stage: Option<String>,
    },

    /// Remove reserved concurrency from every function of a descriptor file
    Strip {
        /// Deployment descriptor (.json, .yml/.yaml or .toml)
        #[arg(short, long)]
        descriptor: PathBuf,

        /// Where to write the result (default: print JSON to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stage override
        #[arg(short, long)]
        stage: Option<String>,
    },

    /// Remove reserved concurrency from deployed functions
    Reconcile {
        /// Deployment descriptor (.json, .yml/.yaml or .toml)
        #[arg(short, long)]
        descriptor: PathBuf,

        /// Only this logical function
        #[arg(short, long)]
        function: Option<String>,

        /// Stage override
        #[arg(short, long)]
        stage: Option<String>,

        #[command(flatten)]
        api: ApiArgs,
    },

    /// Fire the plugin hooks of a host command in pipeline order
    Run {
        /// Host command to simulate
        #[arg(value_enum)]
        command: CommandArg,

        /// Deployment descriptor (.json, .yml/.yaml or .toml)
        #[arg(short, long)]
        descriptor: PathBuf,

        /// Target function for `deploy-function`
        #[arg(short, long)]
        function: Option<String>,

        /// Stage override
        #[arg(short, long)]
        stage: Option<String>,

        /// Where to write the descriptor after the hooks ran
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        api: ApiArgs,
    },
}

#[derive(Args)]
struct ApiArgs {
    /// Function-management API endpoint
    #[arg(long, env = "DEVSTRIP_API_ENDPOINT", default_value = "http://localhost:4566")]
    endpoint: String,

    /// Bearer token for the endpoint
    #[arg(long, env = "DEVSTRIP_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "DEVSTRIP_API_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// Functions reconciled concurrently per batch
    #[arg(long, env = "DEVSTRIP_BATCH_SIZE", default_value_t = 5)]
    batch_size: usize,
}

impl ApiArgs {
    fn client(&self) -> Result<Arc<dyn FunctionApi>> {
        let mut config = FunctionApiConfig::new(&self.endpoint).with_timeout_secs(self.timeout_secs);
        if let Some(token) = &self.token {
            config = config.with_token(token);
        }
        let client = HttpFunctionApi::new(config).context("Failed to create function API client")?;
        Ok(Arc::new(client))
    }

    fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig::default().with_batch_size(self.batch_size)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CommandArg {
    Package,
    Deploy,
    DeployFunction,
}

impl From<CommandArg> for HostCommand {
    fn from(arg: CommandArg) -> Self {
        match arg {
            CommandArg::Package => HostCommand::Package,
            CommandArg::Deploy => HostCommand::Deploy,
            CommandArg::DeployFunction => HostCommand::DeployFunction,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    devstrip_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Classify { stage } => cmd_classify(&stage),
        Commands::Hooks { descriptor, stage } => cmd_hooks(&descriptor, stage),
        Commands::Strip {
            descriptor,
            output,
            stage,
        } => cmd_strip(&descriptor, output.as_deref(), stage.as_deref()),
        Commands::Reconcile {
            descriptor,
            function,
            stage,
            api,
        } => {
            let client = api.client()?;
            cmd_reconcile(
                &descriptor,
                function.as_deref(),
                stage.as_deref(),
                client,
                api.reconciler_config(),
            )
            .await
        }
        Commands::Run {
            command,
            descriptor,
            function,
            stage,
            output,
            api,
        } => {
            let client = api.client()?;
            let options = PluginOptions { function, stage };
            cmd_run(
                command.into(),
                &descriptor,
                output.as_deref(),
                options,
                client,
                api.reconciler_config(),
            )
            .await
        }
    }
}

fn load_descriptor(path: &Path) -> Result<DeploymentDescriptor> {
    DeploymentDescriptor::load(path)
        .with_context(|| format!("Failed to load descriptor {}", path.display()))
}

fn write_descriptor(descriptor: &DeploymentDescriptor, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            descriptor
                .save(path)
                .with_context(|| format!("Failed to write descriptor {}", path.display()))?;
            println!("Descriptor written to {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(descriptor)?),
    }
    Ok(())
}

/// Refuse to mutate anything for a stage that is not development-like
fn require_development_stage(stage: &str) -> Result<()> {
    if StageClass::of(stage) != StageClass::DevelopmentLike {
        anyhow::bail!(
            "Stage '{}' is not development-like, reserved concurrency is left untouched",
            stage
        );
    }
    Ok(())
}

fn print_report(report: &ReconciliationReport) {
    for function in &report.functions {
        let (status, detail) = match &function.outcome {
            FunctionOutcome::Modified => ("✓", "reserved concurrency removed".to_string()),
            FunctionOutcome::AlreadyClean => ("·", "no reserved concurrency".to_string()),
            FunctionOutcome::SkippedWarmup => ("·", "warm-up function skipped".to_string()),
            FunctionOutcome::Failed { error } => ("✗", error.clone()),
        };
        println!(
            "  {} {} ({}): {}",
            status, function.logical_name, function.function_id, detail
        );
    }
    println!();
    println!(
        "Summary: {} modified, {} errored, {} skipped ({} total)",
        report.modified_count(),
        report.error_count(),
        report.skipped_count(),
        report.total()
    );
}

/// Print the classification of a stage
fn cmd_classify(stage: &str) -> Result<()> {
    if is_development_like(stage) {
        println!("{}: development-like (reserved concurrency is removed)", stage);
    } else {
        println!("{}: not development-like (left untouched)", stage);
    }
    Ok(())
}

/// List the hooks the plugin would register
fn cmd_hooks(descriptor_path: &Path, stage: Option<String>) -> Result<()> {
    let descriptor = load_descriptor(descriptor_path)?.into_shared();
    let options = PluginOptions {
        function: None,
        stage,
    };
    // Registration never calls the API, an unreachable endpoint is fine here.
    let api: Arc<dyn FunctionApi> =
        Arc::new(HttpFunctionApi::from_env().context("Failed to create function API client")?);
    let plugin = ConcurrencyPlugin::new(descriptor, options, api, Arc::new(TracingLog));

    println!("Stage: {} ({})", plugin.stage(), plugin.class().name());
    if !plugin.is_active() {
        println!("No hooks registered");
        return Ok(());
    }
    for (point, hook) in plugin.hooks().iter() {
        println!("  {} -> {}", point, hook.operation().name());
    }
    Ok(())
}

/// Strip reserved concurrency from a descriptor file
fn cmd_strip(descriptor_path: &Path, output: Option<&Path>, stage: Option<&str>) -> Result<()> {
    let mut descriptor = load_descriptor(descriptor_path)?;
    require_development_stage(stage.unwrap_or(&descriptor.provider.stage))?;

    let summary = strip_reserved_concurrency(&mut descriptor.functions);
    info!(
        modified = summary.modified_count,
        "Removed reserved concurrency from descriptor"
    );
    for name in &summary.modified {
        eprintln!("  ✓ {}", name);
    }
    write_descriptor(&descriptor, output)
}

/// Reconcile deployed functions of a descriptor
async fn cmd_reconcile(
    descriptor_path: &Path,
    function: Option<&str>,
    stage: Option<&str>,
    api: Arc<dyn FunctionApi>,
    config: ReconcilerConfig,
) -> Result<()> {
    let descriptor = load_descriptor(descriptor_path)?;
    let stage = stage.unwrap_or(&descriptor.provider.stage);
    require_development_stage(stage)?;
    let scope = ServiceScope::new(&descriptor.service, stage);

    println!("Service: {}", scope.service);
    println!("Stage: {}", scope.stage);
    println!();

    let reconciler = RemoteReconciler::new(api, Arc::new(TracingLog), scope).with_config(config);
    let report = match function {
        Some(name) => reconciler.reconcile_one(Some(name)).await,
        None => reconciler.reconcile_all(&descriptor.function_names()).await,
    };
    print_report(&report);

    if report.error_count() > 0 {
        anyhow::bail!("{} function(s) could not be reconciled", report.error_count());
    }
    Ok(())
}

/// Construct the plugin and fire the hooks of a host command in order
async fn cmd_run(
    command: HostCommand,
    descriptor_path: &Path,
    output: Option<&Path>,
    options: PluginOptions,
    api: Arc<dyn FunctionApi>,
    config: ReconcilerConfig,
) -> Result<()> {
    let descriptor = load_descriptor(descriptor_path)?.into_shared();
    let plugin =
        ConcurrencyPlugin::with_config(descriptor.clone(), options, api, Arc::new(TracingLog), config);

    println!("Stage: {} ({})", plugin.stage(), plugin.class().name());

    let fired = plugin
        .run_command(command)
        .await
        .context("Lifecycle hook failed")?;
    for point in &fired {
        println!("  ✓ {}", point);
    }
    if fired.is_empty() {
        println!("No hooks fired");
    }

    if let Some(path) = output {
        let snapshot = descriptor
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        write_descriptor(&snapshot, Some(path))?;
    }
    Ok(())
}
