use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use pipeline_pack::commands;
use pipeline_pack::config::{self, PipelineConfig};
use pipeline_pack::logging;
use pipeline_pack::pipeline::Orchestrator;
use pipeline_pack::plugin::PluginRegistry;

#[derive(Parser, Debug)]
#[command(name = "pipeline-pack")]
#[command(about = "Streaming message pipeline: decode, route, filter and deliver", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (YAML/JSON/TOML)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Run the pipeline until SIGINT/SIGTERM (default)
    Run,
    /// Validate the configuration and resolve every plugin
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(args.debug, args.json_logs);

    let settings = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            config::load_from_path(path)
                .await
                .with_context(|| format!("failed to load {}", path.display()))?
        }
        None => {
            info!("Loading configuration from default locations");
            config::load_from_env_or_file()
                .await
                .context("failed to load configuration")?
        }
    };

    let registry = PluginRegistry::with_builtins();

    match args.command.unwrap_or(Command::Run) {
        Command::Check => {
            commands::run_config_check(settings, &registry).await?;
        }
        Command::Run => {
            let pipeline = Arc::new(PipelineConfig::from_settings(&settings, &registry)?);
            info!(
                "Loaded {} input(s), {} chain(s)",
                pipeline.inputs.len(),
                pipeline.filter_chains.len()
            );

            let orchestrator = Orchestrator::new(pipeline);
            let report = orchestrator.run().await?;
            for failure in &report.failed {
                warn!(input = %failure.input, "Input ended abnormally: {}", failure.exit);
            }
            debug!("Final metrics:\n{}", orchestrator.metrics().gather_text());
        }
    }

    Ok(())
}
