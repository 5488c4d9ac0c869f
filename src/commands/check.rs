use crate::config::{self, PipelineConfig, Settings};
use crate::error::Result;
use crate::plugin::PluginRegistry;
use tracing::{debug, info, warn};

/// Validate settings and resolve every plugin without starting the pipeline
pub async fn run_config_check(settings: Settings, registry: &PluginRegistry) -> Result<()> {
    info!("Checking configuration...");

    config::validate(&settings)?;
    info!("✓ Configuration is valid");

    match serde_yaml::to_string(&settings) {
        Ok(dump) => debug!("Effective configuration:\n{}", dump),
        Err(e) => warn!("Could not render effective configuration: {}", e),
    }

    info!("Pool size: {}", settings.pool_size);
    info!("Max message size: {} bytes", settings.max_message_size);
    info!(
        "Defaults: decoder '{}', chain '{}'",
        settings.default_decoder, settings.default_filter_chain
    );

    let pipeline = PipelineConfig::from_settings(&settings, registry)?;
    info!(
        "✓ Resolved {} decoder(s), {} filter(s), {} output(s), {} input(s)",
        pipeline.decoders.len(),
        pipeline.filters.len(),
        pipeline.outputs.len(),
        pipeline.inputs.len()
    );

    let mut chains: Vec<_> = pipeline.filter_chains.iter().collect();
    chains.sort_by(|a, b| a.0.cmp(b.0));
    for (name, chain) in chains {
        info!("\n--- Chain: {} ---", name);
        if !chain.message_types.is_empty() {
            info!("Message types: {}", chain.message_types.join(", "));
        }
        info!("Filters: {}", chain.filters.join(" -> "));
        info!("Outputs: {}", chain.outputs.join(", "));
        if chain.outputs.is_empty() {
            warn!("Chain '{}' has no outputs; its messages are dropped", name);
        }
    }

    if pipeline.inputs.is_empty() {
        warn!("No inputs configured; the pipeline will idle until stopped");
    }

    info!("\n✓ All checks passed");
    Ok(())
}
