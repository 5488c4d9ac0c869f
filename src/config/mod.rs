pub mod loader;
pub mod pipeline;
pub mod schema;

pub use loader::{load_from_env_or_file, load_from_path, validate};
pub use pipeline::{FilterChain, MessageTypeLookup, PipelineConfig, PipelineConfigBuilder};
pub use schema::{ChainSection, PluginSection, Settings};
