use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_POOL_SIZE: usize = 100;
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 65536;
pub const DEFAULT_DECODER: &str = "json";
pub const DEFAULT_FILTER_CHAIN: &str = "default";

/// On-disk pipeline settings, before plugin types are resolved
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    #[serde(default = "default_decoder")]
    pub default_decoder: String,
    #[serde(default = "default_filter_chain")]
    pub default_filter_chain: String,
    #[serde(default)]
    pub decoders: HashMap<String, PluginSection>,
    #[serde(default)]
    pub filters: HashMap<String, PluginSection>,
    #[serde(default)]
    pub outputs: HashMap<String, PluginSection>,
    #[serde(default)]
    pub inputs: HashMap<String, PluginSection>,
    #[serde(default)]
    pub chains: HashMap<String, ChainSection>,
}

/// A named plugin: its registered type plus free-form settings for that type
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PluginSection {
    #[serde(rename = "type")]
    pub plugin_type: String,
    #[serde(flatten)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSection {
    /// Message types routed to this chain
    #[serde(default)]
    pub message_types: Vec<String>,
    #[serde(default)]
    pub filters: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            max_message_size: default_max_message_size(),
            default_decoder: default_decoder(),
            default_filter_chain: default_filter_chain(),
            decoders: HashMap::new(),
            filters: HashMap::new(),
            outputs: HashMap::new(),
            inputs: HashMap::new(),
            chains: HashMap::new(),
        }
    }
}

impl PluginSection {
    pub fn new(plugin_type: impl Into<String>) -> Self {
        Self {
            plugin_type: plugin_type.into(),
            settings: serde_json::Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: serde_json::Value) -> Self {
        self.settings.insert(key.to_string(), value);
        self
    }
}

// Default value functions
fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

fn default_max_message_size() -> usize {
    DEFAULT_MAX_MESSAGE_SIZE
}

fn default_decoder() -> String {
    DEFAULT_DECODER.to_string()
}

fn default_filter_chain() -> String {
    DEFAULT_FILTER_CHAIN.to_string()
}
