use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Pack pool closed")]
    PoolClosed,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown {kind} plugin type '{plugin_type}' for '{name}'")]
    UnknownPluginType {
        kind: &'static str,
        name: String,
        plugin_type: String,
    },

    #[error("Environment variable error: {0}")]
    EnvVar(String),
}

/// Errors raised by plugin construction, lifecycle events and input tasks
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Invalid settings for plugin '{name}': {reason}")]
    InvalidSettings { name: String, reason: String },

    #[error("Plugin '{name}' failed to handle {event} event: {reason}")]
    Event {
        name: String,
        event: String,
        reason: String,
    },

    #[error("Plugin I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Plugin '{name}' failed: {reason}")]
    Failed { name: String, reason: String },
}

/// Failure to turn a raw buffer into a message
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Empty message buffer")]
    Empty,

    #[error("Malformed JSON message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed message: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
