//! Plugin type registry
//!
//! Maps the `type` named in a settings section to a constructor that turns
//! the section's free-form settings into a [`PluginWrapper`].

use super::{builtin, Decoder, Filter, Input, Output, PluginWrapper};
use crate::config::PluginSection;
use crate::error::{ConfigError, PluginError};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

pub type PluginSettings = serde_json::Map<String, serde_json::Value>;

pub type Constructor<P> = fn(&str, &PluginSettings) -> Result<PluginWrapper<P>, PluginError>;

#[derive(Default)]
pub struct PluginRegistry {
    decoders: HashMap<String, Constructor<dyn Decoder>>,
    filters: HashMap<String, Constructor<dyn Filter>>,
    outputs: HashMap<String, Constructor<dyn Output>>,
    inputs: HashMap<String, Constructor<dyn Input>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with every plugin type shipped in `builtin`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register(&mut registry);
        registry
    }

    pub fn register_decoder(&mut self, plugin_type: &str, ctor: Constructor<dyn Decoder>) {
        self.decoders.insert(plugin_type.to_string(), ctor);
    }

    pub fn register_filter(&mut self, plugin_type: &str, ctor: Constructor<dyn Filter>) {
        self.filters.insert(plugin_type.to_string(), ctor);
    }

    pub fn register_output(&mut self, plugin_type: &str, ctor: Constructor<dyn Output>) {
        self.outputs.insert(plugin_type.to_string(), ctor);
    }

    pub fn register_input(&mut self, plugin_type: &str, ctor: Constructor<dyn Input>) {
        self.inputs.insert(plugin_type.to_string(), ctor);
    }

    pub fn build_decoder(
        &self,
        name: &str,
        section: &PluginSection,
    ) -> Result<PluginWrapper<dyn Decoder>, ConfigError> {
        build(&self.decoders, "decoder", name, section)
    }

    pub fn build_filter(
        &self,
        name: &str,
        section: &PluginSection,
    ) -> Result<PluginWrapper<dyn Filter>, ConfigError> {
        build(&self.filters, "filter", name, section)
    }

    pub fn build_output(
        &self,
        name: &str,
        section: &PluginSection,
    ) -> Result<PluginWrapper<dyn Output>, ConfigError> {
        build(&self.outputs, "output", name, section)
    }

    pub fn build_input(
        &self,
        name: &str,
        section: &PluginSection,
    ) -> Result<PluginWrapper<dyn Input>, ConfigError> {
        build(&self.inputs, "input", name, section)
    }

    pub fn plugin_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self
            .decoders
            .keys()
            .chain(self.filters.keys())
            .chain(self.outputs.keys())
            .chain(self.inputs.keys())
            .map(String::as_str)
            .collect();
        types.sort_unstable();
        types
    }
}

fn build<P: ?Sized>(
    ctors: &HashMap<String, Constructor<P>>,
    kind: &'static str,
    name: &str,
    section: &PluginSection,
) -> Result<PluginWrapper<P>, ConfigError> {
    let ctor = ctors
        .get(&section.plugin_type)
        .ok_or_else(|| ConfigError::UnknownPluginType {
            kind,
            name: name.to_string(),
            plugin_type: section.plugin_type.clone(),
        })?;

    ctor(name, &section.settings).map_err(|e| ConfigError::Validation(e.to_string()))
}

/// Deserialize a plugin's settings into its typed config struct
pub fn parse_settings<T: DeserializeOwned>(
    name: &str,
    settings: &PluginSettings,
) -> Result<T, PluginError> {
    serde_json::from_value(serde_json::Value::Object(settings.clone())).map_err(|e| {
        PluginError::InvalidSettings {
            name: name.to_string(),
            reason: e.to_string(),
        }
    })
}
