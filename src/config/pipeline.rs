//! Runtime pipeline configuration
//!
//! `PipelineConfig` is what the pipeline core consumes: resolved plugin
//! wrappers, chain definitions and the chain lookup. It is immutable once
//! built and shared as `Arc<PipelineConfig>` by every pack.

use super::schema::{
    Settings, DEFAULT_DECODER, DEFAULT_FILTER_CHAIN, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_POOL_SIZE,
};
use crate::error::ConfigError;
use crate::message::Message;
use crate::plugin::{
    ChainLookup, DecoderWrapper, FilterWrapper, InputWrapper, OutputWrapper, PluginRegistry,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A named, ordered list of filters plus the outputs it delivers to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterChain {
    pub message_types: Vec<String>,
    pub filters: Vec<String>,
    pub outputs: Vec<String>,
}

impl FilterChain {
    pub fn new<F, O>(filters: F, outputs: O) -> Self
    where
        F: IntoIterator,
        F::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        Self {
            message_types: Vec::new(),
            filters: filters.into_iter().map(Into::into).collect(),
            outputs: outputs.into_iter().map(Into::into).collect(),
        }
    }

    pub fn for_types<I>(mut self, types: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.message_types = types.into_iter().map(Into::into).collect();
        self
    }
}

/// Routes a message to the chain that claims its `type`
#[derive(Debug, Clone, Default)]
pub struct MessageTypeLookup {
    by_type: HashMap<String, String>,
}

impl MessageTypeLookup {
    pub fn from_chains(chains: &HashMap<String, FilterChain>) -> Self {
        let by_type = chains
            .iter()
            .flat_map(|(name, chain)| {
                chain
                    .message_types
                    .iter()
                    .map(move |msg_type| (msg_type.clone(), name.clone()))
            })
            .collect();
        Self { by_type }
    }
}

impl ChainLookup for MessageTypeLookup {
    fn locate_chain(&self, message: &Message) -> Option<String> {
        self.by_type.get(&message.msg_type).cloned()
    }
}

pub struct PipelineConfig {
    pub default_decoder: String,
    pub default_filter_chain: String,
    pub pool_size: usize,
    pub max_message_size: usize,
    pub decoders: HashMap<String, DecoderWrapper>,
    pub filters: HashMap<String, FilterWrapper>,
    pub outputs: HashMap<String, OutputWrapper>,
    pub inputs: HashMap<String, InputWrapper>,
    pub filter_chains: HashMap<String, FilterChain>,
    pub lookup: Arc<dyn ChainLookup>,
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Resolve file settings into plugin wrappers using the registry
    pub fn from_settings(
        settings: &Settings,
        registry: &PluginRegistry,
    ) -> Result<Self, ConfigError> {
        let mut builder = Self::builder()
            .pool_size(settings.pool_size)
            .max_message_size(settings.max_message_size)
            .default_decoder(&settings.default_decoder)
            .default_filter_chain(&settings.default_filter_chain);

        for (name, section) in &settings.decoders {
            builder = builder.decoder(registry.build_decoder(name, section)?);
        }
        for (name, section) in &settings.filters {
            builder = builder.filter(registry.build_filter(name, section)?);
        }
        for (name, section) in &settings.outputs {
            builder = builder.output(registry.build_output(name, section)?);
        }
        for (name, section) in &settings.inputs {
            builder = builder.input(registry.build_input(name, section)?);
        }
        for (name, chain) in &settings.chains {
            builder = builder.chain(
                name,
                FilterChain::new(&chain.filters, &chain.outputs).for_types(&chain.message_types),
            );
        }

        Ok(builder.build())
    }

    pub fn chain(&self, name: &str) -> Option<&FilterChain> {
        self.filter_chains.get(name)
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("default_decoder", &self.default_decoder)
            .field("default_filter_chain", &self.default_filter_chain)
            .field("pool_size", &self.pool_size)
            .field("max_message_size", &self.max_message_size)
            .field("decoders", &self.decoders.keys().collect::<Vec<_>>())
            .field("filters", &self.filters.keys().collect::<Vec<_>>())
            .field("outputs", &self.outputs.keys().collect::<Vec<_>>())
            .field("inputs", &self.inputs.keys().collect::<Vec<_>>())
            .field("filter_chains", &self.filter_chains)
            .finish()
    }
}

pub struct PipelineConfigBuilder {
    default_decoder: String,
    default_filter_chain: String,
    pool_size: usize,
    max_message_size: usize,
    decoders: HashMap<String, DecoderWrapper>,
    filters: HashMap<String, FilterWrapper>,
    outputs: HashMap<String, OutputWrapper>,
    inputs: HashMap<String, InputWrapper>,
    filter_chains: HashMap<String, FilterChain>,
    lookup: Option<Arc<dyn ChainLookup>>,
}

impl Default for PipelineConfigBuilder {
    fn default() -> Self {
        Self {
            default_decoder: DEFAULT_DECODER.to_string(),
            default_filter_chain: DEFAULT_FILTER_CHAIN.to_string(),
            pool_size: DEFAULT_POOL_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            decoders: HashMap::new(),
            filters: HashMap::new(),
            outputs: HashMap::new(),
            inputs: HashMap::new(),
            filter_chains: HashMap::new(),
            lookup: None,
        }
    }
}

impl PipelineConfigBuilder {
    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    pub fn default_decoder(mut self, name: impl Into<String>) -> Self {
        self.default_decoder = name.into();
        self
    }

    pub fn default_filter_chain(mut self, name: impl Into<String>) -> Self {
        self.default_filter_chain = name.into();
        self
    }

    pub fn decoder(mut self, wrapper: DecoderWrapper) -> Self {
        self.decoders.insert(wrapper.name().to_string(), wrapper);
        self
    }

    pub fn filter(mut self, wrapper: FilterWrapper) -> Self {
        self.filters.insert(wrapper.name().to_string(), wrapper);
        self
    }

    pub fn output(mut self, wrapper: OutputWrapper) -> Self {
        self.outputs.insert(wrapper.name().to_string(), wrapper);
        self
    }

    pub fn input(mut self, wrapper: InputWrapper) -> Self {
        self.inputs.insert(wrapper.name().to_string(), wrapper);
        self
    }

    pub fn chain(mut self, name: impl Into<String>, chain: FilterChain) -> Self {
        self.filter_chains.insert(name.into(), chain);
        self
    }

    /// Replace the default message-type lookup
    pub fn lookup(mut self, lookup: Arc<dyn ChainLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    pub fn build(self) -> PipelineConfig {
        let lookup = self
            .lookup
            .unwrap_or_else(|| Arc::new(MessageTypeLookup::from_chains(&self.filter_chains)));

        PipelineConfig {
            default_decoder: self.default_decoder,
            default_filter_chain: self.default_filter_chain,
            pool_size: self.pool_size,
            max_message_size: self.max_message_size,
            decoders: self.decoders,
            filters: self.filters,
            outputs: self.outputs,
            inputs: self.inputs,
            filter_chains: self.filter_chains,
            lookup,
        }
    }
}
