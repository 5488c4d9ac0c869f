use crate::config::PipelineConfig;
use crate::message::Message;
use crate::plugin::{Decoder, Filter, Output};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// The part of a pack that plugins read and write
pub struct PackState {
    /// Raw input buffer; inputs fill it and truncate it to the received length
    pub msg_bytes: Vec<u8>,
    /// Only meaningful while `decoded` is set
    pub message: Message,
    pub decoder: String,
    pub decoded: bool,
    pub blocked: bool,
    pub filter_chain: String,
    /// Chain resolutions over the pack's whole lifetime; never reset
    pub chain_count: u64,
    pub output_names: HashSet<String>,
    config: Arc<PipelineConfig>,
    capacity: usize,
}

impl PackState {
    pub fn new(config: Arc<PipelineConfig>) -> Self {
        let capacity = config.max_message_size;
        Self {
            msg_bytes: vec![0; capacity],
            message: Message::default(),
            decoder: config.default_decoder.clone(),
            decoded: false,
            blocked: false,
            filter_chain: config.default_filter_chain.clone(),
            chain_count: 0,
            output_names: HashSet::new(),
            config,
            capacity,
        }
    }

    pub fn config(&self) -> &Arc<PipelineConfig> {
        &self.config
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy `bytes` into the buffer, truncated to capacity. Returns the stored length.
    pub fn set_payload(&mut self, bytes: &[u8]) -> usize {
        let len = bytes.len().min(self.capacity);
        self.msg_bytes.resize(self.capacity, 0);
        self.msg_bytes[..len].copy_from_slice(&bytes[..len]);
        self.msg_bytes.truncate(len);
        len
    }

    pub fn message(&self) -> Option<&Message> {
        self.decoded.then_some(&self.message)
    }

    fn zero(&mut self) {
        self.msg_bytes.resize(self.capacity, 0);
        self.message.clear();
        self.decoder.clone_from(&self.config.default_decoder);
        self.decoded = false;
        self.blocked = false;
        self.filter_chain.clone_from(&self.config.default_filter_chain);
        self.output_names.clear();
    }
}

impl fmt::Debug for PackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackState")
            .field("msg_len", &self.msg_bytes.len())
            .field("decoder", &self.decoder)
            .field("decoded", &self.decoded)
            .field("blocked", &self.blocked)
            .field("filter_chain", &self.filter_chain)
            .field("chain_count", &self.chain_count)
            .field("output_names", &self.output_names)
            .finish()
    }
}

/// Reusable unit of work carrying one message through decode, route, filter and deliver
///
/// Each pack owns private instances of every configured decoder, filter and
/// output, so a plugin instance only ever sees one message at a time.
pub struct PipelinePack {
    pub state: PackState,
    pub(crate) decoders: HashMap<String, Box<dyn Decoder>>,
    pub(crate) filters: HashMap<String, Box<dyn Filter>>,
    pub(crate) outputs: HashMap<String, Box<dyn Output>>,
}

impl PipelinePack {
    pub fn new(config: Arc<PipelineConfig>) -> Self {
        let decoders = config
            .decoders
            .iter()
            .map(|(name, wrapper)| (name.clone(), wrapper.create()))
            .collect();
        let filters = config
            .filters
            .iter()
            .map(|(name, wrapper)| (name.clone(), wrapper.create()))
            .collect();
        let outputs = config
            .outputs
            .iter()
            .map(|(name, wrapper)| (name.clone(), wrapper.create()))
            .collect();

        Self {
            state: PackState::new(config),
            decoders,
            filters,
            outputs,
        }
    }

    /// Restore the pack to its freshly pooled state; plugin instances are kept
    pub fn zero(&mut self) {
        self.state.zero();
    }
}

impl fmt::Debug for PipelinePack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelinePack")
            .field("state", &self.state)
            .field("decoders", &self.decoders.keys().collect::<Vec<_>>())
            .field("filters", &self.filters.keys().collect::<Vec<_>>())
            .field("outputs", &self.outputs.keys().collect::<Vec<_>>())
            .finish()
    }
}
