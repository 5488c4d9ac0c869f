//! Plugin contracts for the pipeline
//!
//! The pipeline core only talks to plugins through the narrow traits below.
//! Every pack owns private decoder, filter and output instances created from
//! a [`PluginWrapper`]; state that must span messages lives in the wrapper's
//! shared [`PluginGlobal`], which is also what receives lifecycle events.
//!
//! # Modules
//!
//! - `wrapper`: name + factory + optional shared global
//! - `registry`: plugin type names to constructors, used when loading settings
//! - `builtin`: decoders, filters, outputs and inputs shipped with the crate

pub mod builtin;
pub mod registry;
pub mod wrapper;

use crate::error::{DecodeError, PluginError};
use crate::message::Message;
use crate::pipeline::{InputContext, PackState, PipelineEvent};
use async_trait::async_trait;

pub use registry::{PluginRegistry, PluginSettings};
pub use wrapper::PluginWrapper;

pub type DecoderWrapper = PluginWrapper<dyn Decoder>;
pub type FilterWrapper = PluginWrapper<dyn Filter>;
pub type OutputWrapper = PluginWrapper<dyn Output>;
pub type InputWrapper = PluginWrapper<dyn Input>;

/// Turns the pack's raw buffer into its message
pub trait Decoder: Send {
    fn decode(&mut self, pack: &mut PackState) -> Result<(), DecodeError>;
}

/// Inspects or rewrites a decoded message; may veto delivery by setting `blocked`
pub trait Filter: Send {
    fn filter_msg(&mut self, pack: &mut PackState);
}

/// Best-effort sink for a decoded, unblocked message
#[async_trait]
pub trait Output: Send {
    async fn deliver(&mut self, pack: &PackState);
}

/// Message source; runs as its own task until it sees the stop signal
#[async_trait]
pub trait Input: Send {
    async fn run(&mut self, ctx: InputContext) -> Result<(), PluginError>;
}

/// Shared, cross-message plugin state that observes lifecycle events
#[cfg_attr(test, mockall::automock)]
pub trait PluginGlobal: Send + Sync {
    fn event(&self, event: PipelineEvent) -> Result<(), PluginError>;
}

/// Maps a decoded message to a chain name, `None` meaning "no match"
#[cfg_attr(test, mockall::automock)]
pub trait ChainLookup: Send + Sync {
    fn locate_chain(&self, message: &Message) -> Option<String>;
}
