//! Helpers shared by the unit test modules

use crate::config::{FilterChain, PipelineConfig};
use crate::pipeline::PackState;
use crate::plugin::builtin::JsonDecoder;
use crate::plugin::{Decoder, Output, OutputWrapper, PluginWrapper};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// A standalone pack state backed by the default configuration
pub fn pack_state() -> PackState {
    PackState::new(Arc::new(PipelineConfig::builder().build()))
}

/// Collects the payload of every message delivered to its outputs
#[derive(Clone, Default)]
pub struct Recorder {
    payloads: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn wrapper(&self, name: &str) -> OutputWrapper {
        let recorder = self.clone();
        PluginWrapper::new(name, move || {
            Box::new(RecordingOutput {
                recorder: recorder.clone(),
            }) as Box<dyn Output>
        })
    }

    pub fn payloads(&self) -> Vec<String> {
        self.payloads.lock().unwrap().clone()
    }
}

struct RecordingOutput {
    recorder: Recorder,
}

#[async_trait]
impl Output for RecordingOutput {
    async fn deliver(&mut self, pack: &PackState) {
        self.recorder
            .payloads
            .lock()
            .unwrap()
            .push(pack.message.payload.clone());
    }
}

/// JSON decoder into a default chain that delivers to one recording output, `out1`
pub fn recording_config(recorder: &Recorder, pool_size: usize) -> PipelineConfig {
    PipelineConfig::builder()
        .pool_size(pool_size)
        .decoder(PluginWrapper::new("json", || {
            Box::new(JsonDecoder) as Box<dyn Decoder>
        }))
        .output(recorder.wrapper("out1"))
        .chain("default", FilterChain::new(Vec::<String>::new(), ["out1"]))
        .build()
}
