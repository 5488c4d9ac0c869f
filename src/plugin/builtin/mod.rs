//! Plugins shipped with the crate

pub mod decoders;
pub mod filters;
pub mod inputs;
pub mod outputs;

pub use decoders::{JsonDecoder, PayloadDecoder};
pub use filters::{BlockFilter, CounterFilter, CounterGlobal, NoopFilter};
pub use inputs::UdpInput;
pub use outputs::{FileOutput, FileWriter, LogOutput};

use super::PluginRegistry;

pub fn register(registry: &mut PluginRegistry) {
    registry.register_decoder("JsonDecoder", decoders::json_decoder);
    registry.register_decoder("PayloadDecoder", decoders::payload_decoder);
    registry.register_filter("NoopFilter", filters::noop_filter);
    registry.register_filter("BlockFilter", filters::block_filter);
    registry.register_filter("CounterFilter", filters::counter_filter);
    registry.register_output("LogOutput", outputs::log_output);
    registry.register_output("FileOutput", outputs::file_output);
    registry.register_input("UdpInput", inputs::udp_input);
}
