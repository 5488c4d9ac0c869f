pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod message;
pub mod metrics;
pub mod pipeline;
pub mod plugin;

#[cfg(test)]
pub(crate) mod test_utils;
