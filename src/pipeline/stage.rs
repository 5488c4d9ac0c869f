use super::pack::PipelinePack;
use super::pool::PackGuard;
use super::router;
use crate::error::DecodeError;
use crate::metrics::Metrics;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Why a processing cycle stopped before delivery
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("Decoder '{0}' not found")]
    DecoderNotFound(String),

    #[error("Decoder '{decoder}' failed: {source}")]
    Decode {
        decoder: String,
        #[source]
        source: DecodeError,
    },

    #[error("Filter chain '{0}' not found")]
    ChainNotFound(String),

    #[error("Filter '{filter}' in chain '{chain}' not found")]
    FilterNotFound { chain: String, filter: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Reached this many outputs
    Delivered(usize),
    Blocked,
    Aborted,
}

/// Runs one pack through decode, route, filter and deliver
#[derive(Clone)]
pub struct PipelineExecutor {
    metrics: Arc<Metrics>,
}

impl PipelineExecutor {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Process the pack and hand it back to the pool, whatever the outcome
    pub async fn process(&self, mut pack: PackGuard) -> CycleOutcome {
        let started = Instant::now();
        let outcome = match self.run_cycle(&mut pack).await {
            Ok(outcome) => outcome,
            Err(e) => {
                match &e {
                    CycleError::Decode { .. } => {
                        warn!("Dropping message: {}", e);
                        self.metrics.record_decode_error();
                    }
                    _ => {
                        error!("Aborting cycle: {}", e);
                        self.metrics.record_routing_error();
                    }
                }
                CycleOutcome::Aborted
            }
        };
        self.metrics.record_cycle(started.elapsed());
        drop(pack);
        outcome
    }

    async fn run_cycle(&self, pack: &mut PipelinePack) -> Result<CycleOutcome, CycleError> {
        let PipelinePack {
            state,
            decoders,
            filters,
            outputs,
        } = pack;

        if !state.decoded {
            let decoder = decoders
                .get_mut(&state.decoder)
                .ok_or_else(|| CycleError::DecoderNotFound(state.decoder.clone()))?;
            decoder
                .decode(state)
                .map_err(|source| CycleError::Decode {
                    decoder: state.decoder.clone(),
                    source,
                })?;
            state.decoded = true;
        }

        let config = Arc::clone(state.config());
        let chain = router::resolve_chain(&config, state)?;

        for name in &chain.filters {
            if state.blocked {
                break;
            }
            let filter = filters
                .get_mut(name)
                .ok_or_else(|| CycleError::FilterNotFound {
                    chain: state.filter_chain.clone(),
                    filter: name.clone(),
                })?;
            filter.filter_msg(state);
        }

        if state.blocked {
            debug!(chain = %state.filter_chain, msg_type = %state.message.msg_type, "Message blocked");
            self.metrics.record_blocked();
            return Ok(CycleOutcome::Blocked);
        }

        let mut delivered = 0;
        for name in &state.output_names {
            match outputs.get_mut(name) {
                Some(output) => {
                    output.deliver(state).await;
                    self.metrics.record_delivery();
                    delivered += 1;
                }
                None => {
                    error!(output = %name, chain = %state.filter_chain, "Output not found");
                    self.metrics.record_missing_output();
                }
            }
        }

        Ok(CycleOutcome::Delivered(delivered))
    }
}
