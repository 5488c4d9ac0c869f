//! Pipeline core
//!
//! A fixed pool of [`PipelinePack`]s circulates between inputs and the
//! [`PipelineExecutor`]: an input fills a pack's buffer, the executor decodes
//! it, routes it to a filter chain, runs the filters and delivers to the
//! chain's outputs, and the pack's guard returns it to the pool.

pub mod control;
pub mod pack;
pub mod pool;
pub mod router;
pub mod runner;
pub mod signals;
pub mod stage;

pub use control::{broadcast_event, BroadcastReport, ControlError, EventBus, PipelineEvent};
pub use pack::{PackState, PipelinePack};
pub use pool::{PackGuard, PackPool};
pub use router::resolve_chain;
pub use runner::{
    InputContext, InputExit, InputFailure, InputRunner, Orchestrator, RunState, ShutdownReport,
};
pub use signals::ControlSignal;
pub use stage::{CycleError, CycleOutcome, PipelineExecutor};
