//! Input tasks and the orchestrator that owns them
//!
//! The orchestrator walks `Starting -> Running -> Draining -> Stopped`:
//! it spawns one task per configured input, turns SIGHUP into a reload
//! broadcast, and on SIGINT/SIGTERM broadcasts stop, cancels the inputs and
//! waits for them and for every cycle they dispatched.

use super::control::{broadcast_with_metrics, EventBus, PipelineEvent};
use super::pool::{PackGuard, PackPool};
use super::signals::{self, ControlSignal};
use super::stage::{CycleOutcome, PipelineExecutor};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::metrics::Metrics;
use crate::plugin::Input;
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{self, AbortHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

/// Everything an input needs to feed the pipeline
#[derive(Clone)]
pub struct InputContext {
    name: String,
    pool: PackPool,
    executor: PipelineExecutor,
    events: EventBus,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl InputContext {
    pub fn new(
        name: impl Into<String>,
        pool: PackPool,
        executor: PipelineExecutor,
        events: EventBus,
        shutdown: CancellationToken,
        tracker: TaskTracker,
    ) -> Self {
        Self {
            name: name.into(),
            pool,
            executor,
            events,
            shutdown,
            tracker,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pool(&self) -> &PackPool {
        &self.pool
    }

    pub async fn acquire(&self) -> Result<PackGuard> {
        self.pool.acquire().await
    }

    pub fn try_acquire(&self) -> Option<PackGuard> {
        self.pool.try_acquire()
    }

    /// Wait for a pack; `None` once the pipeline is stopping
    pub async fn next_pack(&self) -> Option<PackGuard> {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => None,
            pack = self.pool.acquire() => pack.ok(),
        }
    }

    /// Run the cycle inside the calling task
    pub async fn deliver(&self, pack: PackGuard) -> CycleOutcome {
        self.executor.process(pack).await
    }

    /// Run the cycle on its own task; shutdown waits for it
    pub fn dispatch(&self, pack: PackGuard) {
        let executor = self.executor.clone();
        self.tracker.spawn(async move {
            executor.process(pack).await;
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    pub fn is_stopping(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Resolves once the pipeline starts draining
    pub async fn stopped(&self) {
        self.shutdown.cancelled().await
    }
}

impl fmt::Debug for InputContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputContext")
            .field("name", &self.name)
            .field("stopping", &self.is_stopping())
            .finish()
    }
}

/// How an input task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputExit {
    Finished,
    Failed(String),
    Panicked(String),
}

impl fmt::Display for InputExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputExit::Finished => f.write_str("finished"),
            InputExit::Failed(reason) => write!(f, "failed: {reason}"),
            InputExit::Panicked(reason) => write!(f, "panicked: {reason}"),
        }
    }
}

/// Runs one input, catching errors and panics so one bad input never takes down the others
pub struct InputRunner {
    name: String,
    input: Box<dyn Input>,
}

impl InputRunner {
    pub fn new(name: impl Into<String>, input: Box<dyn Input>) -> Self {
        Self {
            name: name.into(),
            input,
        }
    }

    pub async fn run(mut self, ctx: InputContext) -> InputExit {
        match AssertUnwindSafe(self.input.run(ctx)).catch_unwind().await {
            Ok(Ok(())) => {
                debug!(input = %self.name, "Input finished");
                InputExit::Finished
            }
            Ok(Err(e)) => {
                error!(input = %self.name, "Input failed: {}", e);
                InputExit::Failed(e.to_string())
            }
            Err(panic) => {
                let reason = panic_reason(panic.as_ref());
                error!(input = %self.name, "Input panicked: {}", reason);
                InputExit::Panicked(reason)
            }
        }
    }
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Starting,
    Running,
    Draining,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFailure {
    pub input: String,
    pub exit: InputExit,
}

/// Summary returned once the pipeline has fully drained
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub inputs_started: usize,
    /// Inputs drained, failed ones included
    pub inputs_drained: usize,
    pub failed: Vec<InputFailure>,
    pub reloads: usize,
    pub peak_outstanding: usize,
}

/// Running input tasks, named by task id so a task that dies still reports its input
struct InputTasks {
    set: JoinSet<InputExit>,
    names: HashMap<task::Id, String>,
}

impl InputTasks {
    fn new() -> Self {
        Self {
            set: JoinSet::new(),
            names: HashMap::new(),
        }
    }

    fn spawn<F>(&mut self, name: impl Into<String>, future: F) -> AbortHandle
    where
        F: Future<Output = InputExit> + Send + 'static,
    {
        let handle = self.set.spawn(future);
        self.names.insert(handle.id(), name.into());
        handle
    }

    fn len(&self) -> usize {
        self.set.len()
    }

    /// Wait for every task, recording each input that did not finish cleanly
    async fn drain(&mut self, report: &mut ShutdownReport) {
        while let Some(joined) = self.set.join_next_with_id().await {
            report.inputs_drained += 1;
            let (id, exit) = match joined {
                Ok((id, exit)) => (id, exit),
                Err(e) => {
                    error!("Input task aborted: {}", e);
                    (e.id(), InputExit::Panicked(e.to_string()))
                }
            };
            if exit != InputExit::Finished {
                let input = self.names.remove(&id).unwrap_or_default();
                report.failed.push(InputFailure { input, exit });
            }
        }
    }
}

pub struct Orchestrator {
    config: Arc<PipelineConfig>,
    metrics: Arc<Metrics>,
    events: EventBus,
    state: watch::Sender<RunState>,
}

impl Orchestrator {
    pub fn new(config: Arc<PipelineConfig>) -> Self {
        Self::with_metrics(config, Arc::new(Metrics::new()))
    }

    pub fn with_metrics(config: Arc<PipelineConfig>, metrics: Arc<Metrics>) -> Self {
        let (state, _) = watch::channel(RunState::Starting);
        Self {
            config,
            metrics,
            events: EventBus::default(),
            state,
        }
    }

    pub fn config(&self) -> &Arc<PipelineConfig> {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn state(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: RunState) {
        debug!(?state, "Pipeline state changed");
        self.state.send_replace(state);
    }

    /// Run until SIGINT or SIGTERM, reloading on SIGHUP
    pub async fn run(&self) -> Result<ShutdownReport> {
        let signals = signals::listen()?;
        self.run_with_signals(signals).await
    }

    /// Run until `signals` yields [`ControlSignal::Interrupt`] or closes
    pub async fn run_with_signals(
        &self,
        mut signals: mpsc::Receiver<ControlSignal>,
    ) -> Result<ShutdownReport> {
        self.set_state(RunState::Starting);
        let pool = PackPool::new(&self.config, Arc::clone(&self.metrics))?;
        let executor = PipelineExecutor::new(Arc::clone(&self.metrics));
        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();
        let mut inputs = InputTasks::new();

        info!(
            pool_size = pool.size(),
            inputs = self.config.inputs.len(),
            "Starting pipeline"
        );

        for (name, wrapper) in &self.config.inputs {
            let ctx = InputContext::new(
                name.clone(),
                pool.clone(),
                executor.clone(),
                self.events.clone(),
                shutdown.clone(),
                tracker.clone(),
            );
            let runner = InputRunner::new(name.clone(), wrapper.create());
            inputs.spawn(name.clone(), async move { runner.run(ctx).await });
            info!(input = %name, "Input started");
        }
        let inputs_started = inputs.len();

        self.set_state(RunState::Running);
        let mut reloads = 0;
        loop {
            match signals.recv().await.unwrap_or(ControlSignal::Interrupt) {
                ControlSignal::Hangup => {
                    info!("Reloading plugins");
                    broadcast_with_metrics(
                        &self.config,
                        &self.events,
                        PipelineEvent::Reload,
                        &self.metrics,
                    );
                    reloads += 1;
                }
                ControlSignal::Interrupt => {
                    info!("Shutdown initiated");
                    broadcast_with_metrics(
                        &self.config,
                        &self.events,
                        PipelineEvent::Stop,
                        &self.metrics,
                    );
                    break;
                }
            }
        }

        self.set_state(RunState::Draining);
        shutdown.cancel();

        let mut report = ShutdownReport {
            inputs_started,
            reloads,
            ..ShutdownReport::default()
        };
        inputs.drain(&mut report).await;
        debug!(drained = report.inputs_drained, "Inputs drained");

        tracker.close();
        tracker.wait().await;

        report.peak_outstanding = pool.peak_outstanding();
        self.set_state(RunState::Stopped);
        info!(
            inputs = report.inputs_drained,
            failed = report.failed.len(),
            "Shutdown complete"
        );
        Ok(report)
    }
}
