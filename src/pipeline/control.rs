//! Lifecycle events and their fan-out to plugins
//!
//! Events travel two ways: they are published on the [`EventBus`] for any
//! task that subscribed (inputs, typically), and delivered synchronously to
//! the shared global of every filter and output wrapper.

use crate::config::PipelineConfig;
use crate::metrics::Metrics;
use std::fmt;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineEvent {
    Reload,
    Stop,
}

impl PipelineEvent {
    /// Topic the event is published under
    pub fn topic(self) -> &'static str {
        match self {
            PipelineEvent::Reload => "reload",
            PipelineEvent::Stop => "stop",
        }
    }
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.topic())
    }
}

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("No subscribers for '{0}' event")]
    NoSubscribers(PipelineEvent),
}

/// Process-local pub/sub for lifecycle events
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

const DEFAULT_BUS_CAPACITY: usize = 16;

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of subscribers reached
    pub fn publish(&self, event: PipelineEvent) -> Result<usize, ControlError> {
        self.sender
            .send(event)
            .map_err(|_| ControlError::NoSubscribers(event))
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// What a broadcast reached
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub published: bool,
    pub notified: usize,
    /// Names of plugins whose global rejected the event
    pub failed: Vec<String>,
}

/// Publish `event` on the bus, then deliver it to every filter and output global
///
/// A failing global is logged and skipped; the rest are still notified.
pub fn broadcast_event(
    config: &PipelineConfig,
    bus: &EventBus,
    event: PipelineEvent,
) -> BroadcastReport {
    let mut report = BroadcastReport::default();

    match bus.publish(event) {
        Ok(subscribers) => {
            debug!(%event, subscribers, "Event published");
            report.published = true;
        }
        Err(e) => warn!(%event, "Event not published: {}", e),
    }

    let globals = config
        .filters
        .values()
        .filter_map(|w| w.global().map(|g| (w.name(), g)))
        .chain(
            config
                .outputs
                .values()
                .filter_map(|w| w.global().map(|g| (w.name(), g))),
        );

    for (name, global) in globals {
        report.notified += 1;
        if let Err(e) = global.event(event) {
            error!(plugin = %name, %event, "Plugin event handling failed: {}", e);
            report.failed.push(name.to_string());
        }
    }

    info!(
        %event,
        notified = report.notified,
        failed = report.failed.len(),
        "Event broadcast"
    );
    report
}

/// [`broadcast_event`] plus broadcast metrics
pub(crate) fn broadcast_with_metrics(
    config: &PipelineConfig,
    bus: &EventBus,
    event: PipelineEvent,
    metrics: &Metrics,
) -> BroadcastReport {
    let report = broadcast_event(config, bus, event);
    metrics.record_broadcast(report.failed.len());
    report
}
