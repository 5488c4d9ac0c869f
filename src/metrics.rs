use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::time::Duration;

pub struct Metrics {
    registry: Registry,

    // Message flow
    pub messages_processed: IntCounter,
    pub decode_errors: IntCounter,
    pub routing_errors: IntCounter,
    pub blocked_messages: IntCounter,
    pub deliveries: IntCounter,
    pub missing_outputs: IntCounter,
    pub cycle_duration: Histogram,

    // Pool
    pub packs_in_flight: IntGauge,

    // Control plane
    pub broadcasts: IntCounter,
    pub broadcast_failures: IntCounter,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn counter(name: &str, help: &str) -> IntCounter {
    IntCounter::new(name, help).expect("metric creation failed")
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let messages_processed = counter(
            "pipeline_messages_processed_total",
            "Total number of processing cycles run",
        );
        let decode_errors = counter(
            "pipeline_decode_errors_total",
            "Messages dropped because decoding failed",
        );
        let routing_errors = counter(
            "pipeline_routing_errors_total",
            "Cycles aborted by a missing decoder, chain or filter",
        );
        let blocked_messages = counter(
            "pipeline_blocked_messages_total",
            "Messages blocked by a filter",
        );
        let deliveries = counter(
            "pipeline_deliveries_total",
            "Total number of output deliveries",
        );
        let missing_outputs = counter(
            "pipeline_missing_outputs_total",
            "Selected outputs with no instance on the pack",
        );
        let cycle_duration = Histogram::with_opts(HistogramOpts::new(
            "pipeline_cycle_duration_seconds",
            "Processing cycle duration in seconds",
        ))
        .expect("metric creation failed");

        let packs_in_flight = IntGauge::new(
            "pipeline_packs_in_flight",
            "Number of packs currently held outside the pool",
        )
        .expect("metric creation failed");

        let broadcasts = counter(
            "pipeline_broadcasts_total",
            "Total number of lifecycle events broadcast",
        );
        let broadcast_failures = counter(
            "pipeline_broadcast_failures_total",
            "Plugin globals that failed to handle a lifecycle event",
        );

        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(messages_processed.clone()),
            Box::new(decode_errors.clone()),
            Box::new(routing_errors.clone()),
            Box::new(blocked_messages.clone()),
            Box::new(deliveries.clone()),
            Box::new(missing_outputs.clone()),
            Box::new(cycle_duration.clone()),
            Box::new(packs_in_flight.clone()),
            Box::new(broadcasts.clone()),
            Box::new(broadcast_failures.clone()),
        ];
        for collector in collectors {
            registry
                .register(collector)
                .expect("metric registration failed");
        }

        Self {
            registry,
            messages_processed,
            decode_errors,
            routing_errors,
            blocked_messages,
            deliveries,
            missing_outputs,
            cycle_duration,
            packs_in_flight,
            broadcasts,
            broadcast_failures,
        }
    }

    pub fn record_cycle(&self, duration: Duration) {
        self.messages_processed.inc();
        self.cycle_duration.observe(duration.as_secs_f64());
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.inc();
    }

    pub fn record_routing_error(&self) {
        self.routing_errors.inc();
    }

    pub fn record_blocked(&self) {
        self.blocked_messages.inc();
    }

    pub fn record_delivery(&self) {
        self.deliveries.inc();
    }

    pub fn record_missing_output(&self) {
        self.missing_outputs.inc();
    }

    pub fn record_broadcast(&self, failures: usize) {
        self.broadcasts.inc();
        self.broadcast_failures.inc_by(failures as u64);
    }

    pub fn set_packs_in_flight(&self, count: usize) {
        self.packs_in_flight.set(count as i64);
    }

    pub fn gather_metrics(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// Render every metric in the Prometheus text exposition format
    pub fn gather_text(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.gather_metrics(), &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}
