#![allow(dead_code)]

use async_trait::async_trait;
use pipeline_pack::config::{FilterChain, PipelineConfig};
use pipeline_pack::error::PluginError;
use pipeline_pack::pipeline::{InputContext, PackState, PipelineEvent};
use pipeline_pack::plugin::builtin::JsonDecoder;
use pipeline_pack::plugin::{
    Decoder, Filter, FilterWrapper, Input, InputWrapper, Output, OutputWrapper, PluginGlobal,
    PluginWrapper,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Ordered record of which plugins ran, e.g. `filter:noop`, `output:out1`
#[derive(Clone, Default)]
pub struct Trace {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Trace {
    pub fn push(&self, entry: String) {
        self.entries.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }

    pub fn tracing_filter(&self, name: &str) -> FilterWrapper {
        let trace = self.clone();
        let label = format!("filter:{name}");
        PluginWrapper::new(name, move || {
            Box::new(TracingFilter {
                trace: trace.clone(),
                label: label.clone(),
            }) as Box<dyn Filter>
        })
    }

    pub fn output(&self, name: &str) -> OutputWrapper {
        self.slow_output(name, Duration::ZERO)
    }

    /// Output that sleeps before recording, keeping cycles in flight
    pub fn slow_output(&self, name: &str, delay: Duration) -> OutputWrapper {
        let trace = self.clone();
        let label = format!("output:{name}");
        PluginWrapper::new(name, move || {
            Box::new(TracingOutput {
                trace: trace.clone(),
                label: label.clone(),
                delay,
            }) as Box<dyn Output>
        })
    }
}

struct TracingFilter {
    trace: Trace,
    label: String,
}

impl Filter for TracingFilter {
    fn filter_msg(&mut self, _pack: &mut PackState) {
        self.trace.push(self.label.clone());
    }
}

struct TracingOutput {
    trace: Trace,
    label: String,
    delay: Duration,
}

#[async_trait]
impl Output for TracingOutput {
    async fn deliver(&mut self, pack: &PackState) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.trace
            .push(format!("{}:{}", self.label, pack.message.payload));
    }
}

/// Global that remembers every lifecycle event it saw
#[derive(Default)]
pub struct EventLogGlobal {
    events: Mutex<Vec<PipelineEvent>>,
}

impl EventLogGlobal {
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl PluginGlobal for EventLogGlobal {
    fn event(&self, event: PipelineEvent) -> Result<(), PluginError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

pub fn json_decoder() -> PluginWrapper<dyn Decoder> {
    PluginWrapper::new("json", || Box::new(JsonDecoder) as Box<dyn Decoder>)
}

pub fn no_filters() -> Vec<String> {
    Vec::new()
}

/// JSON decoder and a default chain delivering to `out1`
pub fn base_config(trace: &Trace, pool_size: usize) -> pipeline_pack::config::PipelineConfigBuilder {
    PipelineConfig::builder()
        .pool_size(pool_size)
        .decoder(json_decoder())
        .output(trace.output("out1"))
        .chain("default", FilterChain::new(no_filters(), ["out1"]))
}

pub fn event(msg_type: &str, payload: &str) -> Vec<u8> {
    serde_json::json!({ "type": msg_type, "payload": payload })
        .to_string()
        .into_bytes()
}

/// Feeds fixed payloads into the pipeline, then idles until stopped
pub struct ScriptedInput {
    payloads: Vec<Vec<u8>>,
    dispatch: bool,
    sent: Arc<AtomicUsize>,
}

impl ScriptedInput {
    pub fn wrapper(
        name: &str,
        payloads: Vec<Vec<u8>>,
        dispatch: bool,
        sent: Arc<AtomicUsize>,
    ) -> InputWrapper {
        PluginWrapper::new(name, move || {
            Box::new(ScriptedInput {
                payloads: payloads.clone(),
                dispatch,
                sent: sent.clone(),
            }) as Box<dyn Input>
        })
    }
}

#[async_trait]
impl Input for ScriptedInput {
    async fn run(&mut self, ctx: InputContext) -> Result<(), PluginError> {
        for payload in &self.payloads {
            let Some(mut pack) = ctx.next_pack().await else {
                return Ok(());
            };
            pack.state.set_payload(payload);
            if self.dispatch {
                ctx.dispatch(pack);
            } else {
                ctx.deliver(pack).await;
            }
            self.sent.fetch_add(1, Ordering::SeqCst);
        }
        ctx.stopped().await;
        Ok(())
    }
}

/// Poll `check` until it holds, failing the test after five seconds
pub async fn eventually<F: Fn() -> bool>(check: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
