use crate::error::PluginError;
use crate::pipeline::{PackState, PipelineEvent};
use crate::plugin::registry::{parse_settings, PluginSettings};
use crate::plugin::{Filter, FilterWrapper, PluginGlobal, PluginWrapper};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Default)]
pub struct NoopFilter;

impl Filter for NoopFilter {
    fn filter_msg(&mut self, _pack: &mut PackState) {}
}

/// Blocks messages whose type is listed; with an empty list, blocks everything
#[derive(Debug, Clone, Default)]
pub struct BlockFilter {
    message_types: HashSet<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockFilterSettings {
    #[serde(default)]
    message_types: Vec<String>,
}

impl BlockFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_types<I>(types: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            message_types: types.into_iter().map(Into::into).collect(),
        }
    }
}

impl Filter for BlockFilter {
    fn filter_msg(&mut self, pack: &mut PackState) {
        if self.message_types.is_empty() || self.message_types.contains(&pack.message.msg_type) {
            pack.blocked = true;
        }
    }
}

/// Message tally shared by every [`CounterFilter`] instance of one wrapper
#[derive(Debug)]
pub struct CounterGlobal {
    name: String,
    count: AtomicU64,
    total: AtomicU64,
}

impl CounterGlobal {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            count: AtomicU64::new(0),
            total: AtomicU64::new(0),
        }
    }

    /// Messages seen since the last reload
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

impl PluginGlobal for CounterGlobal {
    fn event(&self, event: PipelineEvent) -> Result<(), PluginError> {
        match event {
            PipelineEvent::Reload => {
                let count = self.count.swap(0, Ordering::Relaxed);
                info!(filter = %self.name, count, "Counter reset on reload");
            }
            PipelineEvent::Stop => {
                info!(filter = %self.name, total = self.total(), "Final message count");
            }
        }
        Ok(())
    }
}

pub struct CounterFilter {
    global: Arc<CounterGlobal>,
}

impl CounterFilter {
    pub fn new(global: Arc<CounterGlobal>) -> Self {
        Self { global }
    }
}

impl Filter for CounterFilter {
    fn filter_msg(&mut self, _pack: &mut PackState) {
        self.global.count.fetch_add(1, Ordering::Relaxed);
        self.global.total.fetch_add(1, Ordering::Relaxed);
    }
}

pub(super) fn noop_filter(
    name: &str,
    _settings: &PluginSettings,
) -> Result<FilterWrapper, PluginError> {
    Ok(PluginWrapper::new(name, || Box::new(NoopFilter) as Box<dyn Filter>))
}

pub(super) fn block_filter(
    name: &str,
    settings: &PluginSettings,
) -> Result<FilterWrapper, PluginError> {
    let settings: BlockFilterSettings = parse_settings(name, settings)?;
    let template = BlockFilter::for_types(settings.message_types);
    Ok(PluginWrapper::new(name, move || {
        Box::new(template.clone()) as Box<dyn Filter>
    }))
}

pub(super) fn counter_filter(
    name: &str,
    _settings: &PluginSettings,
) -> Result<FilterWrapper, PluginError> {
    let global = Arc::new(CounterGlobal::new(name));
    Ok(PluginWrapper::with_global(name, global, |global| {
        Box::new(CounterFilter::new(global)) as Box<dyn Filter>
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::pack_state;

    #[test]
    fn test_block_filter_all() {
        let mut state = pack_state();
        BlockFilter::all().filter_msg(&mut state);
        assert!(state.blocked);
    }

    #[test]
    fn test_block_filter_by_type() {
        let mut filter = BlockFilter::for_types(["debug"]);

        let mut state = pack_state();
        state.message.msg_type = "error".to_string();
        filter.filter_msg(&mut state);
        assert!(!state.blocked);

        state.message.msg_type = "debug".to_string();
        filter.filter_msg(&mut state);
        assert!(state.blocked);
    }

    #[test]
    fn test_counter_instances_share_global() {
        let wrapper = counter_filter("counter", &PluginSettings::new()).unwrap();
        let mut a = wrapper.create();
        let mut b = wrapper.create();

        let mut state = pack_state();
        a.filter_msg(&mut state);
        b.filter_msg(&mut state);
        b.filter_msg(&mut state);
        assert!(!state.blocked);

        let global = wrapper.global().unwrap();
        global.event(PipelineEvent::Reload).unwrap();
        a.filter_msg(&mut state);
        global.event(PipelineEvent::Stop).unwrap();
    }

    #[test]
    fn test_counter_global_reload_resets_window() {
        let global = Arc::new(CounterGlobal::new("counter"));
        let mut filter = CounterFilter::new(global.clone());
        let mut state = pack_state();

        filter.filter_msg(&mut state);
        filter.filter_msg(&mut state);
        assert_eq!(global.count(), 2);

        global.event(PipelineEvent::Reload).unwrap();
        assert_eq!(global.count(), 0);
        assert_eq!(global.total(), 2);

        filter.filter_msg(&mut state);
        assert_eq!(global.count(), 1);
        assert_eq!(global.total(), 3);
    }
}
