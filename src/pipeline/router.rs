use super::pack::PackState;
use super::stage::CycleError;
use crate::config::{FilterChain, PipelineConfig};
use tracing::{debug, error};

/// Pick the filter chain for a decoded pack and select the chain's outputs
///
/// A lookup miss keeps whatever chain the pack carried in, which is the
/// configured default unless a decoder or input chose otherwise. An unknown
/// chain name aborts the cycle.
pub fn resolve_chain<'c>(
    config: &'c PipelineConfig,
    pack: &mut PackState,
) -> Result<&'c FilterChain, CycleError> {
    pack.output_names.clear();

    if let Some(name) = config.lookup.locate_chain(&pack.message) {
        debug!(chain = %name, msg_type = %pack.message.msg_type, "Chain located");
        pack.filter_chain = name;
    }

    let Some(chain) = config.chain(&pack.filter_chain) else {
        error!(chain = %pack.filter_chain, "Filter chain not found");
        return Err(CycleError::ChainNotFound(pack.filter_chain.clone()));
    };

    pack.output_names.extend(chain.outputs.iter().cloned());
    pack.chain_count += 1;
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use crate::plugin::MockChainLookup;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn config(lookup: MockChainLookup) -> Arc<PipelineConfig> {
        Arc::new(
            PipelineConfig::builder()
                .default_filter_chain("default")
                .chain("default", FilterChain::new(["f1"], ["out1"]))
                .chain("errors", FilterChain::new(["f2"], ["out1", "out2"]))
                .lookup(Arc::new(lookup))
                .build(),
        )
    }

    #[test]
    fn test_lookup_match_overrides_chain() {
        let mut lookup = MockChainLookup::new();
        lookup
            .expect_locate_chain()
            .withf(|msg: &Message| msg.msg_type == "error")
            .times(1)
            .returning(|_| Some("errors".to_string()));
        let config = config(lookup);
        let mut state = PackState::new(config.clone());
        state.message = Message::new("error", "");

        let chain = resolve_chain(&config, &mut state).unwrap();
        assert_eq!(chain.filters, vec!["f2"]);
        assert_eq!(state.filter_chain, "errors");
        assert_eq!(
            state.output_names,
            HashSet::from(["out1".to_string(), "out2".to_string()])
        );
        assert_eq!(state.chain_count, 1);
    }

    #[test]
    fn test_lookup_miss_keeps_default() {
        let mut lookup = MockChainLookup::new();
        lookup.expect_locate_chain().returning(|_| None);
        let config = config(lookup);
        let mut state = PackState::new(config.clone());
        state.output_names.insert("stale".to_string());

        resolve_chain(&config, &mut state).unwrap();
        assert_eq!(state.filter_chain, "default");
        assert_eq!(state.output_names, HashSet::from(["out1".to_string()]));
    }

    #[test]
    fn test_unknown_chain_aborts() {
        let mut lookup = MockChainLookup::new();
        lookup
            .expect_locate_chain()
            .returning(|_| Some("missing".to_string()));
        let config = config(lookup);
        let mut state = PackState::new(config.clone());

        let err = resolve_chain(&config, &mut state).unwrap_err();
        assert!(matches!(err, CycleError::ChainNotFound(name) if name == "missing"));
        assert!(state.output_names.is_empty());
        assert_eq!(state.chain_count, 0);
    }
}
