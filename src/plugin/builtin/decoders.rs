use crate::error::{DecodeError, PluginError};
use crate::pipeline::PackState;
use crate::plugin::registry::{parse_settings, PluginSettings};
use crate::plugin::{Decoder, DecoderWrapper, PluginWrapper};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

/// Parses the buffer as a JSON-encoded [`crate::message::Message`]
#[derive(Debug, Default)]
pub struct JsonDecoder;

impl Decoder for JsonDecoder {
    fn decode(&mut self, pack: &mut PackState) -> Result<(), DecodeError> {
        if pack.msg_bytes.is_empty() {
            return Err(DecodeError::Empty);
        }
        pack.message = serde_json::from_slice(&pack.msg_bytes)?;
        Ok(())
    }
}

/// Wraps the raw buffer, as text, into the payload of a fresh message
#[derive(Debug, Clone)]
pub struct PayloadDecoder {
    msg_type: String,
    hostname: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayloadDecoderSettings {
    #[serde(default = "default_payload_type")]
    msg_type: String,
    #[serde(default)]
    hostname: String,
}

fn default_payload_type() -> String {
    "raw".to_string()
}

impl PayloadDecoder {
    pub fn new(msg_type: impl Into<String>) -> Self {
        Self {
            msg_type: msg_type.into(),
            hostname: String::new(),
        }
    }
}

impl Decoder for PayloadDecoder {
    fn decode(&mut self, pack: &mut PackState) -> Result<(), DecodeError> {
        let text = std::str::from_utf8(&pack.msg_bytes)
            .map_err(|e| DecodeError::Malformed(format!("payload is not UTF-8: {e}")))?;

        let message = &mut pack.message;
        message.clear();
        message.uuid = Uuid::new_v4();
        message.timestamp = Utc::now();
        message.msg_type.push_str(&self.msg_type);
        message.hostname.push_str(&self.hostname);
        message.payload.push_str(text.trim_end_matches(['\r', '\n']));
        Ok(())
    }
}

pub(super) fn json_decoder(
    name: &str,
    _settings: &PluginSettings,
) -> Result<DecoderWrapper, PluginError> {
    Ok(PluginWrapper::new(name, || {
        Box::new(JsonDecoder) as Box<dyn Decoder>
    }))
}

pub(super) fn payload_decoder(
    name: &str,
    settings: &PluginSettings,
) -> Result<DecoderWrapper, PluginError> {
    let settings: PayloadDecoderSettings = parse_settings(name, settings)?;
    let template = PayloadDecoder {
        msg_type: settings.msg_type,
        hostname: settings.hostname,
    };
    Ok(PluginWrapper::new(name, move || {
        Box::new(template.clone()) as Box<dyn Decoder>
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::pack_state;

    #[test]
    fn test_json_decoder() {
        let mut state = pack_state();
        state.set_payload(br#"{"type":"login","payload":"alice","fields":{"ok":true}}"#);

        JsonDecoder.decode(&mut state).unwrap();
        assert_eq!(state.message.msg_type, "login");
        assert_eq!(state.message.payload, "alice");
        assert_eq!(state.message.field("ok"), Some(&serde_json::json!(true)));
    }

    #[test]
    fn test_json_decoder_rejects_garbage() {
        let mut state = pack_state();
        state.set_payload(b"not json");
        assert!(matches!(
            JsonDecoder.decode(&mut state),
            Err(DecodeError::Json(_))
        ));

        state.set_payload(b"");
        assert!(matches!(JsonDecoder.decode(&mut state), Err(DecodeError::Empty)));
    }

    #[test]
    fn test_payload_decoder() {
        let mut state = pack_state();
        state.set_payload(b"disk full\n");

        PayloadDecoder::new("syslog").decode(&mut state).unwrap();
        assert_eq!(state.message.msg_type, "syslog");
        assert_eq!(state.message.payload, "disk full");
        assert!(!state.message.uuid.is_nil());
    }

    #[test]
    fn test_payload_decoder_rejects_invalid_utf8() {
        let mut state = pack_state();
        state.set_payload(&[0xff, 0xfe]);
        assert!(matches!(
            PayloadDecoder::new("raw").decode(&mut state),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_payload_decoder_settings() {
        let settings = crate::config::PluginSection::new("PayloadDecoder")
            .with("msgType", serde_json::json!("nginx"))
            .settings;
        let wrapper = payload_decoder("nginx-raw", &settings).unwrap();

        let mut state = pack_state();
        state.set_payload(b"GET /");
        wrapper.create().decode(&mut state).unwrap();
        assert_eq!(state.message.msg_type, "nginx");
    }
}
