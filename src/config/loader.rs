use super::schema::{PluginSection, Settings};
use crate::error::{ConfigError, Result};
use figment::{
    providers::{Env, Format, Json, Toml, Yaml},
    Figment,
};
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;

const ENV_PREFIX: &str = "PIPELINE_";

pub async fn load_from_env_or_file() -> Result<Settings> {
    let settings: Settings = Figment::new()
        .merge(Toml::file("pipeline.toml"))
        .merge(Json::file("pipeline.json"))
        .merge(Yaml::file("pipeline.yaml"))
        .merge(Yaml::file("pipeline.yml"))
        // Scalar overrides, e.g. PIPELINE_POOL_SIZE=200
        .merge(env_overrides(ENV_PREFIX))
        .extract()
        .map_err(|e| ConfigError::Parse(e.to_string()))?;

    finish(settings)
}

pub async fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Settings> {
    load_file(path.as_ref(), ENV_PREFIX)
}

fn load_file(path: &Path, env_prefix: &str) -> Result<Settings> {

    let figment = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => Figment::new().merge(Toml::file(path)),
        Some("json") => Figment::new().merge(Json::file(path)),
        Some("yaml") | Some("yml") => Figment::new().merge(Yaml::file(path)),
        _ => {
            return Err(ConfigError::Parse(
                "Unsupported config file format. Use .toml, .json, .yaml, or .yml".into(),
            )
            .into())
        }
    };

    let settings: Settings = figment
        .merge(env_overrides(env_prefix))
        .extract()
        .map_err(|e| ConfigError::Parse(e.to_string()))?;

    finish(settings)
}

/// Env provider whose keys match the file's camelCase names
///
/// figment hands keys over lowercased (`POOL_SIZE` becomes `pool_size`), so
/// they are rewritten to `poolSize` before merging over the file.
fn env_overrides(prefix: &str) -> Env {
    Env::prefixed(prefix).map(|key| camel_case(key.as_str()).into())
}

fn camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for c in key.chars() {
        if c == '_' {
            upper = !out.is_empty();
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn finish(settings: Settings) -> Result<Settings> {
    validate(&settings)?;
    apply_env_substitutions(settings)
}

pub fn validate(settings: &Settings) -> Result<()> {
    if settings.pool_size == 0 {
        return Err(ConfigError::Validation("Pool size must be greater than 0".into()).into());
    }

    if settings.max_message_size == 0 {
        return Err(
            ConfigError::Validation("Max message size must be greater than 0".into()).into(),
        );
    }

    if !settings.decoders.contains_key(&settings.default_decoder) {
        return Err(ConfigError::Validation(format!(
            "Default decoder '{}' is not configured",
            settings.default_decoder
        ))
        .into());
    }

    if !settings.chains.contains_key(&settings.default_filter_chain) {
        return Err(ConfigError::Validation(format!(
            "Default filter chain '{}' is not configured",
            settings.default_filter_chain
        ))
        .into());
    }

    let mut claimed_types = HashSet::new();
    for (name, chain) in &settings.chains {
        for filter in &chain.filters {
            if !settings.filters.contains_key(filter) {
                return Err(ConfigError::Validation(format!(
                    "Chain '{name}' references unknown filter '{filter}'"
                ))
                .into());
            }
        }

        for output in &chain.outputs {
            if !settings.outputs.contains_key(output) {
                return Err(ConfigError::Validation(format!(
                    "Chain '{name}' references unknown output '{output}'"
                ))
                .into());
            }
        }

        for msg_type in &chain.message_types {
            if !claimed_types.insert(msg_type.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Message type '{msg_type}' is routed to more than one chain"
                ))
                .into());
            }
        }
    }

    Ok(())
}

fn apply_env_substitutions(mut settings: Settings) -> Result<Settings> {
    let pattern = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::Parse(e.to_string()))?;

    let sections = settings
        .decoders
        .values_mut()
        .chain(settings.filters.values_mut())
        .chain(settings.outputs.values_mut())
        .chain(settings.inputs.values_mut());

    for section in sections {
        substitute_section(&pattern, section)?;
    }

    Ok(settings)
}

fn substitute_section(pattern: &Regex, section: &mut PluginSection) -> Result<()> {
    for value in section.settings.values_mut() {
        substitute_value(pattern, value)?;
    }
    Ok(())
}

fn substitute_value(pattern: &Regex, value: &mut serde_json::Value) -> Result<()> {
    match value {
        serde_json::Value::String(s) => *s = substitute_env_vars(pattern, s)?,
        serde_json::Value::Array(items) => {
            for item in items {
                substitute_value(pattern, item)?;
            }
        }
        serde_json::Value::Object(map) => {
            for item in map.values_mut() {
                substitute_value(pattern, item)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn substitute_env_vars(pattern: &Regex, input: &str) -> Result<String> {
    let mut result = input.to_string();

    for cap in pattern.captures_iter(input) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(value) => {
                result = result.replace(&cap[0], &value);
            }
            Err(_) => {
                // ${VAR:-default}
                if let Some((name, default)) = var_name.split_once(":-") {
                    match std::env::var(name) {
                        Ok(value) => result = result.replace(&cap[0], &value),
                        Err(_) => result = result.replace(&cap[0], default),
                    }
                } else {
                    return Err(ConfigError::EnvVar(format!(
                        "Environment variable '{var_name}' not found"
                    ))
                    .into());
                }
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ChainSection;
    use crate::error::PipelineError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn pattern() -> Regex {
        Regex::new(r"\$\{([^}]+)\}").unwrap()
    }

    fn minimal_settings() -> Settings {
        let mut settings = Settings::default();
        settings
            .decoders
            .insert("json".to_string(), PluginSection::new("JsonDecoder"));
        settings
            .outputs
            .insert("out1".to_string(), PluginSection::new("LogOutput"));
        settings.chains.insert(
            "default".to_string(),
            ChainSection {
                outputs: vec!["out1".to_string()],
                ..ChainSection::default()
            },
        );
        settings
    }

    #[test]
    fn test_env_substitution() {
        std::env::set_var("PIPELINE_TEST_VAR", "test_value");

        let result = substitute_env_vars(&pattern(), "Hello ${PIPELINE_TEST_VAR}!").unwrap();
        assert_eq!(result, "Hello test_value!");

        let result = substitute_env_vars(&pattern(), "${PIPELINE_MISSING:-default}").unwrap();
        assert_eq!(result, "default");

        assert!(substitute_env_vars(&pattern(), "${PIPELINE_NOT_SET_ANYWHERE}").is_err());

        std::env::remove_var("PIPELINE_TEST_VAR");
    }

    #[test]
    fn test_validate_accepts_minimal_settings() {
        assert!(validate(&minimal_settings()).is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_pool() {
        let mut settings = minimal_settings();
        settings.pool_size = 0;
        assert!(matches!(
            validate(&settings),
            Err(PipelineError::Config(ConfigError::Validation(_)))
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_chain_output() {
        let mut settings = minimal_settings();
        settings
            .chains
            .get_mut("default")
            .unwrap()
            .outputs
            .push("missing".to_string());
        let err = validate(&settings).unwrap_err();
        assert!(err.to_string().contains("unknown output 'missing'"));
    }

    #[test]
    fn test_validate_rejects_duplicate_message_type() {
        let mut settings = minimal_settings();
        settings.chains.get_mut("default").unwrap().message_types = vec!["a".to_string()];
        settings.chains.insert(
            "other".to_string(),
            ChainSection {
                message_types: vec!["a".to_string()],
                ..ChainSection::default()
            },
        );
        assert!(validate(&settings).is_err());
    }

    #[test]
    fn test_validate_rejects_missing_default_decoder() {
        let mut settings = minimal_settings();
        settings.default_decoder = "protobuf".to_string();
        let err = validate(&settings).unwrap_err();
        assert!(err.to_string().contains("protobuf"));
    }

    #[tokio::test]
    async fn test_load_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            file,
            r#"
poolSize: 4
defaultDecoder: json
decoders:
  json:
    type: JsonDecoder
outputs:
  out1:
    type: LogOutput
    payloadOnly: true
chains:
  default:
    outputs: [out1]
  errors:
    messageTypes: [error]
    outputs: [out1]
"#
        )
        .unwrap();

        let settings = load_from_path(file.path()).await.unwrap();
        assert_eq!(settings.pool_size, 4);
        assert_eq!(settings.max_message_size, 65536);
        assert_eq!(settings.default_filter_chain, "default");
        assert_eq!(settings.chains["errors"].message_types, vec!["error"]);
        assert_eq!(
            settings.outputs["out1"].settings.get("payloadOnly"),
            Some(&serde_json::json!(true))
        );
    }

    #[tokio::test]
    async fn test_load_substitutes_plugin_settings() {
        std::env::set_var("PIPELINE_TEST_OUT_PATH", "/tmp/out.log");
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[decoders.json]
type = "JsonDecoder"

[outputs.file]
type = "FileOutput"
path = "${{PIPELINE_TEST_OUT_PATH}}"

[chains.default]
outputs = ["file"]
"#
        )
        .unwrap();

        let settings = load_from_path(file.path()).await.unwrap();
        assert_eq!(
            settings.outputs["file"].settings.get("path"),
            Some(&serde_json::json!("/tmp/out.log"))
        );
        std::env::remove_var("PIPELINE_TEST_OUT_PATH");
    }

    #[test]
    fn test_camel_case_env_keys() {
        assert_eq!(camel_case("pool_size"), "poolSize");
        assert_eq!(camel_case("default_filter_chain"), "defaultFilterChain");
        assert_eq!(camel_case("decoders"), "decoders");
    }

    #[test]
    fn test_env_overrides_file_value() {
        // Own prefix so parallel loads never see this variable
        std::env::set_var("PIPELINE_OVERRIDE_TEST_POOL_SIZE", "200");
        std::env::set_var("PIPELINE_OVERRIDE_TEST_DEFAULT_FILTER_CHAIN", "errors");
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
poolSize = 4
defaultFilterChain = "default"

[decoders.json]
type = "JsonDecoder"

[outputs.out1]
type = "LogOutput"

[chains.default]
outputs = ["out1"]

[chains.errors]
outputs = ["out1"]
"#
        )
        .unwrap();

        let result = load_file(file.path(), "PIPELINE_OVERRIDE_TEST_");
        std::env::remove_var("PIPELINE_OVERRIDE_TEST_POOL_SIZE");
        std::env::remove_var("PIPELINE_OVERRIDE_TEST_DEFAULT_FILTER_CHAIN");

        let settings = result.unwrap();
        assert_eq!(settings.pool_size, 200);
        assert_eq!(settings.default_filter_chain, "errors");
        assert_eq!(settings.max_message_size, 65536);
    }

    #[tokio::test]
    async fn test_load_rejects_unknown_extension() {
        let file = NamedTempFile::new().unwrap();
        assert!(matches!(
            load_from_path(file.path()).await,
            Err(PipelineError::Config(ConfigError::Parse(_)))
        ));
    }
}
