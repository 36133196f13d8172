use std::env;
use std::fs;
use std::path::Path;

use sdr_assist_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(format!("- {} = {} (source: {source})", field.key, field.value));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let assistant = &config.assistant;
    let crm = &config.crm;
    let scheduling = &config.scheduling;

    vec![
        Field {
            key: "assistant.api_key",
            value: redact_token(assistant.api_key.expose_secret()),
            env_keys: &["OPENAI_API_KEY"],
        },
        Field {
            key: "assistant.assistant_id",
            value: or_unset(assistant.assistant_id.as_deref()),
            env_keys: &["ASSISTANT_ID"],
        },
        Field {
            key: "assistant.base_url",
            value: assistant.base_url.clone(),
            env_keys: &["OPENAI_BASE_URL"],
        },
        Field {
            key: "assistant.poll_interval_ms",
            value: assistant.poll_interval_ms.to_string(),
            env_keys: &["SDR_ASSISTANT_POLL_INTERVAL_MS"],
        },
        Field {
            key: "assistant.max_stalled_polls",
            value: assistant.max_stalled_polls.to_string(),
            env_keys: &["SDR_ASSISTANT_MAX_STALLED_POLLS"],
        },
        Field {
            key: "assistant.timeout_secs",
            value: assistant.timeout_secs.to_string(),
            env_keys: &["SDR_ASSISTANT_TIMEOUT_SECS"],
        },
        Field {
            key: "crm.api_key",
            value: redact_optional(crm.api_key.as_ref()),
            env_keys: &["PIPEFY_API_KEY"],
        },
        Field {
            key: "crm.pipe_id",
            value: or_unset(crm.pipe_id.as_deref()),
            env_keys: &["PIPEFY_PIPE_ID"],
        },
        Field { key: "crm.api_url", value: crm.api_url.clone(), env_keys: &["PIPEFY_API_URL"] },
        Field {
            key: "scheduling.api_key",
            value: redact_optional(scheduling.api_key.as_ref()),
            env_keys: &["CALENDLY_API_KEY"],
        },
        Field {
            key: "scheduling.event_type_uri",
            value: or_unset(scheduling.event_type_uri.as_deref()),
            env_keys: &["CALENDLY_EVENT_TYPE_URI"],
        },
        Field {
            key: "scheduling.api_url",
            value: scheduling.api_url.clone(),
            env_keys: &["CALENDLY_API_URL"],
        },
        Field {
            key: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["SDR_SERVER_BIND_ADDRESS"],
        },
        Field {
            key: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["SDR_SERVER_PORT"],
        },
        Field {
            key: "server.allowed_origins",
            value: config.server.allowed_origins.join(","),
            env_keys: &["SDR_SERVER_ALLOWED_ORIGINS"],
        },
        Field {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["SDR_LOGGING_LEVEL", "SDR_LOG_LEVEL"],
        },
        Field {
            key: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["SDR_LOGGING_FORMAT", "SDR_LOG_FORMAT"],
        },
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn or_unset(value: Option<&str>) -> String {
    value.unwrap_or("<unset>").to_string()
}

fn redact_optional(secret: Option<&SecretString>) -> String {
    secret.map(|secret| redact_token(secret.expose_secret())).unwrap_or_else(|| "<unset>".to_string())
}

/// Keeps only a recognizable key prefix such as `sk-`.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
