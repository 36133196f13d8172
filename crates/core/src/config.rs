use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "sdr-assist.toml";
pub const NESTED_CONFIG_FILE: &str = "config/sdr-assist.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub assistant: AssistantConfig,
    pub crm: CrmConfig,
    pub scheduling: SchedulingConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct AssistantConfig {
    pub api_key: SecretString,
    pub assistant_id: Option<String>,
    pub base_url: String,
    pub poll_interval_ms: u64,
    pub max_stalled_polls: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CrmConfig {
    pub api_key: Option<SecretString>,
    pub pipe_id: Option<String>,
    pub api_url: String,
}

#[derive(Clone, Debug)]
pub struct SchedulingConfig {
    pub api_key: Option<SecretString>,
    pub event_type_uri: Option<String>,
    pub api_url: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// Credentials for the lead store, present only when both values are configured.
#[derive(Clone, Debug)]
pub struct CrmSettings {
    pub api_key: SecretString,
    pub pipe_id: String,
}

/// Credentials for the scheduling service, present only when both values are configured.
#[derive(Clone, Debug)]
pub struct SchedulingSettings {
    pub api_key: SecretString,
    pub event_type_uri: String,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub openai_api_key: Option<String>,
    pub assistant_id: Option<String>,
    pub assistant_base_url: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub max_stalled_polls: Option<u32>,
    pub crm_api_key: Option<String>,
    pub crm_pipe_id: Option<String>,
    pub crm_api_url: Option<String>,
    pub scheduling_api_key: Option<String>,
    pub scheduling_event_type_uri: Option<String>,
    pub scheduling_api_url: Option<String>,
    pub server_port: Option<u16>,
    pub allowed_origins: Option<Vec<String>>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            assistant: AssistantConfig {
                api_key: String::new().into(),
                assistant_id: None,
                base_url: "https://api.openai.com/v1".to_string(),
                poll_interval_ms: 1_000,
                max_stalled_polls: 30,
                timeout_secs: 60,
            },
            crm: CrmConfig {
                api_key: None,
                pipe_id: None,
                api_url: "https://api.pipefy.com/graphql".to_string(),
            },
            scheduling: SchedulingConfig {
                api_key: None,
                event_type_uri: None,
                api_url: "https://api.calendly.com".to_string(),
            },
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 8000,
                allowed_origins: vec!["http://localhost:5173".to_string()],
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn crm_settings(&self) -> Option<CrmSettings> {
        let api_key = self.crm.api_key.as_ref().filter(|key| !key.expose_secret().is_empty())?;
        let pipe_id = self.crm.pipe_id.as_ref().filter(|id| !id.trim().is_empty())?;
        Some(CrmSettings { api_key: api_key.clone(), pipe_id: pipe_id.clone() })
    }

    pub fn scheduling_settings(&self) -> Option<SchedulingSettings> {
        let api_key =
            self.scheduling.api_key.as_ref().filter(|key| !key.expose_secret().is_empty())?;
        let event_type_uri =
            self.scheduling.event_type_uri.as_ref().filter(|uri| !uri.trim().is_empty())?;
        Some(SchedulingSettings { api_key: api_key.clone(), event_type_uri: event_type_uri.clone() })
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(assistant) = patch.assistant {
            if let Some(api_key) = assistant.api_key {
                self.assistant.api_key = secret_value(api_key);
            }
            if let Some(assistant_id) = assistant.assistant_id {
                self.assistant.assistant_id = Some(assistant_id);
            }
            if let Some(base_url) = assistant.base_url {
                self.assistant.base_url = base_url;
            }
            if let Some(poll_interval_ms) = assistant.poll_interval_ms {
                self.assistant.poll_interval_ms = poll_interval_ms;
            }
            if let Some(max_stalled_polls) = assistant.max_stalled_polls {
                self.assistant.max_stalled_polls = max_stalled_polls;
            }
            if let Some(timeout_secs) = assistant.timeout_secs {
                self.assistant.timeout_secs = timeout_secs;
            }
        }

        if let Some(crm) = patch.crm {
            if let Some(api_key) = crm.api_key {
                self.crm.api_key = Some(secret_value(api_key));
            }
            if let Some(pipe_id) = crm.pipe_id {
                self.crm.pipe_id = Some(pipe_id);
            }
            if let Some(api_url) = crm.api_url {
                self.crm.api_url = api_url;
            }
        }

        if let Some(scheduling) = patch.scheduling {
            if let Some(api_key) = scheduling.api_key {
                self.scheduling.api_key = Some(secret_value(api_key));
            }
            if let Some(event_type_uri) = scheduling.event_type_uri {
                self.scheduling.event_type_uri = Some(event_type_uri);
            }
            if let Some(api_url) = scheduling.api_url {
                self.scheduling.api_url = api_url;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(allowed_origins) = server.allowed_origins {
                self.server.allowed_origins = allowed_origins;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("OPENAI_API_KEY") {
            self.assistant.api_key = secret_value(value);
        }
        if let Some(value) = read_env("ASSISTANT_ID") {
            self.assistant.assistant_id = Some(value);
        }
        if let Some(value) = read_env("OPENAI_BASE_URL") {
            self.assistant.base_url = value;
        }
        if let Some(value) = read_env("SDR_ASSISTANT_POLL_INTERVAL_MS") {
            self.assistant.poll_interval_ms = parse_u64("SDR_ASSISTANT_POLL_INTERVAL_MS", &value)?;
        }
        if let Some(value) = read_env("SDR_ASSISTANT_MAX_STALLED_POLLS") {
            self.assistant.max_stalled_polls =
                parse_u32("SDR_ASSISTANT_MAX_STALLED_POLLS", &value)?;
        }
        if let Some(value) = read_env("SDR_ASSISTANT_TIMEOUT_SECS") {
            self.assistant.timeout_secs = parse_u64("SDR_ASSISTANT_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("PIPEFY_API_KEY") {
            self.crm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("PIPEFY_PIPE_ID") {
            self.crm.pipe_id = Some(value);
        }
        if let Some(value) = read_env("PIPEFY_API_URL") {
            self.crm.api_url = value;
        }

        if let Some(value) = read_env("CALENDLY_API_KEY") {
            self.scheduling.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("CALENDLY_EVENT_TYPE_URI") {
            self.scheduling.event_type_uri = Some(value);
        }
        if let Some(value) = read_env("CALENDLY_API_URL") {
            self.scheduling.api_url = value;
        }

        if let Some(value) = read_env("SDR_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SDR_SERVER_PORT") {
            self.server.port = parse_u16("SDR_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("SDR_SERVER_ALLOWED_ORIGINS") {
            self.server.allowed_origins = split_list(&value);
        }

        let log_level = read_env("SDR_LOGGING_LEVEL").or_else(|| read_env("SDR_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("SDR_LOGGING_FORMAT").or_else(|| read_env("SDR_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(api_key) = overrides.openai_api_key {
            self.assistant.api_key = secret_value(api_key);
        }
        if let Some(assistant_id) = overrides.assistant_id {
            self.assistant.assistant_id = Some(assistant_id);
        }
        if let Some(base_url) = overrides.assistant_base_url {
            self.assistant.base_url = base_url;
        }
        if let Some(poll_interval_ms) = overrides.poll_interval_ms {
            self.assistant.poll_interval_ms = poll_interval_ms;
        }
        if let Some(max_stalled_polls) = overrides.max_stalled_polls {
            self.assistant.max_stalled_polls = max_stalled_polls;
        }
        if let Some(api_key) = overrides.crm_api_key {
            self.crm.api_key = Some(secret_value(api_key));
        }
        if let Some(pipe_id) = overrides.crm_pipe_id {
            self.crm.pipe_id = Some(pipe_id);
        }
        if let Some(api_url) = overrides.crm_api_url {
            self.crm.api_url = api_url;
        }
        if let Some(api_key) = overrides.scheduling_api_key {
            self.scheduling.api_key = Some(secret_value(api_key));
        }
        if let Some(event_type_uri) = overrides.scheduling_event_type_uri {
            self.scheduling.event_type_uri = Some(event_type_uri);
        }
        if let Some(api_url) = overrides.scheduling_api_url {
            self.scheduling.api_url = api_url;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(allowed_origins) = overrides.allowed_origins {
            self.server.allowed_origins = allowed_origins;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_assistant(&self.assistant)?;
        validate_http_url("crm.api_url", &self.crm.api_url)?;
        validate_http_url("scheduling.api_url", &self.scheduling.api_url)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from(NESTED_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_assistant(assistant: &AssistantConfig) -> Result<(), ConfigError> {
    if assistant.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "assistant.api_key is required. Set OPENAI_API_KEY or [assistant].api_key".to_string(),
        ));
    }

    if let Some(assistant_id) = &assistant.assistant_id {
        if assistant_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "assistant.assistant_id must not be blank when provided".to_string(),
            ));
        }
    }

    validate_http_url("assistant.base_url", &assistant.base_url)?;

    if assistant.poll_interval_ms == 0 {
        return Err(ConfigError::Validation(
            "assistant.poll_interval_ms must be greater than zero".to_string(),
        ));
    }

    if assistant.max_stalled_polls == 0 {
        return Err(ConfigError::Validation(
            "assistant.max_stalled_polls must be greater than zero".to_string(),
        ));
    }

    if assistant.timeout_secs == 0 || assistant.timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "assistant.timeout_secs must be in range 1..=600".to_string(),
        ));
    }

    Ok(())
}

fn validate_http_url(key: &str, url: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!("{key} must start with http:// or https://")));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.allowed_origins.is_empty() {
        return Err(ConfigError::Validation(
            "server.allowed_origins must list at least one origin (use `*` to allow any)"
                .to_string(),
        ));
    }

    for origin in &server.allowed_origins {
        if origin != "*" && !origin.starts_with("http://") && !origin.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "server.allowed_origins entry `{origin}` must be `*` or an http(s) origin"
            )));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|part| !part.is_empty()).map(str::to_string).collect()
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    assistant: Option<AssistantPatch>,
    crm: Option<CrmPatch>,
    scheduling: Option<SchedulingPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct AssistantPatch {
    api_key: Option<String>,
    assistant_id: Option<String>,
    base_url: Option<String>,
    poll_interval_ms: Option<u64>,
    max_stalled_polls: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CrmPatch {
    api_key: Option<String>,
    pipe_id: Option<String>,
    api_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SchedulingPatch {
    api_key: Option<String>,
    event_type_uri: Option<String>,
    api_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    allowed_origins: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
