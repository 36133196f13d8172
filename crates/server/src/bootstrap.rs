use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use sdr_assist_agent::openai::OpenAiAssistantClient;
use sdr_assist_agent::tools::lead::LeadRegistrar;
use sdr_assist_agent::tools::scheduling::Scheduler;
use sdr_assist_agent::{AssistantError, ConversationDriver, DriverSettings, ToolRegistry};
use sdr_assist_core::config::AppConfig;
use thiserror::Error;
use tracing::{info, warn};

use crate::calendly::CalendlyGateway;
use crate::health::IntegrationStatus;
use crate::pipefy::PipefyGateway;

pub struct Application {
    pub config: AppConfig,
    pub driver: Arc<ConversationDriver>,
    pub integrations: IntegrationStatus,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("assistant.assistant_id is required to serve chat (set ASSISTANT_ID or run `sdr-assist provision`)")]
    MissingAssistantId,
    #[error("assistant client could not be built: {0}")]
    AssistantClient(#[source] AssistantError),
    #[error("integration http client could not be built: {0}")]
    HttpClient(#[source] reqwest::Error),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        thread_id = "unknown",
        "starting application bootstrap"
    );

    let assistant_id = config
        .assistant
        .assistant_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .ok_or(BootstrapError::MissingAssistantId)?;

    let assistant =
        OpenAiAssistantClient::from_config(&config.assistant).map_err(BootstrapError::AssistantClient)?;

    let http = Client::builder()
        .timeout(Duration::from_secs(config.assistant.timeout_secs))
        .build()
        .map_err(BootstrapError::HttpClient)?;

    let lead_registrar = LeadRegistrar::new(
        Arc::new(PipefyGateway::new(http.clone(), config.crm.api_url.clone())),
        config.crm_settings(),
    );
    let scheduler = Scheduler::new(
        Arc::new(CalendlyGateway::new(http, config.scheduling.api_url.clone())),
        config.scheduling_settings(),
    );

    let integrations = IntegrationStatus {
        crm_configured: lead_registrar.is_configured(),
        scheduling_configured: scheduler.is_configured(),
    };
    if !integrations.crm_configured {
        warn!(
            event_name = "system.bootstrap.crm_not_configured",
            correlation_id = "bootstrap",
            thread_id = "unknown",
            "PIPEFY_API_KEY/PIPEFY_PIPE_ID missing; lead registration will report a configuration error"
        );
    }
    if !integrations.scheduling_configured {
        warn!(
            event_name = "system.bootstrap.scheduling_not_configured",
            correlation_id = "bootstrap",
            thread_id = "unknown",
            "CALENDLY_API_KEY/CALENDLY_EVENT_TYPE_URI missing; scheduling tools will report a configuration error"
        );
    }

    let registry = ToolRegistry::standard(lead_registrar, scheduler);

    let driver = ConversationDriver::new(
        Arc::new(assistant),
        registry,
        DriverSettings::from_config(assistant_id, &config.assistant),
    );

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        thread_id = "unknown",
        tool_count = driver.registry().len(),
        "conversation driver ready"
    );

    Ok(Application { config, driver: Arc::new(driver), integrations })
}

#[cfg(test)]
mod tests {
    use sdr_assist_core::config::{AppConfig, ConfigOverrides, LoadOptions};

    use super::{bootstrap_with_config, BootstrapError};

    // Overrides win over ambient environment, so these stay independent of
    // the developer's shell.
    fn options(assistant_id: Option<&str>) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                openai_api_key: Some("sk-test".to_string()),
                assistant_id: assistant_id.map(str::to_string),
                crm_api_key: Some("pipefy-token".to_string()),
                crm_pipe_id: Some("302".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[test]
    fn bootstrap_wires_the_three_tools() {
        let config = AppConfig::load(options(Some("asst_123"))).expect("config loads");
        let app = bootstrap_with_config(config).expect("bootstrap succeeds");

        assert_eq!(app.driver.registry().len(), 3);
        assert!(app.integrations.crm_configured);
    }

    #[test]
    fn scheduling_readiness_comes_from_the_wired_scheduler() {
        let mut options = options(Some("asst_123"));
        options.overrides.scheduling_api_key = Some("calendly-token".to_string());
        options.overrides.scheduling_event_type_uri =
            Some("https://api.calendly.com/event_types/ABC".to_string());
        let config = AppConfig::load(options).expect("config loads");

        let app = bootstrap_with_config(config).expect("bootstrap succeeds");

        assert!(app.integrations.scheduling_configured);
        assert!(app.integrations.crm_configured);
    }

    #[test]
    fn bootstrap_requires_an_assistant_id() {
        let mut config = AppConfig::default();
        config.assistant.assistant_id = None;

        let result = bootstrap_with_config(config);

        assert!(matches!(result, Err(BootstrapError::MissingAssistantId)));
    }

    #[test]
    fn blank_assistant_id_fails_validation() {
        assert!(AppConfig::load(options(Some("  "))).is_err());
    }
}
