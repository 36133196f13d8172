use crate::commands::{CommandResult, OutputFormat};
use sdr_assist_core::config::{AppConfig, LoadOptions};
use serde::Serialize;
use serde_json::json;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    /// The server still starts, but the related tool answers with a
    /// configuration error.
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const CHECKS_AFTER_CONFIG: [&str; 3] = ["assistant_id", "crm_credentials", "scheduling_credentials"];

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report(LoadOptions::default());
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };

    let output = match OutputFormat::from_json_flag(json_output) {
        OutputFormat::Json => serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            json!({
                "overall_status": "fail",
                "summary": "doctor serialization failed",
                "error": error.to_string(),
            })
            .to_string()
        }),
        OutputFormat::Human => render_human(&report),
    };

    CommandResult { exit_code, output }
}

fn build_report(options: LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_assistant_id(&config));
            checks.push(check_crm(&config));
            checks.push(check_scheduling(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.extend(CHECKS_AFTER_CONFIG.into_iter().map(|name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            }));
        }
    }

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let warned = checks.iter().any(|check| check.status == CheckStatus::Warn);
    let (overall_status, summary) = match (failed, warned) {
        (true, _) => (CheckStatus::Fail, "doctor: one or more readiness checks failed"),
        (false, true) => (CheckStatus::Warn, "doctor: ready to serve chat with degraded integrations"),
        (false, false) => (CheckStatus::Pass, "doctor: all readiness checks passed"),
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn check_assistant_id(config: &AppConfig) -> DoctorCheck {
    match config.assistant.assistant_id.as_deref() {
        Some(id) => DoctorCheck {
            name: "assistant_id",
            status: CheckStatus::Pass,
            details: format!("chat runs will use assistant `{id}`"),
        },
        None => DoctorCheck {
            name: "assistant_id",
            status: CheckStatus::Fail,
            details: "ASSISTANT_ID is not set; run `sdr-assist provision` to create one".to_string(),
        },
    }
}

fn check_crm(config: &AppConfig) -> DoctorCheck {
    match config.crm_settings() {
        Some(settings) => DoctorCheck {
            name: "crm_credentials",
            status: CheckStatus::Pass,
            details: format!("leads go to pipe `{}` via {}", settings.pipe_id, config.crm.api_url),
        },
        None => DoctorCheck {
            name: "crm_credentials",
            status: CheckStatus::Warn,
            details: "PIPEFY_API_KEY and PIPEFY_PIPE_ID are both required for lead registration"
                .to_string(),
        },
    }
}

fn check_scheduling(config: &AppConfig) -> DoctorCheck {
    match config.scheduling_settings() {
        Some(settings) => DoctorCheck {
            name: "scheduling_credentials",
            status: CheckStatus::Pass,
            details: format!("slots come from event type `{}`", settings.event_type_uri),
        },
        None => DoctorCheck {
            name: "scheduling_credentials",
            status: CheckStatus::Warn,
            details: "CALENDLY_API_KEY and CALENDLY_EVENT_TYPE_URI are both required for scheduling"
                .to_string(),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
