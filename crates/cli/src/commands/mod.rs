pub mod config;
pub mod doctor;
pub mod provision;

use std::fmt;

use serde::Serialize;
use serde_json::json;

/// Selected with `--json` on commands that support it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Human
        }
    }
}

/// Why a command stopped early. Each class owns one process exit code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    ConfigValidation,
    ClientInit,
    RuntimeInit,
    AssistantProvision,
}

impl FailureClass {
    pub fn exit_code(self) -> u8 {
        match self {
            Self::ConfigValidation => 2,
            Self::ClientInit | Self::RuntimeInit => 3,
            Self::AssistantProvision => 4,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::ConfigValidation => "config_validation",
            Self::ClientInit => "client_init",
            Self::RuntimeInit => "runtime_init",
            Self::AssistantProvision => "assistant_provision",
        }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    command: &'a str,
    status: &'static str,
    error_class: Option<FailureClass>,
    message: &'a str,
}

impl CommandResult {
    /// Plain output for commands without a machine-readable form.
    pub fn text(output: impl Into<String>) -> Self {
        Self { exit_code: 0, output: output.into() }
    }

    /// `next_step` is shown to humans only; JSON consumers get `message`.
    pub fn succeeded(
        command: &str,
        message: &str,
        next_step: Option<&str>,
        format: OutputFormat,
    ) -> Self {
        let output = match format {
            OutputFormat::Json => render_json(&Report {
                command,
                status: "ok",
                error_class: None,
                message,
            }),
            OutputFormat::Human => match next_step {
                Some(step) => format!("{message}\n{step}"),
                None => message.to_string(),
            },
        };
        Self { exit_code: 0, output }
    }

    pub fn failed(command: &str, class: FailureClass, message: &str, format: OutputFormat) -> Self {
        let output = match format {
            OutputFormat::Json => render_json(&Report {
                command,
                status: "error",
                error_class: Some(class),
                message,
            }),
            OutputFormat::Human => format!("{command} failed ({class}): {message}"),
        };
        Self { exit_code: class.exit_code(), output }
    }
}

fn render_json(report: &Report<'_>) -> String {
    serde_json::to_string(report).unwrap_or_else(|error| {
        json!({
            "command": report.command,
            "status": "error",
            "error_class": "serialization",
            "message": error.to_string(),
        })
        .to_string()
    })
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::{CommandResult, FailureClass, OutputFormat};

    #[test]
    fn failure_classes_map_to_fixed_exit_codes() {
        assert_eq!(FailureClass::ConfigValidation.exit_code(), 2);
        assert_eq!(FailureClass::ClientInit.exit_code(), 3);
        assert_eq!(FailureClass::RuntimeInit.exit_code(), 3);
        assert_eq!(FailureClass::AssistantProvision.exit_code(), 4);
    }

    #[test]
    fn json_failure_carries_class_and_escaped_message() {
        let result = CommandResult::failed(
            "provision",
            FailureClass::AssistantProvision,
            "HTTP 401: \"bad key\"",
            OutputFormat::Json,
        );

        assert_eq!(result.exit_code, 4);
        let payload: Value = serde_json::from_str(&result.output).expect("json payload");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "assistant_provision");
        assert_eq!(payload["message"], "HTTP 401: \"bad key\"");
    }

    #[test]
    fn human_success_appends_next_step() {
        let result = CommandResult::succeeded(
            "provision",
            "Assistente criado com o ID: asst_1",
            Some("set ASSISTANT_ID=asst_1 before starting the server"),
            OutputFormat::Human,
        );

        assert_eq!(result.exit_code, 0);
        assert_eq!(
            result.output,
            "Assistente criado com o ID: asst_1\nset ASSISTANT_ID=asst_1 before starting the server"
        );
    }

    #[test]
    fn json_success_omits_next_step() {
        let result = CommandResult::succeeded(
            "provision",
            "Assistente criado com o ID: asst_1",
            Some("set ASSISTANT_ID=asst_1"),
            OutputFormat::Json,
        );

        let payload: Value = serde_json::from_str(&result.output).expect("json payload");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["error_class"], Value::Null);
        assert!(!result.output.contains("set ASSISTANT_ID"));
    }
}
