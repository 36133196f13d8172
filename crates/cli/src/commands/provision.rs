use crate::commands::{CommandResult, FailureClass, OutputFormat};
use sdr_assist_agent::openai::OpenAiAssistantClient;
use sdr_assist_agent::persona;
use sdr_assist_core::config::{AppConfig, LoadOptions};

const COMMAND: &str = "provision";

pub fn run(json_output: bool) -> CommandResult {
    run_with_options(LoadOptions::default(), OutputFormat::from_json_flag(json_output))
}

pub fn run_with_options(options: LoadOptions, format: OutputFormat) -> CommandResult {
    let fail = |class: FailureClass, message: String| {
        CommandResult::failed(COMMAND, class, &message, format)
    };

    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return fail(FailureClass::ConfigValidation, format!("configuration issue: {error}"));
        }
    };

    let client = match OpenAiAssistantClient::from_config(&config.assistant) {
        Ok(client) => client,
        Err(error) => return fail(FailureClass::ClientInit, error.to_string()),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return fail(
                FailureClass::RuntimeInit,
                format!("failed to initialize async runtime: {error}"),
            );
        }
    };

    match runtime.block_on(client.create_assistant(&persona::assistant_spec())) {
        Ok(assistant_id) => CommandResult::succeeded(
            COMMAND,
            &format!("Assistente criado com o ID: {assistant_id}"),
            Some(&format!("set ASSISTANT_ID={assistant_id} before starting the server")),
            format,
        ),
        Err(error) => fail(FailureClass::AssistantProvision, error.to_string()),
    }
}
