//! [`AssistantClient`] over the OpenAI Assistants v2 REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use sdr_assist_core::config::AssistantConfig;
use sdr_assist_core::domain::conversation::{
    ConversationId, Run, RunError, RunId, RunStatus, ToolCall, ToolCallId, ToolOutput,
};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::assistant::{AssistantClient, AssistantError, AssistantSpec, FunctionDeclaration, RunSpec};

const ASSISTANTS_BETA_HEADER: &str = "OpenAI-Beta";
const ASSISTANTS_BETA_VERSION: &str = "assistants=v2";

#[derive(Clone)]
pub struct OpenAiAssistantClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
}

impl std::fmt::Debug for OpenAiAssistantClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiAssistantClient").field("base_url", &self.base_url).finish()
    }
}

impl OpenAiAssistantClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, AssistantError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| AssistantError::Transport(error.to_string()))?;
        Ok(Self { http, base_url: base_url.into(), api_key })
    }

    pub fn from_config(config: &AssistantConfig) -> Result<Self, AssistantError> {
        Self::new(
            config.base_url.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Creates the remote assistant and returns its id.
    pub async fn create_assistant(&self, spec: &AssistantSpec) -> Result<String, AssistantError> {
        let body = json!({
            "name": spec.name,
            "model": spec.model,
            "instructions": spec.instructions,
            "tools": function_tools(&spec.tools),
        });
        let created: ObjectId =
            self.send(self.request(Method::POST, "assistants").json(&body), None).await?;
        Ok(created.id)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .bearer_auth(self.api_key.expose_secret())
            .header(ASSISTANTS_BETA_HEADER, ASSISTANTS_BETA_VERSION)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        conversation_id: Option<&ConversationId>,
    ) -> Result<T, AssistantError> {
        let response =
            request.send().await.map_err(|error| AssistantError::Transport(error.to_string()))?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = remote_error_message(&body);
            if status.as_u16() == 400 && is_active_run_conflict(&message) {
                if let Some(conversation_id) = conversation_id {
                    return Err(AssistantError::ConversationBusy {
                        conversation_id: conversation_id.clone(),
                    });
                }
            }
            return Err(AssistantError::Status { status: status.as_u16(), message });
        }

        response.json::<T>().await.map_err(|error| AssistantError::Decode(error.to_string()))
    }
}

#[async_trait]
impl AssistantClient for OpenAiAssistantClient {
    async fn create_conversation(&self) -> Result<ConversationId, AssistantError> {
        let thread: ObjectId =
            self.send(self.request(Method::POST, "threads").json(&json!({})), None).await?;
        debug!(event_name = "agent.openai.thread_created", thread_id = %thread.id, "thread created");
        Ok(ConversationId(thread.id))
    }

    async fn append_user_message(
        &self,
        conversation_id: &ConversationId,
        text: &str,
    ) -> Result<(), AssistantError> {
        let path = format!("threads/{conversation_id}/messages");
        let body = json!({ "role": "user", "content": text });
        let _: ObjectId =
            self.send(self.request(Method::POST, &path).json(&body), Some(conversation_id)).await?;
        Ok(())
    }

    async fn create_run(
        &self,
        conversation_id: &ConversationId,
        spec: &RunSpec,
    ) -> Result<Run, AssistantError> {
        let path = format!("threads/{conversation_id}/runs");
        let mut body = json!({
            "assistant_id": spec.assistant_id,
            "tools": function_tools(&spec.tools),
        });
        if let Some(instructions) = &spec.instructions {
            body["instructions"] = Value::String(instructions.clone());
        }
        let run: RunObject =
            self.send(self.request(Method::POST, &path).json(&body), Some(conversation_id)).await?;
        Ok(run.into())
    }

    async fn retrieve_run(
        &self,
        conversation_id: &ConversationId,
        run_id: &RunId,
    ) -> Result<Run, AssistantError> {
        let path = format!("threads/{conversation_id}/runs/{run_id}");
        let run: RunObject =
            self.send(self.request(Method::GET, &path), Some(conversation_id)).await?;
        Ok(run.into())
    }

    async fn submit_tool_outputs(
        &self,
        conversation_id: &ConversationId,
        run_id: &RunId,
        outputs: &[ToolOutput],
    ) -> Result<Run, AssistantError> {
        let path = format!("threads/{conversation_id}/runs/{run_id}/submit_tool_outputs");
        let body = SubmitToolOutputsBody {
            tool_outputs: outputs
                .iter()
                .map(|output| RemoteToolOutput {
                    tool_call_id: &output.tool_call_id.0,
                    output: &output.output,
                })
                .collect(),
        };
        let run: RunObject =
            self.send(self.request(Method::POST, &path).json(&body), Some(conversation_id)).await?;
        Ok(run.into())
    }

    async fn latest_message_text(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<String>, AssistantError> {
        let path = format!("threads/{conversation_id}/messages");
        let messages: MessageList = self
            .send(
                self.request(Method::GET, &path).query(&[("order", "desc"), ("limit", "1")]),
                Some(conversation_id),
            )
            .await?;

        Ok(messages.data.into_iter().next().and_then(|message| {
            message.content.into_iter().find_map(|content| match content {
                MessageContent::Text { text } => Some(text.value),
                MessageContent::Other => None,
            })
        }))
    }
}

fn function_tools(declarations: &[FunctionDeclaration]) -> Vec<Value> {
    declarations
        .iter()
        .map(|declaration| json!({ "type": "function", "function": declaration }))
        .collect()
}

fn remote_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

/// The runtime rejects new messages with a 400 whose message reads like
/// "Can't add messages to thread_x while a run run_y is active."
fn is_active_run_conflict(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    lowered.contains("while a run") && lowered.contains("is active")
}

#[derive(Debug, Deserialize)]
struct ObjectId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct RunObject {
    id: String,
    status: RunStatus,
    #[serde(default)]
    required_action: Option<RequiredAction>,
    #[serde(default)]
    last_error: Option<RemoteRunError>,
}

#[derive(Debug, Deserialize)]
struct RequiredAction {
    #[serde(default)]
    submit_tool_outputs: Option<SubmitToolOutputs>,
}

#[derive(Debug, Deserialize)]
struct SubmitToolOutputs {
    tool_calls: Vec<RemoteToolCall>,
}

#[derive(Debug, Deserialize)]
struct RemoteToolCall {
    id: String,
    function: RemoteFunction,
}

#[derive(Debug, Deserialize)]
struct RemoteFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct RemoteRunError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: String,
}

impl From<RunObject> for Run {
    fn from(remote: RunObject) -> Self {
        let required_tool_calls = remote
            .required_action
            .and_then(|action| action.submit_tool_outputs)
            .map(|submit| {
                submit
                    .tool_calls
                    .into_iter()
                    .map(|call| ToolCall {
                        id: ToolCallId(call.id),
                        name: call.function.name,
                        arguments: call.function.arguments,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Run {
            id: RunId(remote.id),
            status: remote.status,
            required_tool_calls,
            last_error: remote
                .last_error
                .map(|error| RunError { code: error.code, message: error.message }),
        }
    }
}

#[derive(Debug, Serialize)]
struct SubmitToolOutputsBody<'a> {
    tool_outputs: Vec<RemoteToolOutput<'a>>,
}

#[derive(Debug, Serialize)]
struct RemoteToolOutput<'a> {
    tool_call_id: &'a str,
    output: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<MessageObject>,
}

#[derive(Debug, Deserialize)]
struct MessageObject {
    #[serde(default)]
    content: Vec<MessageContent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum MessageContent {
    Text {
        text: TextContent,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct TextContent {
    value: String,
}
