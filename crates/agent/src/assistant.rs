use async_trait::async_trait;
use sdr_assist_core::domain::conversation::{ConversationId, Run, RunId, ToolOutput};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// A function the assistant may ask this service to execute.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    /// JSON schema of the argument object.
    pub parameters: Value,
}

/// What every run is started with.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSpec {
    pub assistant_id: String,
    pub instructions: Option<String>,
    pub tools: Vec<FunctionDeclaration>,
}

/// Definition used when provisioning the remote assistant itself.
#[derive(Clone, Debug, PartialEq)]
pub struct AssistantSpec {
    pub name: String,
    pub model: String,
    pub instructions: String,
    pub tools: Vec<FunctionDeclaration>,
}

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("conversation `{conversation_id}` already has an active run")]
    ConversationBusy { conversation_id: ConversationId },
    #[error("assistant runtime request failed: {0}")]
    Transport(String),
    #[error("assistant runtime answered with HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("assistant runtime response could not be decoded: {0}")]
    Decode(String),
}

/// The hosted assistant runtime: conversations, messages and runs.
#[async_trait]
pub trait AssistantClient: Send + Sync {
    async fn create_conversation(&self) -> Result<ConversationId, AssistantError>;

    /// Fails with [`AssistantError::ConversationBusy`] while a run is active
    /// on the conversation.
    async fn append_user_message(
        &self,
        conversation_id: &ConversationId,
        text: &str,
    ) -> Result<(), AssistantError>;

    async fn create_run(
        &self,
        conversation_id: &ConversationId,
        spec: &RunSpec,
    ) -> Result<Run, AssistantError>;

    async fn retrieve_run(
        &self,
        conversation_id: &ConversationId,
        run_id: &RunId,
    ) -> Result<Run, AssistantError>;

    async fn submit_tool_outputs(
        &self,
        conversation_id: &ConversationId,
        run_id: &RunId,
        outputs: &[ToolOutput],
    ) -> Result<Run, AssistantError>;

    /// Text of the most recent message in the conversation, if it has any.
    async fn latest_message_text(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<String>, AssistantError>;
}
