//! One chat turn against the hosted assistant: append, run, poll, dispatch
//! tools, reply.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sdr_assist_core::config::AssistantConfig;
use sdr_assist_core::domain::conversation::{ConversationId, Run, RunStatus};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::assistant::{AssistantClient, AssistantError, RunSpec};
use crate::persona;
use crate::tools::{Dispatch, ToolRegistry};

pub const STALLED_RUN_TEXT: &str =
    "A execução do assistente ficou aguardando ferramentas sem resposta (status: requires_action).";

/// The wait between two run status polls.
#[async_trait]
pub trait Pause: Send + Sync {
    async fn pause(&self, duration: Duration);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TokioPause;

#[async_trait]
impl Pause for TokioPause {
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriverSettings {
    pub assistant_id: String,
    pub poll_interval: Duration,
    pub max_stalled_polls: u32,
}

impl DriverSettings {
    pub fn from_config(assistant_id: impl Into<String>, config: &AssistantConfig) -> Self {
        Self {
            assistant_id: assistant_id.into(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_stalled_polls: config.max_stalled_polls,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnReply {
    pub conversation_id: ConversationId,
    pub text: String,
    /// Final run status; only `Completed` means `text` came from the assistant.
    pub status: RunStatus,
}

#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Assistant(#[from] AssistantError),
    #[error("run completed without a message in conversation `{0}`")]
    MissingReply(ConversationId),
}

pub struct ConversationDriver {
    client: Arc<dyn AssistantClient>,
    registry: ToolRegistry,
    run_spec: RunSpec,
    poll_interval: Duration,
    max_stalled_polls: u32,
    pause: Arc<dyn Pause>,
}

impl ConversationDriver {
    pub fn new(
        client: Arc<dyn AssistantClient>,
        registry: ToolRegistry,
        settings: DriverSettings,
    ) -> Self {
        Self {
            client,
            run_spec: persona::run_spec(settings.assistant_id, registry.declarations()),
            registry,
            poll_interval: settings.poll_interval,
            max_stalled_polls: settings.max_stalled_polls.max(1),
            pause: Arc::new(TokioPause),
        }
    }

    pub fn with_pause(mut self, pause: Arc<dyn Pause>) -> Self {
        self.pause = pause;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn run_turn(
        &self,
        conversation_id: Option<ConversationId>,
        message: &str,
    ) -> Result<TurnReply, TurnError> {
        let conversation_id = match conversation_id {
            Some(id) => id,
            None => {
                let id = self.client.create_conversation().await?;
                info!(event_name = "agent.turn.conversation_created", thread_id = %id, "new conversation");
                id
            }
        };
        let conversation_id = self.append_with_recovery(conversation_id, message).await?;

        let run = self.client.create_run(&conversation_id, &self.run_spec).await?;
        info!(
            event_name = "agent.turn.run_created",
            thread_id = %conversation_id,
            run_id = %run.id,
            status = %run.status,
            "run started"
        );

        let Some(run) = self.poll_until_settled(&conversation_id, run).await? else {
            return Ok(TurnReply {
                conversation_id,
                text: STALLED_RUN_TEXT.to_string(),
                status: RunStatus::RequiresAction,
            });
        };

        if run.status.is_success() {
            let text = self
                .client
                .latest_message_text(&conversation_id)
                .await?
                .ok_or_else(|| TurnError::MissingReply(conversation_id.clone()))?;
            info!(event_name = "agent.turn.completed", thread_id = %conversation_id, run_id = %run.id, "turn completed");
            return Ok(TurnReply { conversation_id, text, status: run.status });
        }

        warn!(
            event_name = "agent.turn.run_failed",
            thread_id = %conversation_id,
            run_id = %run.id,
            status = %run.status,
            detail = run.last_error.as_ref().map(|error| error.message.as_str()).unwrap_or(""),
            "run ended without completing"
        );
        Ok(TurnReply { text: failure_text(&run), conversation_id, status: run.status })
    }

    /// Appends the message, moving to a fresh conversation once if the given
    /// one still has an active run.
    async fn append_with_recovery(
        &self,
        conversation_id: ConversationId,
        message: &str,
    ) -> Result<ConversationId, TurnError> {
        match self.client.append_user_message(&conversation_id, message).await {
            Ok(()) => Ok(conversation_id),
            Err(AssistantError::ConversationBusy { .. }) => {
                let replacement = self.client.create_conversation().await?;
                warn!(
                    event_name = "agent.turn.busy_recovery",
                    thread_id = %conversation_id,
                    replacement_thread_id = %replacement,
                    "conversation has an active run; continuing in a new conversation"
                );
                self.client.append_user_message(&replacement, message).await?;
                Ok(replacement)
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Returns the first non-pending run, or `None` when the stall guard trips.
    async fn poll_until_settled(
        &self,
        conversation_id: &ConversationId,
        mut run: Run,
    ) -> Result<Option<Run>, TurnError> {
        let mut stalled_polls = 0u32;

        while run.status.is_pending() {
            if run.status == RunStatus::RequiresAction {
                let mut outputs = Vec::with_capacity(run.required_tool_calls.len());
                for call in &run.required_tool_calls {
                    if let Dispatch::Output(output) = self.registry.dispatch(call).await {
                        outputs.push(output);
                    }
                }

                if outputs.is_empty() {
                    stalled_polls += 1;
                    if stalled_polls >= self.max_stalled_polls {
                        warn!(
                            event_name = "agent.turn.stalled",
                            thread_id = %conversation_id,
                            run_id = %run.id,
                            stalled_polls,
                            "run kept requiring tools that produced no output"
                        );
                        return Ok(None);
                    }
                } else {
                    stalled_polls = 0;
                    info!(
                        event_name = "agent.turn.tool_outputs_submitted",
                        thread_id = %conversation_id,
                        run_id = %run.id,
                        output_count = outputs.len(),
                        "submitting tool outputs"
                    );
                    self.client.submit_tool_outputs(conversation_id, &run.id, &outputs).await?;
                }
            }

            self.pause.pause(self.poll_interval).await;
            let previous = run.status;
            run = self.client.retrieve_run(conversation_id, &run.id).await?;
            if run.status != previous {
                debug!(
                    event_name = "agent.turn.run_status",
                    thread_id = %conversation_id,
                    run_id = %run.id,
                    from = %previous,
                    to = %run.status,
                    "run status changed"
                );
            }
        }

        Ok(Some(run))
    }
}

fn failure_text(run: &Run) -> String {
    let mut text = format!("Ocorreu um erro na execução do assistente (status: {}).", run.status);
    if let Some(error) = run.last_error.as_ref().filter(|error| !error.message.is_empty()) {
        text.push_str(" Detalhes: ");
        text.push_str(&error.message);
    }
    text
}
