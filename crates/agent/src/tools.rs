pub mod lead;
pub mod scheduling;

use std::collections::HashMap;

use async_trait::async_trait;
use sdr_assist_core::domain::conversation::{ToolCall, ToolOutput};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::assistant::FunctionDeclaration;

use self::lead::{LeadRegistrar, RegisterLeadTool};
use self::scheduling::{BookMeetingTool, OfferSlotsTool, Scheduler};

#[derive(Debug, Error)]
pub enum ToolArgumentsError {
    #[error("arguments are not valid JSON: {0}")]
    Syntax(String),
    #[error("arguments do not match the declared contract: {0}")]
    Contract(String),
}

/// A local function the assistant can call by name.
///
/// `invoke` returns the observation the assistant reads back; an empty string
/// means "nothing to report" and produces no tool output.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn declaration(&self) -> FunctionDeclaration;
    async fn invoke(&self, arguments: Value) -> Result<String, ToolArgumentsError>;
}

/// Result of routing one tool call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatch {
    Unknown,
    Empty,
    Output(ToolOutput),
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    /// The three sales tools, in declaration order.
    pub fn standard(lead_registrar: LeadRegistrar, scheduler: Scheduler) -> Self {
        let scheduler = std::sync::Arc::new(scheduler);
        let mut registry = Self::default();
        registry.register(RegisterLeadTool::new(lead_registrar));
        registry.register(OfferSlotsTool::new(scheduler.clone()));
        registry.register(BookMeetingTool::new(scheduler));
        registry
    }

    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), Box::new(tool)).is_none() {
            self.order.push(name);
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        self.order.iter().filter_map(|name| self.tools.get(name)).map(|tool| tool.declaration()).collect()
    }

    pub async fn dispatch(&self, call: &ToolCall) -> Dispatch {
        let Some(tool) = self.tools.get(&call.name) else {
            warn!(
                event_name = "agent.tool.unknown",
                tool_call_id = %call.id.0,
                tool_name = %call.name,
                "assistant requested an unregistered tool; dropping call"
            );
            return Dispatch::Unknown;
        };

        let result = match parse_raw_arguments(&call.arguments) {
            Ok(arguments) => tool.invoke(arguments).await,
            Err(error) => Err(error),
        };

        let output = match result {
            Ok(output) => output,
            Err(error) => {
                warn!(
                    event_name = "agent.tool.invalid_arguments",
                    tool_call_id = %call.id.0,
                    tool_name = %call.name,
                    error = %error,
                    "tool arguments rejected"
                );
                format!("Erro: argumentos inválidos para a ferramenta {}: {error}", call.name)
            }
        };

        if output.is_empty() {
            return Dispatch::Empty;
        }

        info!(
            event_name = "agent.tool.dispatched",
            tool_call_id = %call.id.0,
            tool_name = %call.name,
            "tool call produced an output"
        );
        Dispatch::Output(ToolOutput { tool_call_id: call.id.clone(), output })
    }
}

/// Declarations of the standard tools, without wiring any collaborator.
pub fn standard_declarations() -> Vec<FunctionDeclaration> {
    vec![
        lead::register_lead_declaration(),
        scheduling::offer_slots_declaration(),
        scheduling::book_meeting_declaration(),
    ]
}

fn parse_raw_arguments(raw: &str) -> Result<Value, ToolArgumentsError> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(raw).map_err(|error| ToolArgumentsError::Syntax(error.to_string()))
}

pub(crate) fn parse_arguments<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolArgumentsError> {
    serde_json::from_value(arguments).map_err(|error| ToolArgumentsError::Contract(error.to_string()))
}
