//! Lead registration against the CRM: create a card, then fill in its fields.

use std::sync::Arc;

use async_trait::async_trait;
use sdr_assist_core::config::CrmSettings;
use sdr_assist_core::domain::lead::{CardId, Lead};
use sdr_assist_core::errors::GatewayError;
use secrecy::SecretString;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::{parse_arguments, Tool, ToolArgumentsError};
use crate::assistant::FunctionDeclaration;

pub const REGISTER_LEAD_TOOL: &str = "registrarLead";

/// Field written on every registered lead to flag explicit buying interest.
const INTEREST_CONFIRMED_FIELD: &str = "interesse_confirmado";
const INTEREST_CONFIRMED_VALUE: &str = "Sim";

/// Executes a GraphQL document against the CRM and returns the decoded body.
#[async_trait]
pub trait CrmGateway: Send + Sync {
    async fn execute(&self, api_key: &SecretString, query: &str) -> Result<Value, GatewayError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeadReceipt {
    pub card_id: CardId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LeadFailure {
    NotConfigured,
    CreateRejected { detail: String },
    CreateUnreachable(GatewayError),
    /// The card exists but its fields could not be written; it is left as is.
    UpdateRejected { card_id: CardId, detail: String },
    UpdateUnreachable { card_id: CardId, source: GatewayError },
}

pub struct LeadRegistrar {
    gateway: Arc<dyn CrmGateway>,
    settings: Option<CrmSettings>,
}

impl LeadRegistrar {
    pub fn new(gateway: Arc<dyn CrmGateway>, settings: Option<CrmSettings>) -> Self {
        Self { gateway, settings }
    }

    pub fn is_configured(&self) -> bool {
        self.settings.is_some()
    }

    pub async fn create_or_update_lead(&self, lead: &Lead) -> Result<LeadReceipt, LeadFailure> {
        let Some(settings) = &self.settings else {
            error!(
                event_name = "agent.lead.not_configured",
                "PIPEFY_API_KEY or PIPEFY_PIPE_ID is not configured"
            );
            return Err(LeadFailure::NotConfigured);
        };

        info!(event_name = "agent.lead.create_card", pipe_id = %settings.pipe_id, "creating CRM card");
        let created = self
            .gateway
            .execute(&settings.api_key, &create_card_mutation(&settings.pipe_id, &lead.card_title()))
            .await
            .map_err(|source| {
                warn!(event_name = "agent.lead.create_unreachable", error = %source, "crm unreachable");
                LeadFailure::CreateUnreachable(source)
            })?;

        if let Some(detail) = graphql_errors(&created) {
            warn!(event_name = "agent.lead.create_rejected", detail = %detail, "crm rejected card");
            return Err(LeadFailure::CreateRejected { detail });
        }

        let card_id = created_card_id(&created).ok_or_else(|| LeadFailure::CreateRejected {
            detail: "response did not include data.createCard.card.id".to_string(),
        })?;
        info!(event_name = "agent.lead.card_created", card_id = %card_id.0, "crm card created");

        let updated = self
            .gateway
            .execute(&settings.api_key, &update_fields_mutation(&card_id, lead))
            .await
            .map_err(|source| {
                warn!(
                    event_name = "agent.lead.update_unreachable",
                    card_id = %card_id.0,
                    error = %source,
                    "crm unreachable while updating card"
                );
                LeadFailure::UpdateUnreachable { card_id: card_id.clone(), source }
            })?;

        if let Some(detail) = graphql_errors(&updated) {
            warn!(
                event_name = "agent.lead.update_rejected",
                card_id = %card_id.0,
                detail = %detail,
                "crm rejected card update"
            );
            return Err(LeadFailure::UpdateRejected { card_id, detail });
        }

        info!(event_name = "agent.lead.registered", card_id = %card_id.0, "lead registered");
        Ok(LeadReceipt { card_id })
    }
}

pub fn render_lead_outcome(lead: &Lead, outcome: &Result<LeadReceipt, LeadFailure>) -> String {
    match outcome {
        Ok(_) => format!("Lead para '{}' foi registrado com sucesso no CRM.", lead.name),
        Err(LeadFailure::NotConfigured) => "Erro de configuração no servidor.".to_string(),
        Err(LeadFailure::CreateRejected { .. }) => {
            "Ocorreu um erro ao registrar o lead (fase 1).".to_string()
        }
        Err(LeadFailure::CreateUnreachable(_)) => {
            "Não foi possível conectar ao CRM para registrar o lead.".to_string()
        }
        Err(LeadFailure::UpdateRejected { .. }) => {
            "Ocorreu um erro ao registrar o lead (fase 2).".to_string()
        }
        Err(LeadFailure::UpdateUnreachable { .. }) => {
            "Não foi possível conectar ao CRM para atualizar o lead.".to_string()
        }
    }
}

pub fn register_lead_declaration() -> FunctionDeclaration {
    FunctionDeclaration {
        name: REGISTER_LEAD_TOOL.to_string(),
        description: "Registra um novo lead no sistema com os dados coletados.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "nome": { "type": "string", "description": "Nome do cliente." },
                "email": { "type": "string", "description": "E-mail do cliente." },
                "empresa": { "type": "string", "description": "Empresa do cliente." },
                "necessidade": {
                    "type": "string",
                    "description": "A necessidade ou dor que o cliente descreveu."
                }
            },
            "required": ["nome", "email", "empresa", "necessidade"]
        }),
    }
}

pub struct RegisterLeadTool {
    registrar: LeadRegistrar,
}

impl RegisterLeadTool {
    pub fn new(registrar: LeadRegistrar) -> Self {
        Self { registrar }
    }
}

#[async_trait]
impl Tool for RegisterLeadTool {
    fn name(&self) -> &'static str {
        REGISTER_LEAD_TOOL
    }

    fn declaration(&self) -> FunctionDeclaration {
        register_lead_declaration()
    }

    async fn invoke(&self, arguments: Value) -> Result<String, ToolArgumentsError> {
        let lead: Lead = parse_arguments(arguments)?;
        let outcome = self.registrar.create_or_update_lead(&lead).await;
        Ok(render_lead_outcome(&lead, &outcome))
    }
}

fn create_card_mutation(pipe_id: &str, title: &str) -> String {
    format!(
        "mutation {{ createCard(input: {{ pipe_id: {}, title: {} }}) {{ card {{ id }} }} }}",
        graphql_string(pipe_id),
        graphql_string(title)
    )
}

fn update_fields_mutation(card_id: &CardId, lead: &Lead) -> String {
    let values = [
        ("neg_cio", lead.name.as_str()),
        ("email_profissional", lead.email.as_str()),
        ("empresa", lead.company.as_str()),
        ("necessidade_dor", lead.need.as_str()),
        (INTEREST_CONFIRMED_FIELD, INTEREST_CONFIRMED_VALUE),
    ]
    .iter()
    .map(|(field_id, value)| {
        format!("{{ fieldId: {}, value: {} }}", graphql_string(field_id), graphql_string(value))
    })
    .collect::<Vec<_>>()
    .join(", ");

    format!(
        "mutation {{ updateFieldsValues(input: {{ nodeId: {}, values: [{values}] }}) {{ clientMutationId }} }}",
        graphql_string(&card_id.0)
    )
}

/// Quotes and escapes a GraphQL string literal (JSON escaping is a valid subset).
fn graphql_string(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

fn graphql_errors(response: &Value) -> Option<String> {
    match response.get("errors") {
        None | Some(Value::Null) => None,
        Some(errors) => Some(errors.to_string()),
    }
}

fn created_card_id(response: &Value) -> Option<CardId> {
    match response.pointer("/data/createCard/card/id")? {
        Value::String(id) if !id.is_empty() => Some(CardId(id.clone())),
        Value::Number(id) => Some(CardId(id.to_string())),
        _ => None,
    }
}
