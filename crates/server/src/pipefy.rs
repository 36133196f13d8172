//! Pipefy GraphQL transport for lead registration.

use async_trait::async_trait;
use reqwest::Client;
use sdr_assist_agent::tools::lead::CrmGateway;
use sdr_assist_core::errors::GatewayError;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::debug;

#[derive(Clone, Debug)]
pub struct PipefyGateway {
    client: Client,
    api_url: String,
}

impl PipefyGateway {
    pub fn new(client: Client, api_url: impl Into<String>) -> Self {
        Self { client, api_url: api_url.into() }
    }
}

#[async_trait]
impl CrmGateway for PipefyGateway {
    async fn execute(&self, api_key: &SecretString, query: &str) -> Result<Value, GatewayError> {
        debug!(event_name = "server.pipefy.request", api_url = %self.api_url, "sending graphql request");
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key.expose_secret())
            .json(&json!({ "query": query }))
            .send()
            .await
            .map_err(|error| GatewayError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status { status: status.as_u16(), body });
        }

        response.json::<Value>().await.map_err(|error| GatewayError::Decode(error.to_string()))
    }
}
