use serde::{Deserialize, Serialize};

/// A prospective customer, keyed by the argument names the assistant uses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    #[serde(rename = "nome")]
    pub name: String,
    pub email: String,
    #[serde(rename = "empresa")]
    pub company: String,
    #[serde(rename = "necessidade")]
    pub need: String,
}

/// Identifier of the CRM card that holds a registered lead.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub String);

impl Lead {
    pub fn card_title(&self) -> String {
        format!("Lead - {}", self.name)
    }
}
