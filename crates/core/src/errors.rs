use thiserror::Error;

/// Failure talking to an external collaborator (CRM or scheduling service).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("request could not be sent: {0}")]
    Transport(String),
    #[error("remote service answered with HTTP {status}")]
    Status { status: u16, body: String },
    #[error("response body could not be decoded: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(_) | Self::Decode(_) => None,
        }
    }
}
