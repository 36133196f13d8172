pub mod config;
pub mod domain;
pub mod errors;

pub use config::{AppConfig, ConfigError, CrmSettings, LoadOptions, SchedulingSettings};
pub use domain::conversation::{
    ConversationId, Run, RunError, RunId, RunStatus, ToolCall, ToolCallId, ToolOutput,
};
pub use domain::lead::{CardId, Lead};
pub use domain::scheduling::{BookingLink, BookingRequest, Slot, TimeWindow};
pub use errors::GatewayError;
