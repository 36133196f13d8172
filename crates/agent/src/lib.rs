//! Agent Runtime - conversation driver and sales tools for the SDR assistant
//!
//! This crate is the part of the service that talks to the hosted assistant:
//! - Drives one chat turn end to end (`driver`)
//! - Speaks the remote assistant runtime protocol (`assistant`, `openai`)
//! - Routes the assistant's function calls to local tools (`tools`)
//! - Holds the fixed persona and tool declarations (`persona`)
//!
//! # Turn loop
//!
//! 1. **Append** the user message, moving to a fresh conversation if the old
//!    one still has an active run
//! 2. **Run** the assistant with the persona and the three sales tools
//! 3. **Poll** until the run settles, executing required tool calls through
//!    the `ToolRegistry` and submitting their outputs in one batch
//! 4. **Reply** with the latest assistant message, or a failure sentence
//!    carrying the run status
//!
//! # Integrations
//!
//! The CRM and scheduling providers sit behind `CrmGateway` and
//! `SchedulingGateway`. Adapters return typed outcomes; the Portuguese
//! sentences the assistant reads are rendered only at the tool edge.

pub mod assistant;
pub mod driver;
pub mod openai;
pub mod persona;
pub mod tools;

pub use assistant::{AssistantClient, AssistantError};
pub use driver::{ConversationDriver, DriverSettings, TurnError, TurnReply};
pub use tools::ToolRegistry;
