pub mod conversation;
pub mod lead;
pub mod scheduling;
