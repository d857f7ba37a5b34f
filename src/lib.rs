//! Anamnesis — guided intake conversation for a personal-training service.

pub mod config;
pub mod error;
pub mod intake;
pub mod lead;
pub mod llm;
pub mod question;
pub mod server;
pub mod store;
