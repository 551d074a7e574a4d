//! Client core of the AgenticAI assistant: typed orchestrator schemas, the
//! session context, and consumption of streamed chat replies.

pub mod client;
pub mod config;
pub mod errors;
pub mod models;
pub mod service;
pub mod session;
pub mod stream;
