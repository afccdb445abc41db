//! Direct Reply: Instagram direct-message sync, reply generation and dispatch.

pub mod channels;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod scheduler;
pub mod server;
pub mod store;
