//! Domain types, configuration and per-chat state

pub mod chat_state;
pub mod config;
pub mod models;
pub mod thread;
