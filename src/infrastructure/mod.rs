// Infrastructure: server lifecycle and configuration

pub mod config;
pub mod server;

pub use config::{ConfigError, Settings};
pub use server::{start_server, ServerConfig, ServerError};
