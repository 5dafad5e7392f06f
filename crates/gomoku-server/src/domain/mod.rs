//! Domain layer: runtime configuration for the server.

pub mod config;

pub use config::ServerConfig;
