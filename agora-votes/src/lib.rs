//! Agora Votes Library
//!
//! This library provides the HTTP surface of the voting subsystem, including
//! configuration management, error handling, dependency injection and the
//! axum router with its real-time event stream.

pub mod config;
pub mod errors;
pub mod server;

pub use config::{AppConfig, Dependencies, LogFormat};
pub use errors::{ApiError, ConfigError, StartupError};
