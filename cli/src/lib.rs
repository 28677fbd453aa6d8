//! # Freightline CLI
//!
//! Process entry point for the booking engine: configuration, resource
//! lifecycle and the `freightline` subcommands.

pub mod commands;
pub mod config;
pub mod resources;

pub use commands::{Cli, Command};
pub use config::{Config, ConfigError};
pub use resources::Resources;
