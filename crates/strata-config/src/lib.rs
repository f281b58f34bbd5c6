//! Configuration system for Strata terrain streaming.
//!
//! Settings persist to disk as RON files, can be overridden from the command
//! line via clap, and are validated before the streaming core consumes them.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    Config, DebugConfig, OrchestrationMode, SchedulerKind, StreamingConfig, TerrainConfig,
};
pub use error::ConfigError;
