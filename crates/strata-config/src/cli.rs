//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::{Config, OrchestrationMode, SchedulerKind};

/// Strata command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "strata", about = "Strata voxel terrain streaming")]
pub struct CliArgs {
    /// Render region radius in chunks.
    #[arg(long)]
    pub draw_distance: Option<u32>,

    /// Data region radius in chunks.
    #[arg(long)]
    pub load_distance: Option<u32>,

    /// Coordinates per generation batch.
    #[arg(long)]
    pub stream_batch: Option<usize>,

    /// Coordinates per mesh batch.
    #[arg(long)]
    pub mesh_batch: Option<usize>,

    /// Scheduler implementation.
    #[arg(long, value_enum)]
    pub scheduler: Option<SchedulerKind>,

    /// Pipeline interleaving mode.
    #[arg(long, value_enum)]
    pub orchestration: Option<OrchestrationMode>,

    /// World seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(d) = args.draw_distance {
            self.streaming.draw_distance = d;
        }
        if let Some(d) = args.load_distance {
            self.streaming.load_distance = d;
        }
        if let Some(n) = args.stream_batch {
            self.streaming.stream_batch_size = n;
        }
        if let Some(n) = args.mesh_batch {
            self.streaming.mesh_batch_size = n;
        }
        if let Some(kind) = args.scheduler {
            self.streaming.scheduler = kind;
        }
        if let Some(mode) = args.orchestration {
            self.streaming.orchestration = mode;
        }
        if let Some(seed) = args.seed {
            self.terrain.seed = seed;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
