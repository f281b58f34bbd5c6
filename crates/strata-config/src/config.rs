//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Chunk streaming and meshing pipeline settings.
    pub streaming: StreamingConfig,
    /// Terrain synthesis settings.
    pub terrain: TerrainConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Which job scheduler implementation runs the pipeline kernels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
pub enum SchedulerKind {
    /// Kernels run inline on the orchestrating thread when a batch is scheduled.
    Synchronous,
    /// Kernels run on a shared worker-thread pool.
    ThreadPool,
}

/// How the orchestrator interleaves the two pipelines.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
pub enum OrchestrationMode {
    /// At most one pipeline ticks per frame (IDLE / STREAMING / MESHING).
    Alternating,
    /// Both pipelines may have a batch in flight at the same time.
    Overlapped,
}

/// Chunk streaming configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamingConfig {
    /// Chunk extents in blocks along x, y, z.
    pub chunk_extent: [u32; 3],
    /// Radius in chunks of the render (mesh) region.
    pub draw_distance: u32,
    /// Radius in chunks of the data retention region.
    pub load_distance: u32,
    /// Coordinates generated per data batch.
    pub stream_batch_size: usize,
    /// Coordinates meshed per mesh batch.
    pub mesh_batch_size: usize,
    /// Extra render objects beyond the draw volume.
    pub pool_slack: usize,
    /// Extra chunks the store may hold beyond the load volume.
    pub store_slack: usize,
    /// Scheduler implementation.
    pub scheduler: SchedulerKind,
    /// Worker threads for the thread-pool scheduler (0 = derive from CPU count).
    pub worker_threads: usize,
    /// Pipeline interleaving.
    pub orchestration: OrchestrationMode,
}

/// Terrain synthesis configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TerrainConfig {
    /// World seed for deterministic generation.
    pub seed: u64,
    /// Number of fBm octaves for the surface height.
    pub octaves: u32,
    /// Frequency of the lowest octave.
    pub base_frequency: f64,
    /// Amplitude of the lowest octave, in blocks.
    pub amplitude: f64,
    /// Amplitude multiplier between octaves.
    pub persistence: f64,
    /// Frequency multiplier between octaves.
    pub lacunarity: f64,
    /// Mean surface height, in blocks.
    pub base_height: f64,
    /// Frequency of the 3D cave noise (0 disables caves).
    pub cave_frequency: f64,
    /// Cave noise above this value carves air.
    pub cave_threshold: f64,
    /// Empty cells below this world height fill with water.
    pub water_level: i32,
    /// Density band below the surface that uses the surface block.
    pub surface_depth: f64,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_extent: [16, 16, 16],
            draw_distance: 4,
            load_distance: 5,
            stream_batch_size: 8,
            mesh_batch_size: 8,
            pool_slack: 8,
            store_slack: 32,
            scheduler: SchedulerKind::ThreadPool,
            worker_threads: 0,
            orchestration: OrchestrationMode::Alternating,
        }
    }
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            octaves: 4,
            base_frequency: 0.01,
            amplitude: 12.0,
            persistence: 0.5,
            lacunarity: 2.0,
            base_height: 8.0,
            cave_frequency: 0.05,
            cave_threshold: 0.6,
            water_level: 4,
            surface_depth: 3.0,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl StreamingConfig {
    /// Number of chunks in a cube of the given radius: `(2r + 1)^3`.
    pub fn region_volume(radius: u32) -> usize {
        let side = 2 * radius as usize + 1;
        side * side * side
    }

    /// Chunk store capacity: load volume plus slack.
    pub fn store_capacity(&self) -> usize {
        Self::region_volume(self.load_distance) + self.store_slack
    }

    /// Render pool capacity: draw volume plus slack.
    pub fn pool_capacity(&self) -> usize {
        Self::region_volume(self.draw_distance) + self.pool_slack
    }

    /// Rejects zero extents or batch sizes, and a load region that does
    /// not reach at least one chunk past the draw region.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_extent.contains(&0) {
            return Err(ConfigError::Invalid {
                field: "streaming.chunk_extent",
                reason: format!("every extent must be non-zero, got {:?}", self.chunk_extent),
            });
        }
        if self.stream_batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "streaming.stream_batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.mesh_batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "streaming.mesh_batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        // Draw-region chunks mesh only once all 26 neighbours are loaded.
        if self.load_distance < self.draw_distance + 1 {
            return Err(ConfigError::Invalid {
                field: "streaming.load_distance",
                reason: format!(
                    "must exceed draw_distance ({}), got {}",
                    self.draw_distance, self.load_distance
                ),
            });
        }
        Ok(())
    }

    /// Worker thread count with the `0 = auto` rule applied.
    pub fn effective_worker_threads(&self, available_cpus: usize) -> usize {
        if self.worker_threads > 0 {
            self.worker_threads
        } else {
            available_cpus.saturating_sub(1).max(1)
        }
    }
}

// --- Load / Save / Reload / Validate ---

impl Config {
    /// Default config directory (`<platform config dir>/strata`), if the platform has one.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("strata"))
    }

    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }

    /// Checks the values the streaming core relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.streaming.validate()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
