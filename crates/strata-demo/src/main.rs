//! Headless streaming demo.
//!
//! Loads `config.ron` (CLI flags override it), then flies a focus point along
//! +X over procedural terrain, ticking the streaming orchestrator once per
//! frame and logging what it did.
//!
//! Run with: `cargo run -p strata-demo -- --frames 600 --speed 0.5`

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use glam::DVec3;
use strata_config::{CliArgs, Config};
use strata_mesh::GreedyMesher;
use strata_stream::{HeadlessRenderObject, Orchestrator, StreamError};
use strata_terrain::{ChunkGenerator, NoiseField, TerrainPalette};
use strata_voxel::{BlockRegistry, ChunkExtent, ChunkState};
use tracing::{error, info};

/// CLI arguments for the demo binary.
#[derive(Parser, Debug)]
#[command(name = "strata-demo", about = "Headless Strata terrain streaming demo")]
struct DemoArgs {
    #[command(flatten)]
    cli: CliArgs,

    /// Number of frames to simulate.
    #[arg(long, default_value_t = 300)]
    frames: u32,

    /// Focus speed along +X in blocks per frame.
    #[arg(long, default_value_t = 0.25)]
    speed: f64,
}

fn main() -> ExitCode {
    let args = DemoArgs::parse();

    let config_dir = args.cli.config.clone().or_else(Config::default_dir);
    let mut config = match &config_dir {
        Some(dir) => Config::load_or_create(dir).unwrap_or_else(|e| {
            eprintln!("Failed to load config: {e}, using defaults");
            Config::default()
        }),
        None => Config::default(),
    };
    config.apply_cli_overrides(&args.cli);
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        return ExitCode::from(2);
    }

    let log_dir = config_dir.as_ref().map(|dir| dir.join("logs"));
    strata_log::init_logging(log_dir.as_deref(), cfg!(debug_assertions), Some(&config));

    info!("Strata headless streaming demo");
    info!(
        "Regions: draw={} load={} | extent={:?} | scheduler={:?} | mode={:?}",
        config.streaming.draw_distance,
        config.streaming.load_distance,
        config.streaming.chunk_extent,
        config.streaming.scheduler,
        config.streaming.orchestration,
    );

    match run(&config, args.frames, args.speed) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "streaming halted");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config, frames: u32, speed: f64) -> Result<(), StreamError> {
    let registry = Arc::new(BlockRegistry::with_defaults());
    let palette = TerrainPalette::from_registry(&registry, &config.terrain)?;
    let field = NoiseField::from_config(&config.terrain);
    let start_height = field.surface_height(0.5, 0.5);

    let [x, y, z] = config.streaming.chunk_extent;
    let generator = ChunkGenerator::new(Arc::new(field), palette, ChunkExtent::new(x, y, z));
    let mesher = GreedyMesher::new(registry.clone(), registry);
    let mut orchestrator = Orchestrator::new(
        &config.streaming,
        generator,
        mesher,
        HeadlessRenderObject::default,
    )?;

    let mut position = DVec3::new(0.5, start_height + 2.0, 0.5);
    info!("Start: ({:.1}, {:.1}, {:.1})", position.x, position.y, position.z);
    orchestrator.update_focus(position);

    for frame in 0..frames {
        position.x += speed;
        let update = orchestrator.update_focus(position);
        if update.load_claims > 0 {
            info!(
                "Frame {frame}: focus {} | +{} / -{} chunks",
                orchestrator.focus().unwrap_or_default(),
                update.load_claims,
                update.load_reclaims,
            );
        }
        orchestrator.tick()?;
    }

    let drain_ticks = orchestrator.run_until_idle(100_000)?;
    orchestrator.check_invariants()?;

    let pool = orchestrator.pool();
    let (vertices, triangles) = pool
        .active_coordinates()
        .filter_map(|coord| pool.get(coord))
        .fold((0, 0), |(v, t), object| {
            (
                v + object.vertex_count,
                t + (object.opaque_index_count + object.translucent_index_count) / 3,
            )
        });
    let stats = orchestrator.stats();
    let states = orchestrator.states();
    info!(
        "Done after {} ticks ({} to drain): {} loaded, {} active, {} vertices, {} triangles",
        stats.ticks,
        drain_ticks,
        orchestrator.store().len(),
        states.count(ChunkState::Active),
        vertices,
        triangles,
    );
    info!(
        "Merged {} chunks, applied {} meshes, discarded {} stale chunks and {} stale meshes, {} store evictions, pool created {} objects",
        stats.chunks_merged,
        stats.meshes_applied,
        stats.stale_chunks,
        stats.stale_meshes,
        stats.store_evictions,
        pool.created_count(),
    );
    Ok(())
}
