//! Demo binary that flies a camera down onto a procedural planet.
//!
//! Every frame runs one LOD update pass over the chunked mesh and logs what
//! changed. Configuration is loaded from `config.ron` and can be overridden
//! via CLI flags.
//! Run with `cargo run -p planeta-demo -- --frames 120 --verify` for a longer,
//! self-checking descent.

mod approach;

use std::cell::RefCell;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use clap::Parser;
use glam::Vec3;
use planeta_chunk::{ChunkConfig, ChunkError, ChunkedLodMesh, DistancePolicy, UpdateStats};
use planeta_config::{CliArgs, Config};
use planeta_skeleton::{SkeletonConfig, TriangleSkeleton};
use tracing::{error, info, warn};

use crate::approach::Approach;

fn skeleton_config(config: &Config) -> SkeletonConfig {
    SkeletonConfig {
        radius: config.planet.radius_m,
        max_vertices: config.skeleton.max_vertices,
        max_triangles: config.skeleton.max_triangles,
        max_depth: config.skeleton.max_depth,
    }
}

fn chunk_config(config: &Config) -> ChunkConfig {
    ChunkConfig {
        subdivision: config.chunking.subdivision,
        max_chunks: config.chunking.max_chunks,
        max_shared_vertices: config.chunking.max_shared_vertices,
    }
}

/// Gentle rolling hills, a fraction of a percent of the radius.
fn terrain_height(radius: f32) -> impl Fn(Vec3) -> f32 {
    let amplitude = radius * 0.002;
    move |dir: Vec3| amplitude * ((dir.x * 7.0).sin() * (dir.y * 5.0).cos() + (dir.z * 11.0).sin() * 0.5)
}

/// Run both structural verifiers, returning the number of violations.
fn verify_all(mesh: &ChunkedLodMesh) -> usize {
    let skeleton_violations = mesh.skeleton().borrow().verify().len();
    skeleton_violations + mesh.verify().len()
}

fn run(config: &Config) -> Result<(), ChunkError> {
    let skeleton = Rc::new(RefCell::new(TriangleSkeleton::with_config(skeleton_config(
        config,
    ))?));
    let mut mesh = ChunkedLodMesh::new(Rc::clone(&skeleton), chunk_config(config))?;
    mesh.set_height_fn(Box::new(terrain_height(config.planet.radius_m)));

    let approach = Approach::new(
        config.planet.radius_m,
        config.planet.start_altitude_m,
        config.planet.end_altitude_m,
        config.planet.frames,
    );
    let mut policy = DistancePolicy::new(
        config.planet.radius_m,
        config.lod.subdivide_threshold,
        config.lod.max_depth,
    );

    info!(
        "Descending from {:.0} m to {:.0} m over {} frames",
        approach.altitude(0),
        approach.altitude(approach.frames() - 1),
        approach.frames()
    );

    let mut totals = UpdateStats::default();
    let mut violations = 0;
    for frame in 0..approach.frames() {
        policy.viewer = approach.viewer(frame);
        let stats = mesh.chunk_geometry_update_all(&mut policy);

        let vertex_bytes: u64 = mesh.take_vertex_updates().iter().map(|r| r.len()).sum();
        let index_bytes: u64 = mesh.take_index_updates().iter().map(|r| r.len()).sum();
        info!(
            "Frame {frame}: altitude {:.1} m, +{} -{} chunks, {} subdivided, {} merged, {} live, {vertex_bytes} vertex bytes, {index_bytes} index bytes",
            approach.altitude(frame),
            stats.chunks_added,
            stats.chunks_removed,
            stats.subdivided,
            stats.merged,
            mesh.chunk_count()
        );
        if stats.subdivide_failures > 0 || stats.chunk_failures > 0 {
            warn!(
                "Frame {frame}: {} subdivisions and {} chunk adds refused",
                stats.subdivide_failures, stats.chunk_failures
            );
        }

        if config.debug.verify {
            violations += verify_all(&mesh);
        }
        totals.visited += stats.visited;
        totals.subdivided += stats.subdivided;
        totals.subdivide_failures += stats.subdivide_failures;
        totals.chunks_added += stats.chunks_added;
        totals.chunks_removed += stats.chunks_removed;
        totals.chunk_failures += stats.chunk_failures;
        totals.slots_packed += stats.slots_packed;
        totals.merged += stats.merged;
    }

    info!(
        "Descent complete: {} chunks added, {} removed, {} slots packed, {} merges, {} refusals",
        totals.chunks_added,
        totals.chunks_removed,
        totals.slots_packed,
        totals.merged,
        totals.subdivide_failures + totals.chunk_failures
    );
    mesh.log_stats();
    info!(
        "Drawing {} indices ({} triangles)",
        mesh.calc_index_count(),
        mesh.calc_index_count() / 3
    );
    if config.debug.verify {
        if violations == 0 {
            info!("Verifiers found no violations");
        } else {
            error!("Verifiers found {violations} violations");
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    // Resolve config directory
    let config_dir = args
        .config
        .clone()
        .or_else(|| Config::default_dir().ok())
        .unwrap_or_else(|| PathBuf::from(".planeta"));

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    planeta_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("Demo failed: {err}");
            ExitCode::FAILURE
        }
    }
}
