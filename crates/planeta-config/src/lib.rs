//! Configuration for the Planeta planet mesh engine.
//!
//! Settings persist to disk as `config.ron`. CLI arguments override loaded
//! values, and unknown or missing fields fall back to defaults so older and
//! newer files keep loading.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{ChunkingConfig, Config, DebugConfig, LodConfig, PlanetConfig, SkeletonLimits};
pub use error::ConfigError;
