//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Planet and demo camera settings.
    pub planet: PlanetConfig,
    /// Skeleton pool sizes.
    pub skeleton: SkeletonLimits,
    /// Chunk resolution and pool sizes.
    pub chunking: ChunkingConfig,
    /// Level-of-detail selection.
    pub lod: LodConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Planet configuration and the scripted camera approach.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlanetConfig {
    /// Planet radius in meters.
    pub radius_m: f32,
    /// Camera altitude above the surface at the first frame.
    pub start_altitude_m: f32,
    /// Camera altitude above the surface at the last frame.
    pub end_altitude_m: f32,
    /// Number of update passes in the approach.
    pub frames: u32,
}

/// Fixed capacities of the triangle skeleton.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SkeletonLimits {
    pub max_vertices: u32,
    pub max_triangles: u32,
    /// Deepest subdivision level the skeleton accepts.
    pub max_depth: u8,
}

/// Chunk resolution and pool sizes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Chunks have `2^subdivision` segments per edge.
    pub subdivision: u8,
    pub max_chunks: u32,
    pub max_shared_vertices: u32,
}

/// Level-of-detail selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LodConfig {
    /// Edge length over viewer distance above which a triangle is split.
    pub subdivide_threshold: f32,
    /// Deepest level the policy asks for.
    pub max_depth: u8,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Run the structural verifiers after every update pass.
    pub verify: bool,
}

// --- Default implementations ---

impl Default for PlanetConfig {
    fn default() -> Self {
        Self {
            radius_m: 6_000.0,
            start_altitude_m: 30_000.0,
            end_altitude_m: 50.0,
            frames: 60,
        }
    }
}

impl Default for SkeletonLimits {
    fn default() -> Self {
        Self {
            max_vertices: 65_536,
            max_triangles: 32_768,
            max_depth: 12,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            subdivision: 4,
            max_chunks: 2048,
            max_shared_vertices: 131_072,
        }
    }
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            subdivide_threshold: 0.8,
            max_depth: 10,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            verify: false,
        }
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Platform config directory for Planeta, e.g. `~/.config/planeta`.
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("planeta"))
            .ok_or(ConfigError::NoConfigDir)
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
}
