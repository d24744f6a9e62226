//! Command-line argument parsing for Planeta.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Planeta command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "planeta", about = "Procedural planet LOD mesh demo")]
pub struct CliArgs {
    /// Planet radius in meters.
    #[arg(long)]
    pub radius: Option<f32>,

    /// Number of update passes in the camera approach.
    #[arg(long)]
    pub frames: Option<u32>,

    /// Chunk subdivision exponent (2^n segments per edge).
    #[arg(long)]
    pub subdivision: Option<u8>,

    /// Deepest LOD level the policy asks for.
    #[arg(long)]
    pub max_depth: Option<u8>,

    /// Apparent size above which triangles are subdivided.
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Run the structural verifiers after every pass.
    #[arg(long)]
    pub verify: bool,

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
        if let Some(radius) = args.radius {
            self.planet.radius_m = radius;
        }
        if let Some(frames) = args.frames {
            self.planet.frames = frames;
        }
        if let Some(subdivision) = args.subdivision {
            self.chunking.subdivision = subdivision;
        }
        if let Some(depth) = args.max_depth {
            self.lod.max_depth = depth;
        }
        if let Some(threshold) = args.threshold {
            self.lod.subdivide_threshold = threshold;
        }
        if args.verify {
            self.debug.verify = true;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            radius: Some(500.0),
            subdivision: Some(3),
            verify: true,
            ..CliArgs::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.planet.radius_m, 500.0);
        assert_eq!(config.chunking.subdivision, 3);
        assert!(config.debug.verify);
        // Non-overridden fields retain defaults
        assert_eq!(config.planet.frames, 60);
        assert_eq!(config.lod.max_depth, 10);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_parse_flags() {
        let args = CliArgs::parse_from([
            "planeta",
            "--threshold",
            "0.5",
            "--log-level",
            "debug",
            "--verify",
        ]);
        assert_eq!(args.threshold, Some(0.5));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.verify);
        assert!(args.config.is_none());
    }
}
