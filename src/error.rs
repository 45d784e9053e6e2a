// THEORY:
// The engine's error taxonomy is deliberately small. Only invalid
// configuration can fail a run, and only before processing starts; per-tile
// detection errors are absorbed into empty results, and degenerate geometry
// is defined as zero-IoU rather than raised. This module holds the single
// fatal error type.

use thiserror::Error;

/// A fatal configuration error, raised at construction and never during a
/// run. Invalid values are rejected outright, never silently clamped.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("tile_size must be at least 1, got {0}")]
    ZeroTileSize(u32),

    #[error("overlap ({overlap}) must be smaller than tile_size ({tile_size})")]
    OverlapTooLarge { overlap: u32, tile_size: u32 },

    #[error("{name} must be within [0, 1], got {value}")]
    ThresholdOutOfRange { name: &'static str, value: f64 },

    #[error("max_parallel_tiles must be at least 1")]
    ZeroParallelism,
}
