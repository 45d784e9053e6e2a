// THEORY:
// `TilingConfig` is the single tunable surface of the engine. It is read-only
// for the duration of a run and validated up front: a bad combination fails
// fast with a `ConfigError` at construction time, so once processing starts
// the only remaining failure class is per-tile detection errors (which are
// absorbed, not raised). Values are never silently clamped.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for tiling, parallel execution and cross-tile merging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TilingConfig {
    /// Master switch; when false, `should_tile` is always false and every
    /// image is processed as a single tile.
    pub enabled: bool,
    /// An image is tiled when its larger dimension exceeds this many pixels.
    pub dimension_threshold: u32,
    /// Nominal tile edge length in pixels.
    pub tile_size: u32,
    /// Pixel margin shared between grid-adjacent tiles. Must be smaller than
    /// `tile_size` so the grid step stays positive.
    pub overlap: u32,
    /// When true, cut lines snap to long straight boundary edges supplied by
    /// the phase-0 detector instead of the fixed grid.
    pub smart_boundaries: bool,
    /// Polygon IoU at or above which two same-typed zones from different
    /// tiles are merged. In [0, 1].
    pub merge_iou_threshold: f64,
    /// Polygon IoU at or above which two merged zones of the same type are
    /// considered duplicates and the lower-confidence one is dropped.
    /// Independent of `merge_iou_threshold`. In [0, 1].
    pub dedup_iou_threshold: f64,
    /// Upper bound on concurrently processed tiles. At least 1.
    pub max_parallel_tiles: usize,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dimension_threshold: 4000,
            tile_size: 2048,
            overlap: 256,
            smart_boundaries: false,
            merge_iou_threshold: 0.3,
            dedup_iou_threshold: 0.9,
            max_parallel_tiles: num_cpus::get().max(1),
        }
    }
}

impl TilingConfig {
    /// Validates the configuration, rejecting invalid combinations outright.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tile_size == 0 {
            return Err(ConfigError::ZeroTileSize(self.tile_size));
        }
        if self.overlap >= self.tile_size {
            return Err(ConfigError::OverlapTooLarge {
                overlap: self.overlap,
                tile_size: self.tile_size,
            });
        }
        if !(0.0..=1.0).contains(&self.merge_iou_threshold) {
            return Err(ConfigError::ThresholdOutOfRange {
                name: "merge_iou_threshold",
                value: self.merge_iou_threshold,
            });
        }
        if !(0.0..=1.0).contains(&self.dedup_iou_threshold) {
            return Err(ConfigError::ThresholdOutOfRange {
                name: "dedup_iou_threshold",
                value: self.dedup_iou_threshold,
            });
        }
        if self.max_parallel_tiles == 0 {
            return Err(ConfigError::ZeroParallelism);
        }
        Ok(())
    }

    /// Grid step between tile origins. Positive whenever `validate` passed.
    pub fn step(&self) -> u32 {
        self.tile_size - self.overlap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(TilingConfig::default().validate().is_ok());
    }

    #[test]
    fn overlap_must_be_smaller_than_tile_size() {
        let config = TilingConfig {
            tile_size: 500,
            overlap: 500,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::OverlapTooLarge {
                overlap: 500,
                tile_size: 500
            })
        );
    }

    #[test]
    fn thresholds_must_be_in_unit_interval() {
        let config = TilingConfig {
            merge_iou_threshold: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ThresholdOutOfRange { name: "merge_iou_threshold", .. })
        ));

        let config = TilingConfig {
            dedup_iou_threshold: -0.1,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ThresholdOutOfRange { name: "dedup_iou_threshold", .. })
        ));
    }

    #[test]
    fn parallelism_must_be_positive() {
        let config = TilingConfig {
            max_parallel_tiles: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroParallelism));
    }

    #[test]
    fn zero_tile_size_is_rejected_before_overlap_check() {
        let config = TilingConfig {
            tile_size: 0,
            overlap: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroTileSize(0)));
    }
}
