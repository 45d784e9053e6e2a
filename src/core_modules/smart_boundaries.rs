// THEORY:
// The `smart_boundaries` module augments the plain grid tiler with cut lines
// snapped to the floorplan's own structure. Warehouse drawings are dominated
// by long straight walls; when the phase-0 detector reports those walls as
// boundary polygons, cutting the image along them (instead of at arbitrary
// grid positions) means far fewer zones straddle a tile boundary, and the
// merge layer has less reconciliation to do.
//
// The planner works per axis, independently:
// 1.  **Candidate Collection**: every sufficiently long (>100px),
//     near-axis-aligned polygon edge proposes a split at its midpoint, unless
//     it sits too close to an image edge to leave room for a tile.
// 2.  **Clustering**: several detected edges of the same physical wall land
//     within a few pixels of each other; candidates within half a minimum
//     tile size are clustered and replaced by the cluster median.
// 3.  **Minimum Tile Filtering**: surviving splits that would create a tile
//     thinner than the minimum are discarded in order.
// 4.  **Sparse-Data Fallback**: if fewer than half of the grid-implied number
//     of splits survive, the natural splits for that axis are discarded
//     entirely and the plain grid is used instead. Sparse natural-split data
//     is too unreliable to trust.
//
// Final tiles are the cross product of the surviving x and y intervals, each
// expanded by `overlap / 2` into interior neighbors (never past the image
// edge), so straddling detections still appear in both adjacent tiles.

use image::RgbaImage;
use log::debug;

use crate::config::TilingConfig;
use crate::core_modules::geometry::TileBounds;
use crate::core_modules::tiler::{Tile, compute_overlap_regions, extract_tile};
use crate::core_modules::zone::BoundaryHints;
use crate::error::ConfigError;

/// Minimum edge length for a boundary edge to propose a split, in pixels.
const MIN_EDGE_LENGTH: f64 = 100.0;

/// Maximum off-axis drift, as a fraction of edge length, for an edge to count
/// as axis-aligned.
const ALIGNMENT_RATIO: f64 = 0.15;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Y,
}

/// Grid tiler variant that snaps cut lines to long straight boundary edges.
#[derive(Debug, Clone)]
pub struct SmartBoundaryPlanner {
    config: TilingConfig,
    /// No planned tile may be thinner than this on either axis.
    min_tile_size: u32,
}

impl SmartBoundaryPlanner {
    /// Fails fast on an invalid configuration. The minimum tile size defaults
    /// to half the nominal tile size.
    pub fn new(config: TilingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let min_tile_size = (config.tile_size / 2).max(1);
        Ok(Self { config, min_tile_size })
    }

    /// Partitions the image along boundary-derived cut lines, falling back to
    /// the plain grid per axis when the natural splits are too sparse.
    pub fn plan_tiles(&self, image: &RgbaImage, hints: &BoundaryHints) -> Vec<Tile> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Vec::new();
        }

        let x_splits = self.axis_splits(width, hints, Axis::X);
        let y_splits = self.axis_splits(height, hints, Axis::Y);

        let x_intervals = intervals(width, &x_splits);
        let y_intervals = intervals(height, &y_splits);

        let half_overlap = self.config.overlap / 2;
        let mut tiles = Vec::with_capacity(x_intervals.len() * y_intervals.len());
        for (row, &(y1, y2)) in y_intervals.iter().enumerate() {
            for (col, &(x1, x2)) in x_intervals.iter().enumerate() {
                // Expand into interior neighbors only; image edges stay put.
                let bounds = TileBounds::new(
                    x1.saturating_sub(half_overlap),
                    y1.saturating_sub(half_overlap),
                    if x2 < width { (x2 + half_overlap).min(width) } else { width },
                    if y2 < height { (y2 + half_overlap).min(height) } else { height },
                );
                tiles.push(extract_tile(image, format!("tile_{col}_{row}"), bounds));
            }
        }

        compute_overlap_regions(&mut tiles);
        debug!(
            "smart tiling: {} x-splits, {} y-splits -> {} tiles",
            x_splits.len(),
            y_splits.len(),
            tiles.len()
        );
        tiles
    }

    /// Split positions for one axis: clustered natural splits when dense
    /// enough, the plain grid otherwise.
    fn axis_splits(&self, dim: u32, hints: &BoundaryHints, axis: Axis) -> Vec<u32> {
        let natural = self.natural_splits(dim, hints, axis);

        // Interior cut lines the plain grid would use for this dimension.
        let grid_implied = (dim.div_ceil(self.config.tile_size) as usize).saturating_sub(1);
        if natural.len() * 2 < grid_implied {
            debug!(
                "natural splits too sparse ({} of {grid_implied} grid-implied); using plain grid",
                natural.len()
            );
            return (1..dim.div_ceil(self.config.tile_size))
                .map(|i| i * self.config.tile_size)
                .collect();
        }
        natural
    }

    /// Collects, clusters and filters boundary-derived split candidates.
    fn natural_splits(&self, dim: u32, hints: &BoundaryHints, axis: Axis) -> Vec<u32> {
        let margin = self.min_tile_size as f64;
        let mut candidates: Vec<f64> = Vec::new();

        for polygon in &hints.polygons {
            for pair in polygon.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                let dx = (b.x - a.x).abs();
                let dy = (b.y - a.y).abs();
                let len = (dx * dx + dy * dy).sqrt();
                if len < MIN_EDGE_LENGTH {
                    continue;
                }

                // A near-vertical edge proposes an x split; near-horizontal, a y split.
                let (off_axis, position) = match axis {
                    Axis::X => (dx, (a.x + b.x) / 2.0),
                    Axis::Y => (dy, (a.y + b.y) / 2.0),
                };
                if off_axis > ALIGNMENT_RATIO * len {
                    continue;
                }
                if position < margin || position > dim as f64 - margin {
                    continue;
                }
                candidates.push(position);
            }
        }

        candidates.sort_by(|a, b| a.partial_cmp(b).unwrap());

        // Cluster candidates within min_tile_size / 2 of each other and take
        // the cluster median; multiple detections of the same wall collapse
        // to one cut line.
        let cluster_gap = self.min_tile_size as f64 / 2.0;
        let mut medians: Vec<u32> = Vec::new();
        let mut cluster: Vec<f64> = Vec::new();
        for &c in &candidates {
            if let Some(&last) = cluster.last() {
                if c - last > cluster_gap {
                    medians.push(median(&cluster) as u32);
                    cluster.clear();
                }
            }
            cluster.push(c);
        }
        if !cluster.is_empty() {
            medians.push(median(&cluster) as u32);
        }

        // Discard splits that would leave a tile thinner than the minimum.
        let mut splits = Vec::new();
        let mut last = 0u32;
        for m in medians {
            if m.saturating_sub(last) >= self.min_tile_size && dim - m >= self.min_tile_size {
                splits.push(m);
                last = m;
            }
        }
        splits
    }
}

/// Half-open intervals between consecutive splits, spanning the full axis.
fn intervals(dim: u32, splits: &[u32]) -> Vec<(u32, u32)> {
    let mut edges = Vec::with_capacity(splits.len() + 2);
    edges.push(0);
    edges.extend_from_slice(splits);
    edges.push(dim);
    edges.windows(2).map(|w| (w[0], w[1])).collect()
}

fn median(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::geometry::Point;

    fn planner(tile_size: u32, overlap: u32) -> SmartBoundaryPlanner {
        SmartBoundaryPlanner::new(TilingConfig {
            enabled: true,
            dimension_threshold: 100,
            tile_size,
            overlap,
            smart_boundaries: true,
            ..Default::default()
        })
        .unwrap()
    }

    fn vertical_wall(x: f64, y1: f64, y2: f64) -> Vec<Point> {
        vec![Point::new(x, y1), Point::new(x, y2)]
    }

    #[test]
    fn cut_lines_snap_to_long_vertical_walls() {
        let planner = planner(500, 40);
        let image = RgbaImage::new(2000, 400);
        let hints = BoundaryHints {
            polygons: vec![vertical_wall(600.0, 0.0, 400.0), vertical_wall(1300.0, 0.0, 400.0)],
            coverage_ratio: None,
        };
        let tiles = planner.plan_tiles(&image, &hints);

        // x splits at 600 and 1300, y falls back to the (empty) grid:
        // 3 columns x 1 row, expanded by overlap/2 = 20px inward.
        assert_eq!(tiles.len(), 3);
        let first = &tiles[0];
        assert_eq!(first.bounds, TileBounds::new(0, 0, 620, 400));
        let middle = &tiles[1];
        assert_eq!(middle.bounds, TileBounds::new(580, 0, 1320, 400));
        let last = &tiles[2];
        assert_eq!(last.bounds, TileBounds::new(1280, 0, 2000, 400));
    }

    #[test]
    fn nearby_wall_detections_cluster_to_their_median() {
        let planner = planner(500, 0);
        let image = RgbaImage::new(2000, 400);
        // Three detections of the same wall, plus a second distinct wall so
        // the sparse-data fallback does not kick in.
        let hints = BoundaryHints {
            polygons: vec![
                vertical_wall(600.0, 0.0, 400.0),
                vertical_wall(610.0, 0.0, 400.0),
                vertical_wall(620.0, 0.0, 400.0),
                vertical_wall(1400.0, 0.0, 400.0),
            ],
            coverage_ratio: None,
        };
        let tiles = planner.plan_tiles(&image, &hints);
        assert_eq!(tiles.len(), 3);
        assert_eq!(tiles[0].bounds.x2, 610);
        assert_eq!(tiles[1].bounds.x1, 610);
    }

    #[test]
    fn short_and_diagonal_edges_are_ignored() {
        let planner = planner(500, 0);
        let image = RgbaImage::new(2000, 400);
        let hints = BoundaryHints {
            polygons: vec![
                vertical_wall(700.0, 0.0, 50.0), // too short
                vec![Point::new(900.0, 0.0), Point::new(1100.0, 400.0)], // diagonal
            ],
            coverage_ratio: None,
        };
        let tiles = planner.plan_tiles(&image, &hints);
        // No usable natural splits: x falls back to the plain grid
        // (splits at 500, 1000, 1500).
        assert_eq!(tiles.len(), 4);
        assert_eq!(tiles[0].bounds.x2, 500);
    }

    #[test]
    fn splits_too_close_to_the_edge_are_dropped() {
        let planner = planner(500, 0);
        let image = RgbaImage::new(2000, 400);
        // min_tile_size = 250: the wall at x=100 leaves too thin a first tile.
        let hints = BoundaryHints {
            polygons: vec![
                vertical_wall(100.0, 0.0, 400.0),
                vertical_wall(700.0, 0.0, 400.0),
                vertical_wall(1400.0, 0.0, 400.0),
            ],
            coverage_ratio: None,
        };
        let tiles = planner.plan_tiles(&image, &hints);
        assert_eq!(tiles.len(), 3);
        assert_eq!(tiles[0].bounds.x2, 700);
    }

    #[test]
    fn sparse_natural_splits_fall_back_to_grid() {
        let planner = planner(500, 0);
        let image = RgbaImage::new(2000, 400);
        // One natural split against three grid-implied: 1 * 2 < 3.
        let hints = BoundaryHints {
            polygons: vec![vertical_wall(900.0, 0.0, 400.0)],
            coverage_ratio: None,
        };
        let tiles = planner.plan_tiles(&image, &hints);
        assert_eq!(tiles.len(), 4);
        assert_eq!(tiles[0].bounds.x2, 500);
    }

    #[test]
    fn no_hints_behaves_like_the_grid() {
        let planner = planner(500, 0);
        let image = RgbaImage::new(1200, 900);
        let tiles = planner.plan_tiles(&image, &BoundaryHints::default());
        // x: splits at 500, 1000; y: splits at 500.
        assert_eq!(tiles.len(), 6);
    }
}
