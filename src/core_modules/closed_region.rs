// THEORY:
// The `closed_region` module grades the quality of externally supplied
// boundary polygons. The phase-0 color-boundary detector is noisy: it emits
// open polylines, slivers and fragments alongside genuinely closed zone
// outlines. Before the engine can decide to skip detailed processing it needs
// to know how many of those boundaries actually close into plausible regions.
//
// A polygon counts as a closed region when it has enough vertices, its first
// and last vertex nearly coincide (small closure gap), and its area is not
// negligible relative to the image (or an absolute floor when the image size
// is unknown). Convexity (area / convex-hull-area) is computed as a quality
// signal but never used for rejection; warehouse zones are frequently
// L-shaped and a convexity cut would throw them away.

use log::debug;

use crate::core_modules::geometry::{Point, convex_hull, polygon_area};

/// Thresholds for grading boundary polygons.
#[derive(Debug, Clone)]
pub struct ClosedRegionConfig {
    /// Minimum vertex count for a polygon to be considered at all.
    pub min_vertices: usize,
    /// Maximum Euclidean distance between first and last vertex for the
    /// polygon to count as closed, in pixels.
    pub closure_threshold: f64,
    /// Minimum area as a fraction of image area, when the image size is known.
    pub min_area_ratio: f64,
    /// Absolute minimum area in square pixels, used when it is not.
    pub min_absolute_area: f64,
}

impl Default for ClosedRegionConfig {
    fn default() -> Self {
        Self {
            min_vertices: 4,
            closure_threshold: 10.0,
            min_area_ratio: 0.001,
            min_absolute_area: 400.0,
        }
    }
}

/// One boundary polygon that passed all closure checks.
#[derive(Debug, Clone)]
pub struct ClosedRegion {
    pub polygon: Vec<Point>,
    pub area: f64,
    /// area / convex-hull-area in (0, 1]; 1.0 for convex outlines.
    pub convexity: f64,
}

/// Aggregate closure analysis over all supplied boundaries. Read-only once
/// constructed.
#[derive(Debug, Clone)]
pub struct ClosedRegionResult {
    pub has_closed_regions: bool,
    pub closed_region_count: usize,
    pub total_boundary_count: usize,
    /// closed / total; 0.0 when no boundaries were supplied.
    pub closure_ratio: f64,
    pub regions: Vec<ClosedRegion>,
}

impl ClosedRegionResult {
    /// Whether the closure signal alone is strong enough to consider skipping
    /// detailed processing: at least one closed region and at least half of
    /// all boundaries closing.
    pub fn is_fast_track_eligible(&self) -> bool {
        self.has_closed_regions && self.closure_ratio >= 0.5
    }
}

/// Analyzes externally detected boundary polygons for closure quality.
#[derive(Debug, Clone, Default)]
pub struct ClosedRegionDetector {
    config: ClosedRegionConfig,
}

impl ClosedRegionDetector {
    pub fn new(config: ClosedRegionConfig) -> Self {
        Self { config }
    }

    /// Grades every supplied polygon and aggregates the counts. Empty input
    /// yields a neutral result with a closure ratio of 0.0.
    pub fn analyze(
        &self,
        boundaries: &[Vec<Point>],
        image_size: Option<(u32, u32)>,
    ) -> ClosedRegionResult {
        let mut regions = Vec::new();

        for polygon in boundaries {
            if polygon.len() < self.config.min_vertices {
                continue;
            }

            let gap = polygon[0].distance(polygon.last().expect("non-empty by vertex check"));
            if gap > self.config.closure_threshold {
                continue;
            }

            let area = polygon_area(polygon);
            let large_enough = match image_size {
                Some((w, h)) => {
                    let image_area = w as f64 * h as f64;
                    image_area > 0.0 && area / image_area >= self.config.min_area_ratio
                }
                None => area >= self.config.min_absolute_area,
            };
            if !large_enough {
                continue;
            }

            let hull_area = polygon_area(&convex_hull(polygon));
            let convexity = if hull_area > 0.0 { area / hull_area } else { 0.0 };

            regions.push(ClosedRegion {
                polygon: polygon.clone(),
                area,
                convexity,
            });
        }

        let total = boundaries.len();
        let closed = regions.len();
        let closure_ratio = if total == 0 { 0.0 } else { closed as f64 / total as f64 };

        debug!("closed-region analysis: {closed}/{total} boundaries closed (ratio {closure_ratio:.3})");

        ClosedRegionResult {
            has_closed_regions: closed > 0,
            closed_region_count: closed,
            total_boundary_count: total,
            closure_ratio,
            regions,
        }
    }
}
