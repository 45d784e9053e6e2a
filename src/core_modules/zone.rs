// THEORY:
// The `zone` module defines the data contract between this engine and the
// external zone-detection layer. The engine never performs pixel-level
// detection itself; it trusts whatever typed polygons the `ZoneDetector`
// collaborator returns per tile and limits its own guarantees to geometric
// consistency across tiles.
//
// Key architectural principles:
// 1.  **Open Type Tags**: `zone_type` is a free-form string, not a closed
//     enumeration. The detection layer may introduce new zone types without
//     this crate's knowledge, and the merger only ever compares tags for
//     equality.
// 2.  **Frames Are Explicit**: a `Zone` is always tile-local; a `MergedZone`
//     is always in original-image coordinates. The types are distinct so the
//     frame of a polygon is never ambiguous.
// 3.  **Provenance Over Mutation**: merged zones carry `"tile_id:zone_id"`
//     provenance strings instead of references, keeping every record
//     immutable once constructed.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core_modules::geometry::{Point, TileBounds};
use crate::core_modules::tiler::Tile;

/// A typed polygon region detected within a single tile, in tile-local pixel
/// coordinates. Produced by the external `ZoneDetector`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    /// Free-form tag assigned by the detection layer ("parking", "storage",
    /// ...). Not constrained by this crate.
    pub zone_type: String,
    /// Ordered vertices; may be empty or degenerate, which downstream IoU
    /// math defines as zero overlap rather than an error.
    pub polygon: Vec<Point>,
    /// Detection confidence in [0, 1].
    pub confidence: f64,
    /// Opaque key-value bag carried through the merge untouched.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// The zones detected for one tile, still in that tile's local frame.
/// Immutable input to the merger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileZoneResult {
    pub tile_id: String,
    pub zones: Vec<Zone>,
    /// Bounds of the originating tile in original-image coordinates.
    pub bounds: TileBounds,
}

/// Terminal output of the engine: a zone in original-image coordinates with
/// provenance back to every contributing per-tile detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedZone {
    pub id: String,
    pub zone_type: String,
    pub polygon: Vec<Point>,
    pub confidence: f64,
    /// `"tile_id:zone_id"` for every contributing zone.
    pub source_zones: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Boundary polygons supplied by the phase-0 color-boundary detector, in
/// original-image coordinates. Consumed by the smart-boundary planner and the
/// closed-region / fast-track evaluators.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoundaryHints {
    pub polygons: Vec<Vec<Point>>,
    /// Fraction of the image covered by detected boundaries, where the
    /// upstream detector provides it.
    pub coverage_ratio: Option<f64>,
}

/// The external per-tile detection collaborator.
///
/// Called at most once per tile per run, possibly concurrently from several
/// workers; implementations must be pure or internally thread-safe. Errors
/// are absorbed by the processor as an empty result for that tile and never
/// abort the run; retry and timeout policy belong to the implementation.
pub trait ZoneDetector: Send + Sync {
    fn detect(&self, tile: &Tile) -> anyhow::Result<Vec<Zone>>;
}

impl<F> ZoneDetector for F
where
    F: Fn(&Tile) -> anyhow::Result<Vec<Zone>> + Send + Sync,
{
    fn detect(&self, tile: &Tile) -> anyhow::Result<Vec<Zone>> {
        self(tile)
    }
}
