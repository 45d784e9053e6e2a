// THEORY:
// The `merger` module reconciles redundant detections coming from
// independently processed, overlapping tiles into one consistent result in
// the original-image frame. A zone that straddles a tile boundary is detected
// (partially) by both neighbors; left alone, the downstream classifier would
// see two half-zones where the floorplan has one.
//
// The algorithm, in order:
// 1.  **Coordinate Lift**: every per-tile zone is transformed into
//     original-image coordinates using its tile's bounds.
// 2.  **Candidate Search**: only pairs from *different* tiles with the same
//     `zone_type` are considered. A cheap box-IoU pre-filter at half the
//     merge threshold culls most pairs before the expensive polygon
//     rasterization runs; survivors at or above the merge threshold become
//     merge edges.
// 3.  **Union-Find Grouping**: the merge graph is never materialized; an
//     array-based disjoint-set structure groups zones transitively. Two zones
//     from the same tile are never compared directly, but can end up in one
//     group through a cross-tile bridge.
// 4.  **Fusion**: each multi-member group becomes one zone whose polygon is
//     the convex hull of all member vertices, whose confidence is the mean of
//     member confidences, and whose provenance lists every contributing
//     `"tile_id:zone_id"`.
// 5.  **Deduplication**: near-identical survivors of the same type (polygon
//     IoU at or above the dedup threshold) are collapsed to the
//     higher-confidence one; ties keep the first encountered.

use std::collections::HashMap;

use log::debug;

use crate::core_modules::geometry::{Point, convex_hull, polygon_bounding_box, transform_polygon};
use crate::core_modules::iou::{iou_fast, iou_polygon};
use crate::core_modules::zone::{MergedZone, TileZoneResult};

/// Array-based disjoint set with path compression. Zone counts per run are
/// bounded, so no union-by-rank is needed.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = x;
        while cur != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

/// A zone lifted into the original-image frame, with its provenance.
struct LiftedZone {
    tile_index: usize,
    provenance: String,
    zone_type: String,
    polygon: Vec<Point>,
    confidence: f64,
    metadata: HashMap<String, serde_json::Value>,
}

/// Merges and deduplicates per-tile zones across tile boundaries.
#[derive(Debug, Clone)]
pub struct ZoneMerger {
    merge_iou_threshold: f64,
    dedup_iou_threshold: f64,
}

impl ZoneMerger {
    pub fn new(merge_iou_threshold: f64, dedup_iou_threshold: f64) -> Self {
        Self {
            merge_iou_threshold,
            dedup_iou_threshold,
        }
    }

    /// Runs the full lift / group / fuse / dedup pipeline over all per-tile
    /// results. Empty input yields an empty output.
    pub fn merge(&self, results: &[TileZoneResult]) -> Vec<MergedZone> {
        let lifted = self.lift(results);
        if lifted.is_empty() {
            return Vec::new();
        }

        let mut groups = DisjointSet::new(lifted.len());
        let bboxes: Vec<_> = lifted.iter().map(|z| polygon_bounding_box(&z.polygon)).collect();

        // Box pre-filter at half the merge threshold: generous enough to keep
        // every true candidate, cheap enough to cull the quadratic pair scan.
        let prefilter = self.merge_iou_threshold * 0.5;
        let mut edges = 0usize;
        for i in 0..lifted.len() {
            for j in (i + 1)..lifted.len() {
                if lifted[i].tile_index == lifted[j].tile_index {
                    continue;
                }
                if lifted[i].zone_type != lifted[j].zone_type {
                    continue;
                }
                let (Some(bi), Some(bj)) = (bboxes[i], bboxes[j]) else {
                    continue;
                };
                if iou_fast(&bi, &bj) < prefilter {
                    continue;
                }
                let iou = iou_polygon(&lifted[i].polygon, &lifted[j].polygon, Some(bi.union(&bj)));
                if iou >= self.merge_iou_threshold {
                    groups.union(i, j);
                    edges += 1;
                }
            }
        }

        // Collect groups in order of their first member, so output ids are
        // deterministic for a given input.
        let mut members: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut order: Vec<usize> = Vec::new();
        for i in 0..lifted.len() {
            let root = groups.find(i);
            members
                .entry(root)
                .or_insert_with(|| {
                    order.push(root);
                    Vec::new()
                })
                .push(i);
        }

        let merged: Vec<MergedZone> = order
            .iter()
            .enumerate()
            .map(|(n, root)| fuse_group(n, &members[root], &lifted))
            .collect();

        debug!(
            "merge: {} zones, {} merge edges -> {} groups",
            lifted.len(),
            edges,
            merged.len()
        );

        self.dedup(merged)
    }

    /// Collapses near-identical zones of the same type, keeping the
    /// higher-confidence one (ties keep the first encountered).
    pub fn dedup(&self, zones: Vec<MergedZone>) -> Vec<MergedZone> {
        let mut removed = vec![false; zones.len()];
        for i in 0..zones.len() {
            if removed[i] {
                continue;
            }
            for j in (i + 1)..zones.len() {
                if removed[j] || zones[i].zone_type != zones[j].zone_type {
                    continue;
                }
                if iou_polygon(&zones[i].polygon, &zones[j].polygon, None)
                    >= self.dedup_iou_threshold
                {
                    if zones[j].confidence > zones[i].confidence {
                        removed[i] = true;
                        break;
                    }
                    removed[j] = true;
                }
            }
        }

        let survivors: Vec<MergedZone> = zones
            .into_iter()
            .zip(removed)
            .filter(|(_, dropped)| !dropped)
            .map(|(z, _)| z)
            .collect();
        survivors
    }

    fn lift(&self, results: &[TileZoneResult]) -> Vec<LiftedZone> {
        let mut lifted = Vec::new();
        for (tile_index, result) in results.iter().enumerate() {
            for zone in &result.zones {
                lifted.push(LiftedZone {
                    tile_index,
                    provenance: format!("{}:{}", result.tile_id, zone.id),
                    zone_type: zone.zone_type.clone(),
                    polygon: transform_polygon(&zone.polygon, &result.bounds),
                    confidence: zone.confidence,
                    metadata: zone.metadata.clone(),
                });
            }
        }
        lifted
    }
}

/// Fuses one union-find group into a single `MergedZone`. Singleton groups
/// pass through with a fresh id and single-element provenance.
fn fuse_group(n: usize, member_indices: &[usize], lifted: &[LiftedZone]) -> MergedZone {
    let id = format!("zone_{n}");
    if member_indices.len() == 1 {
        let z = &lifted[member_indices[0]];
        return MergedZone {
            id,
            zone_type: z.zone_type.clone(),
            polygon: z.polygon.clone(),
            confidence: z.confidence,
            source_zones: vec![z.provenance.clone()],
            metadata: z.metadata.clone(),
        };
    }

    let mut vertices = Vec::new();
    let mut confidence_sum = 0.0;
    let mut source_zones = Vec::with_capacity(member_indices.len());
    let mut metadata: HashMap<String, serde_json::Value> = HashMap::new();
    for &i in member_indices {
        let z = &lifted[i];
        vertices.extend_from_slice(&z.polygon);
        confidence_sum += z.confidence;
        source_zones.push(z.provenance.clone());
        for (k, v) in &z.metadata {
            metadata.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }
    metadata.insert(
        "merged_from_count".to_string(),
        serde_json::Value::from(member_indices.len()),
    );

    MergedZone {
        id,
        zone_type: lifted[member_indices[0]].zone_type.clone(),
        polygon: convex_hull(&vertices),
        confidence: confidence_sum / member_indices.len() as f64,
        source_zones,
        metadata,
    }
}
