// THEORY:
// The `geometry` module is the leaf of the entire engine. Every layer above it
// (tiling, IoU, merging) speaks in two coordinate frames: the tile-local frame
// of a cropped sub-image, and the original-image frame of the full floorplan.
// This module owns the vocabulary for both and the pure functions that map
// between them.
//
// Key architectural principles:
// 1.  **Stateless Transforms**: Every function here is a pure function of its
//     arguments. There is no cached state, so the functions are trivially safe
//     to call from any worker.
// 2.  **Half-Open Tile Membership**: `is_point_in_tile` uses half-open
//     intervals (`x1 <= x < x2`). Tile bounds deliberately overlap by design,
//     but under this predicate two grid-adjacent tiles never both claim the
//     same boundary pixel.
// 3.  **Cheap Clipping**: `clip_to_bounds` clamps each vertex independently to
//     a rectangle. It is not a true polygon clip (a vertex far outside a
//     corner collapses onto that corner) and is documented as such; the merge
//     layer only needs the cheap variant.
// 4.  **Shared Primitives**: shoelace area, bounding boxes and the convex hull
//     live here because the closed-region detector, the IoU engine and the
//     merger all need them.

use serde::{Deserialize, Serialize};

/// A point in pixel coordinates. Sub-pixel positions are allowed because the
/// external detectors report polygon vertices with fractional precision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// A rectangle in original-image pixel coordinates, `[x1, x2) x [y1, y2)`.
/// Invariant (enforced by the tiler): `0 <= x1 < x2` and `0 <= y1 < y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileBounds {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl TileBounds {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    /// The overlapping rectangle between two bounds, if any. Zero-width or
    /// zero-height intersections are reported as `None`.
    pub fn intersect(&self, other: &TileBounds) -> Option<TileBounds> {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);
        if x1 < x2 && y1 < y2 {
            Some(TileBounds::new(x1, y1, x2, y2))
        } else {
            None
        }
    }
}

/// An axis-aligned box in floating-point coordinates, used for zone polygons.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// The smallest box enclosing both boxes.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }
}

/// Maps a tile-local point into the original-image frame.
pub fn to_original(point: Point, tile_bounds: &TileBounds) -> Point {
    Point::new(point.x + tile_bounds.x1 as f64, point.y + tile_bounds.y1 as f64)
}

/// Maps an original-image point into a tile's local frame. Inverse of
/// `to_original`; the result may be negative if the point lies outside the tile.
pub fn to_tile(point: Point, tile_bounds: &TileBounds) -> Point {
    Point::new(point.x - tile_bounds.x1 as f64, point.y - tile_bounds.y1 as f64)
}

/// Maps every vertex of a tile-local polygon into the original-image frame.
pub fn transform_polygon(polygon: &[Point], tile_bounds: &TileBounds) -> Vec<Point> {
    polygon.iter().map(|p| to_original(*p, tile_bounds)).collect()
}

/// Maps every vertex of an original-image polygon into a tile's local frame.
pub fn transform_polygon_to_tile(polygon: &[Point], tile_bounds: &TileBounds) -> Vec<Point> {
    polygon.iter().map(|p| to_tile(*p, tile_bounds)).collect()
}

/// Clamps each vertex independently to the given rectangle. This is cheap
/// axis-aligned clipping, not a true polygon clip: vertices outside the
/// rectangle are pulled onto its border, which can change the polygon shape.
pub fn clip_to_bounds(polygon: &[Point], bounds: &TileBounds) -> Vec<Point> {
    polygon
        .iter()
        .map(|p| {
            Point::new(
                p.x.clamp(bounds.x1 as f64, bounds.x2 as f64),
                p.y.clamp(bounds.y1 as f64, bounds.y2 as f64),
            )
        })
        .collect()
}

/// Half-open membership test: `x1 <= x < x2` and `y1 <= y < y2`. A boundary
/// pixel shared by two adjacent tiles is claimed by exactly one of them.
pub fn is_point_in_tile(point: Point, tile_bounds: &TileBounds) -> bool {
    point.x >= tile_bounds.x1 as f64
        && point.x < tile_bounds.x2 as f64
        && point.y >= tile_bounds.y1 as f64
        && point.y < tile_bounds.y2 as f64
}

/// Signed shoelace area, returned as an absolute value. Zero for polygons
/// with fewer than 3 vertices.
pub fn polygon_area(polygon: &[Point]) -> f64 {
    if polygon.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..polygon.len() {
        let a = polygon[i];
        let b = polygon[(i + 1) % polygon.len()];
        sum += a.x * b.y - b.x * a.y;
    }
    sum.abs() / 2.0
}

/// The axis-aligned bounding box of a polygon, or `None` for an empty one.
pub fn polygon_bounding_box(polygon: &[Point]) -> Option<BoundingBox> {
    let first = polygon.first()?;
    let mut bbox = BoundingBox {
        x1: first.x,
        y1: first.y,
        x2: first.x,
        y2: first.y,
    };
    for p in &polygon[1..] {
        bbox.x1 = bbox.x1.min(p.x);
        bbox.y1 = bbox.y1.min(p.y);
        bbox.x2 = bbox.x2.max(p.x);
        bbox.y2 = bbox.y2.max(p.y);
    }
    Some(bbox)
}

/// Convex hull via Andrew's monotone chain, in counter-clockwise order.
/// Returns the input unchanged when it has fewer than 3 vertices.
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut sorted: Vec<Point> = points.to_vec();
    sorted.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap().then(a.y.partial_cmp(&b.y).unwrap()));
    sorted.dedup_by(|a, b| a.x == b.x && a.y == b.y);
    if sorted.len() < 3 {
        return sorted;
    }

    fn cross(o: Point, a: Point, b: Point) -> f64 {
        (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
    }

    let mut lower: Vec<Point> = Vec::new();
    for &p in &sorted {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<Point> = Vec::new();
    for &p in sorted.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    // The endpoints of each chain are duplicated in the other chain.
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transforms_are_inverse() {
        let bounds = TileBounds::new(100, 200, 600, 700);
        let p = Point::new(42.5, 17.25);
        let lifted = to_original(p, &bounds);
        assert_eq!(lifted, Point::new(142.5, 217.25));
        assert_eq!(to_tile(lifted, &bounds), p);
    }

    #[test]
    fn polygon_transform_maps_every_vertex() {
        let bounds = TileBounds::new(50, 50, 150, 150);
        let poly = vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0)];
        let lifted = transform_polygon(&poly, &bounds);
        assert_eq!(lifted[0], Point::new(50.0, 50.0));
        assert_eq!(lifted[2], Point::new(60.0, 60.0));
        assert_eq!(transform_polygon_to_tile(&lifted, &bounds), poly);
    }

    #[test]
    fn point_in_tile_is_half_open() {
        let bounds = TileBounds::new(0, 0, 100, 100);
        assert!(is_point_in_tile(Point::new(0.0, 0.0), &bounds));
        assert!(is_point_in_tile(Point::new(99.999, 99.999), &bounds));
        assert!(!is_point_in_tile(Point::new(100.0, 50.0), &bounds));
        assert!(!is_point_in_tile(Point::new(50.0, 100.0), &bounds));

        // A point on the shared edge of two adjacent tiles belongs to exactly one.
        let left = TileBounds::new(0, 0, 100, 100);
        let right = TileBounds::new(100, 0, 200, 100);
        let edge = Point::new(100.0, 50.0);
        assert!(!is_point_in_tile(edge, &left));
        assert!(is_point_in_tile(edge, &right));
    }

    #[test]
    fn clip_clamps_each_vertex() {
        let bounds = TileBounds::new(0, 0, 100, 100);
        let poly = vec![Point::new(-10.0, 50.0), Point::new(150.0, 120.0)];
        let clipped = clip_to_bounds(&poly, &bounds);
        assert_eq!(clipped[0], Point::new(0.0, 50.0));
        assert_eq!(clipped[1], Point::new(100.0, 100.0));
    }

    #[test]
    fn shoelace_area_of_unit_square() {
        let square = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ];
        assert!((polygon_area(&square) - 1.0).abs() < 1e-9);
        assert_eq!(polygon_area(&square[..2]), 0.0);
    }

    #[test]
    fn hull_of_square_with_interior_point() {
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
            Point::new(5.0, 5.0),
        ];
        let hull = convex_hull(&points);
        assert_eq!(hull.len(), 4);
        assert!((polygon_area(&hull) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn bounds_intersection() {
        let a = TileBounds::new(0, 0, 500, 500);
        let b = TileBounds::new(450, 0, 800, 500);
        let overlap = a.intersect(&b).unwrap();
        assert_eq!(overlap.width(), 50);
        assert_eq!(overlap.height(), 500);

        let c = TileBounds::new(500, 0, 600, 500);
        assert!(a.intersect(&c).is_none());
    }
}
