// THEORY:
// The `iou` module answers one question for the merge layer: how much do two
// detections overlap? It deliberately offers two tiers with very different
// costs:
//
// 1.  **Analytic box IoU** (`iou_fast`): O(1) arithmetic on axis-aligned
//     bounding boxes. Used as a pre-filter across the many zone pairs the
//     merger considers, because polygon rasterization dominates the cost of
//     candidate search.
// 2.  **Rasterized polygon IoU** (`iou_polygon`): both polygons are filled
//     into boolean masks over a shared local integer grid sized to their
//     combined bounding box, and the ratio |A ∧ B| / |A ∨ B| is returned.
//     A caller that already knows the combined bounds can supply them to
//     skip the recomputation.
//
// Degenerate geometry (fewer than 3 vertices, zero-area fill, zero-area
// union) is defined to have an IoU of 0.0 rather than being an error, so the
// merge and dedup layers never need special-case branches for malformed
// detector output.

use crate::core_modules::geometry::{BoundingBox, Point, polygon_bounding_box};

/// Analytic intersection-over-union of two axis-aligned boxes. Returns 0.0
/// when the boxes are disjoint or the union has zero area.
pub fn iou_fast(box1: &BoundingBox, box2: &BoundingBox) -> f64 {
    let ix = (box1.x2.min(box2.x2) - box1.x1.max(box2.x1)).max(0.0);
    let iy = (box1.y2.min(box2.y2) - box1.y1.max(box2.y1)).max(0.0);
    let intersection = ix * iy;

    let union = box1.area() + box2.area() - intersection;
    if union <= 0.0 {
        return 0.0;
    }
    intersection / union
}

/// Rasterized intersection-over-union of two polygons.
///
/// Both polygons are filled on a shared integer grid covering `bounds` (or
/// their combined bounding box when `bounds` is `None`). Returns 0.0 for
/// polygons with fewer than 3 vertices, empty fills, or an empty grid.
pub fn iou_polygon(poly1: &[Point], poly2: &[Point], bounds: Option<BoundingBox>) -> f64 {
    if poly1.len() < 3 || poly2.len() < 3 {
        return 0.0;
    }

    let bounds = match bounds {
        Some(b) => b,
        None => {
            let b1 = match polygon_bounding_box(poly1) {
                Some(b) => b,
                None => return 0.0,
            };
            let b2 = match polygon_bounding_box(poly2) {
                Some(b) => b,
                None => return 0.0,
            };
            b1.union(&b2)
        }
    };

    let origin_x = bounds.x1.floor();
    let origin_y = bounds.y1.floor();
    let width = (bounds.x2.ceil() - origin_x).max(0.0) as usize;
    let height = (bounds.y2.ceil() - origin_y).max(0.0) as usize;
    if width == 0 || height == 0 {
        return 0.0;
    }

    let mask1 = rasterize(poly1, origin_x, origin_y, width, height);
    let mask2 = rasterize(poly2, origin_x, origin_y, width, height);

    let mut intersection = 0usize;
    let mut union = 0usize;
    for (a, b) in mask1.iter().zip(mask2.iter()) {
        if *a && *b {
            intersection += 1;
        }
        if *a || *b {
            union += 1;
        }
    }

    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

/// Two-tier overlap test used by the merge candidate search.
///
/// A cheap box pre-filter runs first. With `threshold == 0.0` any non-empty
/// box intersection counts as an overlap and polygon rasterization is skipped
/// entirely; otherwise the exact polygon IoU is compared against `threshold`.
pub fn zones_overlap(poly1: &[Point], poly2: &[Point], threshold: f64) -> bool {
    let (Some(b1), Some(b2)) = (polygon_bounding_box(poly1), polygon_bounding_box(poly2)) else {
        return false;
    };

    let ix = (b1.x2.min(b2.x2) - b1.x1.max(b2.x1)).max(0.0);
    let iy = (b1.y2.min(b2.y2) - b1.y1.max(b2.y1)).max(0.0);
    if ix <= 0.0 || iy <= 0.0 {
        return false;
    }
    if threshold == 0.0 {
        return true;
    }

    iou_polygon(poly1, poly2, Some(b1.union(&b2))) >= threshold
}

/// Fills a polygon into a boolean mask by testing each pixel center with an
/// even-odd ray cast.
fn rasterize(polygon: &[Point], origin_x: f64, origin_y: f64, width: usize, height: usize) -> Vec<bool> {
    let mut mask = vec![false; width * height];
    for row in 0..height {
        let py = origin_y + row as f64 + 0.5;
        for col in 0..width {
            let px = origin_x + col as f64 + 0.5;
            if point_in_polygon(px, py, polygon) {
                mask[row * width + col] = true;
            }
        }
    }
    mask
}

fn point_in_polygon(px: f64, py: f64, polygon: &[Point]) -> bool {
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let a = polygon[i];
        let b = polygon[j];
        if (a.y > py) != (b.y > py) && px < (b.x - a.x) * (py - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: f64, y: f64, w: f64, h: f64) -> Vec<Point> {
        vec![
            Point::new(x, y),
            Point::new(x + w, y),
            Point::new(x + w, y + h),
            Point::new(x, y + h),
        ]
    }

    fn bbox(x1: f64, y1: f64, x2: f64, y2: f64) -> BoundingBox {
        BoundingBox { x1, y1, x2, y2 }
    }

    #[test]
    fn box_iou_of_disjoint_boxes_is_zero() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(20.0, 20.0, 30.0, 30.0);
        assert_eq!(iou_fast(&a, &b), 0.0);
    }

    #[test]
    fn box_iou_of_degenerate_boxes_is_zero() {
        let a = bbox(5.0, 5.0, 5.0, 5.0);
        assert_eq!(iou_fast(&a, &a), 0.0);
    }

    #[test]
    fn box_iou_is_symmetric_and_bounded() {
        let a = bbox(0.0, 0.0, 100.0, 100.0);
        let b = bbox(50.0, 0.0, 150.0, 100.0);
        let ab = iou_fast(&a, &b);
        let ba = iou_fast(&b, &a);
        assert_eq!(ab, ba);
        assert!(ab > 0.0 && ab <= 1.0);
        assert!((iou_fast(&a, &a) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn offset_boxes_give_one_third() {
        // Two 100x100 boxes offset by 50px on one axis: 5000 / 15000.
        let a = bbox(0.0, 0.0, 100.0, 100.0);
        let b = bbox(50.0, 0.0, 150.0, 100.0);
        assert!((iou_fast(&a, &b) - 1.0 / 3.0).abs() < 1e-9);

        let pa = rect(0.0, 0.0, 100.0, 100.0);
        let pb = rect(50.0, 0.0, 100.0, 100.0);
        let iou = iou_polygon(&pa, &pb, None);
        assert!((iou - 1.0 / 3.0).abs() < 0.01, "polygon IoU was {iou}");
    }

    #[test]
    fn polygon_iou_self_is_one() {
        let p = rect(3.0, 7.0, 40.0, 25.0);
        assert!((iou_polygon(&p, &p, None) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn polygon_iou_is_symmetric() {
        let a = rect(0.0, 0.0, 30.0, 30.0);
        let b = vec![Point::new(10.0, 10.0), Point::new(50.0, 12.0), Point::new(25.0, 45.0)];
        assert_eq!(iou_polygon(&a, &b, None), iou_polygon(&b, &a, None));
    }

    #[test]
    fn degenerate_polygons_give_zero() {
        let a = rect(0.0, 0.0, 10.0, 10.0);
        let line = vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0)];
        assert_eq!(iou_polygon(&a, &line, None), 0.0);
        assert_eq!(iou_polygon(&line, &a, None), 0.0);
        assert_eq!(iou_polygon(&[], &a, None), 0.0);
    }

    #[test]
    fn zones_overlap_zero_threshold_skips_rasterization() {
        let a = rect(0.0, 0.0, 100.0, 100.0);
        let b = rect(99.0, 0.0, 100.0, 100.0);
        assert!(zones_overlap(&a, &b, 0.0));

        let far = rect(500.0, 500.0, 10.0, 10.0);
        assert!(!zones_overlap(&a, &far, 0.0));
    }

    #[test]
    fn zones_overlap_respects_threshold() {
        let a = rect(0.0, 0.0, 100.0, 100.0);
        let b = rect(50.0, 0.0, 100.0, 100.0);
        assert!(zones_overlap(&a, &b, 0.2));
        assert!(!zones_overlap(&a, &b, 0.5));
    }
}
