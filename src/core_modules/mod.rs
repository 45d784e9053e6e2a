// THEORY:
// `core_modules` holds the engine's internal building blocks. Each module is
// a self-contained stage: geometry and IoU are pure math, the detectors and
// evaluators are pure analysis over externally supplied boundaries, and the
// tiler/planner/merger own the spatial bookkeeping. The `pipeline` module
// composes them; nothing in here spawns tasks or performs I/O.

pub mod closed_region;
pub mod decision;
pub mod fast_track;
pub mod geometry;
pub mod iou;
pub mod merger;
pub mod progress;
pub mod smart_boundaries;
pub mod tiler;
pub mod zone;
