// THEORY:
// This file is the main entry point for the `zone_tiler` library crate.
// It follows the standard Rust convention of using `lib.rs` to define the
// public API that will be exposed to external consumers (like a detection
// orchestrator).
//
// The primary goal is to export the `TileProcessor` and its associated data
// structures (`TilingConfig`, `MergedZone`, `ZoneDetector`, etc.) as the
// clean, high-level interface for the entire tiling engine. The internal
// modules (`core_modules`) remain available for callers that need individual
// stages, such as running the decision engine without processing an image.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;
