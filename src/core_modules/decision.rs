// THEORY:
// The `decision` module is the mode-selection brain of the engine. It is a
// state machine with no persistent state: one invocation consumes the image
// dimensions and the upstream quality signals and produces exactly one of
// four processing modes. The 2x2 table is total by construction:
//
//             | fast-track eligible | not eligible |
//   needs til.|       HYBRID        |    TILED     |
//   fits      |      FAST_TRACK     |   STANDARD   |
//
// Every decision records a human-readable reasoning trail and a metrics bag
// of every raw value it consulted, so a surprising mode choice in production
// can be audited without re-running the pipeline. A caller override
// (`force_mode`) short-circuits the whole procedure and is reported with
// confidence 1.0.

use std::collections::HashMap;

use log::info;
use serde::{Deserialize, Serialize};

use crate::config::TilingConfig;
use crate::core_modules::closed_region::ClosedRegionResult;
use crate::core_modules::fast_track::FastTrackDecision;

/// The four processing modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessingMode {
    /// Small image, high-quality upstream signals: skip detailed processing.
    FastTrack,
    /// Small image, weak signals: single-pass detailed processing.
    Standard,
    /// Large image, weak signals: tile, detect per tile, merge.
    Tiled,
    /// Large image, strong signals: tile, but downstream may lean on the
    /// upstream boundaries within each tile.
    Hybrid,
}

impl std::fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProcessingMode::FastTrack => "FAST_TRACK",
            ProcessingMode::Standard => "STANDARD",
            ProcessingMode::Tiled => "TILED",
            ProcessingMode::Hybrid => "HYBRID",
        };
        f.write_str(name)
    }
}

/// The outcome of mode selection. Computed once per run, read-only after.
#[derive(Debug, Clone)]
pub struct ProcessingDecision {
    pub mode: ProcessingMode,
    pub confidence: f64,
    pub should_tile: bool,
    /// Grid estimate only; the tiler may produce a different count once
    /// overlap trims the step.
    pub tile_count: usize,
    /// Ordered human-readable basis for each decision point.
    pub reasoning: Vec<String>,
    /// Every raw value consulted, keyed by name.
    pub metrics: HashMap<String, f64>,
}

/// Combines image dimensions and upstream quality signals into a mode.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    config: TilingConfig,
}

impl DecisionEngine {
    pub fn new(config: TilingConfig) -> Self {
        Self { config }
    }

    pub fn decide(
        &self,
        width: u32,
        height: u32,
        fast_track: Option<&FastTrackDecision>,
        closed: Option<&ClosedRegionResult>,
        force_mode: Option<ProcessingMode>,
    ) -> ProcessingDecision {
        let mut reasoning = Vec::new();
        let mut metrics = HashMap::new();

        let longest = width.max(height);
        let needs_tiling = longest > self.config.dimension_threshold;
        let tile_count = if needs_tiling {
            (width.div_ceil(self.config.tile_size) * height.div_ceil(self.config.tile_size))
                as usize
        } else {
            1
        };

        metrics.insert("width".to_string(), width as f64);
        metrics.insert("height".to_string(), height as f64);
        metrics.insert(
            "dimension_threshold".to_string(),
            self.config.dimension_threshold as f64,
        );
        metrics.insert("tile_size".to_string(), self.config.tile_size as f64);
        metrics.insert("estimated_tile_count".to_string(), tile_count as f64);

        if let Some(mode) = force_mode {
            reasoning.push(format!("mode {mode} forced by caller, bypassing decision procedure"));
            let should_tile = matches!(mode, ProcessingMode::Tiled | ProcessingMode::Hybrid);
            return ProcessingDecision {
                mode,
                confidence: 1.0,
                should_tile,
                tile_count: if should_tile { tile_count.max(1) } else { 1 },
                reasoning,
                metrics,
            };
        }

        reasoning.push(format!(
            "longest dimension {longest}px {} threshold {}px: tiling {}",
            if needs_tiling { "exceeds" } else { "within" },
            self.config.dimension_threshold,
            if needs_tiling { "required" } else { "not required" },
        ));
        if needs_tiling {
            reasoning.push(format!("grid estimate: {tile_count} tiles of {}px", self.config.tile_size));
        }

        // Prefer an explicit fast-track evaluation; fall back to the raw
        // closed-region eligibility signal when only that is available.
        let (eligible, signal_confidence) = match (fast_track, closed) {
            (Some(decision), _) => {
                reasoning.push(format!(
                    "fast-track evaluator: eligible={} (confidence {:.3}, criteria: {})",
                    decision.eligible,
                    decision.confidence,
                    decision
                        .criteria
                        .iter()
                        .map(|c| c.tag.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                ));
                (decision.eligible, decision.confidence)
            }
            (None, Some(closed)) => {
                reasoning.push(format!(
                    "no fast-track evaluation; closed-region fallback: eligible={} (closure ratio {:.3})",
                    closed.is_fast_track_eligible(),
                    closed.closure_ratio,
                ));
                (closed.is_fast_track_eligible(), closed.closure_ratio.clamp(0.0, 1.0))
            }
            (None, None) => {
                reasoning.push("no fast-track signal available; assuming ineligible".to_string());
                (false, 0.5)
            }
        };
        metrics.insert("fast_track_eligible".to_string(), if eligible { 1.0 } else { 0.0 });
        metrics.insert("signal_confidence".to_string(), signal_confidence);
        if let Some(closed) = closed {
            metrics.insert("closure_ratio".to_string(), closed.closure_ratio);
            metrics.insert(
                "closed_region_count".to_string(),
                closed.closed_region_count as f64,
            );
        }

        let mode = match (needs_tiling, eligible) {
            (true, true) => ProcessingMode::Hybrid,
            (true, false) => ProcessingMode::Tiled,
            (false, true) => ProcessingMode::FastTrack,
            (false, false) => ProcessingMode::Standard,
        };
        reasoning.push(format!("selected mode {mode}"));

        info!("processing decision: {mode} (tiles={tile_count}, confidence {signal_confidence:.3})");

        ProcessingDecision {
            mode,
            confidence: signal_confidence,
            should_tile: needs_tiling,
            tile_count,
            reasoning,
            metrics,
        }
    }
}
