// THEORY:
// The `pipeline` module is the final, top-level API for the entire tiling
// engine. It encapsulates the full architectural stack into a single,
// easy-to-use interface: give it an image, an external zone detector, and
// optional boundary hints, and it returns merged zones in original-image
// coordinates.
//
// The orchestration for one run:
//
// Stage 1: Decision — analyze boundary hints (closed regions, fast-track
//          eligibility) and image dimensions to pick a processing mode.
// Stage 2: Tiling — either one full-image tile, the plain grid, or the
//          smart-boundary plan.
// Stage 3: Detection — dispatch the detector per tile, sequentially or over
//          the bounded worker pool. A failing tile degrades to an empty
//          result; it never aborts siblings or the run.
// Stage 4: Merge — lift every per-tile zone to original coordinates, fuse
//          cross-tile duplicates, deduplicate survivors.
//
// Progress flows pending -> processing -> merging -> complete through the
// serialized tracker; per-tile failures surface as `Error` annotations on
// the progress stream, never as a run failure.

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use image::RgbaImage;
use log::{info, warn};

use crate::config::TilingConfig;
use crate::core_modules::closed_region::{ClosedRegionConfig, ClosedRegionDetector};
use crate::core_modules::decision::DecisionEngine;
use crate::core_modules::fast_track::{FastTrackConfig, FastTrackEvaluator};
use crate::core_modules::merger::ZoneMerger;
use crate::core_modules::progress::ProgressTracker;
use crate::core_modules::smart_boundaries::SmartBoundaryPlanner;
use crate::core_modules::tiler::{ImageTiler, Tile};
use crate::error::ConfigError;
use crate::parallel_pipeline::{TileOutcome, WorkerPool};

// Re-export key data structures for the public API.
pub use crate::core_modules::decision::{ProcessingDecision, ProcessingMode};
pub use crate::core_modules::progress::{ProcessingProgress, ProcessingStatus, ProgressCallback};
pub use crate::core_modules::zone::{BoundaryHints, MergedZone, TileZoneResult, Zone, ZoneDetector};

/// The main, top-level struct for the tiling engine. Construct once per
/// configuration; each `process` call is an independent run.
pub struct TileProcessor {
    config: TilingConfig,
    tiler: ImageTiler,
    planner: SmartBoundaryPlanner,
    decision_engine: DecisionEngine,
    merger: ZoneMerger,
    progress_callback: Option<ProgressCallback>,
    force_mode: Option<ProcessingMode>,
}

impl TileProcessor {
    /// Fails fast on an invalid configuration; this is the only way a run can
    /// fail at the caller's level.
    pub fn new(config: TilingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let tiler = ImageTiler::new(config.clone())?;
        let planner = SmartBoundaryPlanner::new(config.clone())?;
        let decision_engine = DecisionEngine::new(config.clone());
        let merger = ZoneMerger::new(config.merge_iou_threshold, config.dedup_iou_threshold);
        Ok(Self {
            config,
            tiler,
            planner,
            decision_engine,
            merger,
            progress_callback: None,
            force_mode: None,
        })
    }

    /// Registers an observer for the serialized progress stream.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Overrides mode selection for every subsequent run.
    pub fn with_force_mode(mut self, mode: ProcessingMode) -> Self {
        self.force_mode = Some(mode);
        self
    }

    /// Computes the processing decision for an image without running it.
    pub fn decide(&self, width: u32, height: u32, hints: Option<&BoundaryHints>) -> ProcessingDecision {
        match hints {
            Some(hints) => {
                let closed = ClosedRegionDetector::new(ClosedRegionConfig::default())
                    .analyze(&hints.polygons, Some((width, height)));
                let fast_track = FastTrackEvaluator::new(FastTrackConfig::default()).evaluate(
                    hints,
                    Some(&closed),
                    Some((width, height)),
                );
                self.decision_engine
                    .decide(width, height, Some(&fast_track), Some(&closed), self.force_mode)
            }
            None => self
                .decision_engine
                .decide(width, height, None, None, self.force_mode),
        }
    }

    /// Processes one image end to end and returns merged zones in
    /// original-image coordinates. Per-tile detection failures degrade to
    /// empty results for those tiles; the run itself cannot fail.
    pub async fn process(
        &self,
        image: &RgbaImage,
        detector: Arc<dyn ZoneDetector>,
        hints: Option<&BoundaryHints>,
        parallel: bool,
    ) -> Vec<MergedZone> {
        let (width, height) = image.dimensions();
        let decision = self.decide(width, height, hints);
        info!(
            "processing {}x{} image in mode {} (estimated {} tiles)",
            width, height, decision.mode, decision.tile_count
        );

        // Stage 2: Tiling
        let tiles = if decision.should_tile && self.config.enabled {
            match hints.filter(|h| !h.polygons.is_empty()) {
                Some(h) if self.config.smart_boundaries => self.planner.plan_tiles(image, h),
                _ => self.tiler.generate_tiles(image),
            }
        } else if width == 0 || height == 0 {
            Vec::new()
        } else {
            vec![self.tiler.full_image_tile(image)]
        };

        let tracker = ProgressTracker::new(tiles.len(), self.progress_callback.clone());
        tracker.set_status(ProcessingStatus::Processing);

        // Stage 3: Detection
        let outcomes = if parallel && tiles.len() > 1 {
            self.detect_parallel(tiles, detector, &tracker).await
        } else {
            self.detect_sequential(tiles, detector.as_ref(), &tracker)
        };

        let results: Vec<TileZoneResult> = outcomes
            .into_iter()
            .map(|outcome| TileZoneResult {
                tile_id: outcome.tile_id,
                zones: outcome.zones.unwrap_or_default(),
                bounds: outcome.bounds,
            })
            .collect();

        // Stage 4: Merge (lift + fuse + dedup, even for the single-tile path)
        tracker.set_status(ProcessingStatus::Merging);
        let merged = self.merger.merge(&results);
        tracker.set_status(ProcessingStatus::Complete);

        info!(
            "run complete: {} tiles -> {} zones after merge",
            results.len(),
            merged.len()
        );
        merged
    }

    async fn detect_parallel(
        &self,
        tiles: Vec<Tile>,
        detector: Arc<dyn ZoneDetector>,
        tracker: &ProgressTracker,
    ) -> Vec<TileOutcome> {
        let pool_size = self.config.max_parallel_tiles.min(tiles.len()).max(1);
        let pool = WorkerPool::new(pool_size, detector);

        // Barrier semantics: the merge phase never starts until every tile
        // has either completed or failed.
        let mut in_flight: FuturesUnordered<_> =
            tiles.into_iter().map(|tile| pool.process_tile(tile)).collect();

        let mut outcomes = Vec::with_capacity(in_flight.len());
        while let Some(outcome) = in_flight.next().await {
            record_outcome(&outcome, tracker);
            outcomes.push(outcome);
        }
        drop(in_flight);
        pool.shutdown().await;
        outcomes
    }

    fn detect_sequential(
        &self,
        tiles: Vec<Tile>,
        detector: &dyn ZoneDetector,
        tracker: &ProgressTracker,
    ) -> Vec<TileOutcome> {
        let mut outcomes = Vec::with_capacity(tiles.len());
        for tile in tiles {
            let tile_id = tile.id.clone();
            let bounds = tile.bounds;
            let outcome = TileOutcome {
                tile_id,
                bounds,
                zones: detector.detect(&tile),
            };
            record_outcome(&outcome, tracker);
            outcomes.push(outcome);
        }
        outcomes
    }
}

fn record_outcome(outcome: &TileOutcome, tracker: &ProgressTracker) {
    match &outcome.zones {
        Ok(zones) => {
            tracker.tile_finished(&outcome.tile_id, false);
            info!("tile {} complete: {} zones", outcome.tile_id, zones.len());
        }
        Err(err) => {
            tracker.tile_finished(&outcome.tile_id, true);
            warn!("tile {} failed, continuing without it: {err:#}", outcome.tile_id);
        }
    }
}
