// THEORY:
// The `parallel_pipeline` module owns the bounded worker pool that runs the
// external zone detector across tiles concurrently. The shape is a single
// dispatcher task feeding per-worker channels round-robin, with a `oneshot`
// reply channel per tile.
//
// Key architectural principles:
// 1.  **Bounded Concurrency**: the pool is sized by the caller, normally
//     `min(max_parallel_tiles, tile_count)`. Each worker holds one tile at a
//     time, so at most `pool_size` detector calls are in flight.
// 2.  **Exclusive Task Ownership**: a `TileTask` moves its tile (owned pixel
//     copy included) into exactly one worker. No locks are needed during
//     detection.
// 3.  **Failure Is Data**: a detector error, a detector panic, and a dropped
//     reply channel all resolve to an `Err` inside the returned `TileOutcome`
//     instead of escaping. The orchestrator decides what a failed tile means;
//     the pool never aborts a run.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use log::warn;
use tokio::sync::{mpsc, oneshot};

use crate::core_modules::geometry::TileBounds;
use crate::core_modules::tiler::Tile;
use crate::core_modules::zone::{Zone, ZoneDetector};

/// The result of running the detector on one tile. `zones` carries the
/// captured failure when detection did not produce a usable result.
pub struct TileOutcome {
    pub tile_id: String,
    pub bounds: TileBounds,
    pub zones: anyhow::Result<Vec<Zone>>,
}

/// One unit of work: a tile and the channel its outcome goes back on.
pub struct TileTask {
    pub tile: Tile,
    pub result_sender: oneshot::Sender<TileOutcome>,
}

/// Fixed-size pool of tokio workers consuming tile tasks.
pub struct WorkerPool {
    task_sender: mpsc::UnboundedSender<TileTask>,
    workers: Vec<tokio::task::JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(pool_size: usize, detector: Arc<dyn ZoneDetector>) -> Self {
        let pool_size = pool_size.max(1);
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<TileTask>();
        let mut workers = Vec::with_capacity(pool_size);

        // A single dispatcher distributes tasks to workers round-robin.
        let (worker_senders, worker_receivers): (Vec<_>, Vec<_>) = (0..pool_size)
            .map(|_| mpsc::unbounded_channel::<TileTask>())
            .unzip();

        let dispatcher_senders = worker_senders;
        tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                let _ = dispatcher_senders[worker_idx].send(task);
                worker_idx = (worker_idx + 1) % pool_size;
            }
        });

        for mut worker_receiver in worker_receivers {
            let worker_detector = detector.clone();

            let worker = tokio::spawn(async move {
                while let Some(task) = worker_receiver.recv().await {
                    let outcome = Self::detect_tile(worker_detector.as_ref(), task.tile);
                    let _ = task.result_sender.send(outcome);
                }
            });

            workers.push(worker);
        }

        Self {
            task_sender,
            workers,
        }
    }

    // Runs the detector on one tile, converting a panic into a captured
    // error so a misbehaving detector cannot take the worker down.
    fn detect_tile(detector: &dyn ZoneDetector, tile: Tile) -> TileOutcome {
        let tile_id = tile.id.clone();
        let bounds = tile.bounds;
        let zones = catch_unwind(AssertUnwindSafe(|| detector.detect(&tile))).unwrap_or_else(|_| {
            warn!("zone detector panicked on tile {tile_id}");
            Err(anyhow::anyhow!("zone detector panicked on tile {tile_id}"))
        });
        TileOutcome {
            tile_id,
            bounds,
            zones,
        }
    }

    /// Submits one tile and waits for its outcome. Pool channel failures are
    /// absorbed into the outcome rather than surfaced as a distinct error.
    pub async fn process_tile(&self, tile: Tile) -> TileOutcome {
        let tile_id = tile.id.clone();
        let bounds = tile.bounds;
        let (result_sender, result_receiver) = oneshot::channel();

        let task = TileTask {
            tile,
            result_sender,
        };

        if self.task_sender.send(task).is_err() {
            return TileOutcome {
                tile_id,
                bounds,
                zones: Err(anyhow::anyhow!("worker pool is shut down")),
            };
        }

        match result_receiver.await {
            Ok(outcome) => outcome,
            Err(_) => TileOutcome {
                tile_id,
                bounds,
                zones: Err(anyhow::anyhow!("worker dropped before replying")),
            },
        }
    }

    /// Closes the task queue and waits for every worker to drain.
    pub async fn shutdown(self) {
        drop(self.task_sender);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::geometry::Point;
    use crate::core_modules::tiler::Tile;
    use image::RgbaImage;
    use std::collections::HashMap;

    fn tile(id: &str, x: u32) -> Tile {
        Tile {
            id: id.to_string(),
            bounds: TileBounds::new(x, 0, x + 100, 100),
            pixels: RgbaImage::new(100, 100),
            overlap_regions: Vec::new(),
        }
    }

    fn one_zone(id: &str) -> Vec<Zone> {
        vec![Zone {
            id: id.to_string(),
            zone_type: "parking".to_string(),
            polygon: vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 10.0),
                Point::new(0.0, 10.0),
            ],
            confidence: 0.9,
            metadata: HashMap::new(),
        }]
    }

    #[tokio::test]
    async fn every_submitted_tile_gets_an_outcome() {
        let detector: Arc<dyn ZoneDetector> =
            Arc::new(|t: &Tile| -> anyhow::Result<Vec<Zone>> { Ok(one_zone(&t.id)) });
        let pool = WorkerPool::new(2, detector);

        let futures: Vec<_> = (0..5).map(|i| pool.process_tile(tile(&format!("t{i}"), i * 100))).collect();
        let outcomes = futures::future::join_all(futures).await;

        assert_eq!(outcomes.len(), 5);
        for outcome in &outcomes {
            let zones = outcome.zones.as_ref().unwrap();
            assert_eq!(zones[0].id, outcome.tile_id);
        }
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn detector_errors_and_panics_are_captured() {
        let detector: Arc<dyn ZoneDetector> =
            Arc::new(|t: &Tile| -> anyhow::Result<Vec<Zone>> {
                match t.id.as_str() {
                    "boom" => panic!("synthetic panic"),
                    "fail" => Err(anyhow::anyhow!("synthetic failure")),
                    _ => Ok(one_zone(&t.id)),
                }
            });
        let pool = WorkerPool::new(2, detector);

        let ok = pool.process_tile(tile("good", 0)).await;
        let err = pool.process_tile(tile("fail", 100)).await;
        let panicked = pool.process_tile(tile("boom", 200)).await;

        assert!(ok.zones.is_ok());
        assert!(err.zones.is_err());
        assert!(panicked.zones.is_err());
        // The pool survives a panicking detector.
        let after = pool.process_tile(tile("again", 300)).await;
        assert!(after.zones.is_ok());
        pool.shutdown().await;
    }
}
