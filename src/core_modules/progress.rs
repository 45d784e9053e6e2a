// THEORY:
// The `progress` module replaces the original design's global mutable
// progress state with an explicit value owned by the orchestrator and pushed
// through an injected callback. Tiles complete on whatever worker finishes
// first, but observers must never see interleaved or regressing updates, so
// every mutation happens behind one mutex and the callback is invoked while
// the lock is held. That serializes the update stream and keeps
// `completed_tiles` monotonic regardless of execution order.
//
// `Error` is a per-tile annotation surfaced through the callback, never a
// terminal run state: the run itself proceeds to `Merging` and `Complete`
// even when individual tiles fail.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// Lifecycle of one processing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Merging,
    Complete,
    /// A per-tile failure annotation; the run continues.
    Error,
}

/// A snapshot of run progress, delivered to the observer after every status
/// transition and after every tile completion or failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingProgress {
    pub total_tiles: usize,
    pub completed_tiles: usize,
    pub current_tile: Option<String>,
    pub status: ProcessingStatus,
}

/// Observer invoked with a snapshot after each serialized update.
pub type ProgressCallback = Arc<dyn Fn(&ProcessingProgress) + Send + Sync>;

/// Serializes progress updates from concurrent workers into a single ordered
/// stream. Mutated only by the tile processor.
pub struct ProgressTracker {
    state: Mutex<ProcessingProgress>,
    callback: Option<ProgressCallback>,
}

impl ProgressTracker {
    pub fn new(total_tiles: usize, callback: Option<ProgressCallback>) -> Self {
        Self {
            state: Mutex::new(ProcessingProgress {
                total_tiles,
                completed_tiles: 0,
                current_tile: None,
                status: ProcessingStatus::Pending,
            }),
            callback,
        }
    }

    /// Transitions the run status and notifies the observer.
    pub fn set_status(&self, status: ProcessingStatus) {
        self.update(|p| {
            p.status = status;
            p.current_tile = None;
        });
    }

    /// Records one finished tile. Failed tiles still advance the counter but
    /// are annotated with `Error` status for this one snapshot.
    pub fn tile_finished(&self, tile_id: &str, failed: bool) {
        self.update(|p| {
            p.completed_tiles += 1;
            p.current_tile = Some(tile_id.to_string());
            p.status = if failed { ProcessingStatus::Error } else { ProcessingStatus::Processing };
        });
    }

    /// Current snapshot, for callers polling instead of observing.
    pub fn snapshot(&self) -> ProcessingProgress {
        self.state.lock().expect("progress lock poisoned").clone()
    }

    // The callback runs under the lock so observers see updates in exactly
    // the order they were applied.
    fn update(&self, apply: impl FnOnce(&mut ProcessingProgress)) {
        let mut state = self.state.lock().expect("progress lock poisoned");
        apply(&mut state);
        if let Some(callback) = &self.callback {
            callback(&state);
        }
    }
}
