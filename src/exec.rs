//! Bulk-synchronous execution over frame chunks, plus the job handle the
//! driver uses for cancellation, progress, and snapshot publication.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use rayon::prelude::*;

use crate::frame::{Frame, FrameChunk};
use crate::model::KMeansOutput;

/// A data-parallel pass over the chunks of a frame.
///
/// `map` runs on every chunk independently; the per-chunk accumulators are
/// then combined with `reduce` in chunk order, starting from `identity`.
/// The fixed combine order makes results reproducible under a fixed
/// chunking, which the sampling pass relies on.
pub trait ChunkTask: Sync {
    /// Accumulator produced per chunk and combined across chunks.
    type Acc: Send;

    /// Neutral accumulator the fold starts from.
    fn identity(&self) -> Self::Acc;

    /// Process one chunk.
    fn map(&self, chunk: &FrameChunk<'_>) -> Self::Acc;

    /// Combine two accumulators. Must be associative.
    fn reduce(&self, left: Self::Acc, right: Self::Acc) -> Self::Acc;
}

/// Run a task over every chunk of the frame and combine the results.
pub fn run<T: ChunkTask>(frame: &Frame, task: &T) -> T::Acc {
    let accs: Vec<T::Acc> = frame
        .chunks()
        .into_par_iter()
        .map(|chunk| task.map(&chunk))
        .collect();
    accs.into_iter()
        .fold(task.identity(), |left, right| task.reduce(left, right))
}

#[derive(Debug, Default)]
struct JobInner {
    cancelled: AtomicBool,
    finished: AtomicBool,
    worked: AtomicU64,
    total_work: AtomicU64,
    snapshot: Mutex<Option<KMeansOutput>>,
}

/// Cheaply cloneable handle onto a running training job.
///
/// The driver polls [`Job::is_running`] between phases and publishes
/// intermediate model state through [`Job::publish`]; any other holder of
/// the handle may cancel the job or read the latest snapshot.
#[derive(Debug, Clone, Default)]
pub struct Job {
    inner: Arc<JobInner>,
}

impl Job {
    /// Create an idle job handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the total units of work the job expects to perform.
    pub fn start(&self, total_work: u64) {
        self.inner.total_work.store(total_work, Ordering::Relaxed);
    }

    /// Whether the job may keep going.
    pub fn is_running(&self) -> bool {
        !self.inner.cancelled.load(Ordering::Relaxed)
    }

    /// Request cooperative cancellation; observed at the next phase boundary.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Relaxed);
    }

    /// Record completed units of work.
    pub fn update(&self, units: u64) {
        self.inner.worked.fetch_add(units, Ordering::Relaxed);
    }

    /// Units of work completed so far.
    pub fn worked(&self) -> u64 {
        self.inner.worked.load(Ordering::Relaxed)
    }

    /// Total units of work recorded at [`Job::start`].
    pub fn total_work(&self) -> u64 {
        self.inner.total_work.load(Ordering::Relaxed)
    }

    /// Publish an intermediate model snapshot.
    pub fn publish(&self, output: &KMeansOutput) {
        let mut slot = self.inner.snapshot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(output.clone());
    }

    /// Latest published snapshot, if any.
    pub fn snapshot(&self) -> Option<KMeansOutput> {
        let slot = self.inner.snapshot.lock().unwrap_or_else(|e| e.into_inner());
        slot.clone()
    }

    /// Mark the job finished (normally or after a failure).
    pub fn done(&self) {
        self.inner.finished.store(true, Ordering::Relaxed);
    }

    /// Whether [`Job::done`] has been called.
    pub fn is_done(&self) -> bool {
        self.inner.finished.load(Ordering::Relaxed)
    }
}
