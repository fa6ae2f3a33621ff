//! Worker pool and slice plan for the stage pipeline.
//!
//! One dedicated rayon pool, built at engine construction and kept for
//! the simulator's lifetime. Every stage forks one task per contiguous
//! cache-aligned particle slice and joins before the next stage runs;
//! the join is the inter-stage barrier, so stage k+1 never observes a
//! partially written stage-k result.

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::constants::alignment::SLICE_ALIGNMENT;
use crate::error::{SimError, SimResult};

pub struct StagePool {
    pool: ThreadPool,
    slice_len: usize,
    slice_count: usize,
}

impl StagePool {
    pub fn new(particles: usize, threads: Option<usize>) -> SimResult<Self> {
        let threads = threads
            .unwrap_or_else(|| num_cpus::get() + 1)
            .max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|idx| format!("fluid-worker-{}", idx))
            .build()
            .map_err(|e| SimError::WorkerPool(e.to_string()))?;

        let per_worker = particles.div_ceil(threads).max(1);
        let slice_len = per_worker.div_ceil(SLICE_ALIGNMENT) * SLICE_ALIGNMENT;
        let slice_count = particles.div_ceil(slice_len).max(1);
        log::debug!(
            "stage pool: {} threads, {} slices of {} particles",
            threads,
            slice_count,
            slice_len
        );
        Ok(Self { pool, slice_len, slice_count })
    }

    /// Particles per worker slice; chunked iteration in the stages uses
    /// exactly this so slice boundaries stay cache aligned.
    #[inline]
    pub fn slice_len(&self) -> usize {
        self.slice_len
    }

    /// Number of slices `[0, particles)` splits into. Fixed for the
    /// engine's lifetime; per-worker RNG streams are allocated per
    /// slice.
    #[inline]
    pub fn slice_count(&self) -> usize {
        self.slice_count
    }

    /// Run one stage body on the pool. Rayon's parallel iterators
    /// inside the closure complete before this returns.
    #[inline]
    pub fn run<R: Send>(&self, body: impl FnOnce() -> R + Send) -> R {
        self.pool.install(body)
    }
}
