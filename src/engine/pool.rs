// src/engine/pool.rs
//
// Global thread pool for batch decoding.
//
// One pool is shared by every batch instead of building a pool per call.
// It is created lazily on first use; the thread count is fixed from then on.
//
// Thread count comes from std::thread::available_parallelism(), which respects
// cgroup/CPU quota. Nothing is read from the environment; callers that need a
// specific size build their own rayon pool and use `decode_batch_in`.

use rayon::ThreadPool;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Minimum number of worker threads.
const MIN_THREADS: usize = 1;

static GLOBAL_THREAD_POOL: OnceLock<Option<ThreadPool>> = OnceLock::new();

/// Worker count the global pool is built with.
pub fn default_thread_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(MIN_THREADS)
        .max(MIN_THREADS)
}

/// The shared batch pool, or `None` if no pool could be built; callers then
/// fall back to rayon's implicit global pool.
pub fn get_pool() -> Option<&'static ThreadPool> {
    GLOBAL_THREAD_POOL
        .get_or_init(|| {
            let threads = default_thread_count();
            match rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("strict-png-{i}"))
                .build()
            {
                Ok(pool) => {
                    debug!(threads, "batch thread pool created");
                    Some(pool)
                }
                Err(e) => {
                    warn!("failed to create batch thread pool: {e}");
                    None
                }
            }
        })
        .as_ref()
}
