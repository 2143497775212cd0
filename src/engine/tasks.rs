// src/engine/tasks.rs
//
// Decode tasks and parallel batch decoding.
// Each task owns its input and config; workers share nothing mutable, and a
// failing (or panicking) task only affects its own BatchResult.

use crate::engine::api::{decode_png, DecodedImage};
use crate::engine::firewall::DecodeConfig;
use crate::engine::pool;
use crate::error::{ErrorCategory, ErrorKind, Result};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::sync::Arc;
use tracing::{debug, warn};

/// One independent decode job.
#[derive(Clone, Debug)]
pub struct DecodeTask {
    /// Shared so the same bytes can be queued under several configs.
    pub source: Arc<Vec<u8>>,
    pub config: DecodeConfig,
}

impl DecodeTask {
    pub fn new(source: impl Into<Arc<Vec<u8>>>, config: DecodeConfig) -> Self {
        Self {
            source: source.into(),
            config,
        }
    }

    /// Decodes the source; panics come back as `InternalPanic`.
    pub fn decode(&self) -> Result<DecodedImage> {
        decode_png(&self.source, &self.config)
    }
}

/// Outcome of one task in a batch, in input order.
#[derive(Clone, Debug)]
pub struct BatchResult {
    /// Position of the task in the input slice.
    pub index: usize,
    pub success: bool,
    pub error: Option<String>,
    pub error_code: Option<ErrorKind>,
    pub error_category: Option<ErrorCategory>,
    pub image: Option<DecodedImage>,
}

fn process_one(index: usize, task: &DecodeTask) -> BatchResult {
    match task.decode() {
        Ok(image) => BatchResult {
            index,
            success: true,
            error: None,
            error_code: None,
            error_category: None,
            image: Some(image),
        },
        Err(err) => {
            let code = err.kind();
            let category = err.category();
            debug!(index, kind = ?code, "batch task failed");
            BatchResult {
                index,
                success: false,
                error: Some(format!("[{code:?}] task {index}: {err}")),
                error_code: Some(code),
                error_category: Some(category),
                image: None,
            }
        }
    }
}

/// Decodes every task in parallel on the shared pool.
pub fn decode_batch(tasks: &[DecodeTask]) -> Vec<BatchResult> {
    match pool::get_pool() {
        Some(pool) => decode_batch_in(pool, tasks),
        None => {
            warn!("no batch pool, using rayon's global pool");
            run(tasks)
        }
    }
}

/// Same as [`decode_batch`] on a caller-provided pool.
pub fn decode_batch_in(pool: &ThreadPool, tasks: &[DecodeTask]) -> Vec<BatchResult> {
    pool.install(|| run(tasks))
}

fn run(tasks: &[DecodeTask]) -> Vec<BatchResult> {
    let results: Vec<BatchResult> = tasks
        .par_iter()
        .enumerate()
        .map(|(index, task)| process_one(index, task))
        .collect();
    let failed = results.iter().filter(|r| !r.success).count();
    debug!(tasks = tasks.len(), failed, "batch finished");
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::chunk::{chunk_crc, ChunkType};
    use crate::engine::session::PNG_SIGNATURE;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gray_png(value: u8) -> Vec<u8> {
        let mut out = PNG_SIGNATURE.to_vec();
        let mut put = |ty: &[u8; 4], data: &[u8]| {
            out.extend_from_slice(&(data.len() as u32).to_be_bytes());
            out.extend_from_slice(ty);
            out.extend_from_slice(data);
            out.extend_from_slice(&chunk_crc(ChunkType(*ty), data).to_be_bytes());
        };
        put(b"IHDR", &[0, 0, 0, 1, 0, 0, 0, 1, 8, 0, 0, 0, 0]);
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&[0, value]).unwrap();
        put(b"IDAT", &enc.finish().unwrap());
        put(b"IEND", &[]);
        out
    }

    #[test]
    fn failures_stay_with_their_task() {
        let good = Arc::new(gray_png(9));
        let tasks = vec![
            DecodeTask::new(good.clone(), DecodeConfig::default()),
            DecodeTask::new(vec![0u8; 4], DecodeConfig::default()),
            DecodeTask::new(good, DecodeConfig::strict()),
        ];
        let results = decode_batch(&tasks);
        assert_eq!(results.len(), 3);
        assert_eq!(
            results.iter().map(|r| r.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );

        assert!(results[0].success);
        assert_eq!(results[0].image.as_ref().unwrap().pixels, vec![9]);

        assert!(!results[1].success);
        assert_eq!(results[1].error_code, Some(ErrorKind::Truncated));
        assert_eq!(results[1].error_category, Some(ErrorCategory::CodecError));
        assert!(results[1].error.as_deref().unwrap().contains("task 1"));

        assert!(results[2].success);
    }

    #[test]
    fn custom_pool() {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(2)
            .build()
            .unwrap();
        let tasks: Vec<_> = (0..8u8)
            .map(|v| DecodeTask::new(gray_png(v), DecodeConfig::default()))
            .collect();
        let results = decode_batch_in(&pool, &tasks);
        for (v, r) in results.iter().enumerate() {
            assert_eq!(r.image.as_ref().unwrap().pixels, vec![v as u8]);
        }
    }

    #[test]
    fn empty_batch() {
        assert!(decode_batch(&[]).is_empty());
    }
}
