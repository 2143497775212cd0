// src/engine/common.rs
//
// Panic isolation shared by the one-shot decoder and the batch runner.

use crate::error::{Result, StrictPngError};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error};

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// Runs `f`, turning a panic into [`StrictPngError::InternalPanic`].
///
/// `label` names the stage in the error message and the log, e.g. `"decode:png"`.
/// The closure's own errors pass through untouched.
pub fn run_with_panic_policy<T, F>(label: &'static str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => {
            if let Err(err) = &result {
                debug!(stage = label, kind = ?err.kind(), "stage failed: {err}");
            }
            result
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(stage = label, "panic caught: {message}");
            Err(StrictPngError::internal_panic(format!("{label}: {message}")))
        }
    }
}
