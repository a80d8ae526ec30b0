//! Cooperative cancellation for long-running solves.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag for aborting an in-flight solve from another thread.
///
/// Cloning shares the flag. The solve checks it at every data-dependent
/// loop: before each enumerated free-variable point, before each
/// configuration weighing, and before each recursive step of a cache-miss
/// arrangement enumeration.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
