//! Cooperative cancellation handle. Every long-running operation threads
//! one through and checks it at loop heads and before each I/O call.
//!
//! A thin `Arc<AtomicBool>` wrapper rather than a full async primitive:
//! nothing here needs to `.await` a cancellation, only poll it between
//! units of work.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
