//! Backpressure handling for the send queue.
//!
//! The send queue is bounded: producers wait for space up to a timeout,
//! then fail with `BackpressureTimeout`. This is the documented policy
//! (bounded-with-block); the resulting memory bound is
//! `max_pending` packets times the largest accepted payload.
//!
//! The [`BackpressureController`] tracks pending packets with a shared
//! atomic counter; the writer task releases slots as packets drain.
//!
//! # Configuration
//!
//! - `max_pending`: maximum number of pending packets (default: 1024)
//! - Timeout: how long a producer waits for space (default: 5s)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{ActorwireError, Result};

/// Default maximum pending packets before backpressure kicks in.
pub const DEFAULT_MAX_PENDING: usize = 1024;

/// Default backpressure timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Interval between backpressure checks.
const CHECK_INTERVAL: Duration = Duration::from_micros(100);

/// Backpressure controller for managing send queue pressure.
///
/// Lock-free pending count tracking; cloneable and shared between the
/// send path and the writer task.
#[derive(Debug)]
pub struct BackpressureController {
    /// Current pending packet count.
    pending: Arc<AtomicUsize>,
    /// Maximum allowed pending packets.
    max_pending: usize,
    /// Timeout for waiting on backpressure.
    timeout: Duration,
}

impl BackpressureController {
    /// Create a new backpressure controller with the specified limit.
    pub fn new(max_pending: usize) -> Self {
        Self::with_timeout(max_pending, DEFAULT_TIMEOUT)
    }

    /// Create a controller with a custom timeout.
    pub fn with_timeout(max_pending: usize, timeout: Duration) -> Self {
        Self {
            pending: Arc::new(AtomicUsize::new(0)),
            max_pending,
            timeout,
        }
    }

    /// Check if backpressure is currently active.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.pending.load(Ordering::Acquire) >= self.max_pending
    }

    /// Get current pending count.
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Get maximum pending limit.
    #[inline]
    pub fn max_pending(&self) -> usize {
        self.max_pending
    }

    /// Try to reserve a slot without waiting.
    ///
    /// Returns `Err(BackpressureTimeout)` immediately if at capacity.
    pub fn try_reserve(&self) -> Result<()> {
        if self.pending.load(Ordering::Acquire) >= self.max_pending {
            return Err(ActorwireError::BackpressureTimeout);
        }
        self.pending.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Reserve a slot, waiting if necessary.
    ///
    /// Returns `Err(BackpressureTimeout)` if the timeout is reached.
    pub async fn reserve(&self) -> Result<()> {
        // Fast path
        if self.pending.load(Ordering::Acquire) < self.max_pending {
            self.pending.fetch_add(1, Ordering::AcqRel);
            return Ok(());
        }

        let start = Instant::now();

        loop {
            if self.pending.load(Ordering::Acquire) < self.max_pending {
                self.pending.fetch_add(1, Ordering::AcqRel);
                return Ok(());
            }

            if start.elapsed() > self.timeout {
                return Err(ActorwireError::BackpressureTimeout);
            }

            tokio::time::sleep(CHECK_INTERVAL).await;
        }
    }

    /// Release a slot (called after a packet is written).
    #[inline]
    pub fn release(&self) {
        self.pending.fetch_sub(1, Ordering::Release);
    }

    /// Release multiple slots at once (for batch writes).
    #[inline]
    pub fn release_many(&self, count: usize) {
        self.pending.fetch_sub(count, Ordering::Release);
    }
}

impl Default for BackpressureController {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PENDING)
    }
}

impl Clone for BackpressureController {
    fn clone(&self) -> Self {
        Self {
            pending: self.pending.clone(),
            max_pending: self.max_pending,
            timeout: self.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_creation() {
        let ctrl = BackpressureController::new(100);
        assert_eq!(ctrl.max_pending(), 100);
        assert_eq!(ctrl.pending_count(), 0);
        assert!(!ctrl.is_active());
    }

    #[test]
    fn test_try_reserve_to_capacity() {
        let ctrl = BackpressureController::new(5);

        for _ in 0..5 {
            assert!(ctrl.try_reserve().is_ok());
        }
        assert!(ctrl.is_active());

        let result = ctrl.try_reserve();
        assert!(matches!(result, Err(ActorwireError::BackpressureTimeout)));
    }

    #[test]
    fn test_release() {
        let ctrl = BackpressureController::new(10);

        ctrl.try_reserve().unwrap();
        ctrl.try_reserve().unwrap();
        assert_eq!(ctrl.pending_count(), 2);

        ctrl.release();
        assert_eq!(ctrl.pending_count(), 1);

        ctrl.release_many(1);
        assert_eq!(ctrl.pending_count(), 0);
    }

    #[test]
    fn test_clone_shares_state() {
        let ctrl1 = BackpressureController::new(10);
        let ctrl2 = ctrl1.clone();

        ctrl1.try_reserve().unwrap();
        assert_eq!(ctrl2.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_reserve_immediate() {
        let ctrl = BackpressureController::new(10);
        ctrl.reserve().await.unwrap();
        assert_eq!(ctrl.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_reserve_timeout() {
        let ctrl = BackpressureController::with_timeout(1, Duration::from_millis(10));
        ctrl.try_reserve().unwrap();

        let start = Instant::now();
        let result = ctrl.reserve().await;

        assert!(matches!(result, Err(ActorwireError::BackpressureTimeout)));
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_reserve_wait_success() {
        let ctrl = BackpressureController::with_timeout(1, Duration::from_secs(1));
        ctrl.try_reserve().unwrap();

        let ctrl_clone = ctrl.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            ctrl_clone.release();
        });

        assert!(ctrl.reserve().await.is_ok());
    }
}
