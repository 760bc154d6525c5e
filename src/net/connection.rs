//! In-flight request tracking.
//!
//! # Responsibilities
//! - Generate unique request sequence numbers for tracing
//! - Count requests between accept and the end of their response body
//! - Let shutdown wait until the count reaches zero
//!
//! # Design Decisions
//! - Guards decrement on drop, so panicking handlers cannot leak a slot
//! - The count lives in a watch channel; waiting never polls

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

/// Global counter for request sequence numbers.
/// Relaxed ordering is enough: only uniqueness matters.
static REQUEST_SEQ: AtomicU64 = AtomicU64::new(1);

/// Unique sequence number of a dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestSeq(u64);

impl RequestSeq {
    pub fn next() -> Self {
        Self(REQUEST_SEQ.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RequestSeq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Counts requests that are still being served.
#[derive(Debug, Clone)]
pub struct InFlightTracker {
    active: Arc<watch::Sender<u64>>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            active: Arc::new(tx),
        }
    }

    /// Record a new in-flight request. The returned guard releases it on drop.
    pub fn track(&self) -> InFlightGuard {
        self.active.send_modify(|n| *n += 1);
        InFlightGuard {
            active: Arc::clone(&self.active),
            seq: RequestSeq::next(),
        }
    }

    pub fn active_count(&self) -> u64 {
        *self.active.borrow()
    }

    /// Resolve once no request is in flight.
    pub async fn wait_idle(&self) {
        let mut rx = self.active.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

impl Default for InFlightTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks one request as in flight for as long as it lives.
#[derive(Debug)]
pub struct InFlightGuard {
    active: Arc<watch::Sender<u64>>,
    seq: RequestSeq,
}

impl InFlightGuard {
    pub fn seq(&self) -> RequestSeq {
        self.seq
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.active.send_modify(|n| *n = n.saturating_sub(1));
        tracing::trace!(request = %self.seq, "Request finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn request_seq_unique() {
        assert_ne!(RequestSeq::next(), RequestSeq::next());
    }

    #[test]
    fn tracker_counts() {
        let tracker = InFlightTracker::new();
        assert_eq!(tracker.active_count(), 0);

        let guard1 = tracker.track();
        assert_eq!(tracker.active_count(), 1);

        let guard2 = tracker.track();
        assert_eq!(tracker.active_count(), 2);

        drop(guard1);
        assert_eq!(tracker.active_count(), 1);

        drop(guard2);
        assert_eq!(tracker.active_count(), 0);
    }

    #[tokio::test]
    async fn wait_idle_resolves_after_last_guard() {
        let tracker = InFlightTracker::new();
        let guard = tracker.track();

        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.wait_idle().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("tracker never went idle")
            .unwrap();
    }
}
