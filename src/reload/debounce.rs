//! Debouncing of change notifications.
//!
//! A single save usually produces several filesystem events in quick
//! succession (write, rename, metadata). [`Debouncer`] collapses such a burst
//! into one trigger that fires once no notification has arrived for the
//! whole quiet window.

use std::time::Duration;

use tokio::time::{sleep_until, Instant};

#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a notification, (re)starting the quiet window.
    pub fn notify(&mut self) {
        self.deadline = Some(Instant::now() + self.window);
    }

    /// True while a trigger is scheduled.
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Drop any scheduled trigger.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Resolve when the quiet window elapses; pending forever if idle.
    ///
    /// Cancel safe: dropping the future before it resolves keeps the
    /// trigger scheduled.
    pub async fn fired(&mut self) {
        match self.deadline {
            Some(deadline) => {
                sleep_until(deadline).await;
                self.deadline = None;
            }
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_quiet_window() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let start = Instant::now();

        debouncer.notify();
        assert!(debouncer.is_pending());
        debouncer.fired().await;

        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_notification_resets_window() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let start = Instant::now();

        debouncer.notify();
        tokio::time::advance(Duration::from_millis(80)).await;
        debouncer.notify();
        debouncer.fired().await;

        assert!(start.elapsed() >= Duration::from_millis(180));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_never_fires() {
        let mut debouncer = Debouncer::new(Duration::from_millis(10));
        let fired = tokio::time::timeout(Duration::from_secs(5), debouncer.fired()).await;
        assert!(fired.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_clears_trigger() {
        let mut debouncer = Debouncer::new(Duration::from_millis(10));
        debouncer.notify();
        debouncer.cancel();
        assert!(!debouncer.is_pending());
        let fired = tokio::time::timeout(Duration::from_secs(1), debouncer.fired()).await;
        assert!(fired.is_err());
    }
}
