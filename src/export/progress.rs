//! Progress tracking for export operations
//!
//! Counts rows as they are written and reports them through `tracing`, so a
//! long streamed export leaves a trail in the logs.

use std::time::Instant;

use tracing::{debug, info};

/// Rows between two progress log lines.
const DEFAULT_LOG_EVERY: u64 = 1000;

/// Progress tracker for export operations
pub struct ProgressTracker {
    /// Exporter id, used as log context
    label: String,
    /// Number of rows processed so far
    processed: u64,
    /// Log a line every this many rows
    log_every: u64,
    /// Start time of the operation
    start_time: Instant,
}

impl ProgressTracker {
    /// Create a new progress tracker
    ///
    /// # Arguments
    /// * `label` - Exporter id used in log lines
    pub fn new(label: &str) -> Self {
        Self::with_interval(label, DEFAULT_LOG_EVERY)
    }

    /// Create a tracker that logs every `log_every` rows
    pub fn with_interval(label: &str, log_every: u64) -> Self {
        Self {
            label: label.to_string(),
            processed: 0,
            log_every: log_every.max(1),
            start_time: Instant::now(),
        }
    }

    /// Record one more row
    pub fn tick(&mut self) {
        self.processed += 1;

        if self.processed % self.log_every == 0 {
            let elapsed = self.start_time.elapsed().as_secs_f64();
            let speed = if elapsed > 0.0 {
                self.processed as f64 / elapsed
            } else {
                0.0
            };
            info!(
                "[{}] Progress: {} rows exported ({:.0} rows/sec)",
                self.label, self.processed, speed
            );
        }
    }

    /// Rows counted so far
    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Milliseconds since the tracker was created
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Log the final count
    pub fn finish(&self) {
        debug!(
            "[{}] Finished after {} rows in {} ms",
            self.label,
            self.processed,
            self.elapsed_ms()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_tracker_counts() {
        let mut tracker = ProgressTracker::with_interval("users", 2);
        for _ in 0..5 {
            tracker.tick();
        }
        assert_eq!(tracker.processed(), 5);
        tracker.finish();
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let mut tracker = ProgressTracker::with_interval("orders", 0);
        tracker.tick();
        assert_eq!(tracker.processed(), 1);
    }
}
