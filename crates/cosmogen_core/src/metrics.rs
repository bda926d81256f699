//! Run metrics and logging setup.
//!
//! Counts steps and stability retries, emits a throttled progress line, and
//! owns the tracing subscriber initialization shared by the binary and the
//! integration tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Step and retry accounting for one run.
pub struct StepMetrics {
    steps: AtomicU64,
    retries: AtomicU64,
    log_every: u64,
    start_time: Instant,
}

impl StepMetrics {
    /// Creates a collector that logs progress every `log_every` steps.
    #[must_use]
    pub fn new(log_every: u64) -> Self {
        Self {
            steps: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            log_every: log_every.max(1),
            start_time: Instant::now(),
        }
    }

    /// Records a completed step and returns its index (1-based). Emits an
    /// info line every `log_every` steps.
    pub fn record_step(&self, time_s: f64, scale_factor: f64, temperature_k: f64) -> u64 {
        let step = self.steps.fetch_add(1, Ordering::Relaxed) + 1;
        if step.is_multiple_of(self.log_every) {
            tracing::info!(
                step,
                time_s,
                scale_factor,
                temperature_k,
                elapsed_ms = self.start_time.elapsed().as_millis() as u64,
                "simulation step"
            );
        }
        step
    }

    /// Records one dt-halving retry. Retries are recoverable but signal the
    /// step policy is too aggressive, so they log at warn.
    pub fn record_retry(&self, component: &str, dt: f64) {
        self.retries.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(component, dt, "stability retry, halving dt");
    }

    #[must_use]
    pub fn steps(&self) -> u64 {
        self.steps.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Wall-clock time since the collector was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Initializes the tracing subscriber. Safe to call more than once; later
/// calls are no-ops.
pub fn init_logging() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "cosmogen=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_metrics_start_at_zero() {
        let metrics = StepMetrics::new(500);
        assert_eq!(metrics.steps(), 0);
        assert_eq!(metrics.retries(), 0);
    }

    #[test]
    fn test_record_step_counts_and_numbers_from_one() {
        let metrics = StepMetrics::new(500);
        assert_eq!(metrics.record_step(1.0, 1e-32, 1e32), 1);
        assert_eq!(metrics.record_step(2.0, 2e-32, 5e31), 2);
        assert_eq!(metrics.steps(), 2);
    }

    #[test]
    fn test_record_retry_counts() {
        let metrics = StepMetrics::new(500);
        metrics.record_retry("expansion", 1e10);
        metrics.record_retry("perturbation grid", 5e9);
        assert_eq!(metrics.retries(), 2);
    }

    #[test]
    fn test_retry_is_logged_at_warn_level() {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = SharedBuffer(buffer.clone());
        // A subscriber that drops everything below warn; the default
        // `cosmogen=info` filter must still surface retries.
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_writer(move || sink.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            let metrics = StepMetrics::new(500);
            metrics.record_retry("expansion", 1e10);
        });
        let output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(
            output.contains("stability retry"),
            "retry line should survive a warn-level filter, got: {output:?}"
        );
    }
}
