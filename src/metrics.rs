use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Number of latency samples kept per stage
const LATENCY_WINDOW: usize = 1000;

/// A simple percentile tracker that maintains a sliding window of measurements
#[derive(Debug)]
pub struct PercentileTracker {
    measurements: Mutex<VecDeque<u64>>,
    window_size: usize,
}

impl PercentileTracker {
    /// Create a new percentile tracker with a specified window size
    pub fn new(window_size: usize) -> Self {
        Self {
            measurements: Mutex::new(VecDeque::with_capacity(window_size)),
            window_size,
        }
    }

    /// Record a measurement (in nanoseconds)
    pub fn record(&self, nanos: u64) {
        let mut measurements = self.measurements.lock();
        if measurements.len() >= self.window_size {
            measurements.pop_front();
        }
        measurements.push_back(nanos);
    }

    /// Percentile `p` (0.0-1.0) of the window, in microseconds
    pub fn percentile_us(&self, p: f64) -> f64 {
        let measurements = self.measurements.lock();
        if measurements.is_empty() {
            return 0.0;
        }

        let mut sorted: Vec<_> = measurements.iter().copied().collect();
        sorted.sort_unstable();

        let idx = ((sorted.len() as f64 * p).ceil() as usize)
            .saturating_sub(1)
            .min(sorted.len() - 1);
        sorted[idx] as f64 / 1000.0
    }

    pub fn count(&self) -> usize {
        self.measurements.lock().len()
    }
}

/// Counters for a single stage, shared by every worker that runs it
#[derive(Debug)]
pub struct StageMetrics {
    name: String,
    processed: AtomicU64,
    faults: AtomicU64,
    latency: PercentileTracker,
}

impl StageMetrics {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            processed: AtomicU64::new(0),
            faults: AtomicU64::new(0),
            latency: PercentileTracker::new(LATENCY_WINDOW),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record one successful stage call and how long it took
    pub fn record_processed(&self, elapsed: Duration) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.latency.record(elapsed.as_nanos() as u64);
    }

    /// Record a stage call that panicked
    pub fn record_fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn total_faults(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StageSnapshot {
        StageSnapshot {
            name: self.name.clone(),
            processed: self.total_processed(),
            faults: self.total_faults(),
            latency_p50_us: self.latency.percentile_us(0.50),
            latency_p95_us: self.latency.percentile_us(0.95),
            latency_p99_us: self.latency.percentile_us(0.99),
        }
    }
}

/// Pipeline-wide counters.
///
/// Purely observational: nothing in the scheduler reads these.
#[derive(Debug)]
pub struct PipelineMetrics {
    admitted: AtomicU64,
    rejected: AtomicU64,
    routing_drops: AtomicU64,
    advance_drops: AtomicU64,
    completed: AtomicU64,
    stages: Vec<StageMetrics>,
    start_time: Instant,
}

impl PipelineMetrics {
    pub fn new(stage_names: impl IntoIterator<Item = String>) -> Self {
        Self {
            admitted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            routing_drops: AtomicU64::new(0),
            advance_drops: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            stages: stage_names.into_iter().map(StageMetrics::new).collect(),
            start_time: Instant::now(),
        }
    }

    /// A submission entered the admission gate
    pub fn record_admitted(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
    }

    /// A submission was turned away (not running, or gate full)
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// The dispatcher found the target stage buffer full
    pub fn record_routing_drop(&self) {
        self.routing_drops.fetch_add(1, Ordering::Relaxed);
    }

    /// A worker could not re-admit an item for its next stage
    pub fn record_advance_drop(&self) {
        self.advance_drops.fetch_add(1, Ordering::Relaxed);
    }

    /// An item finished its final stage
    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stage(&self, index: usize) -> Option<&StageMetrics> {
        self.stages.get(index)
    }

    pub fn total_admitted(&self) -> u64 {
        self.admitted.load(Ordering::Relaxed)
    }

    pub fn total_rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn total_routing_drops(&self) -> u64 {
        self.routing_drops.load(Ordering::Relaxed)
    }

    pub fn total_advance_drops(&self) -> u64 {
        self.advance_drops.load(Ordering::Relaxed)
    }

    pub fn total_completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Completed items per second since construction
    pub fn throughput_ips(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            0.0
        } else {
            self.total_completed() as f64 / elapsed
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            admitted: self.total_admitted(),
            rejected: self.total_rejected(),
            routing_drops: self.total_routing_drops(),
            advance_drops: self.total_advance_drops(),
            completed: self.total_completed(),
            throughput_ips: self.throughput_ips(),
            elapsed: self.start_time.elapsed(),
            stages: self.stages.iter().map(StageMetrics::snapshot).collect(),
        }
    }
}

/// Point-in-time copy of one stage's counters
#[derive(Debug, Clone)]
pub struct StageSnapshot {
    pub name: String,
    pub processed: u64,
    pub faults: u64,
    pub latency_p50_us: f64,
    pub latency_p95_us: f64,
    pub latency_p99_us: f64,
}

/// A snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub admitted: u64,
    pub rejected: u64,
    pub routing_drops: u64,
    pub advance_drops: u64,
    pub completed: u64,
    pub throughput_ips: f64,
    pub elapsed: Duration,
    pub stages: Vec<StageSnapshot>,
}

impl MetricsSnapshot {
    /// Format metrics as a human-readable, multi-line string
    pub fn format(&self) -> String {
        let mut summary = format!(
            "Admitted: {}, Rejected: {}, Routing drops: {}, Advance drops: {}, \
             Completed: {}, Throughput: {:.2} items/s, Elapsed: {:.2}s\n",
            self.admitted,
            self.rejected,
            self.routing_drops,
            self.advance_drops,
            self.completed,
            self.throughput_ips,
            self.elapsed.as_secs_f64()
        );
        for (i, stage) in self.stages.iter().enumerate() {
            summary.push_str(&format!(
                "  Stage {} ({}): Processed: {}, Faults: {}, \
                 Latency P50: {:.2}µs, P95: {:.2}µs, P99: {:.2}µs\n",
                i,
                stage.name,
                stage.processed,
                stage.faults,
                stage.latency_p50_us,
                stage.latency_p95_us,
                stage.latency_p99_us
            ));
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_tracker() {
        let tracker = PercentileTracker::new(10);
        for i in 1..=10 {
            tracker.record(i * 1000); // 1us to 10us in nanos
        }
        assert_eq!(tracker.percentile_us(0.50), 5.0);
        assert_eq!(tracker.percentile_us(0.99), 10.0);
    }

    #[test]
    fn test_percentile_window_slides() {
        let tracker = PercentileTracker::new(3);
        for i in 1..=5 {
            tracker.record(i * 1000);
        }
        assert_eq!(tracker.count(), 3);
        assert_eq!(tracker.percentile_us(0.0), 3.0);
    }

    #[test]
    fn test_empty_tracker_reports_zero() {
        let tracker = PercentileTracker::new(3);
        assert_eq!(tracker.percentile_us(0.5), 0.0);
    }

    #[test]
    fn test_stage_metrics() {
        let metrics = StageMetrics::new("parse");
        for _ in 0..100 {
            metrics.record_processed(Duration::from_micros(1));
        }
        metrics.record_fault();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.name, "parse");
        assert_eq!(snapshot.processed, 100);
        assert_eq!(snapshot.faults, 1);
        assert_eq!(snapshot.latency_p50_us, 1.0);
    }

    #[test]
    fn test_pipeline_snapshot_format() {
        let metrics = PipelineMetrics::new(vec!["a".to_string(), "b".to_string()]);
        metrics.record_admitted();
        metrics.record_admitted();
        metrics.record_rejected();
        metrics.record_routing_drop();
        metrics.record_completed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.admitted, 2);
        assert_eq!(snapshot.rejected, 1);
        assert_eq!(snapshot.routing_drops, 1);
        assert_eq!(snapshot.advance_drops, 0);
        assert_eq!(snapshot.completed, 1);
        assert_eq!(snapshot.stages.len(), 2);

        let text = snapshot.format();
        assert!(text.contains("Admitted: 2"));
        assert!(text.contains("Stage 1 (b)"));
    }
}
