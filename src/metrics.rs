//! Request metrics for the scoring service.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

use crate::types::prediction::ClassPrediction;

/// Maximum number of latency samples kept for percentile estimates
const MAX_LATENCY_SAMPLES: usize = 10_000;

/// Metrics collector for the prediction endpoint
pub struct ServiceMetrics {
    /// Total prediction requests received
    pub requests: AtomicU64,
    /// Requests answered with a prediction
    pub predictions: AtomicU64,
    /// Predictions per class label
    predictions_by_label: RwLock<BTreeMap<i64, u64>>,
    /// Failures per error kind
    failures_by_kind: RwLock<BTreeMap<String, u64>>,
    /// Processing times of successful requests (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Fraud probability distribution buckets
    score_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl ServiceMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            predictions: AtomicU64::new(0),
            predictions_by_label: RwLock::new(BTreeMap::new()),
            failures_by_kind: RwLock::new(BTreeMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a successful prediction
    pub fn record_prediction(&self, processing_time: Duration, prediction: &ClassPrediction) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.predictions.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut by_label) = self.predictions_by_label.write() {
            *by_label.entry(prediction.label).or_insert(0) += 1;
        }

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            if times.len() > MAX_LATENCY_SAMPLES {
                times.drain(0..MAX_LATENCY_SAMPLES / 2);
            }
        }

        let bucket = (prediction.positive_probability().clamp(0.0, 1.0) * 10.0).min(9.0) as usize;
        if let Ok(mut buckets) = self.score_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Record a failed request
    pub fn record_failure(&self, kind: &str) {
        self.requests.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut by_kind) = self.failures_by_kind.write() {
            *by_kind.entry(kind.to_string()).or_insert(0) += 1;
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let sorted = match self.processing_times.read() {
            Ok(times) if !times.is_empty() => {
                let mut sorted = times.clone();
                sorted.sort_unstable();
                sorted
            }
            _ => return ProcessingStats::default(),
        };

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let percentile = |p: f64| sorted[((count as f64 * p) as usize).min(count - 1)];

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: percentile(0.50),
            p95_us: percentile(0.95),
            p99_us: percentile(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Get current throughput (requests per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.requests.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            predictions: self.predictions.load(Ordering::Relaxed),
            predictions_by_label: self
                .predictions_by_label
                .read()
                .map(|m| m.iter().map(|(label, n)| (label.to_string(), *n)).collect())
                .unwrap_or_default(),
            failures_by_kind: self
                .failures_by_kind
                .read()
                .map(|m| m.clone())
                .unwrap_or_default(),
            fraud_probability_buckets: self.score_buckets.read().map(|b| *b).unwrap_or_default(),
            processing: self.get_processing_stats(),
            throughput: self.get_throughput(),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let snapshot = self.snapshot();
        let failures: u64 = snapshot.failures_by_kind.values().sum();
        let failure_rate = if snapshot.requests > 0 {
            (failures as f64 / snapshot.requests as f64) * 100.0
        } else {
            0.0
        };
        let p = &snapshot.processing;

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║            FRAUD SCORING SERVICE - METRICS SUMMARY           ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Requests: {:>8}  │  Throughput: {:>6.1} req/s  │  Failed: {:>5.1}% ║",
            snapshot.requests, snapshot.throughput, failure_rate
        );
        info!(
            "║ Latency (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5} max={:>6} ║",
            p.mean_us, p.p50_us, p.p95_us, p.p99_us, p.max_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        for (label, count) in &snapshot.predictions_by_label {
            info!("║   label {:>4}: {:>8}", label, count);
        }
        for (kind, count) in &snapshot.failures_by_kind {
            info!("║   {:>15}: {:>8}", kind, count);
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        let total: u64 = snapshot.fraud_probability_buckets.iter().sum();
        for (i, &count) in snapshot.fraud_probability_buckets.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar: String = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default, Clone, Serialize)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Serializable view served on `GET /metrics`
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub predictions: u64,
    pub predictions_by_label: BTreeMap<String, u64>,
    pub failures_by_kind: BTreeMap<String, u64>,
    pub fraud_probability_buckets: [u64; 10],
    pub processing: ProcessingStats,
    pub throughput: f64,
    pub uptime_secs: u64,
}

/// Periodic metrics reporter
pub struct MetricsReporter {
    metrics: Arc<ServiceMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(label: i64, fraud: f64) -> ClassPrediction {
        ClassPrediction {
            label,
            probabilities: vec![1.0 - fraud, fraud],
        }
    }

    #[test]
    fn test_metrics_recording() {
        let metrics = ServiceMetrics::new();

        metrics.record_prediction(Duration::from_micros(100), &prediction(0, 0.05));
        metrics.record_prediction(Duration::from_micros(300), &prediction(1, 0.95));
        metrics.record_prediction(Duration::from_micros(200), &prediction(1, 1.0));
        metrics.record_failure("invalid_date");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests, 4);
        assert_eq!(snapshot.predictions, 3);
        assert_eq!(snapshot.predictions_by_label.get("0"), Some(&1));
        assert_eq!(snapshot.predictions_by_label.get("1"), Some(&2));
        assert_eq!(snapshot.failures_by_kind.get("invalid_date"), Some(&1));
        assert_eq!(snapshot.fraud_probability_buckets[0], 1);
        assert_eq!(snapshot.fraud_probability_buckets[9], 2);
    }

    #[test]
    fn test_processing_stats() {
        let metrics = ServiceMetrics::new();
        assert_eq!(metrics.get_processing_stats().count, 0);

        for us in [100, 200, 300, 400] {
            metrics.record_prediction(Duration::from_micros(us), &prediction(0, 0.1));
        }

        let stats = metrics.get_processing_stats();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean_us, 250);
        assert_eq!(stats.p50_us, 300);
        assert_eq!(stats.p99_us, 400);
        assert_eq!(stats.max_us, 400);
    }
}
