//! Metrics collection and export for handle pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Point-in-time metrics snapshot for a pool
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    /// Total handles created by the factory
    pub total_created: usize,

    /// Total handles handed out to callers
    pub total_acquired: usize,

    /// Total handles returned by callers
    pub total_released: usize,

    /// Handles evicted by the health checker
    pub total_evicted: usize,

    /// Handles closed (evictions, drains, post-close releases)
    pub total_closed: usize,

    /// Factory creation failures
    pub create_failures: usize,

    /// Acquires that hit their timeout
    pub acquire_timeouts: usize,

    /// Close calls that returned an error
    pub close_failures: usize,

    /// Currently open handles (idle + in use)
    pub live_handles: usize,

    /// Currently idle handles
    pub idle_handles: usize,

    /// Handles currently held by callers
    pub in_use_handles: usize,

    /// Pool utilization ratio (0.0 to 1.0)
    pub utilization: f64,

    /// Maximum pool capacity
    pub capacity: usize,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_created".to_string(), self.total_created.to_string());
        metrics.insert("total_acquired".to_string(), self.total_acquired.to_string());
        metrics.insert("total_released".to_string(), self.total_released.to_string());
        metrics.insert("total_evicted".to_string(), self.total_evicted.to_string());
        metrics.insert("total_closed".to_string(), self.total_closed.to_string());
        metrics.insert("create_failures".to_string(), self.create_failures.to_string());
        metrics.insert("acquire_timeouts".to_string(), self.acquire_timeouts.to_string());
        metrics.insert("close_failures".to_string(), self.close_failures.to_string());
        metrics.insert("live_handles".to_string(), self.live_handles.to_string());
        metrics.insert("idle_handles".to_string(), self.idle_handles.to_string());
        metrics.insert("in_use_handles".to_string(), self.in_use_handles.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics.insert("capacity".to_string(), self.capacity.to_string());
        metrics
    }
}

/// Metrics exporter for Prometheus format
pub struct MetricsExporter;

impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let mut output = String::new();
        let labels = Self::format_labels(pool_name, tags);

        // Gauge metrics
        output.push_str("# HELP gatepool_handles_live Currently open handles\n");
        output.push_str("# TYPE gatepool_handles_live gauge\n");
        output.push_str(&format!("gatepool_handles_live{{{}}} {}\n", labels, metrics.live_handles));

        output.push_str("# HELP gatepool_handles_idle Currently idle handles\n");
        output.push_str("# TYPE gatepool_handles_idle gauge\n");
        output.push_str(&format!("gatepool_handles_idle{{{}}} {}\n", labels, metrics.idle_handles));

        output.push_str("# HELP gatepool_handles_in_use Handles held by callers\n");
        output.push_str("# TYPE gatepool_handles_in_use gauge\n");
        output.push_str(&format!("gatepool_handles_in_use{{{}}} {}\n", labels, metrics.in_use_handles));

        output.push_str("# HELP gatepool_utilization Pool utilization ratio\n");
        output.push_str("# TYPE gatepool_utilization gauge\n");
        output.push_str(&format!("gatepool_utilization{{{}}} {:.2}\n", labels, metrics.utilization));

        // Counter metrics
        output.push_str("# HELP gatepool_handles_created_total Handles created\n");
        output.push_str("# TYPE gatepool_handles_created_total counter\n");
        output.push_str(&format!("gatepool_handles_created_total{{{}}} {}\n", labels, metrics.total_created));

        output.push_str("# HELP gatepool_handles_acquired_total Handles handed out\n");
        output.push_str("# TYPE gatepool_handles_acquired_total counter\n");
        output.push_str(&format!("gatepool_handles_acquired_total{{{}}} {}\n", labels, metrics.total_acquired));

        output.push_str("# HELP gatepool_handles_released_total Handles returned\n");
        output.push_str("# TYPE gatepool_handles_released_total counter\n");
        output.push_str(&format!("gatepool_handles_released_total{{{}}} {}\n", labels, metrics.total_released));

        output.push_str("# HELP gatepool_handles_evicted_total Handles evicted by the health checker\n");
        output.push_str("# TYPE gatepool_handles_evicted_total counter\n");
        output.push_str(&format!("gatepool_handles_evicted_total{{{}}} {}\n", labels, metrics.total_evicted));

        output.push_str("# HELP gatepool_create_failures_total Factory creation failures\n");
        output.push_str("# TYPE gatepool_create_failures_total counter\n");
        output.push_str(&format!("gatepool_create_failures_total{{{}}} {}\n", labels, metrics.create_failures));

        output.push_str("# HELP gatepool_acquire_timeouts_total Acquires that timed out\n");
        output.push_str("# TYPE gatepool_acquire_timeouts_total counter\n");
        output.push_str(&format!("gatepool_acquire_timeouts_total{{{}}} {}\n", labels, metrics.acquire_timeouts));

        output.push_str("# HELP gatepool_close_failures_total Handle close failures\n");
        output.push_str("# TYPE gatepool_close_failures_total counter\n");
        output.push_str(&format!("gatepool_close_failures_total{{{}}} {}\n", labels, metrics.close_failures));

        output
    }

    fn format_labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("pool=\"{}\"", pool_name)];

        if let Some(tags) = tags {
            for (key, value) in tags {
                labels.push(format!("{}=\"{}\"", key, value));
            }
        }

        labels.join(",")
    }
}

/// Internal metrics tracker
pub(crate) struct MetricsTracker {
    pub total_created: AtomicUsize,
    pub total_acquired: AtomicUsize,
    pub total_released: AtomicUsize,
    pub total_evicted: AtomicUsize,
    pub total_closed: AtomicUsize,
    pub create_failures: AtomicUsize,
    pub acquire_timeouts: AtomicUsize,
    pub close_failures: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self {
            total_created: AtomicUsize::new(0),
            total_acquired: AtomicUsize::new(0),
            total_released: AtomicUsize::new(0),
            total_evicted: AtomicUsize::new(0),
            total_closed: AtomicUsize::new(0),
            create_failures: AtomicUsize::new(0),
            acquire_timeouts: AtomicUsize::new(0),
            close_failures: AtomicUsize::new(0),
        }
    }

    pub fn snapshot(&self, live: usize, idle: usize, in_use: usize, capacity: usize) -> PoolMetrics {
        let utilization = if capacity > 0 {
            in_use as f64 / capacity as f64
        } else {
            0.0
        };

        PoolMetrics {
            total_created: self.total_created.load(Ordering::Relaxed),
            total_acquired: self.total_acquired.load(Ordering::Relaxed),
            total_released: self.total_released.load(Ordering::Relaxed),
            total_evicted: self.total_evicted.load(Ordering::Relaxed),
            total_closed: self.total_closed.load(Ordering::Relaxed),
            create_failures: self.create_failures.load(Ordering::Relaxed),
            acquire_timeouts: self.acquire_timeouts.load(Ordering::Relaxed),
            close_failures: self.close_failures.load(Ordering::Relaxed),
            live_handles: live,
            idle_handles: idle,
            in_use_handles: in_use,
            utilization,
            capacity,
        }
    }
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new()
    }
}
