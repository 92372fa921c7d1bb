//! Metrics collection feeding degradation rules

use super::types::{ResourceUsage, ResponseTimes, SystemMetrics};
use crate::breaker::CircuitBreakerManager;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

#[cfg(feature = "system-metrics")]
use sysinfo::{Disks, System};

/// Span over which throughput is measured
const THROUGHPUT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: Instant,
    latency_ms: f64,
    success: bool,
}

/// Derived request statistics
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RequestSnapshot {
    pub response_time: ResponseTimes,
    pub error_rate: f64,
    pub throughput: f64,
    pub samples: usize,
}

/// Bounded window of request outcomes
#[derive(Debug)]
pub struct RequestMetrics {
    capacity: usize,
    samples: Mutex<VecDeque<Sample>>,
}

impl RequestMetrics {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            samples: Mutex::new(VecDeque::with_capacity(capacity.clamp(1, 4096))),
        }
    }

    pub fn record(&self, latency: Duration, success: bool) {
        let mut samples = self.samples.lock();
        if samples.len() >= self.capacity {
            samples.pop_front();
        }
        samples.push_back(Sample {
            at: Instant::now(),
            latency_ms: latency.as_secs_f64() * 1000.0,
            success,
        });
    }

    pub fn clear(&self) {
        self.samples.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }

    /// Percentiles, error rate and throughput over the current window
    pub fn snapshot(&self) -> RequestSnapshot {
        let samples = self.samples.lock();
        if samples.is_empty() {
            return RequestSnapshot::default();
        }

        let mut latencies: Vec<f64> = samples.iter().map(|s| s.latency_ms).collect();
        latencies.sort_by(|a, b| a.total_cmp(b));
        let failures = samples.iter().filter(|s| !s.success).count();

        let now = Instant::now();
        let recent = samples
            .iter()
            .filter(|s| now.duration_since(s.at) <= THROUGHPUT_WINDOW)
            .count();

        RequestSnapshot {
            response_time: ResponseTimes {
                p50: percentile(&latencies, 0.50),
                p95: percentile(&latencies, 0.95),
                p99: percentile(&latencies, 0.99),
            },
            error_rate: failures as f64 / samples.len() as f64,
            throughput: recent as f64 / THROUGHPUT_WINDOW.as_secs_f64(),
            samples: samples.len(),
        }
    }
}

/// Nearest-rank percentile of sorted values
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Reads cpu, memory and disk usage of the host
#[derive(Default)]
pub struct ResourceSampler {
    #[cfg(feature = "system-metrics")]
    system: Mutex<Option<System>>,
}

impl std::fmt::Debug for ResourceSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceSampler").finish()
    }
}

impl ResourceSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current usage as fractions of capacity
    #[cfg(feature = "system-metrics")]
    pub fn sample(&self) -> ResourceUsage {
        let mut guard = self.system.lock();
        let system = guard.get_or_insert_with(System::new_all);

        system.refresh_cpu_usage();
        let cpu = f64::from(system.global_cpu_usage()) / 100.0;

        system.refresh_memory();
        let memory = ratio(system.used_memory(), system.total_memory());

        let disks = Disks::new_with_refreshed_list();
        let (total, available) = disks.iter().fold((0u64, 0u64), |(t, a), disk| {
            (t + disk.total_space(), a + disk.available_space())
        });
        let disk_space = ratio(total.saturating_sub(available), total);

        ResourceUsage {
            cpu: cpu.clamp(0.0, 1.0),
            memory,
            disk_space,
        }
    }

    /// Always zero without the `system-metrics` feature
    #[cfg(not(feature = "system-metrics"))]
    pub fn sample(&self) -> ResourceUsage {
        ResourceUsage::default()
    }
}

#[cfg(feature = "system-metrics")]
fn ratio(used: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        used as f64 / total as f64
    }
}

/// Source of metrics snapshots for degradation evaluation
#[async_trait]
pub trait MetricsCollector: Send + Sync {
    async fn collect(&self) -> SystemMetrics;
}

/// Combines request metrics, breaker states, host resources and gauges
#[derive(Debug)]
pub struct SystemMetricsCollector {
    requests: Arc<RequestMetrics>,
    breakers: Option<Arc<CircuitBreakerManager>>,
    sampler: Option<ResourceSampler>,
    active_connections: AtomicU64,
    queue_size: AtomicU64,
    gauges: DashMap<String, f64>,
}

impl SystemMetricsCollector {
    pub fn new(requests: Arc<RequestMetrics>) -> Self {
        Self {
            requests,
            breakers: None,
            sampler: Some(ResourceSampler::new()),
            active_connections: AtomicU64::new(0),
            queue_size: AtomicU64::new(0),
            gauges: DashMap::new(),
        }
    }

    /// Include breaker states and fall back to breaker error rates
    pub fn with_breakers(mut self, breakers: Arc<CircuitBreakerManager>) -> Self {
        self.breakers = Some(breakers);
        self
    }

    /// Skip host resource sampling
    pub fn without_resources(mut self) -> Self {
        self.sampler = None;
        self
    }

    pub fn requests(&self) -> &Arc<RequestMetrics> {
        &self.requests
    }

    pub fn set_active_connections(&self, value: u64) {
        self.active_connections.store(value, Ordering::Relaxed);
    }

    pub fn set_queue_size(&self, value: u64) {
        self.queue_size.store(value, Ordering::Relaxed);
    }

    /// Set a custom metric matched by custom-metric triggers
    pub fn set_gauge(&self, name: impl Into<String>, value: f64) {
        self.gauges.insert(name.into(), value);
    }

    pub fn remove_gauge(&self, name: &str) {
        self.gauges.remove(name);
    }
}

#[async_trait]
impl MetricsCollector for SystemMetricsCollector {
    async fn collect(&self) -> SystemMetrics {
        let requests = self.requests.snapshot();

        let (circuit_breakers, breaker_error_rate) = match &self.breakers {
            Some(manager) => (manager.states(), manager.overall_error_rate()),
            None => Default::default(),
        };

        let resource_usage = match &self.sampler {
            Some(sampler) => sampler.sample(),
            None => ResourceUsage::default(),
        };

        SystemMetrics {
            timestamp: Utc::now(),
            response_time: requests.response_time,
            error_rate: if requests.samples > 0 {
                requests.error_rate
            } else {
                breaker_error_rate
            },
            throughput: requests.throughput,
            circuit_breakers,
            resource_usage,
            active_connections: self.active_connections.load(Ordering::Relaxed),
            queue_size: self.queue_size.load(Ordering::Relaxed),
            custom: self
                .gauges
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
        }
    }
}
