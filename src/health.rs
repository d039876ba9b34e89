//! Background health checking and pool health reporting

use crate::factory::HandleFactory;
use crate::pool::PoolInner;

use std::sync::Weak;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

/// Health status of a pool
///
/// # Examples
///
/// ```
/// use gatepool::HealthStatus;
///
/// let health = HealthStatus::new(3, 1, 4);
/// assert!(health.is_healthy());
/// assert_eq!(health.idle_handles, 3);
/// ```
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Current pool utilization (0.0 to 1.0)
    pub utilization: f64,

    /// Idle handles count
    pub idle_handles: usize,

    /// Handles held by callers
    pub in_use_handles: usize,

    /// Total capacity
    pub capacity: usize,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    /// Create a new health status
    pub fn new(idle: usize, in_use: usize, capacity: usize) -> Self {
        let utilization = if capacity > 0 {
            in_use as f64 / capacity as f64
        } else {
            0.0
        };

        let mut warnings = Vec::new();
        let mut is_healthy = true;

        if utilization > 0.9 {
            warnings.push(format!("High utilization: {:.1}%", utilization * 100.0));
            is_healthy = false;
        }

        if idle == 0 && capacity > 0 {
            warnings.push("No idle handles".to_string());
        }

        Self {
            is_healthy,
            warning_count: warnings.len(),
            utilization,
            idle_handles: idle,
            in_use_handles: in_use,
            capacity,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}

/// Periodic eviction loop, spawned by the pool when health checking is
/// enabled. Holds only a weak reference so a dropped pool stops its checker.
pub(crate) async fn run<F>(
    pool: Weak<PoolInner<F>>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) where
    F: HandleFactory + 'static,
{
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }
        let Some(pool) = pool.upgrade() else { break };
        if pool.is_closed() {
            break;
        }
        sweep(pool.as_ref()).await;
    }
    debug!("health checker stopped");
}

/// One sweep over the handles currently idle. Each handle is taken out under
/// its own permit, probed, and either returned or destroyed, so acquire and
/// release never wait on more than a single handle's processing. In-use
/// handles are never examined, and the sweep never creates handles.
pub(crate) async fn sweep<F: HandleFactory>(pool: &PoolInner<F>) {
    let snapshot = pool.idle.len();
    for _ in 0..snapshot {
        // taking a permit marks the handle in-flight, so a concurrent
        // acquirer that misses the queue creates instead of waiting forever
        let permit = match pool.permits.try_acquire() {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let Some(slot) = pool.idle.pop() else { break };

        if pool.factory.is_alive(&slot.handle).await {
            if let Err(slot) = pool.idle.push(slot) {
                // only reachable if more handles exist than capacity
                let id = slot.id;
                warn!(id, "idle queue full during sweep, closing handle");
                if let Err(error) = pool.destroy(slot) {
                    warn!(id, %error, "failed to close surplus handle");
                }
            }
        } else {
            let id = slot.id;
            pool.metrics.total_evicted.fetch_add(1, Ordering::Relaxed);
            match pool.destroy(slot) {
                Ok(()) => debug!(id, "evicted dead handle"),
                Err(error) => warn!(id, %error, "failed to close dead handle"),
            }
        }

        drop(permit);
        pool.idle_notify.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::pool::Pool;
    use crate::test_support::TestFactory;
    use std::sync::atomic::Ordering::SeqCst;
    use tokio::time::sleep;

    #[test]
    fn healthy_status_with_headroom() {
        let health = HealthStatus::new(2, 1, 4);
        assert!(health.is_healthy());
        assert_eq!(health.warning_count, 0);
        assert_eq!(health.utilization, 0.25);
    }

    #[test]
    fn high_utilization_flags_unhealthy() {
        let health = HealthStatus::new(0, 4, 4);
        assert!(!health.is_healthy());
        assert!(health.warnings.iter().any(|w| w.contains("High utilization")));
    }

    #[test]
    fn empty_idle_set_warns_but_stays_healthy() {
        let health = HealthStatus::new(0, 1, 4);
        assert!(health.is_healthy());
        assert_eq!(health.warning_count, 1);
    }

    #[tokio::test]
    async fn dead_idle_handle_is_evicted_and_replaced_lazily() {
        let factory = TestFactory::new();
        let config = PoolConfig::new()
            .with_capacity(3)
            .with_prewarm(1)
            .with_health_check(Duration::from_millis(20));
        let pool = Pool::new(factory.clone(), config).await.unwrap();
        assert_eq!(pool.status().live, 1);

        factory.state.alive.store(false, SeqCst);
        sleep(Duration::from_millis(200)).await;

        assert_eq!(pool.status().live, 0);
        assert_eq!(factory.state.closed.load(SeqCst), 1);
        assert_eq!(pool.metrics().total_evicted, 1);

        // replacement happens lazily on the next acquire
        factory.state.alive.store(true, SeqCst);
        let handle = pool.acquire().await.unwrap();
        assert_eq!(factory.state.created.load(SeqCst), 2);
        assert_eq!(pool.status().live, 1);
        drop(handle);
    }

    #[tokio::test]
    async fn healthy_handles_survive_sweeps() {
        let factory = TestFactory::new();
        let config = PoolConfig::new()
            .with_capacity(2)
            .with_prewarm(2)
            .with_health_check(Duration::from_millis(20));
        let pool = Pool::new(factory.clone(), config).await.unwrap();

        sleep(Duration::from_millis(150)).await;

        assert!(factory.state.probes.load(SeqCst) > 0);
        assert_eq!(pool.status().live, 2);
        assert_eq!(factory.state.closed.load(SeqCst), 0);
    }

    #[tokio::test]
    async fn in_use_handles_are_never_probed() {
        let factory = TestFactory::new();
        let config = PoolConfig::new()
            .with_capacity(1)
            .with_prewarm(1)
            .with_health_check(Duration::from_millis(20));
        let pool = Pool::new(factory.clone(), config).await.unwrap();

        let held = pool.acquire().await.unwrap();
        factory.state.alive.store(false, SeqCst);
        sleep(Duration::from_millis(150)).await;

        // the held handle was untouched even though its probe would fail
        assert_eq!(factory.state.probes.load(SeqCst), 0);
        assert_eq!(pool.status().live, 1);
        drop(held);
    }

    #[tokio::test]
    async fn close_failure_does_not_stop_the_sweep() {
        let factory = TestFactory::new();
        factory.state.fail_close.store(true, SeqCst);
        factory.state.alive.store(false, SeqCst);
        let config = PoolConfig::new()
            .with_capacity(3)
            .with_prewarm(3)
            .with_health_check(Duration::from_millis(20));
        let pool = Pool::new(factory.clone(), config).await.unwrap();

        sleep(Duration::from_millis(200)).await;

        // every dead handle was evicted despite close errors
        assert_eq!(pool.status().live, 0);
        assert_eq!(factory.state.closed.load(SeqCst), 3);
        assert_eq!(pool.metrics().close_failures, 3);
    }

    #[tokio::test]
    async fn checker_stops_after_close() {
        let factory = TestFactory::new();
        let config = PoolConfig::new()
            .with_capacity(2)
            .with_prewarm(2)
            .with_health_check(Duration::from_millis(20));
        let pool = Pool::new(factory.clone(), config).await.unwrap();

        sleep(Duration::from_millis(60)).await;
        pool.close().await.unwrap();

        let probes_at_close = factory.state.probes.load(SeqCst);
        sleep(Duration::from_millis(150)).await;
        assert_eq!(factory.state.probes.load(SeqCst), probes_at_close);
    }

    #[tokio::test]
    async fn checker_stops_when_pool_is_dropped() {
        let factory = TestFactory::new();
        let config = PoolConfig::new()
            .with_capacity(1)
            .with_prewarm(1)
            .with_health_check(Duration::from_millis(20));
        let pool = Pool::new(factory.clone(), config).await.unwrap();

        drop(pool);
        sleep(Duration::from_millis(100)).await;

        // idle handle closed by the drop-drain, no probes afterwards
        assert_eq!(factory.state.closed.load(SeqCst), 1);
        let probes = factory.state.probes.load(SeqCst);
        sleep(Duration::from_millis(100)).await;
        assert_eq!(factory.state.probes.load(SeqCst), probes);
    }
}
