//! Core pool implementation: bounded acquire/release with lazy growth

use crate::config::PoolConfig;
use crate::errors::{PoolError, PoolResult};
use crate::factory::HandleFactory;
use crate::health::{self, HealthStatus};
use crate::metrics::{MetricsExporter, MetricsTracker, PoolMetrics};

use crossbeam::queue::ArrayQueue;
use dashmap::DashMap;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify, Semaphore, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// One pooled handle plus its pool-assigned id.
pub(crate) struct HandleSlot<H> {
    pub(crate) handle: H,
    pub(crate) id: usize,
}

/// A handle checked out from a [`Pool`], returned automatically on drop.
///
/// Dereferences to the factory's handle type. Because this guard is the only
/// way a handle leaves the pool, double-release and releasing a foreign
/// handle are impossible by construction.
#[must_use]
pub struct PooledHandle<F: HandleFactory> {
    slot: Option<HandleSlot<F::Handle>>,
    pool: Arc<PoolInner<F>>,
}

impl<F: HandleFactory> Deref for PooledHandle<F> {
    type Target = F::Handle;

    fn deref(&self) -> &Self::Target {
        &self.slot.as_ref().expect("handle already returned").handle
    }
}

impl<F: HandleFactory> DerefMut for PooledHandle<F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.slot.as_mut().expect("handle already returned").handle
    }
}

impl<F: HandleFactory> Drop for PooledHandle<F> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            self.pool.return_handle(slot);
        }
    }
}

impl<F> fmt::Debug for PooledHandle<F>
where
    F: HandleFactory,
    F::Handle: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledHandle")
            .field("handle", &self.slot.as_ref().map(|s| &s.handle))
            .finish()
    }
}

/// Counters and sizes describing the pool at one instant
#[derive(Debug, Clone, Copy)]
pub struct PoolStatus {
    /// Maximum simultaneously open handles
    pub capacity: usize,

    /// Open handles, idle plus in use
    pub live: usize,

    /// Handles sitting in the idle queue
    pub idle: usize,

    /// Handles currently held by callers
    pub in_use: usize,

    /// Whether the pool has been closed
    pub closed: bool,
}

pub(crate) struct PoolInner<F: HandleFactory> {
    pub(crate) factory: F,
    pub(crate) config: PoolConfig,
    pub(crate) idle: ArrayQueue<HandleSlot<F::Handle>>,
    pub(crate) permits: Semaphore,
    pub(crate) idle_notify: Notify,
    pub(crate) live: AtomicUsize,
    pub(crate) metrics: MetricsTracker,
    // serializes factory calls so racing growth attempts cannot overrun
    // capacity
    create_lock: Mutex<()>,
    in_use: DashMap<usize, ()>,
    next_id: AtomicUsize,
    closed: AtomicBool,
    shutdown: watch::Sender<bool>,
    checker: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl<F: HandleFactory> PoolInner<F> {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close one handle and drop it from the live count. The single owner of
    /// a slot calls this at most once, which makes close exactly-once.
    pub(crate) fn destroy(&self, slot: HandleSlot<F::Handle>) -> Result<(), F::Error> {
        self.live.fetch_sub(1, Ordering::SeqCst);
        self.metrics.total_closed.fetch_add(1, Ordering::Relaxed);
        let result = self.factory.close(slot.handle);
        if result.is_err() {
            self.metrics.close_failures.fetch_add(1, Ordering::Relaxed);
        }
        // a destroyed handle opens creation headroom
        self.idle_notify.notify_one();
        result
    }

    fn return_handle(&self, slot: HandleSlot<F::Handle>) {
        let id = slot.id;
        self.in_use.remove(&id);
        self.metrics.total_released.fetch_add(1, Ordering::Relaxed);

        if self.is_closed() {
            debug!(id, "pool closed, closing returned handle");
            if let Err(error) = self.destroy(slot) {
                warn!(id, %error, "failed to close handle returned after shutdown");
            }
            return;
        }

        match self.idle.push(slot) {
            Ok(()) => {
                self.permits.add_permits(1);
                self.idle_notify.notify_one();
                // close() may have drained between the closed-check above and
                // the push; finish its drain so the slot cannot sit unclosed
                // in a closed pool
                if self.is_closed() {
                    while let Some(slot) = self.idle.pop() {
                        let id = slot.id;
                        if let Err(error) = self.destroy(slot) {
                            warn!(id, %error, "failed to close handle returned after shutdown");
                        }
                    }
                }
            }
            Err(slot) => {
                // the queue is capacity-sized, so a full queue means more
                // handles exist than the pool ever created
                warn!(id, "idle queue full on release, closing handle");
                if let Err(error) = self.destroy(slot) {
                    warn!(id, %error, "failed to close surplus handle");
                }
            }
        }
    }
}

impl<F: HandleFactory> Drop for PoolInner<F> {
    fn drop(&mut self) {
        // last-resort drain so handles never outlive the pool unclosed
        while let Some(slot) = self.idle.pop() {
            if let Err(error) = self.factory.close(slot.handle) {
                warn!(%error, "failed to close handle while dropping pool");
            }
        }
    }
}

/// Bounded pool of reusable client handles.
///
/// Cheap to clone; clones share the same underlying pool. Handles are
/// created by the [`HandleFactory`] given at construction, handed out
/// through [`acquire`](Pool::acquire), and returned when the
/// [`PooledHandle`] guard drops. A background health checker (when
/// enabled) evicts idle handles whose liveness probe fails; replacements
/// are created lazily by later acquires.
pub struct Pool<F: HandleFactory> {
    inner: Arc<PoolInner<F>>,
}

impl<F: HandleFactory> Clone for Pool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: HandleFactory + 'static> fmt::Debug for Pool<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.status();
        f.debug_struct("Pool")
            .field("capacity", &status.capacity)
            .field("live", &status.live)
            .field("idle", &status.idle)
            .field("closed", &status.closed)
            .finish()
    }
}

impl<F: HandleFactory + 'static> Pool<F> {
    /// Create a new pool, eagerly creating `prewarm` handles.
    ///
    /// Fails if the configuration is invalid or any prewarm creation fails;
    /// in the latter case every handle created so far is closed before the
    /// error is returned.
    pub async fn new(factory: F, config: PoolConfig) -> PoolResult<Self, F::Error> {
        config.validate().map_err(PoolError::Config)?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let inner = Arc::new(PoolInner {
            idle: ArrayQueue::new(config.capacity),
            permits: Semaphore::new(config.capacity),
            idle_notify: Notify::new(),
            live: AtomicUsize::new(0),
            metrics: MetricsTracker::new(),
            create_lock: Mutex::new(()),
            in_use: DashMap::new(),
            next_id: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            shutdown,
            checker: parking_lot::Mutex::new(None),
            factory,
            config,
        });

        for _ in 0..inner.config.prewarm {
            match inner.factory.create().await {
                Ok(handle) => {
                    let id = inner.next_id.fetch_add(1, Ordering::Relaxed);
                    inner.live.fetch_add(1, Ordering::SeqCst);
                    inner.metrics.total_created.fetch_add(1, Ordering::Relaxed);
                    let _ = inner.idle.push(HandleSlot { handle, id });
                }
                Err(error) => {
                    while let Some(slot) = inner.idle.pop() {
                        inner.live.fetch_sub(1, Ordering::SeqCst);
                        if let Err(close_error) = inner.factory.close(slot.handle) {
                            warn!(%close_error, "failed to close handle while aborting construction");
                        }
                    }
                    return Err(PoolError::Create(error));
                }
            }
        }

        if inner.config.health_check_enabled {
            let task = tokio::spawn(health::run(
                Arc::downgrade(&inner),
                inner.config.health_check_interval,
                shutdown_rx,
            ));
            *inner.checker.lock() = Some(task);
        }

        Ok(Self { inner })
    }

    /// Acquire a handle, waiting up to the configured acquire timeout when
    /// the pool is saturated.
    ///
    /// Returns an idle handle when one exists, otherwise creates a new one
    /// while the pool is under capacity. At capacity the caller sleeps until
    /// a release or eviction frees a slot; it never spins. Dropping the
    /// returned future while waiting leaks nothing.
    pub async fn acquire(&self) -> PoolResult<PooledHandle<F>, F::Error> {
        self.acquire_with_timeout(self.inner.config.acquire_timeout)
            .await
    }

    /// Acquire a handle with an explicit timeout, overriding the configured
    /// one. `None` waits indefinitely.
    pub async fn acquire_with_timeout(
        &self,
        timeout: Option<Duration>,
    ) -> PoolResult<PooledHandle<F>, F::Error> {
        match timeout {
            None => self.acquire_inner().await,
            Some(limit) => match tokio::time::timeout(limit, self.acquire_inner()).await {
                Ok(result) => result,
                Err(_) => {
                    self.inner
                        .metrics
                        .acquire_timeouts
                        .fetch_add(1, Ordering::Relaxed);
                    Err(PoolError::Timeout(limit))
                }
            },
        }
    }

    async fn acquire_inner(&self) -> PoolResult<PooledHandle<F>, F::Error> {
        let inner = &self.inner;

        if inner.is_closed() {
            return Err(PoolError::Closed);
        }

        // Each open handle holds one forgotten permit, so getting a permit
        // means an idle handle exists or the pool is under capacity. Close
        // shuts the semaphore, which wakes every blocked waiter here.
        let permit = inner
            .permits
            .acquire()
            .await
            .map_err(|_| PoolError::Closed)?;

        if let Some(slot) = inner.idle.pop() {
            permit.forget();
            return Ok(self.checkout(slot));
        }

        // Sole-creator section. Losers block on the mutex; winners may still
        // find the queue refilled by a release and skip the factory call.
        let _creating = inner.create_lock.lock().await;
        loop {
            if inner.is_closed() {
                return Err(PoolError::Closed);
            }
            if let Some(slot) = inner.idle.pop() {
                permit.forget();
                return Ok(self.checkout(slot));
            }
            if inner.live.load(Ordering::SeqCst) < inner.config.capacity {
                break;
            }
            // all handles are momentarily out with the health checker;
            // sleep until one returns or dies
            inner.idle_notify.notified().await;
        }

        match inner.factory.create().await {
            Ok(handle) => {
                if inner.is_closed() {
                    // the pool closed mid-creation; the fresh handle must not
                    // outlive it. It never entered the live count, so it is
                    // closed here rather than through destroy.
                    inner.metrics.total_closed.fetch_add(1, Ordering::Relaxed);
                    if let Err(error) = inner.factory.close(handle) {
                        inner
                            .metrics
                            .close_failures
                            .fetch_add(1, Ordering::Relaxed);
                        warn!(%error, "failed to close handle created during shutdown");
                    }
                    return Err(PoolError::Closed);
                }
                let id = inner.next_id.fetch_add(1, Ordering::Relaxed);
                inner.live.fetch_add(1, Ordering::SeqCst);
                inner.metrics.total_created.fetch_add(1, Ordering::Relaxed);
                debug!(id, "created handle via lazy growth");
                permit.forget();
                Ok(self.checkout(HandleSlot { handle, id }))
            }
            Err(error) => {
                // the permit returns on drop, so other callers are unaffected
                inner
                    .metrics
                    .create_failures
                    .fetch_add(1, Ordering::Relaxed);
                Err(PoolError::Create(error))
            }
        }
    }

    fn checkout(&self, slot: HandleSlot<F::Handle>) -> PooledHandle<F> {
        self.inner.in_use.insert(slot.id, ());
        self.inner
            .metrics
            .total_acquired
            .fetch_add(1, Ordering::Relaxed);
        PooledHandle {
            slot: Some(slot),
            pool: Arc::clone(&self.inner),
        }
    }

    /// Close the pool: stop the health checker, wake blocked acquirers with
    /// [`PoolError::Closed`], and close every idle handle.
    ///
    /// Idempotent and safe to call concurrently with acquire/release. The
    /// drain is best-effort: handles currently held by callers are closed
    /// when their guards drop, not awaited here. Returns the first close
    /// error encountered while still closing the rest.
    pub async fn close(&self) -> PoolResult<(), F::Error> {
        let inner = &self.inner;
        if inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        inner.permits.close();
        let _ = inner.shutdown.send(true);
        let checker = inner.checker.lock().take();
        if let Some(task) = checker {
            let _ = task.await;
        }
        // wake anyone sleeping in the creation section
        inner.idle_notify.notify_waiters();

        let mut first_error = None;
        while let Some(slot) = inner.idle.pop() {
            let id = slot.id;
            if let Err(error) = inner.destroy(slot) {
                warn!(id, %error, "failed to close handle during drain");
                first_error.get_or_insert(error);
            }
        }
        debug!("pool closed");

        match first_error {
            None => Ok(()),
            Some(error) => Err(PoolError::Close(error)),
        }
    }

    /// Whether [`close`](Pool::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Maximum number of simultaneously open handles.
    pub fn capacity(&self) -> usize {
        self.inner.config.capacity
    }

    /// Current counts and sizes.
    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            capacity: self.inner.config.capacity,
            live: self.inner.live.load(Ordering::SeqCst),
            idle: self.inner.idle.len(),
            in_use: self.inner.in_use.len(),
            closed: self.inner.is_closed(),
        }
    }

    /// Utilization and warning report.
    pub fn health_status(&self) -> HealthStatus {
        let status = self.status();
        HealthStatus::new(status.idle, status.in_use, status.capacity)
    }

    /// Metrics snapshot.
    pub fn metrics(&self) -> PoolMetrics {
        let status = self.status();
        self.inner
            .metrics
            .snapshot(status.live, status.idle, status.in_use, status.capacity)
    }

    /// Export metrics as a string map.
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.metrics().export()
    }

    /// Export metrics in Prometheus exposition format.
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        MetricsExporter::export_prometheus(&self.metrics(), pool_name, tags)
    }
}
