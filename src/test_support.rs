//! Shared test doubles for pool and health-checker tests

use crate::factory::HandleFactory;

use async_trait::async_trait;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Connection stand-in carrying the serial number the factory assigned it.
#[derive(Debug)]
pub(crate) struct TestConn {
    pub serial: usize,
}

pub(crate) struct TestState {
    pub created: AtomicUsize,
    pub closed: AtomicUsize,
    pub probes: AtomicUsize,
    pub live_now: AtomicUsize,
    pub max_live: AtomicUsize,
    /// Probe result for every handle
    pub alive: AtomicBool,
    /// Make `close` return an error
    pub fail_close: AtomicBool,
    /// Creation fails once `created` reaches this count
    pub fail_after: AtomicUsize,
    /// Milliseconds each `create` call sleeps before returning
    pub create_delay_ms: AtomicU64,
}

/// Instrumented factory; clones share one [`TestState`] so tests can keep
/// counting after handing the factory to the pool.
#[derive(Clone)]
pub(crate) struct TestFactory {
    pub state: Arc<TestState>,
}

impl TestFactory {
    pub fn new() -> Self {
        Self {
            state: Arc::new(TestState {
                created: AtomicUsize::new(0),
                closed: AtomicUsize::new(0),
                probes: AtomicUsize::new(0),
                live_now: AtomicUsize::new(0),
                max_live: AtomicUsize::new(0),
                alive: AtomicBool::new(true),
                fail_close: AtomicBool::new(false),
                fail_after: AtomicUsize::new(usize::MAX),
                create_delay_ms: AtomicU64::new(0),
            }),
        }
    }
}

#[async_trait]
impl HandleFactory for TestFactory {
    type Handle = TestConn;
    type Error = io::Error;

    async fn create(&self) -> Result<TestConn, io::Error> {
        let delay = self.state.create_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let created = self.state.created.load(Ordering::SeqCst);
        if created >= self.state.fail_after.load(Ordering::SeqCst) {
            return Err(io::Error::other("injected create failure"));
        }
        let serial = self.state.created.fetch_add(1, Ordering::SeqCst);
        let live = self.state.live_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_live.fetch_max(live, Ordering::SeqCst);
        Ok(TestConn { serial })
    }

    async fn is_alive(&self, _handle: &TestConn) -> bool {
        self.state.probes.fetch_add(1, Ordering::SeqCst);
        self.state.alive.load(Ordering::SeqCst)
    }

    fn close(&self, _handle: TestConn) -> Result<(), io::Error> {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        self.state.live_now.fetch_sub(1, Ordering::SeqCst);
        if self.state.fail_close.load(Ordering::SeqCst) {
            return Err(io::Error::other("injected close failure"));
        }
        Ok(())
    }
}
