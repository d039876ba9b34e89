//! Pool configuration options

use std::time::Duration;

/// Configuration for pool behavior
///
/// # Examples
///
/// ```
/// use gatepool::PoolConfig;
/// use std::time::Duration;
///
/// let config = PoolConfig::new()
///     .with_capacity(8)
///     .with_prewarm(2)
///     .with_health_check(Duration::from_secs(15))
///     .with_acquire_timeout(Duration::from_secs(5));
///
/// assert_eq!(config.capacity, 8);
/// assert!(config.health_check_enabled);
/// ```
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of simultaneously open handles
    pub capacity: usize,

    /// Number of handles created eagerly at construction (0..=capacity)
    pub prewarm: usize,

    /// Whether the background health checker runs
    pub health_check_enabled: bool,

    /// Interval between health-check sweeps
    pub health_check_interval: Duration,

    /// How long an acquire may block waiting for a handle; `None` waits
    /// indefinitely
    pub acquire_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 16,
            prewarm: 0,
            health_check_enabled: false,
            health_check_interval: Duration::from_secs(30),
            acquire_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl PoolConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of open handles
    ///
    /// # Examples
    ///
    /// ```
    /// use gatepool::PoolConfig;
    ///
    /// let config = PoolConfig::new().with_capacity(4);
    /// assert_eq!(config.capacity, 4);
    /// ```
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the number of handles created at construction
    pub fn with_prewarm(mut self, count: usize) -> Self {
        self.prewarm = count;
        self
    }

    /// Enable the background health checker with the given sweep interval
    pub fn with_health_check(mut self, interval: Duration) -> Self {
        self.health_check_enabled = true;
        self.health_check_interval = interval;
        self
    }

    /// Set the acquire timeout
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    /// Let acquire block indefinitely when the pool is saturated
    pub fn without_acquire_timeout(mut self) -> Self {
        self.acquire_timeout = None;
        self
    }

    /// Check the configuration for internal consistency
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.capacity == 0 {
            return Err("capacity must be greater than 0".to_string());
        }
        if self.prewarm > self.capacity {
            return Err(format!(
                "prewarm ({}) must not exceed capacity ({})",
                self.prewarm, self.capacity
            ));
        }
        if self.health_check_enabled && self.health_check_interval.is_zero() {
            return Err("health check interval must be greater than 0".to_string());
        }
        Ok(())
    }
}
