//! # gatepool
//!
//! Bounded, health-checked pool of reusable network client handles.
//!
//! Connecting to a remote service is expensive: transport security,
//! identity, handshake. `gatepool` amortizes that cost by handing out live
//! handles from a capacity-bounded pool, growing lazily on demand and
//! evicting handles whose liveness probe fails so callers never see a dead
//! connection.
//!
//! ## Features
//!
//! - Bounded acquire with a genuine blocking wait (no spinning, no
//!   busy-polling) and optional timeout
//! - Automatic return of handles via RAII (Drop trait)
//! - Lazy growth with serialized creation, so racing callers never overrun
//!   capacity
//! - Background health checker that probes idle handles only and evicts
//!   dead ones
//! - Exactly-once close for every handle the pool ever created
//! - Pool status, health reports, and Prometheus-format metrics
//!
//! ## Quick Start
//!
//! ```rust
//! use async_trait::async_trait;
//! use gatepool::{HandleFactory, Pool, PoolConfig};
//!
//! struct SessionFactory;
//!
//! #[async_trait]
//! impl HandleFactory for SessionFactory {
//!     type Handle = String;
//!     type Error = std::io::Error;
//!
//!     async fn create(&self) -> Result<String, std::io::Error> {
//!         Ok("session".to_string())
//!     }
//!
//!     async fn is_alive(&self, _handle: &String) -> bool {
//!         true
//!     }
//!
//!     fn close(&self, _handle: String) -> Result<(), std::io::Error> {
//!         Ok(())
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = Pool::new(SessionFactory, PoolConfig::new().with_capacity(4)).await?;
//!
//! {
//!     let handle = pool.acquire().await?;
//!     assert_eq!(&*handle, "session");
//!     // handle returns to the pool when it goes out of scope
//! }
//!
//! pool.close().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod errors;
mod factory;
mod health;
mod metrics;
mod pool;

#[cfg(test)]
mod test_support;

pub use config::PoolConfig;
pub use errors::{PoolError, PoolResult};
pub use factory::HandleFactory;
pub use health::HealthStatus;
pub use metrics::{MetricsExporter, PoolMetrics};
pub use pool::{Pool, PoolStatus, PooledHandle};
