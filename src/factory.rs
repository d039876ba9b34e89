//! Factory seam between the pool and the remote service client

use async_trait::async_trait;

/// Creates, probes, and closes the handles managed by a
/// [`Pool`](crate::Pool).
///
/// The pool treats handles as opaque: it never inspects them beyond the
/// liveness probe and never calls `close` more than once per handle. All
/// connection mechanics (transport security, identity, handshake) live
/// behind `create`.
///
/// A factory is passed to [`Pool::new`](crate::Pool::new) as an explicit
/// constructor parameter, so independent pools with independent factories
/// can coexist in one process.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use gatepool::HandleFactory;
///
/// struct SessionFactory;
///
/// #[async_trait]
/// impl HandleFactory for SessionFactory {
///     type Handle = String;
///     type Error = std::io::Error;
///
///     async fn create(&self) -> Result<String, std::io::Error> {
///         Ok("session".to_string())
///     }
///
///     async fn is_alive(&self, _handle: &String) -> bool {
///         true
///     }
///
///     fn close(&self, _handle: String) -> Result<(), std::io::Error> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait HandleFactory: Send + Sync {
    /// One live client connection to the remote service.
    type Handle: Send + 'static;

    /// Error produced by `create` and `close`.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Establish one new connection.
    ///
    /// Called only by the pool, one call at a time: the pool serializes
    /// creation, so implementations need to be safe for repeated sequential
    /// calls but never reentrant with themselves.
    async fn create(&self) -> Result<Self::Handle, Self::Error>;

    /// Probe an idle handle for liveness.
    ///
    /// Called periodically by the health checker. Must be side-effect safe
    /// and must not change the identity of the handle.
    async fn is_alive(&self, handle: &Self::Handle) -> bool;

    /// Tear down a connection.
    ///
    /// The pool guarantees exactly one `close` call per handle it ever
    /// created, whether the handle died to a failed probe, a release into a
    /// closed pool, or the final drain.
    fn close(&self, handle: Self::Handle) -> Result<(), Self::Error>;
}
