//! Health reporting for a pub/sub client and its durable-stream engine.
//!
//! A [`HealthReporter`] combines two read-only capabilities into a
//! [`HealthSnapshot`]:
//!
//! - a [`ConnectionStatusSource`], which alone decides UP or DOWN, and
//! - an optional [`AccountProbe`] against the durable-stream engine, whose
//!   outcome is reported in the details but never changes the status.
//!
//! ## Example
//!
//! ```rust
//! use busprobe_adapters::health::HealthReporter;
//! use busprobe_types::{keys, ConnectionState};
//!
//! # tokio_test::block_on(async {
//! let reporter = HealthReporter::builder()
//!     .host("nats://localhost:4222")
//!     .backend("NATS")
//!     .connection(ConnectionState::Closed)
//!     .build();
//!
//! let snapshot = reporter.report_health().await;
//! assert!(!snapshot.is_up());
//! assert_eq!(snapshot.text(keys::CONNECTION_STATUS), Some("CLOSED"));
//! assert_eq!(snapshot.flag(keys::JETSTREAM_ENABLED), Some(false));
//! assert!(!snapshot.contains(keys::JETSTREAM_STATUS));
//! # });
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use busprobe_types::{keys, ConnectionState, HealthSnapshot, HealthStatus};

use crate::ProbeError;

/// Token written to `jetstream_status` when the probe succeeds, unless
/// overridden in [`ReporterConfig`].
pub const DEFAULT_PROBE_OK: &str = "OK";

/// Prefix of `jetstream_status` when the probe fails.
pub const PROBE_ERROR_PREFIX: &str = "Error: ";

/// Source of the broker connection's last known state.
///
/// Implementations must not block and cannot fail.
pub trait ConnectionStatusSource: Send + Sync {
    /// The current connection state.
    fn status(&self) -> ConnectionState;
}

/// A fixed state is its own source. Useful for static wiring and tests.
impl ConnectionStatusSource for ConnectionState {
    fn status(&self) -> ConnectionState {
        *self
    }
}

impl<T: ConnectionStatusSource + ?Sized> ConnectionStatusSource for Arc<T> {
    fn status(&self) -> ConnectionState {
        (**self).status()
    }
}

/// Account usage returned by a successful [`AccountProbe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccountSummary {
    /// Memory used by streams, in bytes.
    pub memory: u64,
    /// Storage used by streams, in bytes.
    pub storage: u64,
    /// Number of streams in the account.
    pub streams: usize,
    /// Number of consumers in the account.
    pub consumers: usize,
}

/// Liveness check against the durable-stream engine.
///
/// The probe is the cancellation boundary: implementations should run their
/// I/O through [`ProbeContext::run`] so a cancelled or expired context turns
/// into a [`ProbeError`].
#[async_trait]
pub trait AccountProbe: Send + Sync {
    /// Fetch account information.
    async fn probe(&self, ctx: &ProbeContext) -> Result<AccountSummary, ProbeError>;
}

#[async_trait]
impl<T: AccountProbe + ?Sized> AccountProbe for Arc<T> {
    async fn probe(&self, ctx: &ProbeContext) -> Result<AccountSummary, ProbeError> {
        (**self).probe(ctx).await
    }
}

/// Deadline and cancellation for a single probe.
///
/// The reporter never imposes a timeout of its own. Callers that need
/// bounded latency pass a context with a deadline or a cancellation token.
#[derive(Debug, Clone, Default)]
pub struct ProbeContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl ProbeContext {
    /// A context with no deadline that is never cancelled.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().deadline(Instant::now() + timeout)
    }

    /// Set an absolute deadline.
    pub fn deadline(mut self, at: Instant) -> Self {
        self.deadline = Some(at);
        self
    }

    /// Tie this context to a cancellation token.
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The deadline, if any.
    pub fn expires_at(&self) -> Option<Instant> {
        self.deadline
    }

    /// Check whether the context was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drive `fut` until it completes, the context is cancelled, or the
    /// deadline passes, whichever happens first.
    ///
    /// Cancellation and expiry take precedence over a result that becomes
    /// ready at the same time.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, ProbeError>
    where
        F: Future<Output = Result<T, ProbeError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(ProbeError::Cancelled);
        }

        let expired = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ProbeError::Cancelled),
            _ = expired => Err(ProbeError::DeadlineExceeded),
            result = fut => result,
        }
    }
}

/// Values copied verbatim into every snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReporterConfig {
    /// Configured server address, reported as `host`.
    pub host: String,
    /// Backend identifier, reported as `backend`.
    pub backend: String,
    /// Token reported as `jetstream_status` when the probe succeeds.
    pub probe_ok: String,
}

impl ReporterConfig {
    /// Create a config with the default OK token.
    pub fn new(host: impl Into<String>, backend: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            backend: backend.into(),
            probe_ok: DEFAULT_PROBE_OK.to_string(),
        }
    }
}

/// Produces [`HealthSnapshot`]s from a connection source and an optional
/// account probe.
///
/// The reporter owns no mutable state, so it can be shared behind an `Arc`
/// and polled from any number of tasks at once.
#[derive(Clone)]
pub struct HealthReporter {
    config: ReporterConfig,
    connection: Option<Arc<dyn ConnectionStatusSource>>,
    account_probe: Option<Arc<dyn AccountProbe>>,
}

impl HealthReporter {
    /// Create a new builder for configuring the reporter.
    pub fn builder() -> HealthReporterBuilder {
        HealthReporterBuilder::default()
    }

    /// The values copied into every snapshot.
    pub fn config(&self) -> &ReporterConfig {
        &self.config
    }

    /// Check whether a durable-stream engine probe is configured.
    pub fn has_account_probe(&self) -> bool {
        self.account_probe.is_some()
    }

    /// Report health, probing without a deadline.
    pub async fn report_health(&self) -> HealthSnapshot {
        self.report_health_with(&ProbeContext::background()).await
    }

    /// Report health, passing `ctx` to the account probe.
    ///
    /// Never fails: a probe error becomes the `jetstream_status` detail and
    /// leaves the status alone.
    pub async fn report_health_with(&self, ctx: &ProbeContext) -> HealthSnapshot {
        let state = self
            .connection
            .as_ref()
            .map(|source| source.status())
            .unwrap_or_default();

        let status = if state.is_connected() {
            HealthStatus::Up
        } else {
            HealthStatus::Down
        };

        let mut snapshot = HealthSnapshot::builder()
            .status(status)
            .detail(keys::HOST, self.config.host.as_str())
            .detail(keys::BACKEND, self.config.backend.as_str())
            .detail(keys::CONNECTION_STATUS, state.as_str())
            .detail(keys::JETSTREAM_ENABLED, self.account_probe.is_some());

        if let Some(probe) = &self.account_probe {
            let outcome = match probe.probe(ctx).await {
                Ok(_) => self.config.probe_ok.clone(),
                Err(err) => {
                    debug!(backend = %self.config.backend, error = %err, "account probe failed");
                    format!("{}{}", PROBE_ERROR_PREFIX, err)
                }
            };
            snapshot = snapshot.detail(keys::JETSTREAM_STATUS, outcome);
        }

        snapshot.build()
    }
}

impl fmt::Debug for HealthReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthReporter")
            .field("config", &self.config)
            .field("has_connection", &self.connection.is_some())
            .field("has_account_probe", &self.account_probe.is_some())
            .finish()
    }
}

/// Builder for HealthReporter.
#[derive(Default)]
pub struct HealthReporterBuilder {
    host: String,
    backend: String,
    probe_ok: Option<String>,
    connection: Option<Arc<dyn ConnectionStatusSource>>,
    account_probe: Option<Arc<dyn AccountProbe>>,
}

impl HealthReporterBuilder {
    /// Set the configured server address reported as `host`.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the backend identifier reported as `backend`.
    pub fn backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    /// Override the token reported when the probe succeeds (default: "OK").
    pub fn probe_ok(mut self, token: impl Into<String>) -> Self {
        self.probe_ok = Some(token.into());
        self
    }

    /// Take host, backend and OK token from an existing config.
    pub fn config(mut self, config: ReporterConfig) -> Self {
        self.host = config.host;
        self.backend = config.backend;
        self.probe_ok = Some(config.probe_ok);
        self
    }

    /// Set the connection status source.
    ///
    /// Without one the reporter treats the connection as down.
    pub fn connection(mut self, source: impl ConnectionStatusSource + 'static) -> Self {
        self.connection = Some(Arc::new(source));
        self
    }

    /// Set the durable-stream engine probe.
    pub fn account_probe(mut self, probe: impl AccountProbe + 'static) -> Self {
        self.account_probe = Some(Arc::new(probe));
        self
    }

    /// Build the reporter.
    pub fn build(self) -> HealthReporter {
        HealthReporter {
            config: ReporterConfig {
                host: self.host,
                backend: self.backend,
                probe_ok: self
                    .probe_ok
                    .unwrap_or_else(|| DEFAULT_PROBE_OK.to_string()),
            },
            connection: self.connection,
            account_probe: self.account_probe,
        }
    }
}

impl fmt::Debug for HealthReporterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthReporterBuilder")
            .field("host", &self.host)
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use busprobe_types::DetailValue;
    use parking_lot::RwLock;

    use super::*;

    const NATS_SERVER: &str = "nats://localhost:4222";

    /// Connection source whose state can change between reports.
    #[derive(Default)]
    struct SwitchableConnection {
        state: RwLock<ConnectionState>,
    }

    impl SwitchableConnection {
        fn set(&self, state: ConnectionState) {
            *self.state.write() = state;
        }
    }

    impl ConnectionStatusSource for SwitchableConnection {
        fn status(&self) -> ConnectionState {
            *self.state.read()
        }
    }

    /// Probe that returns a canned result and counts invocations.
    #[derive(Default)]
    struct StubProbe {
        error: Option<ProbeError>,
        calls: AtomicUsize,
    }

    impl StubProbe {
        fn failing(error: ProbeError) -> Self {
            Self {
                error: Some(error),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AccountProbe for StubProbe {
        async fn probe(&self, ctx: &ProbeContext) -> Result<AccountSummary, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = self.error.clone().map_or(Ok(AccountSummary::default()), Err);
            ctx.run(async move { result }).await
        }
    }

    /// Probe that never answers on its own.
    struct HangingProbe;

    #[async_trait]
    impl AccountProbe for HangingProbe {
        async fn probe(&self, ctx: &ProbeContext) -> Result<AccountSummary, ProbeError> {
            ctx.run(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(AccountSummary::default())
            })
            .await
        }
    }

    fn reporter(state: ConnectionState) -> HealthReporterBuilder {
        HealthReporter::builder()
            .host(NATS_SERVER)
            .backend("NATS")
            .connection(state)
    }

    #[tokio::test]
    async fn test_down_for_every_state_but_connected() {
        for state in ConnectionState::ALL {
            let with_probe = reporter(state).account_probe(StubProbe::default()).build();
            let failing_probe = reporter(state)
                .account_probe(StubProbe::failing(ProbeError::ConnectionClosed))
                .build();
            let without_probe = reporter(state).build();

            for r in [with_probe, failing_probe, without_probe] {
                let snapshot = r.report_health().await;
                let expected = if state == ConnectionState::Connected {
                    HealthStatus::Up
                } else {
                    HealthStatus::Down
                };
                assert_eq!(snapshot.status, expected, "state {}", state);
                assert_eq!(snapshot.text(keys::CONNECTION_STATUS), Some(state.as_str()));
            }
        }
    }

    #[tokio::test]
    async fn test_connected_without_probe() {
        let snapshot = reporter(ConnectionState::Connected).build().report_health().await;

        assert_eq!(snapshot.status, HealthStatus::Up);
        assert_eq!(snapshot.flag(keys::JETSTREAM_ENABLED), Some(false));
        assert!(!snapshot.contains(keys::JETSTREAM_STATUS));
    }

    #[tokio::test]
    async fn test_connected_with_healthy_probe() {
        let snapshot = reporter(ConnectionState::Connected)
            .account_probe(StubProbe::default())
            .build()
            .report_health()
            .await;

        assert_eq!(snapshot.status, HealthStatus::Up);
        assert_eq!(snapshot.text(keys::HOST), Some(NATS_SERVER));
        assert_eq!(snapshot.text(keys::BACKEND), Some("NATS"));
        assert_eq!(snapshot.text(keys::CONNECTION_STATUS), Some("CONNECTED"));
        assert_eq!(snapshot.flag(keys::JETSTREAM_ENABLED), Some(true));
        assert_eq!(snapshot.text(keys::JETSTREAM_STATUS), Some("OK"));
    }

    #[tokio::test]
    async fn test_probe_failure_does_not_downgrade() {
        let snapshot = reporter(ConnectionState::Connected)
            .account_probe(StubProbe::failing(ProbeError::Backend(
                "nats: authorization violation".into(),
            )))
            .build()
            .report_health()
            .await;

        assert_eq!(snapshot.status, HealthStatus::Up);
        assert_eq!(snapshot.flag(keys::JETSTREAM_ENABLED), Some(true));
        assert_eq!(
            snapshot.text(keys::JETSTREAM_STATUS),
            Some("Error: nats: authorization violation")
        );
    }

    #[tokio::test]
    async fn test_connected_with_closed_probe_connection() {
        let snapshot = reporter(ConnectionState::Connected)
            .account_probe(StubProbe::failing(ProbeError::ConnectionClosed))
            .build()
            .report_health()
            .await;

        let expected = HealthSnapshot::builder()
            .status(HealthStatus::Up)
            .detail(keys::HOST, NATS_SERVER)
            .detail(keys::BACKEND, "NATS")
            .detail(keys::CONNECTION_STATUS, "CONNECTED")
            .detail(keys::JETSTREAM_ENABLED, true)
            .detail(keys::JETSTREAM_STATUS, "Error: connection closed")
            .build();

        assert_eq!(snapshot, expected);
    }

    #[tokio::test]
    async fn test_closed_without_probe() {
        let snapshot = reporter(ConnectionState::Closed).build().report_health().await;

        let expected = HealthSnapshot::builder()
            .status(HealthStatus::Down)
            .detail(keys::HOST, NATS_SERVER)
            .detail(keys::BACKEND, "NATS")
            .detail(keys::CONNECTION_STATUS, "CLOSED")
            .detail(keys::JETSTREAM_ENABLED, false)
            .build();

        assert_eq!(snapshot, expected);
    }

    #[tokio::test]
    async fn test_missing_connection_source_is_down() {
        let snapshot = HealthReporter::builder()
            .host(NATS_SERVER)
            .backend("NATS")
            .account_probe(StubProbe::default())
            .build()
            .report_health()
            .await;

        assert_eq!(snapshot.status, HealthStatus::Down);
        assert_eq!(snapshot.text(keys::CONNECTION_STATUS), Some("DISCONNECTED"));
        assert_eq!(snapshot.text(keys::JETSTREAM_STATUS), Some("OK"));
    }

    #[tokio::test]
    async fn test_probe_invoked_even_when_disconnected() {
        let probe = Arc::new(StubProbe::default());
        let reporter = reporter(ConnectionState::Disconnected)
            .account_probe(probe.clone())
            .build();

        let snapshot = reporter.report_health().await;

        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
        assert_eq!(snapshot.status, HealthStatus::Down);
        assert_eq!(snapshot.text(keys::JETSTREAM_STATUS), Some("OK"));
    }

    #[tokio::test]
    async fn test_host_and_backend_are_verbatim() {
        let connection = Arc::new(SwitchableConnection::default());
        let reporter = HealthReporter::builder()
            .host("nats://user@broker-1:4222,nats://broker-2:4222")
            .backend("NATS")
            .connection(connection.clone())
            .account_probe(StubProbe::failing(ProbeError::NotEnabled))
            .build();

        for state in [ConnectionState::Connected, ConnectionState::Reconnecting] {
            connection.set(state);
            let snapshot = reporter.report_health().await;
            assert_eq!(
                snapshot.get(keys::HOST),
                Some(&DetailValue::from(
                    "nats://user@broker-1:4222,nats://broker-2:4222"
                ))
            );
            assert_eq!(snapshot.get(keys::BACKEND), Some(&DetailValue::from("NATS")));
        }
    }

    #[tokio::test]
    async fn test_reports_follow_state_changes() {
        let connection = Arc::new(SwitchableConnection::default());
        let reporter = reporter(ConnectionState::Connected)
            .connection(connection.clone())
            .build();

        assert!(!reporter.report_health().await.is_up());

        connection.set(ConnectionState::Connected);
        assert!(reporter.report_health().await.is_up());

        connection.set(ConnectionState::Reconnecting);
        let snapshot = reporter.report_health().await;
        assert!(!snapshot.is_up());
        assert_eq!(snapshot.text(keys::CONNECTION_STATUS), Some("RECONNECTING"));
    }

    #[tokio::test]
    async fn test_repeated_reports_are_equal() {
        let reporter = reporter(ConnectionState::Connected)
            .account_probe(StubProbe::failing(ProbeError::ConnectionClosed))
            .build();

        let first = reporter.report_health().await;
        let second = reporter.report_health().await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_custom_ok_token() {
        let snapshot = reporter(ConnectionState::Connected)
            .probe_ok("HEALTHY")
            .account_probe(StubProbe::default())
            .build()
            .report_health()
            .await;

        assert_eq!(snapshot.text(keys::JETSTREAM_STATUS), Some("HEALTHY"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_surfaces_as_probe_error() {
        let reporter = reporter(ConnectionState::Connected)
            .account_probe(HangingProbe)
            .build();

        let ctx = ProbeContext::with_timeout(Duration::from_secs(5));
        let snapshot = reporter.report_health_with(&ctx).await;

        assert_eq!(snapshot.status, HealthStatus::Up);
        assert_eq!(
            snapshot.text(keys::JETSTREAM_STATUS),
            Some("Error: probe deadline exceeded")
        );
    }

    #[tokio::test]
    async fn test_cancellation_surfaces_as_probe_error() {
        let token = CancellationToken::new();
        let ctx = ProbeContext::background().cancel_on(token.clone());
        let reporter = reporter(ConnectionState::Closed)
            .account_probe(HangingProbe)
            .build();

        let handle = tokio::spawn(async move { reporter.report_health_with(&ctx).await });
        token.cancel();
        let snapshot = handle.await.unwrap();

        assert_eq!(snapshot.status, HealthStatus::Down);
        assert_eq!(
            snapshot.text(keys::JETSTREAM_STATUS),
            Some("Error: probe cancelled")
        );
    }

    #[tokio::test]
    async fn test_pre_cancelled_context_wins_over_ready_result() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = ProbeContext::background().cancel_on(token);

        let result = ctx.run(async { Ok::<_, ProbeError>(1) }).await;
        assert_eq!(result, Err(ProbeError::Cancelled));
    }

    #[tokio::test]
    async fn test_background_context_passes_result_through() {
        let ctx = ProbeContext::background();
        assert!(ctx.expires_at().is_none());
        assert!(!ctx.is_cancelled());

        let result = ctx.run(async { Ok::<_, ProbeError>(7) }).await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reports() {
        let probe = Arc::new(StubProbe::default());
        let reporter = Arc::new(
            reporter(ConnectionState::Connected)
                .account_probe(probe.clone())
                .build(),
        );

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let reporter = reporter.clone();
                tokio::spawn(async move { reporter.report_health().await })
            })
            .collect();

        for handle in handles {
            let snapshot = handle.await.unwrap();
            assert!(snapshot.is_up());
            assert_eq!(snapshot.text(keys::JETSTREAM_STATUS), Some("OK"));
        }
        assert_eq!(probe.calls.load(Ordering::SeqCst), 32);
    }

    #[test]
    fn test_builder_defaults() {
        let reporter = HealthReporter::builder().build();
        assert_eq!(reporter.config().probe_ok, DEFAULT_PROBE_OK);
        assert!(!reporter.has_account_probe());
    }

    #[test]
    fn test_builder_from_config() {
        let mut config = ReporterConfig::new(NATS_SERVER, "NATS");
        config.probe_ok = "ready".into();
        let reporter = HealthReporter::builder().config(config.clone()).build();
        assert_eq!(reporter.config(), &config);
    }
}
