//! NATS adapter: connection health, JetStream probe, and stream management.
//!
//! The adapter connects to NATS, optionally sets up a JetStream context, and
//! exposes both through the crate's capability traits:
//!
//! - `async_nats::Client` is a [`ConnectionStatusSource`]
//! - `jetstream::Context` is an [`AccountProbe`] and a [`StreamApi`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use busprobe_adapters::nats::NatsAdapter;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let adapter = NatsAdapter::builder()
//!         .url("nats://localhost:4222")
//!         .build()
//!         .await?;
//!
//!     let snapshot = adapter.health().await;
//!     println!("{}: {:?}", snapshot.status, snapshot.details);
//!
//!     Ok(())
//! }
//! ```

use std::fmt;

use async_nats::connection::State;
use async_nats::jetstream;
use async_nats::jetstream::context::{
    DeleteStreamError, DeleteStreamErrorKind, GetStreamError, GetStreamErrorKind,
};
use async_nats::jetstream::ErrorCode;
use async_trait::async_trait;
use tracing::{debug, info};

use busprobe_types::{ConnectionState, HealthSnapshot};

use crate::health::{
    AccountProbe, AccountSummary, ConnectionStatusSource, HealthReporter, ProbeContext,
};
use crate::settings::NatsConfig;
use crate::stream::{StreamApi, StreamManager, StreamSpec};
use crate::{AdapterError, ProbeError, StreamError};

/// Backend identifier reported in NATS health snapshots.
pub const NATS_BACKEND: &str = "NATS";

impl ConnectionStatusSource for async_nats::Client {
    fn status(&self) -> ConnectionState {
        connection_state(self.connection_state())
    }
}

/// Map the client's connection state onto [`ConnectionState`].
pub fn connection_state(state: State) -> ConnectionState {
    match state {
        State::Pending => ConnectionState::Connecting,
        State::Connected => ConnectionState::Connected,
        State::Disconnected => ConnectionState::Disconnected,
        #[allow(unreachable_patterns)]
        _ => ConnectionState::Disconnected,
    }
}

#[async_trait]
impl AccountProbe for jetstream::Context {
    async fn probe(&self, ctx: &ProbeContext) -> Result<AccountSummary, ProbeError> {
        ctx.run(async {
            let account = self
                .query_account()
                .await
                .map_err(|e| ProbeError::Backend(e.to_string()))?;

            Ok(AccountSummary {
                memory: account.memory as u64,
                storage: account.storage as u64,
                streams: account.streams as usize,
                consumers: account.consumers as usize,
            })
        })
        .await
    }
}

#[async_trait]
impl StreamApi for jetstream::Context {
    type Config = jetstream::stream::Config;
    type Stream = jetstream::stream::Stream;

    fn config_name(config: &Self::Config) -> &str {
        &config.name
    }

    async fn create_stream(&self, spec: &StreamSpec) -> Result<Self::Stream, StreamError> {
        let config = jetstream::stream::Config {
            name: spec.name.clone(),
            subjects: spec.subjects.clone(),
            ..Default::default()
        };

        jetstream::Context::create_stream(self, config)
            .await
            .map_err(backend_error)
    }

    async fn create_or_update_stream(
        &self,
        config: &Self::Config,
    ) -> Result<Self::Stream, StreamError> {
        let name = config.name.as_str();

        match jetstream::Context::get_stream(self, name).await {
            Ok(_) => {
                jetstream::Context::update_stream(self, config.clone())
                    .await
                    .map_err(backend_error)?;
                jetstream::Context::get_stream(self, name)
                    .await
                    .map_err(|e| get_stream_error(name, e))
            }
            Err(e) => match get_stream_error(name, e) {
                StreamError::NotFound(_) => jetstream::Context::create_stream(self, config.clone())
                    .await
                    .map_err(backend_error),
                other => Err(other),
            },
        }
    }

    async fn delete_stream(&self, name: &str) -> Result<(), StreamError> {
        jetstream::Context::delete_stream(self, name)
            .await
            .map(drop)
            .map_err(|e| delete_stream_error(name, e))
    }

    async fn get_stream(&self, name: &str) -> Result<Self::Stream, StreamError> {
        jetstream::Context::get_stream(self, name)
            .await
            .map_err(|e| get_stream_error(name, e))
    }
}

/// The server answered with JetStream error code 10059.
fn is_stream_not_found(err: &jetstream::Error) -> bool {
    err.error_code() == ErrorCode::STREAM_NOT_FOUND
}

fn get_stream_error(name: &str, err: GetStreamError) -> StreamError {
    match err.kind() {
        GetStreamErrorKind::JetStream(e) if is_stream_not_found(&e) => {
            StreamError::NotFound(name.to_string())
        }
        _ => backend_error(err),
    }
}

fn delete_stream_error(name: &str, err: DeleteStreamError) -> StreamError {
    match err.kind() {
        DeleteStreamErrorKind::JetStream(e) if is_stream_not_found(&e) => {
            StreamError::NotFound(name.to_string())
        }
        _ => backend_error(err),
    }
}

fn backend_error(err: impl fmt::Display) -> StreamError {
    StreamError::Backend(err.to_string())
}

/// A connected NATS client with its health reporter.
pub struct NatsAdapter {
    client: async_nats::Client,
    jetstream: Option<jetstream::Context>,
    reporter: HealthReporter,
}

impl NatsAdapter {
    /// Create a new builder for configuring the adapter.
    pub fn builder() -> NatsAdapterBuilder {
        NatsAdapterBuilder::default()
    }

    /// The underlying client.
    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }

    /// The JetStream context, if JetStream is enabled.
    pub fn jetstream(&self) -> Option<&jetstream::Context> {
        self.jetstream.as_ref()
    }

    /// The reporter used by [`NatsAdapter::health`].
    pub fn reporter(&self) -> &HealthReporter {
        &self.reporter
    }

    /// Report health, probing JetStream without a deadline.
    pub async fn health(&self) -> HealthSnapshot {
        self.reporter.report_health().await
    }

    /// Report health, passing `ctx` to the JetStream probe.
    pub async fn health_with(&self, ctx: &ProbeContext) -> HealthSnapshot {
        self.reporter.report_health_with(ctx).await
    }

    /// Stream management, if JetStream is enabled.
    pub fn stream_manager(&self) -> Option<StreamManager<jetstream::Context>> {
        self.jetstream.clone().map(StreamManager::new)
    }
}

impl fmt::Debug for NatsAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NatsAdapter")
            .field("server", &self.reporter.config().host)
            .field("jetstream", &self.jetstream.is_some())
            .finish()
    }
}

/// Builder for NatsAdapter.
#[derive(Debug, Default)]
pub struct NatsAdapterBuilder {
    config: NatsConfig,
}

impl NatsAdapterBuilder {
    /// Set the NATS server URL (default: "nats://localhost:4222").
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.server = url.into();
        self
    }

    /// Set the path to a credentials file for authentication.
    pub fn credentials_file(mut self, path: impl Into<String>) -> Self {
        self.config.credentials_file = Some(path.into());
        self
    }

    /// Enable or disable JetStream (default: enabled).
    pub fn jetstream(mut self, enabled: bool) -> Self {
        self.config.jetstream = enabled;
        self
    }

    /// Replace all settings with a loaded [`NatsConfig`].
    pub fn config(mut self, config: NatsConfig) -> Self {
        self.config = config;
        self
    }

    /// Connect and build the adapter.
    pub async fn build(self) -> Result<NatsAdapter, AdapterError> {
        let NatsConfig {
            server,
            credentials_file,
            jetstream: jetstream_enabled,
        } = self.config;

        debug!(server = %server, "connecting to nats");

        let client = if let Some(creds) = credentials_file {
            async_nats::ConnectOptions::new()
                .credentials_file(&creds)
                .await
                .map_err(|e| AdapterError::Auth(e.to_string()))?
                .connect(server.as_str())
                .await
                .map_err(|e| AdapterError::Connection(e.to_string()))?
        } else {
            async_nats::connect(server.as_str())
                .await
                .map_err(|e| AdapterError::Connection(e.to_string()))?
        };

        info!(server = %server, jetstream = jetstream_enabled, "connected to nats");

        let jetstream = jetstream_enabled.then(|| jetstream::new(client.clone()));

        let mut reporter = HealthReporter::builder()
            .host(server)
            .backend(NATS_BACKEND)
            .connection(client.clone());
        if let Some(context) = &jetstream {
            reporter = reporter.account_probe(context.clone());
        }

        Ok(NatsAdapter {
            client,
            jetstream,
            reporter: reporter.build(),
        })
    }
}
