//! # busprobe-adapters
//!
//! Health reporting and stream management for message bus and cache clients.
//!
//! The core is [`health::HealthReporter`], which turns a connection state and
//! an optional durable-stream engine probe into a [`HealthSnapshot`]. The
//! client-specific adapters plug real clients into it.
//!
//! ## Supported Systems
//!
//! - **NATS** (`nats` feature) - Connection state, JetStream account probe,
//!   and JetStream stream management
//! - **Redis** (`redis` feature) - Client construction from `REDIS_*`
//!   settings and PING-based health
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use busprobe_adapters::{ConnectionState, HealthReporter, ProbeContext};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let reporter = HealthReporter::builder()
//!         .host("nats://localhost:4222")
//!         .backend("NATS")
//!         .connection(ConnectionState::Connected)
//!         .build();
//!
//!     // Bound the probe; the reporter itself never times out
//!     let ctx = ProbeContext::with_timeout(Duration::from_secs(2));
//!     let snapshot = reporter.report_health_with(&ctx).await;
//!
//!     println!("{}: {:?}", snapshot.status, snapshot.details);
//!     Ok(())
//! }
//! ```
//!
//! With the `nats` feature, `nats::NatsAdapter` wires a live client and its
//! JetStream context into the same reporter.

pub mod error;
pub mod health;
pub mod settings;
pub mod stream;

#[cfg(feature = "nats")]
pub mod nats;

#[cfg(feature = "redis")]
pub mod redis;

pub use error::{AdapterError, ProbeError, StreamError};
pub use health::{
    AccountProbe, AccountSummary, ConnectionStatusSource, HealthReporter, ProbeContext,
    ReporterConfig,
};
pub use stream::{StreamApi, StreamManager, StreamSpec};

// Re-export types for convenience
pub use busprobe_types::{keys, ConnectionState, DetailValue, HealthSnapshot, HealthStatus};
