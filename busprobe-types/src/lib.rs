//! # busprobe-types
//!
//! Core types for reporting the health of message bus and cache clients.
//! These are the values a health-aggregation layer consumes, independent of
//! which client library produced them.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: Core types work without any serialization framework
//! - **Optional serialization**: Enable the `serde` feature for JSON output
//! - **Stable key names**: Detail keys are fixed constants so existing monitoring
//!   consumers keep working
//!
//! ## Features
//!
//! - `std` (default): Standard library support
//! - `serde`: JSON/MessagePack/etc. serialization via serde
//!
//! ## Example
//!
//! ```rust
//! use busprobe_types::{keys, ConnectionState, HealthSnapshot, HealthStatus};
//!
//! let snapshot = HealthSnapshot::builder()
//!     .status(HealthStatus::Up)
//!     .detail(keys::HOST, "nats://localhost:4222")
//!     .detail(keys::BACKEND, "NATS")
//!     .detail(keys::CONNECTION_STATUS, ConnectionState::Connected.as_str())
//!     .detail(keys::JETSTREAM_ENABLED, false)
//!     .build();
//!
//! assert!(snapshot.is_up());
//! assert_eq!(snapshot.text(keys::CONNECTION_STATUS), Some("CONNECTED"));
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod connection;
mod health;

pub use connection::*;
pub use health::*;
