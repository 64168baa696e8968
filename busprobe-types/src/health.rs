//! Health snapshot - a point-in-time view of a client's health.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use core::fmt;

/// Detail keys understood by existing monitoring consumers.
///
/// These names are part of the serialized form and must stay verbatim.
pub mod keys {
    /// Configured server address.
    pub const HOST: &str = "host";
    /// Identifier of the backend that produced the snapshot (e.g. "NATS").
    pub const BACKEND: &str = "backend";
    /// Rendering of the underlying connection state.
    pub const CONNECTION_STATUS: &str = "connection_status";
    /// Whether the durable-stream engine is configured.
    pub const JETSTREAM_ENABLED: &str = "jetstream_enabled";
    /// Outcome of the durable-stream engine probe: the OK token or `Error: <msg>`.
    pub const JETSTREAM_STATUS: &str = "jetstream_status";
    /// Error text for backends that report a single failure.
    pub const ERROR: &str = "error";
}

/// Binary health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum HealthStatus {
    /// The client is usable.
    #[default]
    Up,
    /// The client is not usable.
    Down,
}

impl HealthStatus {
    /// Wire form: `"UP"` or `"DOWN"`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Up => "UP",
            HealthStatus::Down => "DOWN",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single value in [`HealthSnapshot::details`].
///
/// Serialized untagged, so JSON carries plain strings and booleans.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum DetailValue {
    /// Free-form text.
    Text(String),
    /// A yes/no fact.
    Flag(bool),
}

impl DetailValue {
    /// The text, if this is a [`DetailValue::Text`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DetailValue::Text(s) => Some(s),
            DetailValue::Flag(_) => None,
        }
    }

    /// The flag, if this is a [`DetailValue::Flag`].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DetailValue::Flag(b) => Some(*b),
            DetailValue::Text(_) => None,
        }
    }
}

impl From<&str> for DetailValue {
    fn from(s: &str) -> Self {
        DetailValue::Text(s.to_string())
    }
}

impl From<String> for DetailValue {
    fn from(s: String) -> Self {
        DetailValue::Text(s)
    }
}

impl From<bool> for DetailValue {
    fn from(b: bool) -> Self {
        DetailValue::Flag(b)
    }
}

impl fmt::Display for DetailValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetailValue::Text(s) => f.write_str(s),
            DetailValue::Flag(b) => write!(f, "{}", b),
        }
    }
}

/// A point-in-time health record for one client.
///
/// A snapshot is built fresh for every health check and never mutated after
/// it is handed out.
///
/// # Example
///
/// ```rust
/// use busprobe_types::{keys, HealthSnapshot, HealthStatus};
///
/// let snapshot = HealthSnapshot::builder()
///     .status(HealthStatus::Down)
///     .detail(keys::HOST, "nats://localhost:4222")
///     .detail(keys::CONNECTION_STATUS, "CLOSED")
///     .build();
///
/// assert!(!snapshot.is_up());
/// assert!(!snapshot.contains(keys::JETSTREAM_STATUS));
///
/// // Serialize with serde (requires "serde" feature)
/// // let json = serde_json::to_string(&snapshot)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HealthSnapshot {
    /// Overall status.
    pub status: HealthStatus,

    /// Diagnostic details keyed by name. See [`keys`] for the well-known names.
    pub details: BTreeMap<String, DetailValue>,
}

impl HealthSnapshot {
    /// Create a snapshot with the given status and no details.
    pub fn new(status: HealthStatus) -> Self {
        Self {
            status,
            details: BTreeMap::new(),
        }
    }

    /// Create a builder for constructing snapshots.
    pub fn builder() -> HealthSnapshotBuilder {
        HealthSnapshotBuilder::new()
    }

    /// Check if the overall status is [`HealthStatus::Up`].
    pub fn is_up(&self) -> bool {
        self.status == HealthStatus::Up
    }

    /// Get a detail by key.
    pub fn get(&self, key: &str) -> Option<&DetailValue> {
        self.details.get(key)
    }

    /// Get a text detail by key.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(DetailValue::as_str)
    }

    /// Get a flag detail by key.
    pub fn flag(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(DetailValue::as_bool)
    }

    /// Check whether a detail key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.details.contains_key(key)
    }
}

/// Builder for constructing `HealthSnapshot` instances.
#[derive(Debug, Default)]
pub struct HealthSnapshotBuilder {
    status: HealthStatus,
    details: BTreeMap<String, DetailValue>,
}

impl HealthSnapshotBuilder {
    /// Create a new builder. Status starts as [`HealthStatus::Up`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the overall status.
    pub fn status(mut self, status: HealthStatus) -> Self {
        self.status = status;
        self
    }

    /// Add a detail, replacing any previous value for the key.
    pub fn detail(mut self, key: impl Into<String>, value: impl Into<DetailValue>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Build the snapshot.
    pub fn build(self) -> HealthSnapshot {
        HealthSnapshot {
            status: self.status,
            details: self.details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_to_up() {
        let snapshot = HealthSnapshot::builder().build();
        assert!(snapshot.is_up());
        assert!(snapshot.details.is_empty());
    }

    #[test]
    fn test_typed_accessors() {
        let snapshot = HealthSnapshot::builder()
            .detail(keys::HOST, "nats://localhost:4222")
            .detail(keys::JETSTREAM_ENABLED, true)
            .build();

        assert_eq!(snapshot.text(keys::HOST), Some("nats://localhost:4222"));
        assert_eq!(snapshot.flag(keys::HOST), None);
        assert_eq!(snapshot.flag(keys::JETSTREAM_ENABLED), Some(true));
        assert_eq!(snapshot.text(keys::JETSTREAM_ENABLED), None);
        assert!(!snapshot.contains(keys::JETSTREAM_STATUS));
    }

    #[test]
    fn test_later_detail_wins() {
        let snapshot = HealthSnapshot::builder()
            .detail(keys::BACKEND, "NATS")
            .detail(keys::BACKEND, "REDIS")
            .build();

        assert_eq!(snapshot.text(keys::BACKEND), Some("REDIS"));
        assert_eq!(snapshot.details.len(), 1);
    }

    #[test]
    fn test_status_rendering() {
        assert_eq!(HealthStatus::Up.to_string(), "UP");
        assert_eq!(HealthStatus::Down.to_string(), "DOWN");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_shape() {
        let snapshot = HealthSnapshot::builder()
            .status(HealthStatus::Down)
            .detail(keys::HOST, "nats://localhost:4222")
            .detail(keys::BACKEND, "NATS")
            .detail(keys::CONNECTION_STATUS, "CLOSED")
            .detail(keys::JETSTREAM_ENABLED, false)
            .build();

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "DOWN",
                "details": {
                    "host": "nats://localhost:4222",
                    "backend": "NATS",
                    "connection_status": "CLOSED",
                    "jetstream_enabled": false
                }
            })
        );

        let parsed: HealthSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, snapshot);
    }
}
