//! Connection state of a broker client.

use core::fmt;

/// Transport-level state of the link to the message broker.
///
/// The textual form returned by [`ConnectionState::as_str`] is the one the
/// NATS client libraries print for each state. Monitoring consumers match on
/// these strings, so they must not be changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum ConnectionState {
    /// Not connected. This is also the state reported when no client is set.
    #[default]
    Disconnected,
    /// Connected and able to publish and subscribe.
    Connected,
    /// Closed for good; the client will not reconnect.
    Closed,
    /// Lost the connection and trying to get it back.
    Reconnecting,
    /// Initial connection attempt in progress.
    Connecting,
    /// Draining subscriptions before closing.
    DrainingSubs,
    /// Draining publishers before closing.
    DrainingPubs,
}

impl ConnectionState {
    /// All states, in declaration order.
    pub const ALL: [ConnectionState; 7] = [
        ConnectionState::Disconnected,
        ConnectionState::Connected,
        ConnectionState::Closed,
        ConnectionState::Reconnecting,
        ConnectionState::Connecting,
        ConnectionState::DrainingSubs,
        ConnectionState::DrainingPubs,
    ];

    /// The client library's rendering of this state.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::Connected => "CONNECTED",
            ConnectionState::Closed => "CLOSED",
            ConnectionState::Reconnecting => "RECONNECTING",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::DrainingSubs => "DRAINING_SUBS",
            ConnectionState::DrainingPubs => "DRAINING_PUBS",
        }
    }

    /// Returns true only for [`ConnectionState::Connected`].
    pub const fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_disconnected() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert_eq!(ConnectionState::default().to_string(), "DISCONNECTED");
    }

    #[test]
    fn test_only_connected_is_connected() {
        for state in ConnectionState::ALL {
            assert_eq!(state.is_connected(), state == ConnectionState::Connected);
        }
    }

    #[test]
    fn test_rendering() {
        assert_eq!(ConnectionState::Connected.to_string(), "CONNECTED");
        assert_eq!(ConnectionState::Closed.to_string(), "CLOSED");
        assert_eq!(ConnectionState::DrainingSubs.to_string(), "DRAINING_SUBS");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_uses_rendering() {
        for state in ConnectionState::ALL {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state.as_str()));
        }
    }
}
