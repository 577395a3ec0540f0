use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle states of a session channel
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum SessionState {
    /// No session with the remote endpoint
    Idle,
    /// Local invite sent, awaiting accept or deny
    Inviting,
    /// Remote invite received, awaiting local accept or deny
    Invited,
    /// Accepted; media negotiation in progress
    Connecting,
    /// Session established
    Connected,
    /// Stop requested; cleanup in progress
    Ending,
    /// Terminal; a fresh channel is needed for a new session with the same
    /// remote id
    Closed,
}

impl SessionState {
    /// Terminal state; the channel can be reclaimed.
    pub fn is_closed(&self) -> bool {
        matches!(self, SessionState::Closed)
    }

    /// States in which publish/subscribe/send are accepted.
    pub fn allows_media_ops(&self) -> bool {
        matches!(self, SessionState::Connected)
    }

    /// States in which stats queries are served (best effort while ending).
    pub fn allows_stats(&self) -> bool {
        matches!(self, SessionState::Connected | SessionState::Ending)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Inviting => write!(f, "Inviting"),
            SessionState::Invited => write!(f, "Invited"),
            SessionState::Connecting => write!(f, "Connecting"),
            SessionState::Connected => write!(f, "Connected"),
            SessionState::Ending => write!(f, "Ending"),
            SessionState::Closed => write!(f, "Closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_ops_only_when_connected() {
        assert!(SessionState::Connected.allows_media_ops());
        for state in [
            SessionState::Idle,
            SessionState::Inviting,
            SessionState::Invited,
            SessionState::Connecting,
            SessionState::Ending,
            SessionState::Closed,
        ] {
            assert!(!state.allows_media_ops(), "{state} should refuse media ops");
        }
    }

    #[test]
    fn stats_allowed_while_ending() {
        assert!(SessionState::Connected.allows_stats());
        assert!(SessionState::Ending.allows_stats());
        assert!(!SessionState::Closed.allows_stats());
        assert!(!SessionState::Idle.allows_stats());
    }
}
