use std::fmt;

/// Lifecycle state of a session.
///
/// States advance monotonically toward the terminal `Closed`/`Failed` pair;
/// leaving a terminal state is a programming fault.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Initializing,
    Connecting,
    Connected,
    Closed,
    Failed,
}

const SESSION_STATE_INITIALIZING_STR: &str = "initializing";
const SESSION_STATE_CONNECTING_STR: &str = "connecting";
const SESSION_STATE_CONNECTED_STR: &str = "connected";
const SESSION_STATE_CLOSED_STR: &str = "closed";
const SESSION_STATE_FAILED_STR: &str = "failed";

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

impl From<&str> for SessionState {
    fn from(raw: &str) -> Self {
        match raw {
            SESSION_STATE_CONNECTING_STR => SessionState::Connecting,
            SESSION_STATE_CONNECTED_STR => SessionState::Connected,
            SESSION_STATE_CLOSED_STR => SessionState::Closed,
            SESSION_STATE_FAILED_STR => SessionState::Failed,
            _ => SessionState::Initializing,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Initializing => SESSION_STATE_INITIALIZING_STR,
            SessionState::Connecting => SESSION_STATE_CONNECTING_STR,
            SessionState::Connected => SESSION_STATE_CONNECTED_STR,
            SessionState::Closed => SESSION_STATE_CLOSED_STR,
            SessionState::Failed => SESSION_STATE_FAILED_STR,
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_state_string() {
        let tests = vec![
            (SessionState::Initializing, "initializing"),
            (SessionState::Connecting, "connecting"),
            (SessionState::Connected, "connected"),
            (SessionState::Closed, "closed"),
            (SessionState::Failed, "failed"),
        ];

        for (state, expected) in tests {
            assert_eq!(state.to_string(), expected);
            assert_eq!(SessionState::from(expected), state);
        }

        assert_eq!(SessionState::from("bogus"), SessionState::Initializing);
    }

    #[test]
    fn test_session_state_terminal() {
        let tests = vec![
            (SessionState::Initializing, false),
            (SessionState::Connecting, false),
            (SessionState::Connected, false),
            (SessionState::Closed, true),
            (SessionState::Failed, true),
        ];

        for (state, expected) in tests {
            assert_eq!(state.is_terminal(), expected, "{state}");
        }
    }
}
