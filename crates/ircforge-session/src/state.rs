//! Connection lifecycle.

use serde::{Deserialize, Serialize};

/// Where a connection stands.
///
/// ```text
/// Disconnected → Connecting → Registering → Ready → Disconnecting → Disconnected
/// ```
///
/// Any live state may also drop straight to `Disconnected` on a fault,
/// and a connection that is still registering may be asked to quit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// Opening the transport.
    Connecting,
    /// Identification sent, waiting for the welcome.
    Registering,
    /// Registered; channel operations are allowed.
    Ready,
    /// `QUIT` sent, draining until the server closes.
    Disconnecting,
}

impl ConnectionState {
    /// Returns `true` once registration is complete.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Returns `true` while a transport is open or being opened.
    pub fn is_connected(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }

    /// The state the normal lifecycle moves to next.
    pub fn next(self) -> Self {
        match self {
            Self::Disconnected => Self::Connecting,
            Self::Connecting => Self::Registering,
            Self::Registering => Self::Ready,
            Self::Ready => Self::Disconnecting,
            Self::Disconnecting => Self::Disconnected,
        }
    }

    /// Returns `true` if moving to `target` is a legal transition.
    pub fn can_transition_to(self, target: Self) -> bool {
        if self.next() == target {
            return true;
        }
        match (self, target) {
            (Self::Disconnected, _) => false,
            (_, Self::Disconnected) => true,
            (Self::Registering, Self::Disconnecting) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Registering => write!(f, "Registering"),
            Self::Ready => write!(f, "Ready"),
            Self::Disconnecting => write!(f, "Disconnecting"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_next_follows_lifecycle() {
        let mut state = ConnectionState::Disconnected;
        let mut seen = vec![state];
        for _ in 0..5 {
            state = state.next();
            seen.push(state);
        }
        assert_eq!(
            seen,
            [
                ConnectionState::Disconnected,
                ConnectionState::Connecting,
                ConnectionState::Registering,
                ConnectionState::Ready,
                ConnectionState::Disconnecting,
                ConnectionState::Disconnected,
            ]
        );
    }

    #[test]
    fn test_connection_state_can_transition_to() {
        use ConnectionState::*;

        assert!(Connecting.can_transition_to(Registering));
        assert!(Registering.can_transition_to(Ready));
        assert!(Ready.can_transition_to(Disconnecting));

        // faults
        assert!(Connecting.can_transition_to(Disconnected));
        assert!(Ready.can_transition_to(Disconnected));
        assert!(Registering.can_transition_to(Disconnecting));

        assert!(!Disconnected.can_transition_to(Ready));
        assert!(!Disconnected.can_transition_to(Disconnected));
        assert!(!Connecting.can_transition_to(Ready));
        assert!(!Ready.can_transition_to(Registering));
        assert!(!Disconnecting.can_transition_to(Ready));
    }

    #[test]
    fn test_connection_state_is_ready() {
        assert!(ConnectionState::Ready.is_ready());
        assert!(!ConnectionState::Registering.is_ready());
        assert!(!ConnectionState::Disconnecting.is_ready());
        assert!(!ConnectionState::Disconnected.is_connected());
        assert!(ConnectionState::Registering.is_connected());
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Registering.to_string(), "Registering");
        assert_eq!(ConnectionState::default().to_string(), "Disconnected");
    }
}
