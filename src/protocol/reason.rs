//! Disconnect reason codes and their classification.

use std::fmt;

/// Protocol disconnect reason, decoded from the status code the client
/// reports when a connection closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Stored credential material is corrupt.
    BadSession,
    /// The server closed the connection.
    ConnectionClosed,
    /// The connection dropped mid-stream.
    ConnectionLost,
    /// Another device took over this session.
    ConnectionReplaced,
    /// The user logged out from their device.
    LoggedOut,
    /// The client asked for a restart to finish pairing.
    RestartRequired,
    /// The connection attempt timed out.
    TimedOut,
    /// A status code this build does not know about.
    Unknown(u16),
}

/// What the supervisor does about a disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectClass {
    /// Terminal. No automatic reconnect; the operator must delete the
    /// stored credentials before restarting the session.
    Fatal,
    /// Transient. Reconnect under the session's retry policy.
    Recoverable,
    /// Remote logout. The configured logged-out policy decides.
    LoggedOut,
    /// Logged only; the session stays closed.
    Unrecognized,
}

impl DisconnectReason {
    /// Decode a protocol status code.
    pub fn from_code(code: u16) -> Self {
        match code {
            500 => Self::BadSession,
            428 => Self::ConnectionClosed,
            408 => Self::ConnectionLost,
            440 => Self::ConnectionReplaced,
            401 => Self::LoggedOut,
            515 => Self::RestartRequired,
            411 => Self::TimedOut,
            other => Self::Unknown(other),
        }
    }

    /// The wire status code for this reason.
    pub fn code(&self) -> u16 {
        match self {
            Self::BadSession => 500,
            Self::ConnectionClosed => 428,
            Self::ConnectionLost => 408,
            Self::ConnectionReplaced => 440,
            Self::LoggedOut => 401,
            Self::RestartRequired => 515,
            Self::TimedOut => 411,
            Self::Unknown(code) => *code,
        }
    }

    /// Classify this reason for the supervisor's reconnect decision.
    pub fn classify(&self) -> DisconnectClass {
        match self {
            Self::BadSession => DisconnectClass::Fatal,
            Self::ConnectionClosed
            | Self::ConnectionLost
            | Self::ConnectionReplaced
            | Self::RestartRequired
            | Self::TimedOut => DisconnectClass::Recoverable,
            Self::LoggedOut => DisconnectClass::LoggedOut,
            Self::Unknown(_) => DisconnectClass::Unrecognized,
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadSession => write!(f, "bad session"),
            Self::ConnectionClosed => write!(f, "connection closed"),
            Self::ConnectionLost => write!(f, "connection lost"),
            Self::ConnectionReplaced => write!(f, "connection replaced"),
            Self::LoggedOut => write!(f, "logged out"),
            Self::RestartRequired => write!(f, "restart required"),
            Self::TimedOut => write!(f, "timed out"),
            Self::Unknown(code) => write!(f, "unknown reason ({code})"),
        }
    }
}
