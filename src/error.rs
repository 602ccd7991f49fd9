use std::io;
use thiserror::Error;

use crate::types::TrackState;

/// Errors that can occur during sync operations
#[derive(Debug, Error)]
pub enum SyncError {
    // ===== Handshake Errors =====
    /// Peer speaks an incompatible protocol version
    #[error("protocol version mismatch: ours {ours}, theirs {theirs}")]
    VersionMismatch {
        /// Version this crate speaks
        ours: String,
        /// Version the peer announced
        theirs: String,
    },

    /// Authentication token invalid or missing
    #[error("authentication rejected: {message}")]
    AuthRejected {
        /// Description of the rejection
        message: String,
    },

    /// Handshake message repeated or out of order
    #[error("handshake error: {message}")]
    HandshakeError {
        /// Description of the failure
        message: String,
    },

    // ===== Protocol Errors =====
    /// Message could not be decoded
    #[error("codec error: {message}")]
    CodecError {
        /// Description of the error
        message: String,
    },

    /// Message type is not part of the protocol
    #[error("unknown message type: {message_type}")]
    UnknownMessage {
        /// The unrecognized type tag
        message_type: String,
    },

    /// Sender exceeded a rate limit
    #[error("rate limited: {class} exceeded {limit}/s")]
    RateLimited {
        /// The throttled message class
        class: &'static str,
        /// The per-second limit
        limit: u32,
    },

    // ===== Scheduling Errors =====
    /// Scheduled action arrived past its execution window
    #[error("action {action_id} too late by {late_by:.3}s")]
    TooLate {
        /// Id of the discarded action
        action_id: String,
        /// Seconds past the deadline
        late_by: f64,
    },

    /// Operation not valid for the track's current state
    #[error("invalid state: {message} (track in {current:?})")]
    InvalidState {
        /// Description of why the state is invalid
        message: String,
        /// The track state at the time
        current: TrackState,
    },

    /// Track is not known to the scheduler
    #[error("unknown track: {track_id}")]
    UnknownTrack {
        /// The missing track id
        track_id: String,
    },

    // ===== Transport Errors =====
    /// Underlying transport closed
    #[error("transport closed: {message}")]
    TransportClosed {
        /// Description of the closure
        message: String,
    },

    /// Network I/O error
    #[error("network error: {0}")]
    NetworkError(#[from] io::Error),

    /// Operation timed out
    #[error("operation timed out")]
    Timeout,

    // ===== Internal Errors =====
    /// Internal library error
    #[error("internal error: {message}")]
    Internal {
        /// Description of the error
        message: String,
    },
}

impl SyncError {
    /// Check if this error is recoverable by retrying
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Timeout | Self::NetworkError(_)
        )
    }

    /// Check if this error indicates the session is gone
    #[must_use]
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::TransportClosed { .. } | Self::NetworkError(_))
    }

    /// The wire error code this error maps to
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::VersionMismatch { .. } => ErrorCode::VersionMismatch,
            Self::AuthRejected { .. } => ErrorCode::AuthRejected,
            Self::RateLimited { .. } => ErrorCode::RateLimited,
            Self::TooLate { .. } => ErrorCode::TooLate,
            Self::HandshakeError { .. }
            | Self::InvalidState { .. }
            | Self::UnknownTrack { .. }
            | Self::UnknownMessage { .. }
            | Self::CodecError { .. } => ErrorCode::InvalidState,
            Self::TransportClosed { .. } | Self::NetworkError(_) | Self::Timeout => {
                ErrorCode::TransportClosed
            }
            Self::Internal { .. } => ErrorCode::Internal,
        }
    }
}

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Wire-visible error codes carried in `error` messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum ErrorCode {
    /// Handshake refused, session closed
    VersionMismatch,
    /// Token invalid or missing, session closed
    AuthRejected,
    /// Throttled, connection may remain open
    RateLimited,
    /// Scheduled action past deadline, discarded
    TooLate,
    /// Operation invalid for current state, ignored and reported
    InvalidState,
    /// Scheduler queue over capacity, telemetry only
    QueuePressure,
    /// Session lost, triggers re-bind
    TransportClosed,
    /// Unexpected failure
    Internal,
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> u16 {
        match code {
            ErrorCode::AuthRejected => 401,
            ErrorCode::VersionMismatch => 426,
            ErrorCode::RateLimited => 429,
            ErrorCode::TooLate => 460,
            ErrorCode::InvalidState => 461,
            ErrorCode::QueuePressure => 462,
            ErrorCode::TransportClosed => 463,
            ErrorCode::Internal => 500,
        }
    }
}

impl TryFrom<u16> for ErrorCode {
    type Error = String;

    fn try_from(value: u16) -> std::result::Result<Self, String> {
        match value {
            401 => Ok(Self::AuthRejected),
            426 => Ok(Self::VersionMismatch),
            429 => Ok(Self::RateLimited),
            460 => Ok(Self::TooLate),
            461 => Ok(Self::InvalidState),
            462 => Ok(Self::QueuePressure),
            463 => Ok(Self::TransportClosed),
            500 => Ok(Self::Internal),
            other => Err(format!("unknown error code {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SyncError::UnknownTrack {
            track_id: "deck-a".to_string(),
        };
        assert_eq!(err.to_string(), "unknown track: deck-a");
    }

    #[test]
    fn test_error_is_recoverable() {
        assert!(SyncError::Timeout.is_recoverable());
        assert!(
            SyncError::RateLimited {
                class: "clock_sync",
                limit: 10,
            }
            .is_recoverable()
        );

        let version = SyncError::VersionMismatch {
            ours: "1.0.0".to_string(),
            theirs: "2.0.0".to_string(),
        };
        assert!(!version.is_recoverable());
    }

    #[test]
    fn test_error_is_connection_lost() {
        let err = SyncError::TransportClosed {
            message: "peer went away".to_string(),
        };
        assert!(err.is_connection_lost());
        assert!(!SyncError::Timeout.is_connection_lost());
    }

    #[test]
    fn test_error_code_mapping() {
        let err = SyncError::TooLate {
            action_id: "X".to_string(),
            late_by: 0.2,
        };
        assert_eq!(err.code(), ErrorCode::TooLate);
        assert_eq!(u16::from(err.code()), 460);
    }

    #[test]
    fn test_error_code_round_trip() {
        for code in [
            ErrorCode::VersionMismatch,
            ErrorCode::AuthRejected,
            ErrorCode::RateLimited,
            ErrorCode::TooLate,
            ErrorCode::InvalidState,
            ErrorCode::QueuePressure,
            ErrorCode::TransportClosed,
            ErrorCode::Internal,
        ] {
            assert_eq!(ErrorCode::try_from(u16::from(code)).unwrap(), code);
        }
        assert!(ErrorCode::try_from(999).is_err());
    }

    #[test]
    fn test_error_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SyncError>();
    }
}
