//! Transport NSW error types

use thiserror::Error;

/// Errors that can occur while querying departures or vehicle positions
#[derive(Debug, Error)]
pub enum TransportNswError {
    /// Connection to the Transport NSW API failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The API answered with a non-success status
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The API rejected the key
    #[error("Request rejected with HTTP {status}; check api key")]
    Unauthorized {
        /// HTTP status code returned by the API
        status: u16,
    },

    /// The departure monitor response has no `stopEvents` field
    #[error("No stop events for stop {stop_id}")]
    NoStopEvents {
        /// The queried stop
        stop_id: String,
    },

    /// Failed to parse a JSON response or a timestamp inside it
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to decode the GTFS-realtime vehicle position feed
    #[error("Feed decode error: {0}")]
    FeedDecode(#[from] prost::DecodeError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Request timeout
    #[error("Request timed out after {timeout_secs} seconds")]
    Timeout {
        /// The timeout duration in seconds
        timeout_secs: u64,
    },
}

impl TransportNswError {
    /// Returns true if a later attempt could succeed
    ///
    /// Requests are never retried automatically; callers polling through a
    /// monitor can use this to decide how loudly to report a failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_) | Self::RequestFailed(_) | Self::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(TransportNswError::ConnectionFailed("test".to_string()).is_retryable());
        assert!(TransportNswError::RequestFailed("HTTP 503".to_string()).is_retryable());
        assert!(TransportNswError::Timeout { timeout_secs: 10 }.is_retryable());
    }

    #[test]
    fn test_non_retryable_errors() {
        assert!(!TransportNswError::Unauthorized { status: 401 }.is_retryable());
        assert!(!TransportNswError::ParseError("test".to_string()).is_retryable());
        assert!(!TransportNswError::ConfigurationError("test".to_string()).is_retryable());
        assert!(
            !TransportNswError::NoStopEvents {
                stop_id: "200060".to_string(),
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_error_display() {
        let err = TransportNswError::NoStopEvents {
            stop_id: "200060".to_string(),
        };
        assert_eq!(err.to_string(), "No stop events for stop 200060");

        let err = TransportNswError::Unauthorized { status: 401 };
        assert!(err.to_string().contains("check api key"));

        let err = TransportNswError::Timeout { timeout_secs: 10 };
        assert!(err.to_string().contains("10"));
    }

    #[test]
    fn test_from_prost_decode_error() {
        let bad_bytes: &[u8] = &[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F];
        let result = <gtfs_realtime::FeedMessage as prost::Message>::decode(bad_bytes);
        let err: TransportNswError = result.unwrap_err().into();
        assert!(matches!(err, TransportNswError::FeedDecode(_)));
        assert!(err.to_string().starts_with("Feed decode error"));
    }
}
