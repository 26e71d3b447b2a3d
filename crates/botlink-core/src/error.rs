// ── Core error types ──
//
// User-facing errors from botlink-core. Consumers never see raw HTTP
// status codes or JSON parse failures; the `From<botlink_api::Error>`
// impl translates transport-layer errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to device at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Device request timed out")]
    Timeout,

    // ── Submission errors ────────────────────────────────────────────
    #[error("Device still busy after {attempts} attempt(s)")]
    Busy { attempts: u32 },

    #[error("Command rejected: {message}")]
    Rejected { message: String },

    #[error("Command submission failed: {message}")]
    SubmissionFailed { message: String },

    #[error("Submission cancelled")]
    Cancelled,

    // ── Status errors ────────────────────────────────────────────────
    #[error("Unknown request id: {request_id}")]
    NotFound { request_id: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<botlink_api::Error> for CoreError {
    fn from(err: botlink_api::Error) -> Self {
        match err {
            botlink_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            botlink_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            botlink_api::Error::InvalidHeader(reason) => CoreError::Config {
                message: format!("Invalid token: {reason}"),
            },
            botlink_api::Error::InvalidRequest { message } => CoreError::Rejected { message },
            botlink_api::Error::Busy { .. } => CoreError::Busy { attempts: 1 },
            botlink_api::Error::NotFound { request_id } => CoreError::NotFound { request_id },
            botlink_api::Error::Server { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            botlink_api::Error::StreamConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("event stream: {reason}"),
            },
            e @ (botlink_api::Error::StreamClosed | botlink_api::Error::LineTooLong { .. }) => {
                CoreError::ConnectionFailed {
                    url: String::new(),
                    reason: e.to_string(),
                }
            }
            botlink_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
