use thiserror::Error;

/// Top-level error type for the `botlink-api` crate.
///
/// Covers every failure mode of the command/status surface: transport,
/// HTTP status mapping, the SSE event stream, and payload decoding.
/// `botlink-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A configured header value (e.g. the bearer token) is not valid ASCII.
    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    // ── Command submission ──────────────────────────────────────────
    /// HTTP 400: the server rejected the request payload.
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// HTTP 409: another command is already executing.
    #[error("Device busy: {message}")]
    Busy { message: String },

    // ── Status ──────────────────────────────────────────────────────
    /// HTTP 404 on a status lookup: the id is unknown, too new, or expired.
    #[error("Unknown request id: {request_id}")]
    NotFound { request_id: String },

    /// Any other non-success status code.
    #[error("Server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    // ── Event stream ────────────────────────────────────────────────
    /// The SSE connection could not be opened.
    #[error("Event stream connection failed: {0}")]
    StreamConnect(String),

    /// The SSE connection ended (server closed or body finished).
    #[error("Event stream closed")]
    StreamClosed,

    /// A single SSE line grew past the decoder's limit without a line break.
    #[error("Event stream line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` for HTTP 409 on command submission.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Busy { .. }
            | Self::StreamConnect(_)
            | Self::StreamClosed
            | Self::LineTooLong { .. } => true,
            Self::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// HTTP status code carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::InvalidRequest { .. } => Some(400),
            Self::NotFound { .. } => Some(404),
            Self::Busy { .. } => Some(409),
            Self::Server { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
