//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use botlink_config::ConfigError;
use botlink_core::{CommandState, CoreError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const BUSY: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const COMMAND_FAILED: i32 = 9;
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to device at {url}")]
    #[diagnostic(
        code(botlink::connection_failed),
        help(
            "Check that the device is powered on and reachable.\n\
             Reason: {reason}\n\
             Try: botlink health"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out")]
    #[diagnostic(
        code(botlink::timeout),
        help("Increase the timeout with --timeout or check the device's load.")
    )]
    Timeout,

    // ── Submission ───────────────────────────────────────────────────
    #[error("Device still busy after {attempts} attempt(s)")]
    #[diagnostic(
        code(botlink::busy),
        help(
            "The device is still executing another command.\n\
             Wait for it to finish, or retry with a larger --max-attempts."
        )
    )]
    Busy { attempts: u32 },

    #[error("Command rejected: {message}")]
    #[diagnostic(code(botlink::rejected), help("Rephrase the prompt and try again."))]
    Rejected { message: String },

    #[error("Command {request_id} ended in state '{state}'")]
    #[diagnostic(code(botlink::command_failed), help("{message}"))]
    CommandFailed {
        request_id: String,
        state: CommandState,
        message: String,
    },

    #[error("Interrupted")]
    #[diagnostic(code(botlink::interrupted))]
    Interrupted,

    // ── Resources ────────────────────────────────────────────────────
    #[error("Request '{request_id}' not found")]
    #[diagnostic(
        code(botlink::not_found),
        help("Request ids are only known to the device that issued them.")
    )]
    NotFound { request_id: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error ({code}): {message}")]
    #[diagnostic(code(botlink::api_error))]
    ApiError { code: String, message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(botlink::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(botlink::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: botlink config init --name {name} --device-url <URL>"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No device configured")]
    #[diagnostic(
        code(botlink::no_config),
        help(
            "Pass --url, set BOTLINK_URL, or create a profile with:\n  \
             botlink config init --device-url <URL>\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Profile '{name}' already exists")]
    #[diagnostic(code(botlink::profile_exists), help("Use --force to overwrite it."))]
    ProfileExists { name: String },

    #[error(transparent)]
    #[diagnostic(code(botlink::config))]
    Config(ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(botlink::json), help("Check the JSON value and try again."))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render TOML: {0}")]
    #[diagnostic(code(botlink::toml))]
    Toml(#[from] toml::ser::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout => exit_code::TIMEOUT,
            Self::Busy { .. } => exit_code::BUSY,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::CommandFailed { .. } => exit_code::COMMAND_FAILED,
            Self::Interrupted => exit_code::INTERRUPTED,
            Self::Rejected { .. }
            | Self::Validation { .. }
            | Self::ProfileNotFound { .. }
            | Self::NoConfig { .. }
            | Self::ProfileExists { .. }
            | Self::Json(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::UnknownProfile { profile } => CliError::ProfileNotFound {
                name: profile,
                available: String::new(),
            },
            other => CliError::Config(other),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },

            CoreError::Timeout => CliError::Timeout,

            CoreError::Busy { attempts } => CliError::Busy { attempts },

            CoreError::Rejected { message } => CliError::Rejected { message },

            CoreError::SubmissionFailed { message } => CliError::ApiError {
                code: "submission_failed".into(),
                message,
            },

            CoreError::Cancelled => CliError::Interrupted,

            CoreError::NotFound { request_id } => CliError::NotFound { request_id },

            CoreError::Api { message, status } => CliError::ApiError {
                code: status.map_or_else(|| "unknown".into(), |s| s.to_string()),
                message,
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::ApiError {
                code: "internal".into(),
                message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_kind() {
        assert_eq!(
            CliError::from(CoreError::Busy { attempts: 10 }).exit_code(),
            exit_code::BUSY
        );
        assert_eq!(
            CliError::from(CoreError::Cancelled).exit_code(),
            exit_code::INTERRUPTED
        );
        assert_eq!(
            CliError::from(CoreError::Rejected {
                message: "empty".into()
            })
            .exit_code(),
            exit_code::USAGE
        );
        assert_eq!(
            CliError::from(CoreError::Api {
                message: "boom".into(),
                status: Some(500),
            })
            .exit_code(),
            exit_code::GENERAL
        );
    }

    #[test]
    fn config_validation_keeps_field() {
        let err = CliError::from(ConfigError::Validation {
            field: "url".into(),
            reason: "bad".into(),
        });
        assert!(matches!(err, CliError::Validation { ref field, .. } if field == "url"));
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }
}
