// Wire types for the command/status API.
//
// Field names follow the server's snake_case JSON. Anything the server
// sends beyond the known set is ignored rather than rejected.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle state of a command as reported by the server.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CommandState {
    Idle,
    Executing,
    Completed,
    Failed,
    Timeout,
    Interrupted,
}

impl CommandState {
    /// Terminal states end a command's lifecycle; no update follows them.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Timeout | Self::Interrupted
        )
    }
}

/// Progress snapshot for one submitted command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandStatus {
    pub request_id: String,
    pub state: CommandState,

    /// Sub-progress tag within `executing`. Opaque to this crate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Model confidence in `[0, 1]`, when the server reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
}

impl CommandStatus {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Same request at the same point of progress. `elapsed_ms` is
    /// ignored: it advances on every report without anything happening.
    pub fn same_progress(&self, other: &Self) -> bool {
        self.request_id == other.request_id
            && self.state == other.state
            && self.phase == other.phase
            && self.confidence == other.confidence
            && self.message == other.message
    }
}

/// Body of `POST /command`.
#[derive(Debug, Clone, Serialize)]
pub struct CommandRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Value>,
}

impl CommandRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            options: None,
        }
    }

    pub fn with_options(mut self, options: serde_json::Value) -> Self {
        self.options = Some(options);
        self
    }
}

/// Successful `POST /command` response (HTTP 200 or 202).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommandAccepted {
    pub request_id: String,
}

/// `GET /health` response. Only `status` is interpreted; the rest is kept
/// verbatim for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Error body shapes the server may use. The first present field wins.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ErrorBody {
    /// Extract a human-readable message from a raw error response body.
    pub(crate) fn message_from(body: &str) -> String {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let detail = parsed.detail.map(|d| match d {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });
        detail
            .or(parsed.message)
            .or(parsed.error)
            .unwrap_or_else(|| body.trim().to_owned())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn terminal_states() {
        assert!(!CommandState::Idle.is_terminal());
        assert!(!CommandState::Executing.is_terminal());
        assert!(CommandState::Completed.is_terminal());
        assert!(CommandState::Failed.is_terminal());
        assert!(CommandState::Timeout.is_terminal());
        assert!(CommandState::Interrupted.is_terminal());
    }

    #[test]
    fn status_without_message_defaults_to_empty() {
        let status: CommandStatus = serde_json::from_str(
            r#"{"request_id":"r1","state":"executing","phase":"returning_home"}"#,
        )
        .unwrap();
        assert_eq!(status.request_id, "r1");
        assert_eq!(status.state, CommandState::Executing);
        assert_eq!(status.phase.as_deref(), Some("returning_home"));
        assert_eq!(status.message, "");
        assert!(status.confidence.is_none());
    }

    #[test]
    fn status_with_every_field() {
        let status: CommandStatus = serde_json::from_str(
            r#"{
                "request_id": "r9",
                "state": "completed",
                "phase": "done",
                "confidence": 0.92,
                "message": "Home reached",
                "elapsed_ms": 4210,
                "server_extra": true
            }"#,
        )
        .unwrap();
        assert!(status.is_terminal());
        assert_eq!(status.confidence, Some(0.92));
        assert_eq!(status.elapsed_ms, Some(4210));
        assert_eq!(status.message, "Home reached");
    }

    #[test]
    fn same_progress_ignores_elapsed_time() {
        let first: CommandStatus = serde_json::from_str(
            r#"{"request_id":"r1","state":"executing","phase":"navigating","elapsed_ms":500}"#,
        )
        .unwrap();
        let later = CommandStatus {
            elapsed_ms: Some(1_000),
            ..first.clone()
        };
        assert!(first.same_progress(&later));

        let moved_on = CommandStatus {
            phase: Some("docking".into()),
            ..first.clone()
        };
        assert!(!first.same_progress(&moved_on));
    }

    #[test]
    fn unknown_state_is_rejected() {
        let result = serde_json::from_str::<CommandStatus>(
            r#"{"request_id":"r1","state":"dancing","message":""}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn state_display_matches_wire_name() {
        assert_eq!(CommandState::Interrupted.to_string(), "interrupted");
        assert_eq!(
            "timeout".parse::<CommandState>().unwrap(),
            CommandState::Timeout
        );
    }

    #[test]
    fn request_omits_empty_options() {
        let body = serde_json::to_value(CommandRequest::new("go home")).unwrap();
        assert_eq!(body, serde_json::json!({ "prompt": "go home" }));
    }

    #[test]
    fn error_message_prefers_detail() {
        assert_eq!(
            ErrorBody::message_from(r#"{"detail":"prompt must not be empty"}"#),
            "prompt must not be empty"
        );
        assert_eq!(
            ErrorBody::message_from(r#"{"message":"bad options"}"#),
            "bad options"
        );
        assert_eq!(ErrorBody::message_from("plain text body\n"), "plain text body");
    }
}
