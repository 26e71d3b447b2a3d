//! Output formatting: plain lines or JSON.
//!
//! Plain output is meant for people (optionally colored by state); JSON
//! output is one document per item so it can be piped into `jq`.

use std::io::{self, IsTerminal, Write};

use owo_colors::{OwoColorize, Style};
use serde::Serialize;
use serde_json::json;

use botlink_core::{CommandState, CommandStatus, ConnectionStatus, HealthStatus, SyncEvent};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

/// Rendering choices resolved once from the global flags.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    pub format: OutputFormat,
    pub color: bool,
}

impl Renderer {
    pub fn new(format: OutputFormat, color: ColorMode) -> Self {
        Self {
            format,
            color: should_color(color),
        }
    }

    pub fn status(&self, status: &CommandStatus) -> Result<String, CliError> {
        match self.format {
            OutputFormat::Plain => Ok(self.status_line(status)),
            _ => self.json(status),
        }
    }

    pub fn request_id(&self, request_id: &str) -> Result<String, CliError> {
        match self.format {
            OutputFormat::Plain => Ok(request_id.to_owned()),
            _ => self.json(&json!({ "request_id": request_id })),
        }
    }

    pub fn health(&self, health: &HealthStatus) -> Result<String, CliError> {
        match self.format {
            OutputFormat::Plain => {
                let mut lines = vec![format!(
                    "status: {}",
                    health.status.as_deref().unwrap_or("unknown")
                )];
                lines.extend(health.extra.iter().map(|(k, v)| format!("{k}: {v}")));
                Ok(lines.join("\n"))
            }
            _ => self.json(health),
        }
    }

    pub fn event(&self, event: &SyncEvent) -> Result<String, CliError> {
        if self.format == OutputFormat::Plain {
            return Ok(match event {
                SyncEvent::StatusUpdate(status) => self.status_line(status),
                SyncEvent::ConnectionChanged(conn) => self.connection_line(*conn),
                SyncEvent::Error(message) => self.paint(&format!("error: {message}"), Style::new().red()),
                SyncEvent::Notice(message) => self.paint(message, Style::new().yellow()),
            });
        }

        let value = match event {
            SyncEvent::StatusUpdate(status) => json!({ "type": "status", "status": status }),
            SyncEvent::ConnectionChanged(conn) => json!({ "type": "connection", "connection": conn }),
            SyncEvent::Error(message) => json!({ "type": "error", "message": message }),
            SyncEvent::Notice(message) => json!({ "type": "notice", "message": message }),
        };
        self.json(&value)
    }

    fn status_line(&self, status: &CommandStatus) -> String {
        let state = self.paint(&status.state.to_string(), state_style(status.state));
        let mut line = format!("{}  {state}", status.request_id);
        if let Some(ref phase) = status.phase {
            line.push_str(&format!("  [{phase}]"));
        }
        if let Some(confidence) = status.confidence {
            line.push_str(&format!("  {:.0}%", confidence * 100.0));
        }
        if !status.message.is_empty() {
            line.push_str(&format!("  {}", status.message));
        }
        line
    }

    fn connection_line(&self, conn: ConnectionStatus) -> String {
        let (label, style) = if conn.connected {
            ("connected", Style::new().green())
        } else {
            ("disconnected", Style::new().dimmed())
        };
        format!("sync: {} ({})", self.paint(label, style), conn.mode)
    }

    fn paint(&self, text: &str, style: Style) -> String {
        if self.color {
            text.style(style).to_string()
        } else {
            text.to_owned()
        }
    }

    fn json<T: Serialize + ?Sized>(&self, data: &T) -> Result<String, CliError> {
        let rendered = if self.format == OutputFormat::JsonCompact {
            serde_json::to_string(data)?
        } else {
            serde_json::to_string_pretty(data)?
        };
        Ok(rendered)
    }
}

fn state_style(state: CommandState) -> Style {
    match state {
        CommandState::Completed => Style::new().green().bold(),
        CommandState::Failed | CommandState::Timeout => Style::new().red().bold(),
        CommandState::Interrupted => Style::new().yellow().bold(),
        CommandState::Executing => Style::new().cyan(),
        CommandState::Idle => Style::new().dimmed(),
    }
}

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}
