//! `send`: submit a command, then follow it to a terminal state.

use std::time::Duration;

use botlink_core::{CommandRequest, CommandState, CommandStatus, Session, SyncEvent};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cli::{GlobalOpts, SendArgs};
use crate::error::CliError;
use crate::output::{self, Renderer};

pub async fn handle(session: &Session, args: SendArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let renderer = Renderer::new(global.output, global.color);
    let request = build_request(args.prompt, args.options.as_deref())?;
    let interrupt = super::interrupt_token();

    let mut events = session.subscribe();
    if !args.no_wait {
        session.connect();
    }

    // Busy notices arrive while submission retries, and a fast device may
    // report status before the request id is returned.
    let mut early = Vec::new();
    let submit = session.submit_cancellable(&request, &interrupt);
    tokio::pin!(submit);
    let request_id = loop {
        tokio::select! {
            result = &mut submit => break result?,
            event = events.recv() => match event {
                Ok(SyncEvent::Notice(message)) => notice(&message, global.quiet),
                Ok(SyncEvent::StatusUpdate(status)) => early.push(status),
                _ => {}
            },
        }
    };

    if args.no_wait {
        output::print_output(&renderer.request_id(&request_id)?, global.quiet);
        return Ok(());
    }
    notice(&format!("submitted {request_id}"), global.quiet);

    let follow = follow(&mut events, &request_id, early, renderer, global.quiet, &interrupt);
    let outcome = match args.wait_timeout {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), follow)
            .await
            .unwrap_or(Err(CliError::Timeout)),
        None => follow.await,
    };
    session.disconnect().await;

    let last = outcome?;
    match last.state {
        CommandState::Completed => Ok(()),
        state => Err(CliError::CommandFailed {
            request_id,
            state,
            message: last.message,
        }),
    }
}

fn build_request(prompt: String, options: Option<&str>) -> Result<CommandRequest, CliError> {
    let request = CommandRequest::new(prompt);
    let Some(raw) = options else {
        return Ok(request);
    };

    let options: serde_json::Value = serde_json::from_str(raw)?;
    if !options.is_object() {
        return Err(CliError::Validation {
            field: "options".into(),
            reason: "expected a JSON object".into(),
        });
    }
    Ok(request.with_options(options))
}

/// Print updates for `request_id` until one is terminal.
async fn follow(
    events: &mut broadcast::Receiver<SyncEvent>,
    request_id: &str,
    early: Vec<CommandStatus>,
    renderer: Renderer,
    quiet: bool,
    interrupt: &CancellationToken,
) -> Result<CommandStatus, CliError> {
    for status in early {
        if status.request_id == request_id {
            output::print_output(&renderer.status(&status)?, quiet);
            if status.is_terminal() {
                return Ok(status);
            }
        }
    }

    loop {
        let event = tokio::select! {
            biased;
            () = interrupt.cancelled() => return Err(CliError::Interrupted),
            event = events.recv() => event,
        };

        match event {
            Ok(SyncEvent::StatusUpdate(status)) if status.request_id == request_id => {
                output::print_output(&renderer.status(&status)?, quiet);
                if status.is_terminal() {
                    return Ok(status);
                }
            }
            Ok(SyncEvent::StatusUpdate(status)) => {
                debug!(request_id = %status.request_id, "ignoring update for another request");
            }
            Ok(SyncEvent::ConnectionChanged(conn)) => {
                debug!(connected = conn.connected, mode = %conn.mode, "sync connection changed");
            }
            Ok(SyncEvent::Notice(message)) => notice(&message, quiet),
            Ok(SyncEvent::Error(message)) => warn!("{message}"),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "missed sync events"),
            Err(RecvError::Closed) => {
                return Err(CliError::ApiError {
                    code: "internal".into(),
                    message: "sync coordinator stopped".into(),
                });
            }
        }
    }
}

fn notice(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{message}");
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn options_must_be_an_object() {
        let request = build_request("wave".into(), Some(r#"{"speed":"slow"}"#)).unwrap();
        assert_eq!(request.options.unwrap()["speed"], "slow");

        let err = build_request("wave".into(), Some("[1,2]")).unwrap_err();
        assert!(matches!(err, CliError::Validation { ref field, .. } if field == "options"));

        let err = build_request("wave".into(), Some("{oops")).unwrap_err();
        assert!(matches!(err, CliError::Json(_)));
    }

    #[test]
    fn no_options_leaves_request_bare() {
        assert!(build_request("wave".into(), None).unwrap().options.is_none());
    }
}
