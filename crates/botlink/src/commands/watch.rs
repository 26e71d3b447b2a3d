//! `watch`: print every sync event until Ctrl-C.

use botlink_core::Session;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;
use crate::output::{self, Renderer};

pub async fn handle(session: &Session, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let renderer = Renderer::new(global.output, global.color);
    let interrupt = super::interrupt_token();

    let mut events = session.subscribe();
    if let Some(request_id) = args.request_id {
        session.track_request(request_id);
    }
    session.connect();

    loop {
        let event = tokio::select! {
            biased;
            () = interrupt.cancelled() => break,
            event = events.recv() => event,
        };
        match event {
            Ok(event) => output::print_output(&renderer.event(&event)?, global.quiet),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "missed sync events"),
            Err(RecvError::Closed) => break,
        }
    }

    session.disconnect().await;
    Ok(())
}
