//! `status`: one-shot status fetch for a request id.

use botlink_core::Session;

use crate::cli::{GlobalOpts, StatusArgs};
use crate::error::CliError;
use crate::output::{self, Renderer};

pub async fn handle(session: &Session, args: StatusArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let status = session.command_status(&args.request_id).await?;
    let renderer = Renderer::new(global.output, global.color);
    output::print_output(&renderer.status(&status)?, global.quiet);
    Ok(())
}
