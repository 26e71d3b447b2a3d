//! `health`: probe the device API.

use botlink_core::Session;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output::{self, Renderer};

pub async fn handle(session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    let health = session.health().await?;
    let renderer = Renderer::new(global.output, global.color);
    output::print_output(&renderer.health(&health)?, global.quiet);
    Ok(())
}
