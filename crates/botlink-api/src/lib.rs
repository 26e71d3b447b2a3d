// botlink-api: Async Rust client for the command/status HTTP API.

pub mod client;
pub mod error;
pub mod models;
pub mod sse;
pub mod transport;

pub use client::ApiClient;
pub use error::Error;
pub use models::{CommandAccepted, CommandRequest, CommandState, CommandStatus, HealthStatus};
pub use sse::{COMMAND_UPDATE_EVENT, EventStream, SseDecoder, SseEvent};
pub use transport::TransportConfig;
