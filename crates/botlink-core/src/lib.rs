// botlink-core: Command submission and push/poll status sync between botlink-api and consumers.

pub mod backoff;
pub mod config;
pub mod error;
pub mod session;
pub mod submit;
pub mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use backoff::{ReconnectSchedule, SubmitBackoff};
pub use config::{ClientConfig, SessionConfig, SubmitPolicy, SyncConfig};
pub use error::CoreError;
pub use session::Session;
pub use submit::{CommandSubmitter, RetryState, SubmitOutcome};
pub use sync::{ConnectionStatus, SharedClient, SyncCoordinator, SyncEvent, SyncMode, TransportMode};

// Wire types consumers see in events and results.
pub use botlink_api::{CommandRequest, CommandState, CommandStatus, HealthStatus};
