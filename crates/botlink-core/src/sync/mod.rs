// ── Status synchronization ──
//
// Push-first, poll-fallback delivery of command status. The coordinator
// actor owns both transports and is the only place state changes; the
// transports' background tasks report back through `SyncMessage`.

mod coordinator;
mod poller;
mod push;
mod tasks;

use std::sync::Arc;

use arc_swap::ArcSwap;
use botlink_api::{ApiClient, CommandStatus};
use serde::Serialize;
use strum::Display;
use tokio::sync::oneshot;

pub use coordinator::SyncCoordinator;

/// The API client shared by the coordinator and the submitter. Swapped
/// atomically when the session is reconfigured.
pub type SharedClient = Arc<ArcSwap<ApiClient>>;

// ── Consumer-facing types ────────────────────────────────────────────

/// Which transport is delivering status, as seen by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TransportMode {
    Push,
    Poll,
    Disconnected,
}

/// Health of the sync layer itself (not of any command).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub mode: TransportMode,
}

impl ConnectionStatus {
    pub const DISCONNECTED: Self = Self {
        connected: false,
        mode: TransportMode::Disconnected,
    };
}

/// Internal coordinator mode. `Reconnecting` is reported to consumers as
/// a disconnected push transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SyncMode {
    Disconnected,
    Push,
    Reconnecting,
    Poll,
}

/// Everything the sync core tells its consumer.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Latest observed status for the tracked command.
    StatusUpdate(CommandStatus),
    /// The sync layer's connectivity or transport changed.
    ConnectionChanged(ConnectionStatus),
    /// A failure worth showing the user. Never fatal.
    Error(String),
    /// A soft, transient notice (e.g. busy-retry in progress).
    Notice(String),
}

// ── Actor protocol ───────────────────────────────────────────────────

/// What the push connection task observed.
#[derive(Debug)]
pub(crate) enum PushSignal {
    Opened,
    Status(CommandStatus),
    Malformed(String),
    Failed(String),
}

/// Messages consumed by the coordinator actor.
///
/// Background-task messages carry the epoch of the transport instance
/// that produced them; anything from an older epoch is dropped.
pub(crate) enum SyncMessage {
    Connect,
    Disconnect {
        done: oneshot::Sender<()>,
    },
    SetRequestId(Option<String>),
    Reconfigure {
        client: ApiClient,
        done: oneshot::Sender<()>,
    },
    Push {
        epoch: u64,
        signal: PushSignal,
    },
    ReconnectDue {
        epoch: u64,
    },
    PollTick {
        epoch: u64,
    },
    PollResult {
        epoch: u64,
        request_id: String,
        result: Result<CommandStatus, botlink_api::Error>,
    },
}
