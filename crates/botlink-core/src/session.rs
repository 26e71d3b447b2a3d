// ── Session ──
//
// Composition root: one API client shared by the submitter and the sync
// coordinator. Consumers (CLI, UI) hold a `Session` and never touch the
// transports directly.

use std::sync::Arc;

use arc_swap::ArcSwap;
use botlink_api::{ApiClient, CommandRequest, CommandStatus, HealthStatus};
use secrecy::SecretString;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::info;
use url::Url;

use crate::config::{ClientConfig, SessionConfig};
use crate::error::CoreError;
use crate::submit::CommandSubmitter;
use crate::sync::{ConnectionStatus, SharedClient, SyncCoordinator, SyncEvent, SyncMode};

pub struct Session {
    client_config: Mutex<ClientConfig>,
    client: SharedClient,
    coordinator: SyncCoordinator,
    submitter: CommandSubmitter,
}

impl Session {
    /// Build the client and spawn the coordinator. Does NOT connect;
    /// call [`connect()`](Self::connect) to start receiving status.
    pub fn new(config: SessionConfig) -> Result<Self, CoreError> {
        let api = config.client.build_client()?;
        let client: SharedClient = Arc::new(ArcSwap::from_pointee(api));
        let coordinator = SyncCoordinator::new(Arc::clone(&client), config.sync);
        let submitter =
            CommandSubmitter::new(Arc::clone(&client), coordinator.clone(), config.submit);

        Ok(Self {
            client_config: Mutex::new(config.client),
            client,
            coordinator,
            submitter,
        })
    }

    // ── Sync lifecycle ───────────────────────────────────────────

    pub fn connect(&self) {
        self.coordinator.connect();
    }

    pub async fn disconnect(&self) {
        self.coordinator.disconnect().await;
    }

    /// Point the session at a different device (or token). Both
    /// transports are torn down and rebuilt; push is tried first again.
    ///
    /// If the new client cannot be built the session keeps its old one.
    pub async fn update_configuration(
        &self,
        base_url: Url,
        token: Option<SecretString>,
    ) -> Result<(), CoreError> {
        let mut current = self.client_config.lock().await;
        let mut next = current.clone();
        next.base_url = base_url;
        next.token = token;

        let api = next.build_client()?;
        info!(base_url = %next.base_url, "session reconfigured");
        *current = next;
        drop(current);

        self.coordinator.reconfigure(api).await;
        Ok(())
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Submit a prompt, retrying while the device is busy. Returns the
    /// accepted request id, which is now tracked.
    pub async fn submit_command(&self, prompt: impl Into<String>) -> Result<String, CoreError> {
        self.submitter.submit(&CommandRequest::new(prompt)).await
    }

    pub async fn submit_request(&self, request: &CommandRequest) -> Result<String, CoreError> {
        self.submitter.submit(request).await
    }

    pub async fn submit_cancellable(
        &self,
        request: &CommandRequest,
        cancel: &CancellationToken,
    ) -> Result<String, CoreError> {
        self.submitter.submit_cancellable(request, cancel).await
    }

    /// Follow `request_id` without submitting anything (e.g. a command
    /// issued by another client).
    pub fn track_request(&self, request_id: impl Into<String>) {
        self.coordinator.set_request_id(Some(request_id.into()));
    }

    /// Stop following the current request.
    pub fn clear_request(&self) {
        self.coordinator.set_request_id(None);
    }

    /// One-shot status fetch, independent of the sync transports.
    pub async fn command_status(&self, request_id: &str) -> Result<CommandStatus, CoreError> {
        let client = self.client.load_full();
        Ok(client.command_status(request_id).await?)
    }

    pub async fn health(&self) -> Result<HealthStatus, CoreError> {
        let client = self.client.load_full();
        Ok(client.health().await?)
    }

    // ── Observation ──────────────────────────────────────────────

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.coordinator.subscribe()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.coordinator.connection_status()
    }

    pub fn mode(&self) -> SyncMode {
        self.coordinator.mode()
    }

    pub fn client(&self) -> Arc<ApiClient> {
        self.client.load_full()
    }

    pub fn coordinator(&self) -> &SyncCoordinator {
        &self.coordinator
    }

    pub fn submitter(&self) -> &CommandSubmitter {
        &self.submitter
    }
}
