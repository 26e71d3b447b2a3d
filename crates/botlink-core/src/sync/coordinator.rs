// ── Sync coordinator ──
//
// A cheap cloneable handle in front of a single actor task. The actor owns
// both transports, the tracked request id, and the mode state machine:
//
//   disconnected ──connect──▶ push ──error──▶ reconnecting ──ok──▶ push
//                                                  │
//                                     threshold reached
//                                                  ▼
//                                                poll
//
// Every state change happens inside `SyncActor::handle`, one message at a
// time. Consumers observe the result through a broadcast of `SyncEvent`
// and two `watch` channels (mode and connection status).

use std::collections::VecDeque;
use std::sync::Arc;

use botlink_api::{ApiClient, CommandStatus};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::poller::{PollOutcome, StatusPoller};
use super::push::{FailureAction, TransportChannel};
use super::{
    ConnectionStatus, PushSignal, SharedClient, SyncEvent, SyncMessage, SyncMode, TransportMode,
};
use crate::backoff::millis;
use crate::config::SyncConfig;

const EVENT_CHANNEL_SIZE: usize = 256;
const RETIRED_ID_CAPACITY: usize = 64;

// ── SyncCoordinator ──────────────────────────────────────────────

/// Handle to the status synchronization actor.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`. The actor stops when the
/// last handle is dropped.
#[derive(Clone)]
pub struct SyncCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    tx: mpsc::UnboundedSender<SyncMessage>,
    client: SharedClient,
    events: broadcast::Sender<SyncEvent>,
    mode: watch::Receiver<SyncMode>,
    connection: watch::Receiver<ConnectionStatus>,
    cancel: CancellationToken,
}

impl Drop for CoordinatorInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl SyncCoordinator {
    /// Spawn the actor. Starts `disconnected`; call
    /// [`connect()`](Self::connect) to begin receiving status.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(client: SharedClient, config: SyncConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (mode_tx, mode) = watch::channel(SyncMode::Disconnected);
        let (connection_tx, connection) = watch::channel(ConnectionStatus::DISCONNECTED);
        let cancel = CancellationToken::new();

        let actor = SyncActor {
            client: Arc::clone(&client),
            push: TransportChannel::new(config.reconnect.clone(), config.failure_threshold),
            poller: StatusPoller::new(config.poll_interval),
            config,
            mode: SyncMode::Disconnected,
            push_abandoned: false,
            tracked: None,
            last_delivered: None,
            retired: RetiredIds::new(RETIRED_ID_CAPACITY),
            tx: tx.clone(),
            events: events.clone(),
            mode_tx,
            connection_tx,
        };
        tokio::spawn(actor.run(rx, cancel.clone()));

        Self {
            inner: Arc::new(CoordinatorInner {
                tx,
                client,
                events,
                mode,
                connection,
                cancel,
            }),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Start delivering status. Push first when enabled, otherwise poll.
    /// No-op unless currently disconnected.
    pub fn connect(&self) {
        self.send(SyncMessage::Connect);
    }

    /// Stop both transports and drop anything still in flight.
    /// Safe to call repeatedly.
    pub async fn disconnect(&self) {
        let (done, rx) = oneshot::channel();
        if self.inner.tx.send(SyncMessage::Disconnect { done }).is_ok() {
            let _ = rx.await;
        }
    }

    /// Point the coordinator at a new API client and restart from scratch:
    /// failure counters reset and push is preferred again.
    pub async fn reconfigure(&self, client: ApiClient) {
        let (done, rx) = oneshot::channel();
        if self
            .inner
            .tx
            .send(SyncMessage::Reconfigure { client, done })
            .is_ok()
        {
            let _ = rx.await;
        }
    }

    /// Track `request_id`, superseding any previously tracked id.
    pub fn set_request_id(&self, request_id: Option<String>) {
        self.send(SyncMessage::SetRequestId(request_id));
    }

    // ── Observation ──────────────────────────────────────────────

    /// Subscribe to status updates, connectivity changes, and notices.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    pub fn mode(&self) -> SyncMode {
        *self.inner.mode.borrow()
    }

    pub fn watch_mode(&self) -> watch::Receiver<SyncMode> {
        self.inner.mode.clone()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        *self.inner.connection.borrow()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.connection.clone()
    }

    /// The API client currently in use.
    pub fn client(&self) -> Arc<ApiClient> {
        self.inner.client.load_full()
    }

    /// Publish an event on the consumer channel from outside the actor
    /// (submission notices and errors).
    pub(crate) fn notify(&self, event: SyncEvent) {
        let _ = self.inner.events.send(event);
    }

    fn send(&self, msg: SyncMessage) {
        if self.inner.tx.send(msg).is_err() {
            debug!("sync coordinator already stopped");
        }
    }
}

// ── Actor ────────────────────────────────────────────────────────

struct SyncActor {
    client: SharedClient,
    config: SyncConfig,
    push: TransportChannel,
    poller: StatusPoller,
    mode: SyncMode,
    /// Set once the failure threshold is hit; cleared only by a teardown.
    push_abandoned: bool,
    tracked: Option<String>,
    /// Most recent status handed to consumers; unchanged repeats are dropped.
    last_delivered: Option<CommandStatus>,
    retired: RetiredIds,
    tx: mpsc::UnboundedSender<SyncMessage>,
    events: broadcast::Sender<SyncEvent>,
    mode_tx: watch::Sender<SyncMode>,
    connection_tx: watch::Sender<ConnectionStatus>,
}

impl SyncActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SyncMessage>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                msg = rx.recv() => {
                    let Some(msg) = msg else { break };
                    self.handle(msg);
                }
            }
        }

        self.teardown();
        debug!("sync coordinator exiting");
    }

    fn handle(&mut self, msg: SyncMessage) {
        match msg {
            SyncMessage::Connect => self.connect(),
            SyncMessage::Disconnect { done } => {
                self.teardown();
                let _ = done.send(());
            }
            SyncMessage::SetRequestId(request_id) => self.set_request_id(request_id),
            SyncMessage::Reconfigure { client, done } => {
                self.reconfigure(client);
                let _ = done.send(());
            }
            SyncMessage::Push { epoch, signal } => self.on_push(epoch, signal),
            SyncMessage::ReconnectDue { epoch } => self.on_reconnect_due(epoch),
            SyncMessage::PollTick { epoch } => {
                let client = self.current_client();
                self.poller.tick(epoch, client, &self.tx);
            }
            SyncMessage::PollResult {
                epoch,
                request_id,
                result,
            } => self.on_poll_result(epoch, &request_id, result),
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    fn connect(&mut self) {
        if self.mode != SyncMode::Disconnected {
            trace!(mode = %self.mode, "connect ignored, already active");
            return;
        }

        if self.config.push_enabled && !self.push_abandoned {
            info!(base_url = %self.client.load().base_url(), "connecting push transport");
            self.set_mode(SyncMode::Push);
            self.set_connection(false, TransportMode::Push);
            let client = self.current_client();
            self.push.connect(client, &self.tx);
        } else {
            self.enter_poll();
        }
    }

    fn teardown(&mut self) {
        self.push.disconnect();
        self.push.reset_failures();
        self.poller.stop();
        self.push_abandoned = false;
        self.set_mode(SyncMode::Disconnected);
        self.set_connection(false, TransportMode::Disconnected);
    }

    fn reconfigure(&mut self, client: ApiClient) {
        info!(base_url = %client.base_url(), "reconfiguring sync transport");
        self.teardown();
        self.client.store(Arc::new(client));
        self.connect();
    }

    fn enter_poll(&mut self) {
        self.push.disconnect();
        self.set_mode(SyncMode::Poll);
        self.poller.start(None, &self.tx);
        self.set_connection(true, TransportMode::Poll);
    }

    fn set_request_id(&mut self, request_id: Option<String>) {
        if self.tracked == request_id {
            return;
        }
        if let Some(previous) = self.tracked.take() {
            self.retired.insert(previous);
        }
        // A re-tracked id is live again, even after a terminal status.
        if let Some(ref id) = request_id {
            self.retired.remove(id);
        }
        self.last_delivered = None;
        debug!(request_id = ?request_id, mode = %self.mode, "tracking request");
        self.poller.set_request_id(request_id.clone());
        self.tracked = request_id;
    }

    // ── Push events ──────────────────────────────────────────────

    fn on_push(&mut self, epoch: u64, signal: PushSignal) {
        if !self.push.accepts(epoch) {
            trace!(epoch, "dropping stale push signal");
            return;
        }

        match signal {
            PushSignal::Opened => {
                self.push.record_open();
                info!("push transport connected");
                self.set_mode(SyncMode::Push);
                self.set_connection(true, TransportMode::Push);
            }
            PushSignal::Status(status) => self.deliver(status),
            PushSignal::Malformed(reason) => {
                warn!(%reason, "malformed status event");
                self.emit(SyncEvent::Error(format!("Malformed status event: {reason}")));
            }
            PushSignal::Failed(reason) => self.on_push_failure(&reason),
        }
    }

    fn on_push_failure(&mut self, reason: &str) {
        let action = self.push.record_failure();
        let failures = self.push.failures();
        warn!(%reason, failures, "push transport failed");
        self.set_connection(false, TransportMode::Push);

        match action {
            FailureAction::Retry(delay) => {
                info!(delay_ms = millis(delay), attempt = failures, "scheduling push reconnect");
                self.set_mode(SyncMode::Reconnecting);
                self.push.schedule_reconnect(delay, &self.tx);
            }
            FailureAction::Abandon => {
                warn!(failures, "push transport unavailable, falling back to polling");
                self.push_abandoned = true;
                self.enter_poll();
            }
        }
    }

    fn on_reconnect_due(&mut self, epoch: u64) {
        if self.mode != SyncMode::Reconnecting || !self.push.reconnect_due(epoch) {
            trace!(epoch, "dropping stale reconnect timer");
            return;
        }
        debug!("reconnecting push transport");
        let client = self.current_client();
        self.push.connect(client, &self.tx);
    }

    // ── Poll events ──────────────────────────────────────────────

    fn on_poll_result(
        &mut self,
        epoch: u64,
        request_id: &str,
        result: Result<CommandStatus, botlink_api::Error>,
    ) {
        match self.poller.on_result(epoch, request_id, result) {
            PollOutcome::Status(status) => {
                self.set_connection(true, TransportMode::Poll);
                self.deliver(status);
            }
            PollOutcome::Failed(e) => {
                warn!(%request_id, error = %e, "status poll failed");
                self.set_connection(false, TransportMode::Poll);
                self.emit(SyncEvent::Error(format!("Status poll failed: {e}")));
            }
            PollOutcome::Ignored => {}
        }
    }

    // ── Normalization ────────────────────────────────────────────

    /// Single exit for status from either transport.
    ///
    /// Drops updates for ids that already reached a terminal state or were
    /// superseded by a newer `set_request_id`, and repeats of the status
    /// delivered last (push replays, unchanged poll results). Otherwise the
    /// latest observed status wins; no reordering is attempted.
    fn deliver(&mut self, status: CommandStatus) {
        if self.retired.contains(&status.request_id) {
            debug!(
                request_id = %status.request_id,
                state = %status.state,
                "dropping update for retired request"
            );
            return;
        }
        if self
            .last_delivered
            .as_ref()
            .is_some_and(|last| last.same_progress(&status))
        {
            trace!(request_id = %status.request_id, state = %status.state, "status unchanged");
            return;
        }

        if status.is_terminal() {
            let id = status.request_id.as_str();
            info!(request_id = %id, state = %status.state, "command finished");
            self.retired.insert(id.to_owned());
            if self.tracked.as_deref() == Some(id) {
                self.tracked = None;
            }
            if self.poller.tracked() == Some(id) {
                self.poller.set_request_id(None);
            }
        }

        self.last_delivered = Some(status.clone());
        self.emit(SyncEvent::StatusUpdate(status));
    }

    // ── Helpers ──────────────────────────────────────────────────

    fn current_client(&self) -> ApiClient {
        ApiClient::clone(&self.client.load())
    }

    fn set_mode(&mut self, mode: SyncMode) {
        if self.mode != mode {
            debug!(from = %self.mode, to = %mode, "sync mode changed");
            self.mode = mode;
            self.mode_tx.send_replace(mode);
        }
    }

    fn set_connection(&mut self, connected: bool, mode: TransportMode) {
        let status = ConnectionStatus { connected, mode };
        if *self.connection_tx.borrow() == status {
            return;
        }
        self.connection_tx.send_replace(status);
        self.emit(SyncEvent::ConnectionChanged(status));
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

// ── Retired ids ──────────────────────────────────────────────────

/// Bounded FIFO set of ids whose updates must no longer reach consumers.
struct RetiredIds {
    ids: VecDeque<String>,
    capacity: usize,
}

impl RetiredIds {
    fn new(capacity: usize) -> Self {
        Self {
            ids: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn insert(&mut self, id: String) {
        if self.contains(&id) {
            return;
        }
        if self.ids.len() == self.capacity {
            self.ids.pop_front();
        }
        self.ids.push_back(id);
    }

    fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|r| r == id)
    }

    fn remove(&mut self, id: &str) {
        self.ids.retain(|r| r != id);
    }
}
