// ── Push transport (SSE) ──
//
// Owns the lifecycle of a single `/events` connection and the count of
// consecutive failures. The coordinator decides what a failure means;
// this type only reports whether the threshold was reached.

use std::time::Duration;

use botlink_api::ApiClient;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use super::tasks::TaskArena;
use super::{PushSignal, SyncMessage};
use crate::backoff::ReconnectSchedule;

/// What the coordinator should do after a push failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailureAction {
    /// Try again after the given delay.
    Retry(Duration),
    /// Threshold reached: stop using push.
    Abandon,
}

pub(crate) struct TransportChannel {
    arena: TaskArena,
    epoch: u64,
    open: bool,
    failures: u32,
    threshold: u32,
    schedule: ReconnectSchedule,
}

impl TransportChannel {
    pub(crate) fn new(schedule: ReconnectSchedule, threshold: u32) -> Self {
        Self {
            arena: TaskArena::new(),
            epoch: 0,
            open: false,
            failures: 0,
            threshold: threshold.max(1),
            schedule,
        }
    }

    /// Open the stream unless a connection is already open or opening.
    pub(crate) fn connect(&mut self, client: ApiClient, tx: &mpsc::UnboundedSender<SyncMessage>) {
        if self.open {
            trace!("push transport already open");
            return;
        }
        // A pending reconnect timer is superseded by this attempt.
        self.arena.cancel_all();
        self.open = true;

        let epoch = self.epoch;
        let tx = tx.clone();
        debug!(epoch, "opening push transport");
        self.arena.spawn(run_stream(client, epoch, tx));
    }

    /// Close the stream and cancel any reconnect timer. Idempotent.
    pub(crate) fn disconnect(&mut self) {
        self.arena.cancel_all();
        self.open = false;
        self.epoch += 1;
    }

    /// Whether a message tagged `epoch` came from the live instance.
    pub(crate) fn accepts(&self, epoch: u64) -> bool {
        self.open && epoch == self.epoch
    }

    /// Whether a reconnect timer tagged `epoch` is still current.
    pub(crate) fn reconnect_due(&self, epoch: u64) -> bool {
        !self.open && epoch == self.epoch
    }

    pub(crate) fn record_open(&mut self) {
        if self.failures > 0 {
            info!(after_failures = self.failures, "push transport recovered");
        }
        self.failures = 0;
    }

    /// Count a failure of the live connection and decide what comes next.
    pub(crate) fn record_failure(&mut self) -> FailureAction {
        self.disconnect();
        self.failures += 1;

        if self.failures >= self.threshold {
            FailureAction::Abandon
        } else {
            FailureAction::Retry(self.schedule.delay(self.failures - 1))
        }
    }

    /// Arm a timer that asks the coordinator to reconnect after `delay`.
    pub(crate) fn schedule_reconnect(
        &mut self,
        delay: Duration,
        tx: &mpsc::UnboundedSender<SyncMessage>,
    ) {
        let epoch = self.epoch;
        let tx = tx.clone();
        self.arena.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(SyncMessage::ReconnectDue { epoch });
        });
    }

    pub(crate) fn failures(&self) -> u32 {
        self.failures
    }

    /// Forget past failures (fresh start after reconfiguration).
    pub(crate) fn reset_failures(&mut self) {
        self.failures = 0;
    }
}

/// Connect, then forward every event until the stream fails or ends.
async fn run_stream(client: ApiClient, epoch: u64, tx: mpsc::UnboundedSender<SyncMessage>) {
    let send = |signal| tx.send(SyncMessage::Push { epoch, signal }).is_ok();

    let mut stream = match client.open_event_stream().await {
        Ok(stream) => stream,
        Err(e) => {
            send(PushSignal::Failed(e.to_string()));
            return;
        }
    };

    if !send(PushSignal::Opened) {
        return;
    }

    loop {
        let signal = match stream.next().await {
            Some(Ok(event)) => match event.command_update() {
                Some(Ok(status)) => PushSignal::Status(status),
                Some(Err(e)) => PushSignal::Malformed(e.to_string()),
                None => {
                    trace!(event = %event.event, "ignoring non-status event");
                    continue;
                }
            },
            Some(Err(e)) => {
                send(PushSignal::Failed(e.to_string()));
                return;
            }
            None => {
                send(PushSignal::Failed(
                    botlink_api::Error::StreamClosed.to_string(),
                ));
                return;
            }
        };

        if !send(signal) {
            return;
        }
    }
}
