// ── Poll transport (fallback) ──
//
// A repeating timer plus at most one in-flight status request for the
// single tracked id. Results are routed back through the coordinator,
// which hands them to `on_result` for filtering.

use std::time::Duration;

use botlink_api::{ApiClient, CommandStatus};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use super::SyncMessage;
use super::tasks::TaskArena;
use crate::backoff::millis;

/// What a poll response means for the consumer.
#[derive(Debug)]
pub(crate) enum PollOutcome {
    /// Deliver this status.
    Status(CommandStatus),
    /// Surface this failure; keep polling.
    Failed(botlink_api::Error),
    /// Nothing to report (404, stale epoch, superseded id).
    Ignored,
}

pub(crate) struct StatusPoller {
    arena: TaskArena,
    epoch: u64,
    interval: Duration,
    tracked: Option<String>,
    running: bool,
    in_flight: bool,
}

impl StatusPoller {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            arena: TaskArena::new(),
            epoch: 0,
            interval,
            tracked: None,
            running: false,
            in_flight: false,
        }
    }

    /// Track `request_id` (if given) and start the timer unless it is
    /// already running.
    pub(crate) fn start(
        &mut self,
        request_id: Option<String>,
        tx: &mpsc::UnboundedSender<SyncMessage>,
    ) {
        if request_id.is_some() {
            self.tracked = request_id;
        }
        if self.running {
            return;
        }
        self.running = true;

        let epoch = self.epoch;
        let period = self.interval;
        let tx = tx.clone();
        debug!(epoch, period_ms = millis(period), "starting status poller");

        self.arena.spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if tx.send(SyncMessage::PollTick { epoch }).is_err() {
                    break;
                }
            }
        });
    }

    /// Cancel the timer and any in-flight request. Idempotent.
    pub(crate) fn stop(&mut self) {
        if self.running {
            debug!(epoch = self.epoch, "stopping status poller");
        }
        self.arena.cancel_all();
        self.running = false;
        self.in_flight = false;
        self.epoch += 1;
    }

    /// Replace the tracked id. A response for the previous id that is
    /// still in flight will be ignored on arrival.
    pub(crate) fn set_request_id(&mut self, request_id: Option<String>) {
        self.tracked = request_id;
    }

    pub(crate) fn tracked(&self) -> Option<&str> {
        self.tracked.as_deref()
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        self.running
    }

    /// Timer tick: fetch status for the tracked id if nothing is pending.
    pub(crate) fn tick(
        &mut self,
        epoch: u64,
        client: ApiClient,
        tx: &mpsc::UnboundedSender<SyncMessage>,
    ) {
        if !self.running || epoch != self.epoch {
            return;
        }
        let Some(request_id) = self.tracked.clone() else {
            return;
        };
        if self.in_flight {
            trace!(%request_id, "previous poll still in flight");
            return;
        }
        self.in_flight = true;

        let tx = tx.clone();
        self.arena.spawn(async move {
            let result = client.command_status(&request_id).await;
            let _ = tx.send(SyncMessage::PollResult {
                epoch,
                request_id,
                result,
            });
        });
    }

    /// Filter a poll response. Terminal statuses stop tracking their id.
    pub(crate) fn on_result(
        &mut self,
        epoch: u64,
        request_id: &str,
        result: Result<CommandStatus, botlink_api::Error>,
    ) -> PollOutcome {
        if epoch != self.epoch {
            trace!(%request_id, "dropping poll result from stopped poller");
            return PollOutcome::Ignored;
        }
        self.in_flight = false;

        if self.tracked.as_deref() != Some(request_id) {
            debug!(%request_id, "dropping poll result for superseded id");
            return PollOutcome::Ignored;
        }

        match result {
            Ok(status) => {
                if status.is_terminal() {
                    debug!(%request_id, state = %status.state, "terminal status, tracking stopped");
                    self.tracked = None;
                }
                PollOutcome::Status(status)
            }
            Err(e) if e.is_not_found() => {
                trace!(%request_id, "status not found yet");
                PollOutcome::Ignored
            }
            Err(e) => PollOutcome::Failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use botlink_api::CommandState;

    use super::*;

    fn status(id: &str, state: CommandState) -> CommandStatus {
        CommandStatus {
            request_id: id.into(),
            state,
            phase: None,
            confidence: None,
            message: String::new(),
            elapsed_ms: None,
        }
    }

    #[test]
    fn terminal_result_stops_tracking() {
        let mut poller = StatusPoller::new(Duration::from_millis(500));
        poller.set_request_id(Some("r2".into()));

        let outcome = poller.on_result(0, "r2", Ok(status("r2", CommandState::Executing)));
        assert!(matches!(outcome, PollOutcome::Status(_)));
        assert_eq!(poller.tracked(), Some("r2"));

        let outcome = poller.on_result(0, "r2", Ok(status("r2", CommandState::Failed)));
        assert!(matches!(outcome, PollOutcome::Status(_)));
        assert_eq!(poller.tracked(), None);
    }

    #[test]
    fn superseded_id_is_ignored() {
        let mut poller = StatusPoller::new(Duration::from_millis(500));
        poller.set_request_id(Some("a".into()));
        poller.set_request_id(Some("b".into()));

        let outcome = poller.on_result(0, "a", Ok(status("a", CommandState::Executing)));
        assert!(matches!(outcome, PollOutcome::Ignored));
        assert_eq!(poller.tracked(), Some("b"));
    }

    #[test]
    fn not_found_is_silent_but_other_errors_surface() {
        let mut poller = StatusPoller::new(Duration::from_millis(500));
        poller.set_request_id(Some("r1".into()));

        let not_found = botlink_api::Error::NotFound {
            request_id: "r1".into(),
        };
        assert!(matches!(
            poller.on_result(0, "r1", Err(not_found)),
            PollOutcome::Ignored
        ));

        let server = botlink_api::Error::Server {
            status: 502,
            message: "bad gateway".into(),
        };
        assert!(matches!(
            poller.on_result(0, "r1", Err(server)),
            PollOutcome::Failed(_)
        ));
        assert_eq!(poller.tracked(), Some("r1"));
    }

    #[test]
    fn results_after_stop_are_dropped() {
        let mut poller = StatusPoller::new(Duration::from_millis(500));
        poller.set_request_id(Some("r1".into()));
        poller.stop();
        poller.stop();

        let outcome = poller.on_result(0, "r1", Ok(status("r1", CommandState::Completed)));
        assert!(matches!(outcome, PollOutcome::Ignored));
        assert!(!poller.is_running());
    }
}
