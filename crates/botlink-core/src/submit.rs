// ── Command submission ──
//
// Submits prompts and absorbs "busy" (409) rejections with capped
// exponential backoff. An accepted request id is handed to the sync
// coordinator, which from then on tracks it on whichever transport is live.

use std::time::Duration;

use botlink_api::CommandRequest;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::millis;
use crate::config::SubmitPolicy;
use crate::error::CoreError;
use crate::sync::{SharedClient, SyncCoordinator, SyncEvent};

/// Busy-retry bookkeeping for one logical submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Busy responses seen so far.
    pub attempt: u32,
    /// Delay chosen after the most recent busy response.
    pub next_delay: Option<Duration>,
}

impl RetryState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Result of a single submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The device took the command.
    Accepted(String),
    /// The device is busy; try again after `retry_in`.
    Busy { retry_in: Duration, attempt: u32 },
}

/// Submits commands and drives busy-retry.
#[derive(Clone)]
pub struct CommandSubmitter {
    client: SharedClient,
    coordinator: SyncCoordinator,
    policy: SubmitPolicy,
}

impl CommandSubmitter {
    pub fn new(client: SharedClient, coordinator: SyncCoordinator, policy: SubmitPolicy) -> Self {
        Self {
            client,
            coordinator,
            policy,
        }
    }

    pub fn policy(&self) -> &SubmitPolicy {
        &self.policy
    }

    /// One POST, no waiting.
    ///
    /// On acceptance the id becomes the coordinator's tracked request and
    /// `state` resets. On 409 `state` advances and a busy notice is
    /// published. Anything else resets `state`, publishes an error, and
    /// is returned as-is; those failures are never retried.
    pub async fn submit_once(
        &self,
        request: &CommandRequest,
        state: &mut RetryState,
    ) -> Result<SubmitOutcome, CoreError> {
        let client = self.client.load_full();

        match client.submit_command(request).await {
            Ok(accepted) => {
                info!(request_id = %accepted.request_id, "command accepted");
                state.reset();
                self.coordinator
                    .set_request_id(Some(accepted.request_id.clone()));
                Ok(SubmitOutcome::Accepted(accepted.request_id))
            }
            Err(e) if e.is_busy() => {
                let delay = self.policy.backoff.delay(state.attempt);
                state.attempt += 1;
                state.next_delay = Some(delay);

                debug!(attempt = state.attempt, delay_ms = millis(delay), "device busy");
                self.coordinator.notify(SyncEvent::Notice(format!(
                    "System busy, retrying in {} ms",
                    millis(delay)
                )));
                Ok(SubmitOutcome::Busy {
                    retry_in: delay,
                    attempt: state.attempt,
                })
            }
            Err(e) => {
                state.reset();
                warn!(error = %e, "command submission failed");
                let err = submission_error(e);
                self.coordinator.notify(SyncEvent::Error(err.to_string()));
                Err(err)
            }
        }
    }

    /// Submit, retrying on busy until accepted or the policy budget runs
    /// out. Returns the accepted request id.
    pub async fn submit(&self, request: &CommandRequest) -> Result<String, CoreError> {
        self.submit_cancellable(request, &CancellationToken::new())
            .await
    }

    /// Like [`submit()`](Self::submit), but abandons any pending retry as
    /// soon as `cancel` fires.
    pub async fn submit_cancellable(
        &self,
        request: &CommandRequest,
        cancel: &CancellationToken,
    ) -> Result<String, CoreError> {
        let mut state = RetryState::default();
        let mut waited = Duration::ZERO;

        loop {
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(CoreError::Cancelled),
                result = self.submit_once(request, &mut state) => result?,
            };

            let (retry_in, attempt) = match outcome {
                SubmitOutcome::Accepted(request_id) => return Ok(request_id),
                SubmitOutcome::Busy { retry_in, attempt } => (retry_in, attempt),
            };

            if attempt >= self.policy.max_attempts || waited + retry_in > self.policy.max_wait {
                warn!(
                    attempts = attempt,
                    waited_ms = millis(waited),
                    "giving up on busy device"
                );
                let err = CoreError::Busy { attempts: attempt };
                self.coordinator.notify(SyncEvent::Error(err.to_string()));
                return Err(err);
            }
            waited += retry_in;

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(attempt, "busy retry cancelled");
                    return Err(CoreError::Cancelled);
                }
                () = tokio::time::sleep(retry_in) => {}
            }
        }
    }
}

/// Server failures surface as a generic message; the response body only
/// reaches the log. 400 keeps its server message as a rejection.
fn submission_error(err: botlink_api::Error) -> CoreError {
    match CoreError::from(err) {
        CoreError::Api {
            status: Some(status),
            ..
        } => CoreError::SubmissionFailed {
            message: format!("HTTP {status}"),
        },
        CoreError::Api { status: None, .. } => CoreError::SubmissionFailed {
            message: "unexpected response from device".into(),
        },
        other => other,
    }
}
