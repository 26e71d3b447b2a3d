// ── Backoff schedules ──
//
// Two independent schedules: a fixed, jitter-free table for transport
// reconnection, and a capped exponential with jitter for command
// resubmission after a busy response.

use std::time::Duration;

const RECONNECT_STEPS_MS: [u64; 5] = [500, 1_000, 2_000, 4_000, 8_000];

/// Deterministic reconnection delays, clamped at the last step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectSchedule {
    steps: Vec<Duration>,
}

impl Default for ReconnectSchedule {
    fn default() -> Self {
        Self {
            steps: RECONNECT_STEPS_MS
                .iter()
                .copied()
                .map(Duration::from_millis)
                .collect(),
        }
    }
}

impl ReconnectSchedule {
    /// A custom table. An empty table means "retry immediately".
    pub fn new(steps: Vec<Duration>) -> Self {
        Self { steps }
    }

    /// Delay before reconnection attempt `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let idx = usize::try_from(attempt).unwrap_or(usize::MAX);
        self.steps
            .get(idx)
            .or_else(|| self.steps.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    pub fn steps(&self) -> &[Duration] {
        &self.steps
    }
}

/// Exponential backoff for busy (HTTP 409) resubmission.
///
/// `delay = min(base * 2^attempt, ceiling) + jitter`, where jitter is a
/// uniformly random share (up to `jitter_ratio`) of the capped delay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubmitBackoff {
    base_ms: u64,
    ceiling_ms: u64,
    jitter_ratio: f64,
}

impl Default for SubmitBackoff {
    fn default() -> Self {
        Self::new(500, 2_000, 0.25)
    }
}

impl SubmitBackoff {
    pub fn new(base_ms: u64, ceiling_ms: u64, jitter_ratio: f64) -> Self {
        Self {
            base_ms,
            ceiling_ms,
            jitter_ratio: jitter_ratio.clamp(0.0, 1.0),
        }
    }

    /// The capped delay for `attempt`, without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let shift = attempt.min(20);
        let multiplier = 1_u64 << shift;
        let bounded = self
            .base_ms
            .saturating_mul(multiplier)
            .min(self.ceiling_ms);
        Duration::from_millis(bounded)
    }

    /// The capped delay plus `fraction` (in `[0, 1]`) of the jitter band.
    pub fn delay_with_jitter(&self, attempt: u32, fraction: f64) -> Duration {
        let base = self.base_delay(attempt);
        base + base.mul_f64(self.jitter_ratio * fraction.clamp(0.0, 1.0))
    }

    /// The capped delay plus random jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with_jitter(attempt, random_fraction())
    }
}

/// Whole milliseconds in `d`, saturating. For log fields.
pub(crate) fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Uniform value in `[0, 1)` drawn from the v4 UUID generator.
fn random_fraction() -> f64 {
    let bytes = uuid::Uuid::new_v4().into_bytes();
    let n = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    f64::from(n) / (f64::from(u32::MAX) + 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ms(values: &[u64]) -> Vec<Duration> {
        values.iter().copied().map(Duration::from_millis).collect()
    }

    #[test]
    fn reconnect_schedule_clamps_at_last_step() {
        let schedule = ReconnectSchedule::default();
        let delays: Vec<Duration> = (0..7).map(|a| schedule.delay(a)).collect();
        assert_eq!(
            delays,
            ms(&[500, 1_000, 2_000, 4_000, 8_000, 8_000, 8_000])
        );
    }

    #[test]
    fn reconnect_schedule_handles_huge_attempts() {
        let schedule = ReconnectSchedule::default();
        assert_eq!(schedule.delay(u32::MAX), Duration::from_millis(8_000));
    }

    #[test]
    fn empty_reconnect_schedule_retries_immediately() {
        assert_eq!(ReconnectSchedule::new(Vec::new()).delay(3), Duration::ZERO);
    }

    #[test]
    fn submit_backoff_doubles_then_caps() {
        let backoff = SubmitBackoff::default();
        assert_eq!(backoff.base_delay(0), Duration::from_millis(500));
        assert_eq!(backoff.base_delay(1), Duration::from_millis(1_000));
        for attempt in 2..40 {
            assert_eq!(backoff.base_delay(attempt), Duration::from_millis(2_000));
        }
    }

    #[test]
    fn submit_jitter_stays_in_band() {
        let backoff = SubmitBackoff::default();
        assert_eq!(backoff.delay_with_jitter(0, 0.0), Duration::from_millis(500));
        assert_eq!(backoff.delay_with_jitter(0, 1.0), Duration::from_millis(625));
        assert_eq!(backoff.delay_with_jitter(5, 0.5), Duration::from_millis(2_250));

        for attempt in 0..6 {
            let base = backoff.base_delay(attempt);
            let jittered = backoff.delay(attempt);
            assert!(jittered >= base, "{jittered:?} < {base:?}");
            assert!(jittered <= base.mul_f64(1.25), "{jittered:?} above band");
        }
    }

    #[test]
    fn random_fraction_is_unit_interval() {
        for _ in 0..1_000 {
            let f = random_fraction();
            assert!((0.0..1.0).contains(&f));
        }
    }
}
