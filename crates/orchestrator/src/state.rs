//! Batch progress counters and the progress reporter

use serde::Serialize;
use std::time::{Duration, Instant};
use target_pipeline::ProcessingStatus;
use tracing::info;

/// Counters for one batch run.
///
/// Owned by the driver and changed only through the `on_*` callbacks it
/// calls as tasks are dispatched and collected.
#[derive(Debug, Clone, Default)]
pub struct BatchState {
    total: usize,
    skipped: usize,
    in_flight: usize,
    succeeded: usize,
    degraded: usize,
    failed: usize,
    retries: usize,
    lost: usize,
}

impl BatchState {
    /// State for `total` unique targets
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub(crate) fn on_skipped(&mut self) {
        self.skipped += 1;
    }

    pub(crate) fn on_dispatch(&mut self) {
        self.in_flight += 1;
    }

    pub(crate) fn on_success(&mut self, status: ProcessingStatus) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.succeeded += 1;
        if status != ProcessingStatus::Success {
            self.degraded += 1;
        }
    }

    pub(crate) fn on_failure(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.failed += 1;
    }

    /// A task will be dispatched again; it stays outstanding
    pub(crate) fn on_retry(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.retries += 1;
    }

    /// A task vanished without a result; its target stays pending
    pub(crate) fn on_lost(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.lost += 1;
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    /// Succeeded with at least one degraded domain
    pub fn degraded(&self) -> usize {
        self.degraded
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn retries(&self) -> usize {
        self.retries
    }

    pub fn lost(&self) -> usize {
        self.lost
    }

    /// Targets settled in this run
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed + self.lost
    }

    /// Targets still to settle in this run
    pub fn remaining(&self) -> usize {
        self.total
            .saturating_sub(self.skipped)
            .saturating_sub(self.processed())
    }
}

/// Final outcome of a batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub skipped: usize,
    pub succeeded: usize,
    pub degraded: usize,
    pub failed: usize,
    pub lost: usize,
    pub retries: usize,
    pub elapsed_secs: f64,
}

impl BatchSummary {
    pub(crate) fn from_state(state: &BatchState, elapsed: Duration) -> Self {
        Self {
            total: state.total,
            skipped: state.skipped,
            succeeded: state.succeeded,
            degraded: state.degraded,
            failed: state.failed,
            lost: state.lost,
            retries: state.retries,
            elapsed_secs: elapsed.as_secs_f64(),
        }
    }

    /// Fraction of targets processed in this run that succeeded (1.0 when
    /// nothing needed processing)
    pub fn success_fraction(&self) -> f64 {
        let processed = self.succeeded + self.failed + self.lost;
        if processed == 0 {
            1.0
        } else {
            self.succeeded as f64 / processed as f64
        }
    }

    /// Nothing failed or went missing
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.lost == 0
    }
}

/// Periodic throughput and ETA logging
pub struct ProgressReporter {
    started: Instant,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Settled targets per second so far
    pub fn rate(&self, state: &BatchState) -> f64 {
        let secs = self.started.elapsed().as_secs_f64();
        if secs > 0.0 {
            state.processed() as f64 / secs
        } else {
            0.0
        }
    }

    /// Estimated time to finish at the current rate
    pub fn eta(&self, state: &BatchState) -> Option<Duration> {
        let rate = self.rate(state);
        (rate > 0.0).then(|| Duration::from_secs_f64(state.remaining() as f64 / rate))
    }

    /// Log one progress line
    pub fn report(&self, state: &BatchState) {
        let eta = self
            .eta(state)
            .map(format_duration)
            .unwrap_or_else(|| "unknown".to_string());
        let success_rate = if state.processed() > 0 {
            100.0 * state.succeeded() as f64 / state.processed() as f64
        } else {
            0.0
        };
        info!(
            "Progress: {}/{} settled ({} skipped, {} in flight), {:.1}% success, {:.2} targets/s, ETA {}",
            state.processed() + state.skipped(),
            state.total(),
            state.skipped(),
            state.in_flight(),
            success_rate,
            self.rate(state),
            eta
        );
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}h{:02}m{:02}s", secs / 3600, (secs / 60) % 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_callbacks() {
        let mut state = BatchState::new(5);
        state.on_skipped();
        for _ in 0..4 {
            state.on_dispatch();
        }
        state.on_success(ProcessingStatus::Success);
        state.on_success(ProcessingStatus::SearchTimeout);
        state.on_retry();
        state.on_failure();

        assert_eq!(state.in_flight(), 0);
        assert_eq!(state.succeeded(), 2);
        assert_eq!(state.degraded(), 1);
        assert_eq!(state.failed(), 1);
        assert_eq!(state.retries(), 1);
        assert_eq!(state.remaining(), 1);
    }

    #[test]
    fn test_success_fraction() {
        let mut state = BatchState::new(4);
        assert_eq!(
            BatchSummary::from_state(&state, Duration::ZERO).success_fraction(),
            1.0
        );
        state.on_dispatch();
        state.on_success(ProcessingStatus::Success);
        state.on_dispatch();
        state.on_success(ProcessingStatus::Success);
        state.on_dispatch();
        state.on_success(ProcessingStatus::Success);
        state.on_dispatch();
        state.on_failure();
        let summary = BatchSummary::from_state(&state, Duration::from_secs(2));
        assert!((summary.success_fraction() - 0.75).abs() < 1e-12);
        assert!(!summary.all_succeeded());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h02m05s");
    }
}
