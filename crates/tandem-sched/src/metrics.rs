//! Per-round scheduling metrics.
//!
//! [`RoundMetrics`] captures timing and dispatch data for a single
//! round. The scheduler populates it after each `run_round()`;
//! consumers (telemetry, coupling diagnostics) read it from the round
//! report or from the scheduler's most recent round.

/// Timing and dispatch metrics collected during a single round.
///
/// All durations are in microseconds.
#[derive(Clone, Debug, Default)]
pub struct RoundMetrics {
    /// Wall-clock time for the entire round, in microseconds.
    pub total_us: u64,
    /// Per-action execution times: `(name, microseconds)`, in
    /// completion order.
    pub action_us: Vec<(String, u64)>,
    /// Number of actions dispatched this round.
    pub dispatched: u64,
    /// Peak number of actions in flight at once.
    pub max_in_flight: u64,
    /// Cumulative number of aborted rounds since the scheduler was
    /// built.
    pub aborted_rounds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = RoundMetrics::default();
        assert_eq!(m.total_us, 0);
        assert!(m.action_us.is_empty());
        assert_eq!(m.dispatched, 0);
        assert_eq!(m.max_in_flight, 0);
        assert_eq!(m.aborted_rounds, 0);
    }
}
