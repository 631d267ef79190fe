//! Scheduler configuration.

/// Tuning knobs for [`DdgScheduler`](crate::DdgScheduler).
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Maximum number of actions in flight at once. Zero means
    /// unbounded (every ready action dispatches immediately).
    pub max_concurrency: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { max_concurrency: 1 }
    }
}

impl SchedulerConfig {
    /// Sequential execution: one action in flight at a time.
    pub fn sequential() -> Self {
        Self { max_concurrency: 1 }
    }

    /// Concurrent execution bounded by `n` (0 = unbounded).
    pub fn concurrent(n: usize) -> Self {
        Self { max_concurrency: n }
    }

    /// Worker pool size for a round over `actions` actions.
    ///
    /// Unbounded configs get one worker per action; bounded configs get
    /// the bound, clamped so a degenerate bound still yields a usable
    /// pool.
    pub(crate) fn worker_count(&self, actions: usize) -> usize {
        let n = if self.max_concurrency == 0 {
            actions
        } else {
            self.max_concurrency.min(actions)
        };
        n.clamp(1, 64)
    }
}
