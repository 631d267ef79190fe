//! Temporal interpolation between agents advancing at different rates.
//!
//! A producer agent posts checkpoint samples of a linked attribute into
//! a [`SampleSeries`]; an [`Interpolate`] action registered in the
//! consumer's scheduler produces the value at the consumer's current
//! sub-step time by linear interpolation (or extrapolation when the
//! target time falls outside the recorded range).

use std::sync::{Arc, Mutex};

use tandem_core::{ActionError, AttrRef, AttrValue};

use crate::action::Action;
use crate::context::RoundContext;

/// A time-ordered series of attribute samples from one producer.
#[derive(Clone, Debug, Default)]
pub struct SampleSeries {
    times: Vec<f64>,
    values: Vec<AttrValue>,
}

impl SampleSeries {
    /// Create an empty series.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sample at `time`, keeping the series time-ordered.
    ///
    /// A re-post at an already-recorded time replaces the earlier
    /// sample (a producer re-running a checkpoint after a retried round
    /// must not duplicate it).
    pub fn push(&mut self, time: f64, value: AttrValue) {
        for (i, &t) in self.times.iter().enumerate() {
            if tandem_core::times_close(t, time) {
                self.values[i] = value;
                return;
            }
            if time < t {
                self.times.insert(i, time);
                self.values.insert(i, value);
                return;
            }
        }
        self.times.push(time);
        self.values.push(value);
    }

    /// Number of recorded samples.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Whether no samples have been recorded.
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Value at `time` by piecewise-linear interpolation.
    ///
    /// Outside the recorded range the first (or last) two samples are
    /// extrapolated linearly; a single-sample series is constant.
    /// Deterministic: identical series and time give bit-identical
    /// output.
    pub fn value_at(&self, time: f64) -> Result<AttrValue, ActionError> {
        if self.times.is_empty() {
            return Err(ActionError::Failed {
                reason: "no samples recorded".into(),
            });
        }
        if self.times.len() == 1 {
            return Ok(self.values[0].clone());
        }

        // Pick the bracketing segment, clamping to the end segments for
        // extrapolation.
        let last = self.times.len() - 1;
        let hi = match self.times.iter().position(|&t| time <= t) {
            Some(0) => 1,
            Some(i) => i,
            None => last,
        };
        let lo = hi - 1;

        let (t0, t1) = (self.times[lo], self.times[hi]);
        let (v0, v1) = (&self.values[lo], &self.values[hi]);
        if v0.len() != v1.len() {
            return Err(ActionError::Failed {
                reason: format!(
                    "sample arity mismatch: {} components at t={t0}, {} at t={t1}",
                    v0.len(),
                    v1.len()
                ),
            });
        }

        let w = (time - t0) / (t1 - t0);
        Ok(v0
            .iter()
            .zip(v1.iter())
            .map(|(a, b)| a + w * (b - a))
            .collect())
    }
}

/// Shared handle to a [`SampleSeries`]: the producer side pushes
/// checkpoint samples, the consumer side interpolates.
pub type SeriesHandle = Arc<Mutex<SampleSeries>>;

/// Create a fresh shared series handle.
pub fn new_series() -> SeriesHandle {
    Arc::new(Mutex::new(SampleSeries::new()))
}

/// An action producing one attribute at the context's current time from
/// another agent's sample series.
///
/// Writes only its declared target attribute; reads nothing from its
/// own scheduler (its input lives outside that scheduler's attribute
/// space). Output is checked for finiteness — a NaN or infinity from a
/// degenerate extrapolation fails the action rather than propagating
/// into a solver.
#[derive(Debug)]
pub struct Interpolate {
    name: String,
    series: SeriesHandle,
    target: AttrRef,
    priority: i32,
}

impl Interpolate {
    /// Create an interpolation action writing `target` from `series`.
    pub fn new(name: impl Into<String>, series: SeriesHandle, target: AttrRef) -> Self {
        Self {
            name: name.into(),
            series,
            target,
            priority: 0,
        }
    }

    /// Override the tie-break priority (default 0).
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl Action for Interpolate {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn reads(&self) -> Vec<AttrRef> {
        Vec::new()
    }

    fn writes(&self) -> Vec<AttrRef> {
        vec![self.target.clone()]
    }

    fn run(&self, ctx: &mut RoundContext) -> Result<(), ActionError> {
        let value = {
            let series = self.series.lock().map_err(|_| ActionError::Failed {
                reason: "sample series poisoned".into(),
            })?;
            series.value_at(ctx.time())?
        };
        if value.iter().any(|v| !v.is_finite()) {
            return Err(ActionError::NonFinite {
                attr: self.target.clone(),
            });
        }
        ctx.set(self.target.clone(), value)
    }
}
