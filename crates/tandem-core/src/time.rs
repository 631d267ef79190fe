//! Simulation-time arithmetic shared by agents and the coupling.
//!
//! Local clocks advance by repeated addition of a fixed timestep, so
//! comparisons against checkpoint times must tolerate accumulated
//! floating-point error. [`times_close`] is the single tolerance used
//! everywhere a clock is reconciled against a checkpoint.

use crate::error::TimeError;

/// Relative tolerance for clock/checkpoint comparisons.
const TIME_RTOL: f64 = 1e-9;

/// Absolute floor for comparisons near zero.
const TIME_ATOL: f64 = 1e-12;

/// Whether two simulation times are equal within tolerance.
pub fn times_close(a: f64, b: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= TIME_ATOL.max(TIME_RTOL * scale)
}

/// Check that a timestep is usable: finite and strictly positive.
pub fn validate_timestep(dt: f64) -> Result<(), TimeError> {
    if !dt.is_finite() || dt <= 0.0 {
        return Err(TimeError::InvalidTimestep { value: dt });
    }
    Ok(())
}

/// Number of whole steps of `dt` needed to move a clock from `current`
/// to exactly `target`.
///
/// Returns `None` when `target` lies behind `current` or is not an
/// integral number of steps away (within [`times_close`] tolerance) —
/// the caller reports that as a time-reconciliation failure rather than
/// silently overshooting.
pub fn steps_to_reach(current: f64, target: f64, dt: f64) -> Option<u64> {
    if times_close(current, target) {
        return Some(0);
    }
    if target < current {
        return None;
    }
    let n = ((target - current) / dt).round();
    if n < 1.0 || !times_close(current + n * dt, target) {
        return None;
    }
    Some(n as u64)
}
