//! Elapsed-time progress estimation.
//!
//! fio exposes no live progress hook, so progress is derived from wall
//! clock against the pattern's expected duration. This is cosmetic output
//! for polling UIs; the hard execution ceiling lives in the runner and is
//! entirely independent of these numbers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Point-in-time progress estimate for a running benchmark.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    /// 0..=99 while the run is alive. 100 is only ever reported by a
    /// terminal record, never by the estimator.
    pub percent: u8,
    pub phase: &'static str,
    pub elapsed_seconds: u64,
    pub remaining_seconds: u64,
    /// Synthesized instantaneous throughput figure for UI feedback.
    pub live_bw_estimate_kibps: f64,
    /// Always true: these numbers are derived, not measured.
    pub estimated: bool,
}

/// Compute a progress estimate.
///
/// Percent is monotonic in `now` for a fixed `started_at` and never
/// reaches 100. The live bandwidth figure ramps in over the first seconds
/// and then wobbles smoothly around `nominal_bw_kibps`; it is a plausible
/// reading, not a measurement, and is deterministic in the inputs.
pub fn estimate(
    started_at: DateTime<Utc>,
    now: DateTime<Utc>,
    estimated_duration: Duration,
    nominal_bw_kibps: f64,
) -> ProgressSnapshot {
    let elapsed = now
        .signed_duration_since(started_at)
        .num_seconds()
        .max(0) as u64;
    let total = estimated_duration.as_secs().max(1);

    let percent = ((elapsed * 100) / total).min(99) as u8;
    let phase = phase_for(percent);
    let remaining = total.saturating_sub(elapsed);

    let ramp = (elapsed as f64 / 10.0).min(1.0);
    let wobble = 0.93 + 0.07 * (elapsed as f64 / 7.0).sin();
    let live_bw_estimate_kibps = nominal_bw_kibps * ramp * wobble;

    ProgressSnapshot {
        percent,
        phase,
        elapsed_seconds: elapsed,
        remaining_seconds: remaining,
        live_bw_estimate_kibps,
        estimated: true,
    }
}

fn phase_for(percent: u8) -> &'static str {
    match percent {
        0..=4 => "initializing",
        5..=24 => "warming up",
        25..=89 => "main test",
        _ => "finalizing",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_percent_is_monotonic_and_never_hits_100() {
        let duration = Duration::from_secs(100);
        let mut last = 0;
        for s in 0..500 {
            let now = t0() + chrono::Duration::seconds(s);
            let snap = estimate(t0(), now, duration, 1000.0);
            assert!(snap.percent >= last, "percent decreased at {}s", s);
            assert!(snap.percent < 100, "percent hit 100 at {}s", s);
            last = snap.percent;
        }
        assert_eq!(last, 99);
    }

    #[test]
    fn test_phase_progression() {
        let duration = Duration::from_secs(100);
        let phase_at = |s: i64| {
            estimate(t0(), t0() + chrono::Duration::seconds(s), duration, 1000.0).phase
        };
        assert_eq!(phase_at(0), "initializing");
        assert_eq!(phase_at(10), "warming up");
        assert_eq!(phase_at(50), "main test");
        assert_eq!(phase_at(95), "finalizing");
    }

    #[test]
    fn test_clock_skew_clamps_to_zero() {
        let now = t0() - chrono::Duration::seconds(30);
        let snap = estimate(t0(), now, Duration::from_secs(100), 1000.0);
        assert_eq!(snap.percent, 0);
        assert_eq!(snap.elapsed_seconds, 0);
    }

    #[test]
    fn test_live_estimate_is_deterministic_and_bounded() {
        let now = t0() + chrono::Duration::seconds(42);
        let a = estimate(t0(), now, Duration::from_secs(100), 2000.0);
        let b = estimate(t0(), now, Duration::from_secs(100), 2000.0);
        assert_eq!(a, b);
        assert!(a.live_bw_estimate_kibps > 0.0);
        assert!(a.live_bw_estimate_kibps <= 2000.0);
    }

    #[test]
    fn test_zero_duration_does_not_divide_by_zero() {
        let snap = estimate(t0(), t0(), Duration::from_secs(0), 1000.0);
        assert!(snap.percent <= 99);
    }
}
