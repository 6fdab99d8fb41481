//! Probe limits and numeric bounds.
//!
//! Every window has an explicit capacity and every failure an explicit cost.

/// Penalty added to the measured delta of a failed probe, in milliseconds.
///
/// Failures skew latency upward instead of being silently excluded.
pub const FAILURE_PENALTY_MS: u64 = 60_000;

/// Capacity of a per-partition latency window: only the most recent probe.
pub const PARTITION_WINDOW_CAPACITY: u32 = 1;

/// Upper bound on any sliding window capacity.
///
/// A cluster with more locally-assigned partitions than this is still probed,
/// the global window just keeps the most recent `WINDOW_CAPACITY_MAX` samples.
pub const WINDOW_CAPACITY_MAX: u32 = 1_048_576;

/// Scope tag used for cluster-wide metrics.
pub const SCOPE_ALL: &str = "all";

/// Returns the latency recorded for a probe.
///
/// Successful probes record the raw delta; failed probes record the delta
/// plus [`FAILURE_PENALTY_MS`].
#[inline]
#[must_use]
pub const fn elapsed_with_penalty(elapsed_ms: u64, failed: bool) -> u64 {
    if failed {
        elapsed_ms.saturating_add(FAILURE_PENALTY_MS)
    } else {
        elapsed_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_records_raw_delta() {
        assert_eq!(elapsed_with_penalty(17, false), 17);
    }

    #[test]
    fn test_failure_adds_penalty() {
        assert_eq!(elapsed_with_penalty(0, true), 60_000);
        assert_eq!(elapsed_with_penalty(250, true), 60_250);
    }

    #[test]
    fn test_penalty_saturates() {
        assert_eq!(elapsed_with_penalty(u64::MAX, true), u64::MAX);
    }
}
