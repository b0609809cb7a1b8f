//! Periodic sampling of device-exposed capture statistics.

use std::fmt;

/// Immutable read of the device's live counters at one instant.
///
/// Snapshots have no lifecycle of their own; each one is re-derived from the
/// device counters at the moment of sampling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatisticsSnapshot {
    /// Frames delivered per second.
    pub frames_per_second: f64,
    /// Requests the device finished with an error.
    pub error_count: u64,
    /// Average seconds spent capturing one frame.
    pub capture_time_s: f64,
}

impl fmt::Display for StatisticsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FramesPerSecond: {:.2}, ErrorCount: {}, CaptureTime_s: {:.4}",
            self.frames_per_second, self.error_count, self.capture_time_s
        )
    }
}

/// Decides when a statistics snapshot is owed and reports it.
///
/// Sampling is a pure reporting side effect driven by the engine's counter of
/// successful completions; failed completions and wait timeouts never advance
/// the cadence.
#[derive(Debug, Clone, Copy)]
pub struct StatisticsSampler {
    interval: u64,
}

impl StatisticsSampler {
    /// Sample every `interval` successful completions. An interval of zero
    /// disables sampling.
    #[must_use]
    pub const fn new(interval: u64) -> Self {
        Self { interval }
    }

    /// `true` when `completed` successful completions call for a snapshot.
    #[must_use]
    pub const fn due(&self, completed: u64) -> bool {
        self.interval > 0 && completed > 0 && completed % self.interval == 0
    }

    /// Emit one snapshot as an info-level report.
    pub fn emit(&self, completed: u64, snapshot: &StatisticsSnapshot) {
        debug_assert!(self.due(completed), "snapshot emitted off cadence");
        log::info!("{completed}: {snapshot}");
    }
}
