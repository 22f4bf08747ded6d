//! Software transfer parameters.

/// Software parameters fanned out to slave streams.
///
/// These steer transfer-time behavior only; nothing here changes the
/// hardware configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwParams {
    /// Minimum frames available before a transfer wakes up.
    pub avail_min: u64,
    /// Fill level at which an implicit start happens.
    pub start_threshold: u64,
    /// Fill level past which the stream stops with an xrun.
    pub stop_threshold: u64,
    /// Wake the poller on every period boundary.
    pub period_event: bool,
}

impl Default for SwParams {
    fn default() -> Self {
        Self {
            avail_min: 1,
            start_threshold: 1,
            stop_threshold: u64::MAX,
            period_event: false,
        }
    }
}
