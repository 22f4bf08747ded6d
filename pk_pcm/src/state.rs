//! Stream state and status reporting.

/// Runtime state of a PCM stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum State {
    /// Opened, no configuration installed.
    #[default]
    Open,
    /// Hardware configuration installed.
    Setup,
    /// Ready for transfer.
    Prepared,
    /// Transferring.
    Running,
    /// Overrun/underrun, or a broken gang; needs prepare.
    Xrun,
    /// Stopping after pending frames play out.
    Draining,
    /// Paused by the application.
    Paused,
    /// Hardware is suspended.
    Suspended,
    /// Hardware went away.
    Disconnected,
}

/// Snapshot of a stream's state and fill level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Status {
    /// State at the time of the call.
    pub state: State,
    /// Frames between application and hardware position.
    pub delay: i64,
    /// Frames available for transfer.
    pub avail: u64,
    /// Largest `avail` seen since the last status call.
    pub avail_max: u64,
}
