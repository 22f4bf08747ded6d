//! Error types for the plugkit workspace.
//!
//! A single enum serves every crate: all stream operations flow through
//! the `Pcm` trait object in `pk_pcm`, which needs one error type at the
//! seam.

/// A specialized [`Result`] type for PCM adaptation operations.
pub type Result<T> = std::result::Result<T, PcmError>;

/// Errors produced by PCM adaptation operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PcmError {
    /// A configuration tree was malformed or contained unknown fields.
    #[error("invalid configuration: {0}")]
    BadConfig(String),

    /// No parameter combination satisfies both sides of a constraint.
    #[error("no value satisfies the requested constraints")]
    Unsatisfiable,

    /// An argument was out of range or the call does not apply here.
    #[error("invalid argument")]
    BadArgument,

    /// A collaborator failed to allocate resources.
    #[error("out of memory")]
    NoMemory,

    /// The operation is specified but not implemented for this topology.
    #[error("operation not implemented")]
    Unimplemented,

    /// Ganged slave streams diverged; the stream must be re-prepared.
    #[error("slave streams diverged")]
    StreamBroken,

    /// The stream state cannot serve the requested operation.
    #[error("operation invalid in the current stream state")]
    BadState,

    /// An error reported by an underlying device.
    #[error("device error: {0}")]
    Device(String),
}

impl PcmError {
    /// The negative `errno`-style code for this error, for callers that
    /// speak the C convention at the boundary.
    pub const fn errno(&self) -> i32 {
        match self {
            PcmError::BadConfig(_) | PcmError::Unsatisfiable | PcmError::BadArgument => -22,
            PcmError::NoMemory => -12,
            PcmError::Unimplemented | PcmError::Device(_) => -5,
            PcmError::StreamBroken => -32,
            PcmError::BadState => -77,
        }
    }
}
