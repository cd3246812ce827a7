use thiserror::Error;

/// Error kinds shared across the SVTS workspace.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SvtsError {
    /// Rejected at the boundary; no state change took place.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Rule expression, COMTRADE header, or GOOSE PDU failed to parse.
    #[error("parse error: {0}")]
    ParseError(String),

    /// Raw sink could not be opened (missing capability/permission).
    #[error("permission denied opening sink: {0}")]
    IoPermission(String),

    /// A sink write failed with a retryable condition.
    #[error("transient I/O error: {0}")]
    IoTransient(String),

    /// The bound interface went administratively or physically down.
    #[error("interface down: {0}")]
    IfaceDown(String),

    /// A cycle/tick deadline was missed.
    #[error("deadline miss: {0}")]
    DeadlineMiss(String),

    /// An operation that expected an external event timed out.
    #[error("timeout waiting for {0}")]
    Timeout(String),

    /// A start/run was requested while already running.
    #[error("busy: {0}")]
    Busy(String),

    /// Generic fieldbus/fault-engine runtime failure.
    #[error("runtime fault: {0}")]
    Fault(String),

    /// Catch-all for unexpected internal failures.
    #[error("internal error: {0}")]
    Internal(String),

    /// Invalid state transition attempted.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Source state.
        from: String,
        /// Attempted target state.
        to: String,
    },

    /// A frame could not be transmitted because it exceeded the MTU.
    #[error("frame too large: {size} bytes (limit {limit})")]
    TooLarge {
        /// Frame size in bytes.
        size: usize,
        /// Maximum permitted size.
        limit: usize,
    },
}

/// Convenience alias for SVTS operations.
pub type SvtsResult<T> = Result<T, SvtsError>;
