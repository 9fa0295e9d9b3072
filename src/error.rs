pub type Result<T> = std::result::Result<T, AxonError>;

/// Failures the communicator can surface to the caller.
///
/// Violations of the runtime's stated invariants (sending to an out-of-range
/// rank, re-entering the dispatcher, calling `barrier` under the interrupt
/// mask, dereferencing a foreign anchor) are programming errors in a
/// bulk-synchronous job and panic instead of returning a variant: every rank
/// would fail the same way and there is nothing to recover.
#[derive(Debug, thiserror::Error)]
pub enum AxonError {
    #[error("transport channel closed: peer endpoints dropped")]
    TransportClosed,

    #[error("argument encode failed: {0}")]
    EncodeFailed(String),

    #[error("argument decode failed: {0}")]
    DecodeFailed(String),

    #[error("control message decode failed: {0}")]
    ControlDecodeFailed(String),

    #[error("malformed record: {0}")]
    MalformedRecord(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
