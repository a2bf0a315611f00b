//! Error taxonomy for mailbox operations.
//!
//! Every I/O failure is wrapped with enough context (operation, folder) to
//! diagnose without protocol traces. Connection failures are fatal and never
//! retried; verification failures are distinct from protocol failures because
//! every reported command succeeded.

/// Result type alias for mailbox operations.
pub type Result<T> = std::result::Result<T, MailError>;

/// Errors that can occur while operating on a mailbox.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// Dial, TLS handshake, or login failure.
    #[error("connection failed: {0}")]
    Connection(String),

    /// A command the server rejected, wrapped with operation context.
    #[error("{operation} failed{}: {message}", folder.as_ref().map(|f| format!(" in {f}")).unwrap_or_default())]
    Protocol {
        /// The protocol operation that failed (e.g. "UID MOVE").
        operation: String,
        /// The folder being operated on, if any.
        folder: Option<String>,
        /// The underlying error text.
        message: String,
    },

    /// A post-move check found messages still present in the source folder,
    /// even though every move command reported success.
    #[error("{} messages still present in {folder} after move (uids {uids:?})", uids.len())]
    Verification {
        /// The source folder that was verified.
        folder: String,
        /// The UIDs still present after the move.
        uids: Vec<u32>,
    },

    /// One or more concurrent move batches failed. Every batch error is
    /// retained, not just the first observed.
    #[error("{} of {total} move batches failed: {}", errors.len(), errors.join("; "))]
    BatchFailed {
        /// Total number of batches launched.
        total: usize,
        /// One error message per failed batch.
        errors: Vec<String>,
    },

    /// Invalid configuration: unknown account, unparsable date, and similar
    /// problems surfaced before any I/O.
    #[error("configuration error: {0}")]
    Config(String),

    /// Contradictory or malformed search options.
    #[error("invalid search: {0}")]
    InvalidSearch(String),

    /// The caller-supplied cancellation token fired mid-operation.
    #[error("operation cancelled")]
    Cancelled,
}

impl MailError {
    /// Wraps a protocol-level failure with its operation and folder context.
    pub fn protocol(
        operation: impl Into<String>,
        folder: Option<&str>,
        err: impl std::fmt::Display,
    ) -> Self {
        Self::Protocol {
            operation: operation.into(),
            folder: folder.map(str::to_owned),
            message: err.to_string(),
        }
    }
}
