//! Error types for the synchronization engine.
//!
//! # Design
//! One enum for the whole crate, with a variant per failure class the spec
//! of the remote service forces callers to distinguish. `Auth` is fatal
//! (credential rejected, reconfigure), `Connectivity` is transient (retry
//! next cycle), `PartialCreate` gets a dedicated variant because the remote
//! create is two-phase without rollback — an orphaned shell record exists
//! and the caller must be able to see that rather than a generic failure.

use std::fmt;

use uuid::Uuid;

/// Errors returned by the client, coordinator and mutation paths.
#[derive(Debug)]
pub enum Error {
    /// The credential was rejected — the current-user response did not
    /// contain a username.
    Auth,

    /// Timeout or transport-level failure. The remote was never reached or
    /// never answered; callers should treat this as "not ready, retry".
    Connectivity(String),

    /// The remote answered a read with a non-success status.
    Fetch { status: u16, body: String },

    /// A refresh cycle (or a mutation's backing fetch) failed; the previous
    /// snapshot is still in place.
    UpdateFailed(String),

    /// The caller supplied an unsupported or ambiguous field combination.
    Validation(String),

    /// The entry shell was created remotely but populating its fields
    /// failed. No compensating delete is attempted; the bare record remains
    /// on the remote side until reconciled manually.
    PartialCreate { uuid: Uuid, reason: String },

    /// The request payload could not be serialized to JSON.
    Serialization(String),

    /// A successful response body could not be deserialized into the
    /// expected shape.
    Deserialization(String),
}

impl Error {
    /// Whether retrying the same operation later can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Connectivity(_) | Error::Fetch { .. } | Error::UpdateFailed(_)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Auth => write!(f, "authentication rejected by the remote service"),
            Error::Connectivity(msg) => write!(f, "connectivity failure: {msg}"),
            Error::Fetch { status, body } => write!(f, "HTTP {status}: {body}"),
            Error::UpdateFailed(msg) => write!(f, "update failed: {msg}"),
            Error::Validation(msg) => write!(f, "invalid request: {msg}"),
            Error::PartialCreate { uuid, reason } => {
                write!(f, "entry {uuid} created but not populated: {reason}")
            }
            Error::Serialization(msg) => write!(f, "serialization failed: {msg}"),
            Error::Deserialization(msg) => write!(f, "deserialization failed: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_failures_are_retryable() {
        assert!(Error::Connectivity("timeout".to_string()).is_retryable());
        assert!(Error::Fetch { status: 500, body: String::new() }.is_retryable());
        assert!(Error::UpdateFailed("list gone".to_string()).is_retryable());
    }

    #[test]
    fn fatal_failures_are_not_retryable() {
        assert!(!Error::Auth.is_retryable());
        assert!(!Error::Validation("two fields".to_string()).is_retryable());
        assert!(!Error::PartialCreate {
            uuid: Uuid::nil(),
            reason: "update failed".to_string(),
        }
        .is_retryable());
    }
}
