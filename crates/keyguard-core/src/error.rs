//! Error types shared by the mediator and its collaborators.

use thiserror::Error;

/// Why a caller request was rejected without any state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectReason {
    /// The device has not completed setup.
    #[error("device is not provisioned")]
    NotProvisioned,

    /// Verify-unlock only applies while an external caller has disabled the
    /// keyguard.
    #[error("keyguard is not externally disabled")]
    NotExternallyDisabled,

    /// Another verify-unlock request is outstanding.
    #[error("a verify-unlock request is already in progress")]
    VerifyInProgress,
}

/// Failure reported by a downstream collaborator.
///
/// The mediator logs and swallows these; the state transition that caused the
/// call has already been committed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    /// A remote call failed.
    #[error("remote call failed: {0}")]
    Remote(String),

    /// The collaborator is not available (not bound yet, or gone).
    #[error("{0} is unavailable")]
    Unavailable(&'static str),
}
