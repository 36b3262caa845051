//! Authorization error types.
//!
//! Errors are designed for layered context using rootcause:
//! - `LookupError`: failures reported by the collaborators the engine queries
//! - `AuthorizationError`: outcomes of an authorization call other than success

use crate::types::{ClientStatus, UserStatus};
use std::fmt;
use warden_core::{ClientId, UserId};

/// Errors from identity lookups (role index, assignments, directories).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// No user with this id exists.
    UserNotFound { user_id: UserId },
    /// No client with this id exists.
    ClientNotFound { client_id: ClientId },
    /// A role id list violated the ascending, duplicate-free ordering.
    InvalidRoleFilter { reason: String },
    /// The backing store could not answer.
    Unavailable { reason: String },
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserNotFound { user_id } => write!(f, "user not found: {user_id}"),
            Self::ClientNotFound { client_id } => write!(f, "client not found: {client_id}"),
            Self::InvalidRoleFilter { reason } => write!(f, "invalid role filter: {reason}"),
            Self::Unavailable { reason } => write!(f, "identity store unavailable: {reason}"),
        }
    }
}

impl std::error::Error for LookupError {}

/// Failure classes a caller can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request itself is malformed.
    InvalidInput,
    /// The principal is not in a state that allows authorization.
    InvalidOperation,
    /// Access denied.
    PermissionNotGranted,
    /// The system is broken: a collaborator failed or broke its contract.
    Internal,
}

/// Errors from authorization operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    /// The request is malformed (e.g. no required permissions).
    InvalidInput { reason: String },
    /// The user exists but is not active.
    InvalidUserStatus { user_id: UserId, status: UserStatus },
    /// The client exists but is not active.
    InvalidClientStatus {
        client_id: ClientId,
        status: ClientStatus,
    },
    /// At least one required permission is not held by the principal.
    PermissionNotGranted,
    /// A collaborator violated its subset or ordering contract, or the
    /// concurrent resolution failed.
    Internal { reason: String },
    /// A collaborator call failed (use as context wrapper).
    Collaborator { operation: &'static str },
}

impl AuthorizationError {
    /// Creates an internal error.
    pub(crate) fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    /// Returns the failure class of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::InvalidUserStatus { .. } | Self::InvalidClientStatus { .. } => {
                ErrorKind::InvalidOperation
            }
            Self::PermissionNotGranted => ErrorKind::PermissionNotGranted,
            Self::Internal { .. } | Self::Collaborator { .. } => ErrorKind::Internal,
        }
    }

    /// Returns true if the error signals a broken invariant rather than a
    /// failed lookup or a denial.
    ///
    /// The engine never stops the process itself; callers decide whether a
    /// fatal error should terminate, circuit-break or just be reported.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

impl fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput { reason } => {
                write!(f, "invalid authorization input: {reason}")
            }
            Self::InvalidUserStatus { user_id, status } => {
                write!(f, "invalid status of user {user_id} ({status})")
            }
            Self::InvalidClientStatus { client_id, status } => {
                write!(f, "invalid status of client {client_id} ({status})")
            }
            Self::PermissionNotGranted => write!(f, "permission not granted"),
            Self::Internal { reason } => write!(f, "internal authorization error: {reason}"),
            Self::Collaborator { operation } => {
                write!(f, "authorization lookup failed: {operation}")
            }
        }
    }
}

impl std::error::Error for AuthorizationError {}
