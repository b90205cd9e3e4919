//! Social error types
//!
//! Every operation of the request ledger and the friendship graph reports
//! failures through [`SocialError`]. Callers branch on [`SocialError::kind`]
//! to render an accurate message ("already friends" vs "request not found").

use crate::types::{RequestId, UserRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse error category surfaced to the service layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Structurally invalid command, e.g. a self-targeted request.
    InvalidOperation,
    /// Transition blocked by existing state.
    Conflict,
    /// Referenced request, friendship or user does not exist.
    NotFound,
    /// Persistence layer could not complete the operation.
    StorageFailure,
}

/// Errors from friend request and friendship operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SocialError {
    /// Command is structurally invalid.
    #[error("invalid operation: {reason}")]
    InvalidOperation {
        /// Why the command was refused
        reason: String,
    },

    /// Transition blocked by existing state.
    #[error("{0}")]
    Conflict(ConflictReason),

    /// Referenced record does not exist.
    #[error("{0}")]
    NotFound(Missing),

    /// Backend failure, never retried here.
    #[error("storage failure: {0}")]
    StorageFailure(#[from] StorageError),
}

/// Why a transition conflicts with existing state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictReason {
    /// The pair already share a friendship edge.
    #[error("{a} and {b} are already friends")]
    AlreadyFriends {
        /// First user of the pair
        a: UserRef,
        /// Second user of the pair
        b: UserRef,
    },

    /// A pending request exists between the pair, in either direction.
    #[error("pending friend request between {a} and {b} already exists")]
    PendingRequestExists {
        /// First user of the pair
        a: UserRef,
        /// Second user of the pair
        b: UserRef,
    },
}

/// The record a command referred to but could not find.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Missing {
    /// No pending request `from -> to`.
    #[error("friend request from {from} to {to} does not exist")]
    Request {
        /// Sender
        from: UserRef,
        /// Recipient
        to: UserRef,
    },

    /// No pending request with this id.
    #[error("friend request {0} is not pending")]
    RequestId(RequestId),

    /// No friendship edge between the pair.
    #[error("friendship between {a} and {b} not found")]
    Friendship {
        /// First user of the pair
        a: UserRef,
        /// Second user of the pair
        b: UserRef,
    },

    /// Handle unknown to the user directory.
    #[error("user {handle} not found")]
    User {
        /// The handle that failed to resolve
        handle: String,
    },
}

/// Persistence failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Storage access exceeded the configured timeout.
    #[error("storage operation timed out after {after_ms} ms")]
    Timeout {
        /// Configured bound in milliseconds
        after_ms: u64,
    },

    /// Read or write against the backing medium failed.
    #[error("storage io error: {0}")]
    Io(String),

    /// Persisted document could not be decoded or violates an invariant.
    #[error("stored state is corrupt: {0}")]
    Corrupt(String),

    /// Backend is not reachable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl SocialError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SocialError::InvalidOperation { .. } => ErrorKind::InvalidOperation,
            SocialError::Conflict(_) => ErrorKind::Conflict,
            SocialError::NotFound(_) => ErrorKind::NotFound,
            SocialError::StorageFailure(_) => ErrorKind::StorageFailure,
        }
    }

    /// Create an invalid operation error.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            reason: reason.into(),
        }
    }

    /// Create a self-targeted command error.
    pub fn self_target(user: &UserRef) -> Self {
        Self::invalid(format!("{user} cannot befriend themselves"))
    }

    /// Create an already friends conflict.
    pub fn already_friends(a: &UserRef, b: &UserRef) -> Self {
        Self::Conflict(ConflictReason::AlreadyFriends {
            a: a.clone(),
            b: b.clone(),
        })
    }

    /// Create a duplicate pending request conflict.
    pub fn pending_exists(a: &UserRef, b: &UserRef) -> Self {
        Self::Conflict(ConflictReason::PendingRequestExists {
            a: a.clone(),
            b: b.clone(),
        })
    }

    /// Create a missing request error.
    pub fn request_not_found(from: &UserRef, to: &UserRef) -> Self {
        Self::NotFound(Missing::Request {
            from: from.clone(),
            to: to.clone(),
        })
    }

    /// Create a missing friendship error.
    pub fn friendship_not_found(a: &UserRef, b: &UserRef) -> Self {
        Self::NotFound(Missing::Friendship {
            a: a.clone(),
            b: b.clone(),
        })
    }

    /// Create an unknown user error.
    pub fn user_not_found(handle: impl Into<String>) -> Self {
        Self::NotFound(Missing::User {
            handle: handle.into(),
        })
    }

    /// Whether this error came from the storage backend.
    pub fn is_storage(&self) -> bool {
        matches!(self, SocialError::StorageFailure(_))
    }
}
