// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error taxonomy for Azure reconciliation.
//!
//! Every failure surfaced by a reconciler is a [`ReconcileError`]. The variant
//! decides what the outer controller does with the object:
//!
//! - `Transient` / `Conflict` - requeue after a delay
//! - `NotDone` - a long-running operation was persisted; requeue and resume it
//! - `Terminal` / `ResourceDeleted` - record and stop until the spec changes
//! - `NotFound` - interpreted by the caller (create on Get, success on Delete)

use crate::constants::DEFAULT_RECONCILER_REQUEUE_SECS;
use crate::crd::Future;
use crate::status_reasons::{
    REASON_CONFLICT, REASON_NOT_FOUND, REASON_OPERATION_NOT_DONE, REASON_RESOURCE_DELETED,
    REASON_TERMINAL_ERROR, REASON_TRANSIENT_ERROR,
};
use std::time::Duration;
use thiserror::Error;

/// Default requeue interval applied when Azure gives no `Retry-After`.
pub const DEFAULT_REQUEUE: Duration = Duration::from_secs(DEFAULT_RECONCILER_REQUEUE_SECS);

/// Errors surfaced by the reconcilers and the Azure client shim.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReconcileError {
    /// Retry after `requeue_after`.
    #[error("{message}")]
    Transient {
        /// What went wrong
        message: String,
        /// When to try again
        requeue_after: Duration,
    },

    /// Will not succeed without a change to the spec.
    #[error("{message}")]
    Terminal {
        /// What went wrong
        message: String,
    },

    /// A long-running operation is still in flight; its state has been persisted.
    #[error("{future} is not done")]
    NotDone {
        /// The persisted operation
        future: Future,
        /// When to poll again
        requeue_after: Duration,
    },

    /// The resource does not exist.
    #[error("{message}")]
    NotFound {
        /// What was not found
        message: String,
    },

    /// The request conflicted with a concurrent change.
    #[error("{message}")]
    Conflict {
        /// What conflicted
        message: String,
    },

    /// The resource was deleted out-of-band and must not be recreated.
    #[error("resource {resource_group}/{name} was deleted out-of-band and will not be recreated")]
    ResourceDeleted {
        /// Resource group of the deleted resource
        resource_group: String,
        /// Name of the deleted resource
        name: String,
    },
}

impl ReconcileError {
    /// Transient error with the default requeue interval.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
            requeue_after: DEFAULT_REQUEUE,
        }
    }

    /// Terminal error.
    #[must_use]
    pub fn terminal(message: impl Into<String>) -> Self {
        Self::Terminal {
            message: message.into(),
        }
    }

    /// Not-done error with the default requeue interval.
    #[must_use]
    pub fn not_done(future: Future) -> Self {
        Self::NotDone {
            future,
            requeue_after: DEFAULT_REQUEUE,
        }
    }

    /// Returns true if the object should be requeued and retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transient { .. } | Self::NotDone { .. } | Self::Conflict { .. }
        )
    }

    /// Returns true if retrying cannot help.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal { .. } | Self::ResourceDeleted { .. })
    }

    #[must_use]
    pub fn is_not_done(&self) -> bool {
        matches!(self, Self::NotDone { .. })
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// How long to wait before the next attempt, or `None` when the error is terminal.
    #[must_use]
    pub fn requeue_after(&self) -> Option<Duration> {
        match self {
            Self::Transient { requeue_after, .. } | Self::NotDone { requeue_after, .. } => {
                Some(*requeue_after)
            }
            Self::Conflict { .. } | Self::NotFound { .. } => Some(DEFAULT_REQUEUE),
            Self::Terminal { .. } | Self::ResourceDeleted { .. } => None,
        }
    }

    /// Returns the Kubernetes status reason code for this error.
    #[must_use]
    pub fn status_reason(&self) -> &'static str {
        match self {
            Self::Transient { .. } => REASON_TRANSIENT_ERROR,
            Self::Terminal { .. } => REASON_TERMINAL_ERROR,
            Self::NotDone { .. } => REASON_OPERATION_NOT_DONE,
            Self::NotFound { .. } => REASON_NOT_FOUND,
            Self::Conflict { .. } => REASON_CONFLICT,
            Self::ResourceDeleted { .. } => REASON_RESOURCE_DELETED,
        }
    }

    /// Short label used in metrics.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Transient { .. } => "transient",
            Self::Terminal { .. } => "terminal",
            Self::NotDone { .. } => "not_done",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::ResourceDeleted { .. } => "resource_deleted",
        }
    }

    /// Prefixes the message with `context`, keeping the variant.
    ///
    /// `NotDone` and `ResourceDeleted` carry structured data rather than a message
    /// and are returned unchanged.
    #[must_use]
    pub fn wrap(self, context: impl AsRef<str>) -> Self {
        let context = context.as_ref();
        match self {
            Self::Transient {
                message,
                requeue_after,
            } => Self::Transient {
                message: format!("{context}: {message}"),
                requeue_after,
            },
            Self::Terminal { message } => Self::Terminal {
                message: format!("{context}: {message}"),
            },
            Self::NotFound { message } => Self::NotFound {
                message: format!("{context}: {message}"),
            },
            Self::Conflict { message } => Self::Conflict {
                message: format!("{context}: {message}"),
            },
            other @ (Self::NotDone { .. } | Self::ResourceDeleted { .. }) => other,
        }
    }

    /// Precedence used when aggregating errors across specs:
    /// terminal > other > not-done.
    #[must_use]
    pub(crate) fn precedence(&self) -> u8 {
        match self {
            Self::Terminal { .. } | Self::ResourceDeleted { .. } => 3,
            Self::NotDone { .. } => 1,
            _ => 2,
        }
    }
}

impl From<serde_json::Error> for ReconcileError {
    fn from(err: serde_json::Error) -> Self {
        Self::terminal(format!("failed to decode Azure resource: {err}"))
    }
}

#[cfg(test)]
#[path = "azure_errors_tests.rs"]
mod azure_errors_tests;
