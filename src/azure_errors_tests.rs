// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for Azure error types.

#[cfg(test)]
mod tests {
    use crate::azure_errors::*;
    use crate::crd::{Future, FutureType};
    use std::time::Duration;

    fn future() -> Future {
        Future {
            r#type: FutureType::Put,
            service_name: "virtualmachine".to_string(),
            name: "my-vm".to_string(),
            resource_group: "my-rg".to_string(),
            data: String::new(),
        }
    }

    #[test]
    fn test_not_done_message_names_resource_and_operation() {
        let error = ReconcileError::not_done(future());
        assert_eq!(
            error.to_string(),
            "operation type PUT on Azure resource my-rg/my-vm is not done"
        );
    }

    #[test]
    fn test_resource_deleted_message() {
        let error = ReconcileError::ResourceDeleted {
            resource_group: "my-rg".to_string(),
            name: "my-vm".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "resource my-rg/my-vm was deleted out-of-band and will not be recreated"
        );
        assert!(error.is_terminal());
        assert!(error.requeue_after().is_none());
    }

    #[test]
    fn test_classification() {
        assert!(ReconcileError::transient("x").is_transient());
        assert!(ReconcileError::not_done(future()).is_transient());
        assert!(ReconcileError::not_done(future()).is_not_done());
        assert!(ReconcileError::Conflict {
            message: "x".to_string()
        }
        .is_transient());
        assert!(ReconcileError::terminal("x").is_terminal());
        assert!(!ReconcileError::terminal("x").is_transient());
        assert!(ReconcileError::NotFound {
            message: "x".to_string()
        }
        .is_not_found());
    }

    #[test]
    fn test_requeue_after() {
        let error = ReconcileError::Transient {
            message: "throttled".to_string(),
            requeue_after: Duration::from_secs(42),
        };
        assert_eq!(error.requeue_after(), Some(Duration::from_secs(42)));
        assert_eq!(
            ReconcileError::Conflict {
                message: "x".to_string()
            }
            .requeue_after(),
            Some(DEFAULT_REQUEUE)
        );
        assert_eq!(DEFAULT_REQUEUE, Duration::from_secs(15));
    }

    #[test]
    fn test_wrap_preserves_variant() {
        let wrapped = ReconcileError::terminal("bad sku").wrap("failed to create resource rg/vm");
        assert!(wrapped.is_terminal());
        assert_eq!(
            wrapped.to_string(),
            "failed to create resource rg/vm: bad sku"
        );

        let not_done = ReconcileError::not_done(future()).wrap("ignored");
        assert!(not_done.is_not_done());
        assert!(!not_done.to_string().contains("ignored"));
    }

    #[test]
    fn test_status_reason() {
        assert_eq!(
            ReconcileError::not_done(future()).status_reason(),
            "OperationNotDone"
        );
        assert_eq!(
            ReconcileError::terminal("x").status_reason(),
            "TerminalError"
        );
        assert_eq!(
            ReconcileError::transient("x").status_reason(),
            "TransientError"
        );
    }

    #[test]
    fn test_precedence_ordering() {
        let terminal = ReconcileError::terminal("x");
        let transient = ReconcileError::transient("x");
        let not_done = ReconcileError::not_done(future());
        assert!(terminal.precedence() > transient.precedence());
        assert!(transient.precedence() > not_done.precedence());
    }

    #[test]
    fn test_decode_failure_is_terminal() {
        let err = serde_json::from_str::<u32>("\"nope\"").unwrap_err();
        let error: ReconcileError = err.into();
        assert!(error.is_terminal());
    }
}
