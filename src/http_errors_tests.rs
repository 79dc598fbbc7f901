// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for http_errors module
//!
//! These tests verify HTTP error code mapping onto the error taxonomy.

#[cfg(test)]
mod tests {
    use crate::azure_errors::{ReconcileError, DEFAULT_REQUEUE};
    use crate::http_errors::*;
    use std::time::Duration;

    fn body(code: &str) -> String {
        format!(r#"{{"error":{{"code":"{code}","message":"details"}}}}"#)
    }

    // ============================================================================
    // Test HTTP 4xx Error Code Mappings
    // ============================================================================

    #[test]
    fn test_map_404_not_found() {
        let err = map_arm_error(404, &body("ResourceNotFound"), None);
        assert!(err.is_not_found());
        assert!(err.to_string().contains("404"));
        assert!(err.to_string().contains("ResourceNotFound"));
    }

    #[test]
    fn test_map_409_conflict() {
        let err = map_arm_error(409, &body("AnotherOperationInProgress"), None);
        assert!(err.is_conflict());
        assert!(err.is_transient());
    }

    #[test]
    fn test_resource_group_not_found_code_wins_over_status() {
        let err = map_arm_error(400, &body("ResourceGroupNotFound"), None);
        assert!(err.is_not_found());
    }

    #[test]
    fn test_map_400_terminal() {
        let err = map_arm_error(400, &body("InvalidParameter"), None);
        assert!(err.is_terminal());
    }

    #[test]
    fn test_map_403_transient() {
        let err = map_arm_error(403, &body("AuthorizationFailed"), None);
        assert!(err.is_transient());
        assert_eq!(err.requeue_after(), Some(DEFAULT_REQUEUE));
    }

    // ============================================================================
    // Test Throttling and 5xx Mappings
    // ============================================================================

    #[test]
    fn test_map_429_honours_retry_after() {
        let err = map_arm_error(429, "", Some(Duration::from_secs(30)));
        assert_eq!(
            err,
            ReconcileError::Transient {
                message: "Azure returned HTTP 429: no error details".to_string(),
                requeue_after: Duration::from_secs(30),
            }
        );
    }

    #[test]
    fn test_map_503_default_requeue() {
        let err = map_arm_error(503, "not json", None);
        assert!(err.is_transient());
        assert_eq!(err.requeue_after(), Some(DEFAULT_REQUEUE));
    }

    // ============================================================================
    // Test Operation Failures and Kubernetes Errors
    // ============================================================================

    #[test]
    fn test_operation_failure_is_transient() {
        let detail = ArmErrorDetail {
            code: Some("InternalError".to_string()),
            message: Some("boom".to_string()),
        };
        let err = map_operation_failure("Failed", Some(&detail));
        assert!(err.is_transient());
        assert!(err.to_string().contains("InternalError: boom"));
    }

    #[test]
    fn test_kube_404_maps_to_not_found() {
        let err = kube::Error::Api(Box::new(kube::core::Status {
            status: Some(kube::core::response::StatusSummary::Failure),
            message: "resourcegroups.resources.azure.com \"rg\" not found".to_string(),
            reason: "NotFound".to_string(),
            code: 404,
            metadata: None,
            details: None,
        }));
        assert!(map_kube_error(err).is_not_found());
    }

    #[test]
    fn test_kube_409_maps_to_conflict() {
        let err = kube::Error::Api(Box::new(kube::core::Status {
            status: Some(kube::core::response::StatusSummary::Failure),
            message: "conflict".to_string(),
            reason: "Conflict".to_string(),
            code: 409,
            metadata: None,
            details: None,
        }));
        assert!(map_kube_error(err).is_conflict());
    }

    #[test]
    fn test_kube_500_maps_to_transient() {
        let err = kube::Error::Api(Box::new(kube::core::Status {
            status: Some(kube::core::response::StatusSummary::Failure),
            message: "etcd unavailable".to_string(),
            reason: "InternalError".to_string(),
            code: 500,
            metadata: None,
            details: None,
        }));
        assert!(map_kube_error(err).is_transient());
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("10"), Some(Duration::from_secs(10)));
        assert_eq!(parse_retry_after(" 3 "), Some(Duration::from_secs(3)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }
}
