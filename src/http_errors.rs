// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Mapping of Azure Resource Manager and Kubernetes API failures onto
//! [`ReconcileError`].
//!
//! This is the only place that looks at raw HTTP status codes. Everything above
//! the client shim reasons in terms of the error taxonomy.
//!
//! # HTTP Code Mapping
//!
//! | HTTP Code | Variant | Meaning |
//! |-----------|---------|---------|
//! | 400, 422 | `Terminal` | The request is invalid |
//! | 401, 403 | `Transient` | Credentials or RBAC not yet effective |
//! | 404 | `NotFound` | Resource not found |
//! | 409 | `Conflict` | Concurrent modification |
//! | 429 | `Transient` | Throttled, honours `Retry-After` |
//! | 5xx | `Transient` | Azure-side failure, honours `Retry-After` |
//! | Other | `Transient` | Unexpected response |
//!
//! # Usage
//!
//! ```rust
//! use capz_core::http_errors::map_arm_error;
//!
//! let err = map_arm_error(404, r#"{"error":{"code":"ResourceNotFound","message":"gone"}}"#, None);
//! assert!(err.is_not_found());
//!
//! let err = map_arm_error(400, r#"{"error":{"code":"ResourceGroupNotFound","message":"missing"}}"#, None);
//! assert!(err.is_not_found());
//! ```

use crate::azure_errors::{ReconcileError, DEFAULT_REQUEUE};
use crate::constants::ERROR_CODE_RESOURCE_GROUP_NOT_FOUND;
use serde::Deserialize;
use std::time::Duration;

/// ARM error envelope: `{"error": {"code": "...", "message": "..."}}`.
#[derive(Debug, Deserialize, Default)]
pub struct ArmErrorResponse {
    #[serde(default)]
    pub error: Option<ArmErrorDetail>,
}

/// Error detail inside an [`ArmErrorResponse`] or a failed operation status.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ArmErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ArmErrorDetail {
    fn describe(&self) -> String {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => format!("{code}: {message}"),
            (Some(code), None) => code.clone(),
            (None, Some(message)) => message.clone(),
            (None, None) => "no error details".to_string(),
        }
    }
}

/// Map an ARM error response to a [`ReconcileError`].
///
/// # Arguments
///
/// * `status_code` - HTTP status code of the response
/// * `body` - Raw response body (may be empty or non-JSON)
/// * `retry_after` - Parsed `Retry-After` header, if any
#[must_use]
pub fn map_arm_error(status_code: u16, body: &str, retry_after: Option<Duration>) -> ReconcileError {
    let detail = serde_json::from_str::<ArmErrorResponse>(body)
        .ok()
        .and_then(|r| r.error)
        .unwrap_or_default();
    let message = format!("Azure returned HTTP {status_code}: {}", detail.describe());

    if detail.code.as_deref() == Some(ERROR_CODE_RESOURCE_GROUP_NOT_FOUND) {
        return ReconcileError::NotFound { message };
    }

    match status_code {
        404 => ReconcileError::NotFound { message },
        409 => ReconcileError::Conflict { message },
        400 | 422 => ReconcileError::Terminal { message },
        _ => ReconcileError::Transient {
            message,
            requeue_after: retry_after.unwrap_or(DEFAULT_REQUEUE),
        },
    }
}

/// Map a failed long-running operation (status `Failed` or `Canceled`) to an error.
///
/// Azure reports why the operation failed but not whether retrying helps, so the
/// failure is treated as transient. A subsequent PUT starts a fresh operation.
#[must_use]
pub fn map_operation_failure(status: &str, detail: Option<&ArmErrorDetail>) -> ReconcileError {
    let describe = detail.map_or_else(|| "no error details".to_string(), ArmErrorDetail::describe);
    if detail.and_then(|d| d.code.as_deref()) == Some(ERROR_CODE_RESOURCE_GROUP_NOT_FOUND) {
        return ReconcileError::NotFound {
            message: format!("long-running operation {status}: {describe}"),
        };
    }
    ReconcileError::transient(format!("long-running operation {status}: {describe}"))
}

/// Map a transport-level failure (DNS, connect, TLS, timeout) to a transient error.
#[must_use]
pub fn map_transport_error(err: &reqwest::Error) -> ReconcileError {
    if err.is_timeout() {
        return ReconcileError::transient(format!("request to Azure timed out: {err}"));
    }
    ReconcileError::transient(format!("failed to reach Azure: {err}"))
}

/// Map a Kubernetes API error to a [`ReconcileError`].
#[must_use]
pub fn map_kube_error(err: kube::Error) -> ReconcileError {
    match &err {
        kube::Error::Api(api_err) if api_err.code == 404 => ReconcileError::NotFound {
            message: err.to_string(),
        },
        kube::Error::Api(api_err) if api_err.code == 409 => ReconcileError::Conflict {
            message: err.to_string(),
        },
        _ => ReconcileError::transient(format!("Kubernetes API request failed: {err}")),
    }
}

/// Parse a `Retry-After` header given in delta-seconds. HTTP dates are ignored.
#[must_use]
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
#[path = "http_errors_tests.rs"]
mod http_errors_tests;
