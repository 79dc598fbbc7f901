// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Pollers for ARM long-running operations.
//!
//! ARM reports the progress of an accepted PUT or DELETE in one of three ways:
//!
//! 1. an `Azure-AsyncOperation` header pointing at an operation status resource
//!    (`{"status": "InProgress" | "Succeeded" | "Failed" | "Canceled"}`)
//! 2. a `Location` header that answers `202` until the operation finishes
//! 3. neither, in which case the resource's own `provisioningState` is the
//!    progress indicator
//!
//! The URLs needed to continue polling are the whole poller state. They are
//! serialized as JSON and used as the resume token, so a poller can be rebuilt
//! on any later reconcile.

use super::client::{retry_after_header, ArmClient};
use super::{PollStatus, Poller};
use crate::azure_errors::ReconcileError;
use crate::constants::{HEADER_AZURE_ASYNC_OPERATION, HEADER_LOCATION};
use crate::crd::ProvisioningState;
use crate::http_errors::{map_operation_failure, ArmErrorDetail};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Serializable state of an in-flight operation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PollerState {
    pub method: String,
    pub resource_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub async_operation_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_url: Option<String>,
}

impl PollerState {
    /// State of an operation accepted with the given response headers.
    #[must_use]
    pub fn from_response(method: Method, resource_url: &Url, headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Self {
            method: method.to_string(),
            resource_url: resource_url.to_string(),
            async_operation_url: header(HEADER_AZURE_ASYNC_OPERATION),
            location_url: header(HEADER_LOCATION),
        }
    }

    /// Encodes the state as a resume token.
    ///
    /// # Errors
    ///
    /// Returns a terminal error if serialization fails.
    pub fn encode(&self) -> Result<String, ReconcileError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes a resume token.
    ///
    /// # Errors
    ///
    /// Returns a transient error when the token is not a poller state, so the
    /// persisted future is dropped and the operation is restarted.
    pub fn decode(token: &str) -> Result<Self, ReconcileError> {
        serde_json::from_str(token)
            .map_err(|e| ReconcileError::transient(format!("invalid resume token: {e}")))
    }
}

fn parse_url(raw: &str) -> Result<Url, ReconcileError> {
    Url::parse(raw)
        .map_err(|e| ReconcileError::transient(format!("invalid polling URL {raw:?}: {e}")))
}

#[derive(Debug, Deserialize)]
struct OperationStatus {
    status: String,
    #[serde(default)]
    error: Option<ArmErrorDetail>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProvisioningEnvelope {
    #[serde(default)]
    properties: Option<ProvisioningProperties>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProvisioningProperties {
    #[serde(default)]
    provisioning_state: Option<String>,
}

enum Progress {
    Running,
    Finished,
    Failed(ReconcileError),
}

/// Shared tracking of the operation status, independent of the result type.
struct Operation {
    arm: ArmClient,
    state: PollerState,
    retry_after: Option<Duration>,
}

impl Operation {
    async fn check(&mut self) -> Result<Progress, ReconcileError> {
        if let Some(raw) = self.state.async_operation_url.clone() {
            let response = self.arm.send::<()>(Method::GET, parse_url(&raw)?, None).await?;
            self.retry_after = response.retry_after();
            let operation: OperationStatus = response.json()?;
            debug!(url = %raw, status = %operation.status, "polled async operation");
            return match operation.status.as_str() {
                "Succeeded" => Ok(Progress::Finished),
                "Failed" | "Canceled" => Ok(Progress::Failed(map_operation_failure(
                    &operation.status,
                    operation.error.as_ref(),
                ))),
                _ => Ok(Progress::Running),
            };
        }

        if let Some(raw) = self.state.location_url.clone() {
            let response = self.arm.send::<()>(Method::GET, parse_url(&raw)?, None).await?;
            self.retry_after = response.retry_after();
            debug!(url = %raw, status = response.status, "polled operation location");
            return Ok(if response.status == 202 {
                Progress::Running
            } else {
                Progress::Finished
            });
        }

        Ok(Progress::Finished)
    }
}

/// Poller for a create-or-update. Finishes by reading the resource.
pub struct PutPoller<T> {
    operation: Operation,
    _result: PhantomData<fn() -> T>,
}

impl<T> PutPoller<T> {
    #[must_use]
    pub fn new(arm: ArmClient, state: PollerState, retry_after: Option<Duration>) -> Self {
        Self {
            operation: Operation {
                arm,
                state,
                retry_after,
            },
            _result: PhantomData,
        }
    }
}

#[async_trait]
impl<T: DeserializeOwned + Send + 'static> Poller<T> for PutPoller<T> {
    async fn poll(&mut self) -> Result<PollStatus<T>, ReconcileError> {
        match self.operation.check().await? {
            Progress::Running => return Ok(PollStatus::InProgress),
            Progress::Failed(err) => return Ok(PollStatus::Failed(err)),
            Progress::Finished => {}
        }

        let url = parse_url(&self.operation.state.resource_url)?;
        let response = self.operation.arm.send::<()>(Method::GET, url, None).await?;
        let envelope: ProvisioningEnvelope =
            serde_json::from_str(&response.body).unwrap_or_default();
        let state = envelope
            .properties
            .and_then(|p| p.provisioning_state)
            .map(|s| ProvisioningState::from_azure(&s));

        match state {
            Some(ProvisioningState::Creating | ProvisioningState::Updating) => {
                self.operation.retry_after = response.retry_after();
                Ok(PollStatus::InProgress)
            }
            Some(ProvisioningState::Failed) => {
                Ok(PollStatus::Failed(map_operation_failure("Failed", None)))
            }
            Some(ProvisioningState::Canceled) => {
                Ok(PollStatus::Failed(map_operation_failure("Canceled", None)))
            }
            _ => Ok(PollStatus::Done(response.json()?)),
        }
    }

    fn resume_token(&self) -> Result<String, ReconcileError> {
        self.operation.state.encode()
    }

    fn retry_after(&self) -> Option<Duration> {
        self.operation.retry_after
    }
}

/// Poller for a delete.
pub struct DeletePoller {
    operation: Operation,
}

impl DeletePoller {
    #[must_use]
    pub fn new(arm: ArmClient, state: PollerState, retry_after: Option<Duration>) -> Self {
        Self {
            operation: Operation {
                arm,
                state,
                retry_after,
            },
        }
    }
}

#[async_trait]
impl Poller<()> for DeletePoller {
    async fn poll(&mut self) -> Result<PollStatus<()>, ReconcileError> {
        match self.operation.check().await {
            Ok(Progress::Running) => Ok(PollStatus::InProgress),
            Ok(Progress::Finished) => Ok(PollStatus::Done(())),
            Ok(Progress::Failed(err)) if err.is_not_found() => Ok(PollStatus::Done(())),
            Ok(Progress::Failed(err)) => Ok(PollStatus::Failed(err)),
            // The operation resource itself may be gone once the delete finished.
            Err(e) if e.is_not_found() => Ok(PollStatus::Done(())),
            Err(e) => Err(e),
        }
    }

    fn resume_token(&self) -> Result<String, ReconcileError> {
        self.operation.state.encode()
    }

    fn retry_after(&self) -> Option<Duration> {
        self.operation.retry_after
    }
}
