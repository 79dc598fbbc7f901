// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes-facing types shared by every reconciler.
//!
//! This module defines the status shapes persisted on the objects that own Azure
//! resources, and the custom resources used as backing objects in operator-managed
//! mode.
//!
//! # Status Types
//!
//! - [`Condition`] - A single observation of a service's state
//! - [`Future`] - Persisted state of an in-flight Azure long-running operation
//! - [`MachineAddress`] - An address reported for a virtual machine
//!
//! # Backing Objects
//!
//! - [`ResourceGroup`] - Operator-managed Azure resource group
//!
//! # Example: Persisting an in-flight operation
//!
//! ```rust
//! use capz_core::crd::{Future, FutureType};
//!
//! let future = Future {
//!     r#type: FutureType::Put,
//!     service_name: "virtualmachine".to_string(),
//!     name: "my-vm".to_string(),
//!     resource_group: "my-rg".to_string(),
//!     data: "eyJtZXRob2QiOiJQVVQifQ==".to_string(),
//! };
//!
//! assert_eq!(serde_json::to_value(&future).unwrap()["type"], "PUT");
//! ```

use crate::constants::{ASO_READY_CONDITION, ASO_SEVERITY_ERROR};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Conditions
// ============================================================================

/// Severity attached to a `False` condition.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub enum ConditionSeverity {
    /// The object needs user attention.
    Error,
    /// Something is off but progress is still possible.
    Warning,
    /// Expected, temporary state (e.g. an operation in progress).
    Info,
}

impl fmt::Display for ConditionSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Error => "Error",
            Self::Warning => "Warning",
            Self::Info => "Info",
        };
        f.write_str(s)
    }
}

/// Condition represents an observation of a service's current state.
///
/// Conditions are used in status subresources to communicate the state of
/// each Azure service to users and to the outer controller.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition, e.g. `ResourceGroupReady` or `VMRunning`.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Severity of a `False` condition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<ConditionSeverity>,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

// ============================================================================
// Long-running Operation State
// ============================================================================

/// Kind of Azure long-running operation tracked by a [`Future`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
pub enum FutureType {
    /// Create-or-update.
    #[serde(rename = "PUT")]
    Put,
    /// Partial update.
    #[serde(rename = "PATCH")]
    Patch,
    /// Delete.
    #[serde(rename = "DELETE")]
    Delete,
}

impl fmt::Display for FutureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

/// Persisted state of an Azure long-running operation.
///
/// At most one future exists per `(service_name, name, type)`. The `data` field
/// is the base64 encoding of an opaque resume token: it is only ever handed back
/// to the client that produced it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Future {
    /// Operation kind.
    pub r#type: FutureType,

    /// Service that started the operation (e.g. `virtualmachine`).
    pub service_name: String,

    /// Name of the Azure resource being operated on.
    pub name: String,

    /// Resource group (or namespace for backing objects) of the resource.
    pub resource_group: String,

    /// Base64-encoded resume token.
    pub data: String,
}

impl fmt::Display for Future {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "operation type {} on Azure resource {}/{}",
            self.r#type, self.resource_group, self.name
        )
    }
}

// ============================================================================
// Machine Status
// ============================================================================

/// Type of a [`MachineAddress`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub enum AddressType {
    /// Hostname resolvable inside the cluster network.
    InternalDNS,
    /// Private IP of a NIC IP configuration.
    InternalIP,
    /// Public IP attached to a NIC IP configuration.
    ExternalIP,
}

/// An address reported for a virtual machine.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct MachineAddress {
    /// Address type.
    pub r#type: AddressType,
    /// The address itself.
    pub address: String,
}

impl MachineAddress {
    #[must_use]
    pub fn new(r#type: AddressType, address: impl Into<String>) -> Self {
        Self {
            r#type,
            address: address.into(),
        }
    }
}

/// Azure provisioning state of a resource, as reported on the machine status.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub enum ProvisioningState {
    Creating,
    Updating,
    Succeeded,
    Failed,
    Deleting,
    Deleted,
    Canceled,
    Unknown,
}

impl ProvisioningState {
    /// Parses the `provisioningState` string Azure returns. Unknown values map to
    /// [`ProvisioningState::Unknown`].
    #[must_use]
    pub fn from_azure(state: &str) -> Self {
        match state {
            "Creating" => Self::Creating,
            "Updating" => Self::Updating,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            "Deleting" => Self::Deleting,
            "Deleted" => Self::Deleted,
            "Canceled" => Self::Canceled,
            _ => Self::Unknown,
        }
    }
}

// ============================================================================
// Operator-managed Backing Objects
// ============================================================================

/// Condition reported by the service operator on a backing object.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AsoCondition {
    pub r#type: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

impl AsoCondition {
    /// True when the service operator flagged the failure as needing user action.
    #[must_use]
    pub fn is_error_severity(&self) -> bool {
        self.severity.as_deref() == Some(ASO_SEVERITY_ERROR)
    }
}

/// Status of an operator-managed resource group.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroupStatus {
    #[serde(default)]
    pub conditions: Vec<AsoCondition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
}

/// Desired state of an operator-managed Azure resource group.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[kube(
    group = "resources.azure.com",
    version = "v1api20200601",
    kind = "ResourceGroup",
    namespaced,
    doc = "ResourceGroup is an Azure resource group reconciled by the Azure service operator on behalf of a cluster.",
    derive = "PartialEq"
)]
#[kube(status = "ResourceGroupStatus")]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroupSpec {
    /// Name of the resource group in Azure, when it differs from the object name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azure_name: Option<String>,

    /// Azure region.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Azure tags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
}

/// Read access to the readiness condition of a backing object.
pub trait AsoStatus {
    /// All conditions reported by the service operator.
    fn aso_conditions(&self) -> &[AsoCondition];

    /// The `Ready` condition, when reported.
    fn ready_condition(&self) -> Option<&AsoCondition> {
        self.aso_conditions()
            .iter()
            .find(|c| c.r#type == ASO_READY_CONDITION)
    }
}

impl AsoStatus for ResourceGroup {
    fn aso_conditions(&self) -> &[AsoCondition] {
        self.status
            .as_ref()
            .map_or(&[], |status| status.conditions.as_slice())
    }
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
