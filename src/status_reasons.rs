// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Condition types and reasons published by the service wrappers.
//!
//! Every service owns one condition on the owning Kubernetes object. A `True`
//! condition carries no reason; a `False` condition carries one of the reasons
//! below plus a severity.
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   conditions:
//!     - type: ResourceGroupReady
//!       status: "True"
//!     - type: VMRunning
//!       status: "False"
//!       severity: Info
//!       reason: OperationNotDone
//!       message: "virtualmachine creation is in progress: operation type PUT on Azure resource my-rg/my-vm is not done"
//! ```

// ============================================================================
// Condition Types
// ============================================================================

/// Resource group has been created (or is observed and unmanaged).
pub const CONDITION_RESOURCE_GROUP_READY: &str = "ResourceGroupReady";

/// Virtual network is ready.
pub const CONDITION_VNET_READY: &str = "VNetReady";

/// All network interfaces of a machine are ready.
pub const CONDITION_NETWORK_INTERFACE_READY: &str = "NetworkInterfaceReady";

/// All public IPs are ready.
pub const CONDITION_PUBLIC_IPS_READY: &str = "PublicIPsReady";

/// Machine disks are ready (or have been deleted).
pub const CONDITION_DISKS_READY: &str = "DisksReady";

/// The virtual machine exists and is running.
pub const CONDITION_VM_RUNNING: &str = "VMRunning";

/// Every user assigned identity the spec asks for is attached to the VM.
pub const CONDITION_VM_IDENTITIES_READY: &str = "VMIdentitiesReady";

/// The scale set exists and is running.
pub const CONDITION_SCALE_SET_RUNNING: &str = "ScaleSetRunning";

/// All load balancers are ready.
pub const CONDITION_LOAD_BALANCERS_READY: &str = "LoadBalancersReady";

/// Role assignments for the machine identity are in place.
pub const CONDITION_ROLE_ASSIGNMENT_READY: &str = "RoleAssignmentReady";

// ============================================================================
// Condition Reasons
// ============================================================================

/// An Azure long-running operation is still in flight; the object will be requeued.
pub const REASON_OPERATION_NOT_DONE: &str = "OperationNotDone";

/// Create or update failed.
pub const REASON_FAILED: &str = "Failed";

/// Delete failed.
pub const REASON_DELETION_FAILED: &str = "DeletionFailed";

/// A resource backing the object was deleted outside of the controller.
pub const REASON_RESOURCE_DELETED: &str = "ResourceDeleted";

/// A user assigned identity named by the machine spec is missing from the VM.
pub const REASON_USER_ASSIGNED_IDENTITY_MISSING: &str = "UserAssignedIdentityMissing";

// ============================================================================
// Error Reasons (used for `ReconcileError::status_reason`)
// ============================================================================

/// Azure (or the Kubernetes API) asked us to retry later.
pub const REASON_TRANSIENT_ERROR: &str = "TransientError";

/// The request is invalid and will not succeed without a spec change.
pub const REASON_TERMINAL_ERROR: &str = "TerminalError";

/// The resource does not exist.
pub const REASON_NOT_FOUND: &str = "NotFound";

/// The request conflicted with a concurrent change.
pub const REASON_CONFLICT: &str = "Conflict";

// ============================================================================
// Message Prefixes
// ============================================================================

/// Message prefix used with `REASON_USER_ASSIGNED_IDENTITY_MISSING`.
pub const MESSAGE_VM_MISSING_IDENTITY: &str =
    "VM is missing expected user assigned identity with client ID: ";
