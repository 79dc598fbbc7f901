// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Azure reconciliation core.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Timing Constants
// ============================================================================

/// Default bound on a single Azure call made from within a reconcile tick.
///
/// When this elapses while a long-running operation is in flight, the operation's
/// resume token is persisted and the tick returns a not-done error.
pub const DEFAULT_AZURE_SERVICE_RECONCILE_TIMEOUT_SECS: u64 = 15;

/// Default requeue interval for transient errors and not-done operations.
pub const DEFAULT_RECONCILER_REQUEUE_SECS: u64 = 15;

/// Default interval between two polls of a long-running operation when Azure
/// does not send a `Retry-After` header.
pub const DEFAULT_LRO_POLL_FREQUENCY_MILLIS: u64 = 1000;

/// Default timeout for a single HTTP request to Azure Resource Manager.
pub const DEFAULT_HTTP_REQUEST_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Azure Resource Manager Constants
// ============================================================================

/// Public cloud Azure Resource Manager endpoint.
pub const DEFAULT_RESOURCE_MANAGER_ENDPOINT: &str = "https://management.azure.com";

/// OAuth scope used when requesting a token for Azure Resource Manager.
pub const RESOURCE_MANAGER_SCOPE: &str = "https://management.azure.com/.default";

/// Header carrying the URL of an Azure-AsyncOperation status monitor.
pub const HEADER_AZURE_ASYNC_OPERATION: &str = "azure-asyncoperation";

/// Header carrying the URL of a Location-style status monitor.
pub const HEADER_LOCATION: &str = "location";

/// Header carrying the server's suggested poll delay in seconds.
pub const HEADER_RETRY_AFTER: &str = "retry-after";

/// Prefix of every Azure provider ID (`azure://` followed by the ARM resource ID).
pub const PROVIDER_ID_PREFIX: &str = "azure://";

// API versions used by the generic ARM client, one per resource provider.

/// API version for `Microsoft.Resources/resourceGroups`
pub const API_VERSION_RESOURCES: &str = "2021-04-01";

/// API version for `Microsoft.Resources/tags`
pub const API_VERSION_TAGS: &str = "2021-04-01";

/// API version for `Microsoft.Network/*`
pub const API_VERSION_NETWORK: &str = "2023-05-01";

/// API version for `Microsoft.Compute/virtualMachines` and scale sets
pub const API_VERSION_COMPUTE: &str = "2023-09-01";

/// API version for `Microsoft.Compute/disks`
pub const API_VERSION_DISKS: &str = "2023-04-02";

/// API version for `Microsoft.Compute/skus`
pub const API_VERSION_SKUS: &str = "2021-07-01";

/// API version for `Microsoft.Authorization/roleAssignments`
pub const API_VERSION_AUTHORIZATION: &str = "2022-04-01";

/// API version for `Microsoft.ManagedIdentity/userAssignedIdentities`
pub const API_VERSION_MANAGED_IDENTITY: &str = "2023-01-31";

// ============================================================================
// Azure Error Codes
// ============================================================================

/// ARM error code returned when the enclosing resource group is missing.
pub const ERROR_CODE_RESOURCE_GROUP_NOT_FOUND: &str = "ResourceGroupNotFound";

// ============================================================================
// Resource SKU Capabilities
// ============================================================================

/// SKU capability advertising accelerated networking support.
pub const CAPABILITY_ACCELERATED_NETWORKING: &str = "AcceleratedNetworkingEnabled";

// ============================================================================
// Role Constants
// ============================================================================

/// Role tag value for resources shared by the whole cluster.
pub const ROLE_COMMON: &str = "common";

/// Role tag value for control plane resources.
pub const ROLE_CONTROL_PLANE: &str = "control-plane";

/// Role tag value for worker node resources.
pub const ROLE_NODE: &str = "node";

// ============================================================================
// Operator-managed Backing Objects
// ============================================================================

/// Field manager used for server-side apply of backing objects.
pub const FIELD_MANAGER: &str = "capz-manager";

/// Name of the readiness condition reported on backing objects.
pub const ASO_READY_CONDITION: &str = "Ready";

/// Condition severity marking a backing object failure as requiring user action.
pub const ASO_SEVERITY_ERROR: &str = "Error";
