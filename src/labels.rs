// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Tag keys, labels and annotations shared across all reconcilers.
//!
//! Azure tag keys use underscores because Azure rejects `/` in tag names. Kubernetes
//! labels and annotations follow the usual `<prefix>/<name>` form.

// ============================================================================
// Azure Tag Keys
// ============================================================================

/// Prefix of the cluster-ownership tag. The full key is
/// `sigs.k8s.io_cluster-api-provider-azure_cluster_<ClusterName>`.
pub const TAG_CLUSTER_PREFIX: &str = "sigs.k8s.io_cluster-api-provider-azure_cluster_";

/// Tag key recording the role of a resource within the cluster.
pub const TAG_ROLE: &str = "sigs.k8s.io_cluster-api-provider-azure_role";

/// Tag key holding the human readable resource name.
pub const TAG_NAME: &str = "Name";

// ============================================================================
// Azure Tag Values
// ============================================================================

/// Cluster-ownership value: the resource lives and dies with the cluster.
pub const LIFECYCLE_OWNED: &str = "owned";

/// Cluster-ownership value: the resource is used by, but not owned by, the cluster.
pub const LIFECYCLE_SHARED: &str = "shared";

// ============================================================================
// Kubernetes Labels
// ============================================================================

/// Standard cluster name label applied to backing objects.
pub const CLUSTER_NAME_LABEL: &str = "cluster.x-k8s.io/cluster-name";

/// Legacy ownership label on backing objects; its value is the owning cluster name.
pub const OWNED_BY_CLUSTER_LABEL: &str = "sigs.k8s.io/cluster-api-provider-azure-owned-by-cluster";

// ============================================================================
// Kubernetes Annotations
// ============================================================================

/// Prefix of the last-applied tags annotation. The full key is
/// `sigs.k8s.io/last-applied-tags-<scope>` and its value is a JSON map.
pub const LAST_APPLIED_TAGS_ANNOTATION_PREFIX: &str = "sigs.k8s.io/last-applied-tags-";

/// Annotation on backing objects telling the service operator whether to act.
pub const RECONCILE_POLICY_ANNOTATION: &str = "serviceoperator.azure.com/reconcile-policy";

/// Reconcile policy: the service operator creates, updates and deletes the resource.
pub const RECONCILE_POLICY_MANAGE: &str = "manage";

/// Reconcile policy: the service operator leaves the resource alone.
pub const RECONCILE_POLICY_SKIP: &str = "skip";

/// Reconcile policy: the service operator detaches instead of deleting.
pub const RECONCILE_POLICY_DETACH_ON_DELETE: &str = "detach-on-delete";

/// Remembers the reconcile policy a backing object had before its cluster was paused.
pub const PRE_PAUSE_RECONCILE_POLICY_ANNOTATION: &str =
    "sigs.k8s.io/cluster-api-provider-azure-pre-pause-reconcile-policy";

/// Records the spec most recently applied to a backing object (JSON).
pub const LAST_APPLIED_SPEC_ANNOTATION: &str = "sigs.k8s.io/cluster-api-provider-azure-last-applied-spec";

/// Annotation on the owning cluster that suspends reconciliation.
pub const PAUSED_ANNOTATION: &str = "cluster.x-k8s.io/paused";

/// Builds the last-applied tags annotation key for a tag scope (e.g. `vm`).
#[must_use]
pub fn last_applied_tags_annotation(scope: &str) -> String {
    format!("{LAST_APPLIED_TAGS_ANNOTATION_PREFIX}{scope}")
}
