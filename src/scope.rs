// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Traits through which reconcilers read the desired state of the owning object
//! and write back status.
//!
//! A scope wraps one Kubernetes object (a cluster, a machine, a machine pool) for
//! the duration of a reconcile. All methods take `&self`: a scope is shared by the
//! service wrappers and the reconcilers they drive, so implementations keep their
//! status behind interior mutability (see
//! [`ReconcileStatus`](crate::reconcilers::status::ReconcileStatus)).
//!
//! Each service declares its own scope trait next to its wrapper (for example
//! [`GroupScope`](crate::reconcilers::services::groups::GroupScope)) on top of the
//! traits here.

use crate::azure_errors::ReconcileError;
use crate::constants::{DEFAULT_AZURE_SERVICE_RECONCILE_TIMEOUT_SECS, DEFAULT_RECONCILER_REQUEUE_SECS};
use crate::crd::{ConditionSeverity, Future, FutureType};
use crate::tags::Tags;
use std::time::Duration;

/// Persistence of long-running operation state.
pub trait FutureScope: Send + Sync {
    /// The future for `(name, service_name, future_type)`, if one is persisted.
    fn get_long_running_operation_state(
        &self,
        name: &str,
        service_name: &str,
        future_type: FutureType,
    ) -> Option<Future>;

    /// Persists `future`, replacing any future with the same key.
    fn set_long_running_operation_state(&self, future: Future);

    /// Forgets the future for `(name, service_name, future_type)`.
    fn delete_long_running_operation_state(
        &self,
        name: &str,
        service_name: &str,
        future_type: FutureType,
    );
}

/// Direct condition manipulation.
pub trait ConditionSetter: Send + Sync {
    fn set_condition_true(&self, condition: &str);

    fn set_condition_false(
        &self,
        condition: &str,
        reason: &str,
        severity: ConditionSeverity,
        message: &str,
    );
}

/// Publishes the outcome of a service operation as a condition.
pub trait AsyncStatusUpdater: FutureScope + ConditionSetter {
    fn update_put_status(&self, condition: &str, service_name: &str, err: Option<&ReconcileError>);
    fn update_delete_status(&self, condition: &str, service_name: &str, err: Option<&ReconcileError>);
}

/// Identity of the cluster the resources belong to.
pub trait ClusterDescriber: Send + Sync {
    fn cluster_name(&self) -> String;
    fn subscription_id(&self) -> String;
    /// The cluster's primary resource group.
    fn resource_group(&self) -> String;
    fn location(&self) -> String;
    /// User supplied tags added to every resource.
    fn additional_tags(&self) -> Tags;
}

/// Timing knobs. The defaults are the crate-wide defaults from
/// [`constants`](crate::constants).
pub trait TimeoutsGetter: Send + Sync {
    /// Upper bound on the Azure work done for one spec within one tick.
    fn defaulted_azure_service_reconcile_timeout(&self) -> Duration {
        Duration::from_secs(DEFAULT_AZURE_SERVICE_RECONCILE_TIMEOUT_SECS)
    }

    /// Requeue delay used when Azure gives no hint.
    fn defaulted_reconciler_requeue(&self) -> Duration {
        Duration::from_secs(DEFAULT_RECONCILER_REQUEUE_SECS)
    }
}

/// JSON-valued annotations on the owning object, used for last-applied tags.
pub trait AnnotationJson: Send + Sync {
    /// Decodes the annotation `key`; a missing annotation yields an empty map.
    ///
    /// # Errors
    ///
    /// Returns a terminal error when the annotation holds invalid JSON.
    fn annotation_json(&self, key: &str) -> Result<Tags, ReconcileError>;

    /// Stores `value` as JSON under the annotation `key`.
    ///
    /// # Errors
    ///
    /// Returns a terminal error when `value` cannot be encoded.
    fn update_annotation_json(&self, key: &str, value: &Tags) -> Result<(), ReconcileError>;
}
