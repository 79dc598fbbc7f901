// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers and the in-memory status store used by scopes.
//!
//! # Condition Format
//!
//! Conditions follow the cluster-lifecycle conventions:
//! - `type`: The service being reported (e.g., "ResourceGroupReady")
//! - `status`: "True", "False", or "Unknown"
//! - `severity`: Error, Warning or Info for `False` conditions
//! - `reason`: A programmatic identifier (CamelCase)
//! - `message`: A human-readable explanation
//! - `lastTransitionTime`: RFC3339 timestamp when the condition changed
//!
//! # Example
//!
//! ```rust
//! use capz_core::azure_errors::ReconcileError;
//! use capz_core::reconcilers::status::ReconcileStatus;
//! use capz_core::scope::AsyncStatusUpdater;
//!
//! let status = ReconcileStatus::default();
//! status.update_put_status("VNetReady", "virtualnetworks", None);
//! status.update_put_status(
//!     "ResourceGroupReady",
//!     "group",
//!     Some(&ReconcileError::terminal("invalid location")),
//! );
//!
//! let conditions = status.conditions();
//! assert_eq!(conditions[0].status, "True");
//! assert_eq!(conditions[1].reason.as_deref(), Some("Failed"));
//! ```

use crate::azure_errors::ReconcileError;
use crate::crd::{Condition, ConditionSeverity, Future, FutureType};
use crate::future::FutureStore;
use crate::http_errors::map_kube_error;
use crate::scope::{AnnotationJson, AsyncStatusUpdater, ConditionSetter, FutureScope};
use crate::status_reasons::{REASON_DELETION_FAILED, REASON_FAILED, REASON_OPERATION_NOT_DONE};
use crate::tags::Tags;
use chrono::Utc;
use kube::api::{Patch, PatchParams};
use kube::core::NamespaceResourceScope;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

const STATUS_TRUE: &str = "True";
const STATUS_FALSE: &str = "False";

/// Create a new condition with the current timestamp.
///
/// # Example
///
/// ```rust
/// # use capz_core::reconcilers::status::create_condition;
/// # use capz_core::crd::ConditionSeverity;
/// let condition = create_condition(
///     "VMRunning",
///     "False",
///     Some(ConditionSeverity::Info),
///     Some("OperationNotDone"),
///     Some("vm creation is in progress"),
/// );
/// assert_eq!(condition.r#type, "VMRunning");
/// assert_eq!(condition.status, "False");
/// ```
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    severity: Option<ConditionSeverity>,
    reason: Option<&str>,
    message: Option<&str>,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        severity,
        reason: reason.map(str::to_string),
        message: message.map(str::to_string),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Find a condition by type in a list of conditions.
#[must_use]
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Update or add a condition in a mutable conditions list (in-memory, no API call).
///
/// Preserves `lastTransitionTime` when the status hasn't changed.
pub fn update_condition_in_memory(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: &str,
    severity: Option<ConditionSeverity>,
    reason: Option<&str>,
    message: Option<&str>,
) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) {
        let last_transition_time = if existing.status == status {
            existing
                .last_transition_time
                .clone()
                .unwrap_or_else(|| Utc::now().to_rfc3339())
        } else {
            Utc::now().to_rfc3339()
        };

        existing.status = status.to_string();
        existing.severity = severity;
        existing.reason = reason.map(str::to_string);
        existing.message = message.map(str::to_string);
        existing.last_transition_time = Some(last_transition_time);
    } else {
        conditions.push(create_condition(
            condition_type,
            status,
            severity,
            reason,
            message,
        ));
    }
}

/// Compare two condition lists, ignoring `lastTransitionTime`.
#[must_use]
pub fn conditions_equal(current: &[Condition], new: &[Condition]) -> bool {
    if current.len() != new.len() {
        return false;
    }

    new.iter().all(|new_cond| {
        current.iter().any(|c| {
            c.r#type == new_cond.r#type
                && c.status == new_cond.status
                && c.severity == new_cond.severity
                && c.reason == new_cond.reason
                && c.message == new_cond.message
        })
    })
}

/// Coarse state of one service after a reconcile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceState {
    Ready,
    Deleting,
    NotDone,
    Error,
}

/// State and last error of one service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceStatus {
    pub state: ServiceState,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
struct StatusState {
    conditions: Vec<Condition>,
    futures: FutureStore,
    annotations: BTreeMap<String, String>,
    services: BTreeMap<String, ServiceStatus>,
    initial_conditions: Vec<Condition>,
    initial_futures: FutureStore,
    initial_annotations: BTreeMap<String, String>,
}

/// In-memory status of one owning object.
///
/// Scopes embed one of these and delegate the status traits to it. Changes are
/// collected during the reconcile and written back with a single [`apply`]
/// call, which is skipped when nothing changed.
///
/// [`apply`]: ReconcileStatus::apply
#[derive(Debug, Default)]
pub struct ReconcileStatus {
    inner: Mutex<StatusState>,
}

impl ReconcileStatus {
    /// Seeds the store from the object's current status and annotations.
    #[must_use]
    pub fn new(
        conditions: Vec<Condition>,
        futures: Vec<Future>,
        annotations: BTreeMap<String, String>,
    ) -> Self {
        let futures = FutureStore::new(futures);
        Self {
            inner: Mutex::new(StatusState {
                initial_conditions: conditions.clone(),
                initial_futures: futures.clone(),
                initial_annotations: annotations.clone(),
                conditions,
                futures,
                annotations,
                services: BTreeMap::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, StatusState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn conditions(&self) -> Vec<Condition> {
        self.state().conditions.clone()
    }

    #[must_use]
    pub fn condition(&self, condition_type: &str) -> Option<Condition> {
        find_condition(&self.state().conditions, condition_type).cloned()
    }

    #[must_use]
    pub fn long_running_operation_states(&self) -> Vec<Future> {
        self.state().futures.as_slice().to_vec()
    }

    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<String> {
        self.state().annotations.get(key).cloned()
    }

    pub fn set_annotation(&self, key: &str, value: String) {
        self.state().annotations.insert(key.to_string(), value);
    }

    #[must_use]
    pub fn service_status(&self, service_name: &str) -> Option<ServiceStatus> {
        self.state().services.get(service_name).cloned()
    }

    /// True when conditions, futures or annotations differ from what the store
    /// was seeded with.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        let state = self.state();
        !conditions_equal(&state.initial_conditions, &state.conditions)
            || state.initial_futures != state.futures
            || state.initial_annotations != state.annotations
    }

    /// The merge patch for the status subresource.
    #[must_use]
    pub fn status_patch(&self) -> serde_json::Value {
        let state = self.state();
        json!({
            "status": {
                "conditions": state.conditions,
                "longRunningOperationStates": state.futures.as_slice(),
            }
        })
    }

    /// The merge patch for the object's annotations.
    #[must_use]
    pub fn annotations_patch(&self) -> serde_json::Value {
        json!({
            "metadata": {
                "annotations": self.state().annotations,
            }
        })
    }

    /// Writes collected changes back to the owning object.
    ///
    /// Only makes API calls if there are actual changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the Kubernetes API call fails.
    pub async fn apply<K>(
        &self,
        client: &Client,
        namespace: &str,
        name: &str,
    ) -> Result<(), ReconcileError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Debug
            + DeserializeOwned,
    {
        if !self.has_changes() {
            debug!(namespace = %namespace, name = %name, "status unchanged, skipping update");
            return Ok(());
        }

        let api: Api<K> = Api::namespaced(client.clone(), namespace);
        api.patch_status(name, &PatchParams::default(), &Patch::Merge(&self.status_patch()))
            .await
            .map_err(map_kube_error)?;
        api.patch(name, &PatchParams::default(), &Patch::Merge(&self.annotations_patch()))
            .await
            .map_err(map_kube_error)?;

        let (conditions, futures) = {
            let state = self.state();
            (state.conditions.len(), state.futures.as_slice().len())
        };
        debug!(
            namespace = %namespace,
            name = %name,
            conditions,
            futures,
            "updated status"
        );
        Ok(())
    }

    fn record_service(&self, service_name: &str, state: ServiceState, err: Option<&ReconcileError>) {
        self.state().services.insert(
            service_name.to_string(),
            ServiceStatus {
                state,
                error: err.map(ToString::to_string),
            },
        );
    }
}

impl FutureScope for ReconcileStatus {
    fn get_long_running_operation_state(
        &self,
        name: &str,
        service_name: &str,
        future_type: FutureType,
    ) -> Option<Future> {
        self.state()
            .futures
            .get(name, service_name, future_type)
            .cloned()
    }

    fn set_long_running_operation_state(&self, future: Future) {
        self.state().futures.set(future);
    }

    fn delete_long_running_operation_state(
        &self,
        name: &str,
        service_name: &str,
        future_type: FutureType,
    ) {
        self.state().futures.delete(name, service_name, future_type);
    }
}

impl ConditionSetter for ReconcileStatus {
    fn set_condition_true(&self, condition: &str) {
        update_condition_in_memory(
            &mut self.state().conditions,
            condition,
            STATUS_TRUE,
            None,
            None,
            None,
        );
    }

    fn set_condition_false(
        &self,
        condition: &str,
        reason: &str,
        severity: ConditionSeverity,
        message: &str,
    ) {
        update_condition_in_memory(
            &mut self.state().conditions,
            condition,
            STATUS_FALSE,
            Some(severity),
            Some(reason),
            Some(message),
        );
    }
}

impl AsyncStatusUpdater for ReconcileStatus {
    fn update_put_status(&self, condition: &str, service_name: &str, err: Option<&ReconcileError>) {
        match err {
            None => {
                self.set_condition_true(condition);
                self.record_service(service_name, ServiceState::Ready, None);
            }
            Some(e) if e.is_not_done() => {
                self.set_condition_false(
                    condition,
                    REASON_OPERATION_NOT_DONE,
                    ConditionSeverity::Info,
                    &format!("{service_name} creation is in progress: {e}"),
                );
                self.record_service(service_name, ServiceState::NotDone, err);
            }
            Some(e) => {
                self.set_condition_false(
                    condition,
                    REASON_FAILED,
                    ConditionSeverity::Error,
                    &format!("{service_name} failed to create or update. err: {e}"),
                );
                self.record_service(service_name, ServiceState::Error, err);
            }
        }
    }

    fn update_delete_status(&self, condition: &str, service_name: &str, err: Option<&ReconcileError>) {
        match err {
            None => {
                self.set_condition_true(condition);
                self.record_service(service_name, ServiceState::Ready, None);
            }
            Some(e) if e.is_not_done() => {
                self.set_condition_false(
                    condition,
                    REASON_OPERATION_NOT_DONE,
                    ConditionSeverity::Info,
                    &format!("{service_name} deletion is in progress: {e}"),
                );
                self.record_service(service_name, ServiceState::Deleting, err);
            }
            Some(e) => {
                self.set_condition_false(
                    condition,
                    REASON_DELETION_FAILED,
                    ConditionSeverity::Error,
                    &format!("{service_name} failed to delete. err: {e}"),
                );
                self.record_service(service_name, ServiceState::Error, err);
            }
        }
    }
}

impl AnnotationJson for ReconcileStatus {
    fn annotation_json(&self, key: &str) -> Result<Tags, ReconcileError> {
        match self.annotation(key) {
            None => Ok(Tags::new()),
            Some(raw) if raw.is_empty() => Ok(Tags::new()),
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                ReconcileError::terminal(format!("annotation {key} is not a valid JSON map: {e}"))
            }),
        }
    }

    fn update_annotation_json(&self, key: &str, value: &Tags) -> Result<(), ReconcileError> {
        let raw = serde_json::to_string(value)?;
        self.set_annotation(key, raw);
        Ok(())
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
