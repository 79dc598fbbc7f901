// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation through backing objects owned by the Azure service operator.
//!
//! Instead of calling Azure, this reconciler applies a Kubernetes object
//! describing the resource and reads back the operator's `Ready` condition.
//!
//! # Ownership
//!
//! A backing object is *owned* when it carries a controller owner reference to
//! the owning object (or, for objects created by older releases, the
//! owned-by-cluster label). It is *managed* when it is owned and its
//! reconcile-policy annotation is `manage` or absent. Only managed objects are updated or
//! deleted; anything else was adopted from the user and is left alone.
//!
//! # Pausing
//!
//! While the owning cluster is paused ([`AsoReconciler::with_paused`]),
//! create-or-update only runs [`AsoReconciler::pause_resource`], which switches
//! a managed object to `reconcile-policy=skip` and remembers the previous policy.
//! The first create-or-update after unpausing restores it.
//!
//! Every Kubernetes call is bounded by the service reconcile timeout
//! ([`AsoReconciler::with_timeout`]); one that runs out is a transient error.

use crate::azure_errors::ReconcileError;
use crate::constants::DEFAULT_AZURE_SERVICE_RECONCILE_TIMEOUT_SECS;
use crate::crd::{AsoStatus, Future, FutureType};
use crate::labels::{
    CLUSTER_NAME_LABEL, LAST_APPLIED_SPEC_ANNOTATION, OWNED_BY_CLUSTER_LABEL,
    PRE_PAUSE_RECONCILE_POLICY_ANNOTATION, RECONCILE_POLICY_ANNOTATION, RECONCILE_POLICY_MANAGE,
    RECONCILE_POLICY_SKIP,
};
use crate::reconcilers::resources::ObjectClient;
use crate::reconcilers::{ManagedChecker, Reconciler};
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A spec reconciled through a backing object of kind `Object`.
pub trait AsoResourceSpecGetter: Send + Sync {
    type Object: Resource<DynamicType = ()>
        + AsoStatus
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static;

    /// An object carrying only the name and namespace of the backing object.
    fn resource_ref(&self) -> Self::Object;

    /// The desired backing object given the existing one, or `None` when the
    /// existing object needs no change.
    ///
    /// # Errors
    ///
    /// Returns a terminal error when the spec cannot be satisfied.
    fn parameters(
        &self,
        existing: Option<&Self::Object>,
    ) -> Result<Option<Self::Object>, ReconcileError>;

    /// Reconcile policy for newly created objects. Defaults to `manage`.
    fn reconcile_policy(&self) -> Option<String> {
        None
    }
}

/// Controller owner reference to `owner`.
#[must_use]
pub fn controller_owner_reference<K: Resource<DynamicType = ()>>(owner: &K) -> OwnerReference {
    OwnerReference {
        api_version: K::api_version(&()).to_string(),
        kind: K::kind(&()).to_string(),
        name: owner.meta().name.clone().unwrap_or_default(),
        uid: owner.meta().uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// Decodes the spec recorded by the last apply of `object`.
///
/// # Errors
///
/// Returns a terminal error when the annotation is not valid JSON for `T`.
pub fn last_applied_spec<K: Resource, T: DeserializeOwned>(
    object: &K,
) -> Result<Option<T>, ReconcileError> {
    object
        .annotations()
        .get(LAST_APPLIED_SPEC_ANNOTATION)
        .map(|raw| {
            serde_json::from_str(raw).map_err(|e| {
                ReconcileError::terminal(format!(
                    "annotation {LAST_APPLIED_SPEC_ANNOTATION} is not a valid spec: {e}"
                ))
            })
        })
        .transpose()
}

/// Reconciles specs by applying backing objects through `C`.
pub struct AsoReconciler<C> {
    client: C,
    cluster_name: String,
    owner: OwnerReference,
    paused: bool,
    timeout: Duration,
}

impl<C> AsoReconciler<C> {
    #[must_use]
    pub fn new(client: C, cluster_name: impl Into<String>, owner: OwnerReference) -> Self {
        Self {
            client,
            cluster_name: cluster_name.into(),
            owner,
            paused: false,
            timeout: Duration::from_secs(DEFAULT_AZURE_SERVICE_RECONCILE_TIMEOUT_SECS),
        }
    }

    /// Bounds every Kubernetes call, normally with the scope's
    /// `defaulted_azure_service_reconcile_timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Marks the owning cluster as paused: create-or-update then only pauses
    /// the backing object.
    #[must_use]
    pub fn with_paused(mut self, paused: bool) -> Self {
        self.paused = paused;
        self
    }

    fn is_owned<K: Resource>(&self, object: &K) -> bool {
        let has_owner_ref = object.owner_references().iter().any(|owner| {
            owner.uid == self.owner.uid
                || (owner.kind == self.owner.kind && owner.name == self.owner.name)
        });
        has_owner_ref
            || object
                .labels()
                .get(OWNED_BY_CLUSTER_LABEL)
                .is_some_and(|cluster| *cluster == self.cluster_name)
    }

    fn is_managed_object<K: Resource>(&self, object: &K) -> bool {
        self.is_owned(object)
            && reconcile_policy(object).unwrap_or(RECONCILE_POLICY_MANAGE) == RECONCILE_POLICY_MANAGE
    }

    /// Owned objects with a remembered pre-pause policy are being unpaused.
    fn is_paused_by_us<K: Resource>(&self, object: &K) -> bool {
        self.is_owned(object)
            && object
                .annotations()
                .contains_key(PRE_PAUSE_RECONCILE_POLICY_ANNOTATION)
    }

    async fn bounded<T>(
        &self,
        action: &str,
        namespace: &str,
        name: &str,
        call: impl std::future::Future<Output = Result<T, ReconcileError>> + Send,
    ) -> Result<T, ReconcileError> {
        tokio::time::timeout(self.timeout, call).await.unwrap_or_else(|_| {
            warn!(namespace = %namespace, name = %name, "Kubernetes {action} timed out");
            Err(ReconcileError::transient(format!(
                "timed out trying to {action} backing object {namespace}/{name}"
            )))
        })
    }

    async fn get_object<K>(&self, namespace: &str, name: &str) -> Result<Option<K>, ReconcileError>
    where
        K: Send + Sync + 'static,
        C: ObjectClient<K>,
    {
        self.bounded("get", namespace, name, ObjectClient::<K>::get(&self.client, namespace, name))
            .await
    }

    async fn apply_object<K>(&self, namespace: &str, object: &K) -> Result<K, ReconcileError>
    where
        K: Resource + Send + Sync + 'static,
        C: ObjectClient<K>,
    {
        let name = object.meta().name.clone().unwrap_or_default();
        self.bounded("apply", namespace, &name, ObjectClient::<K>::apply(&self.client, namespace, object))
            .await
    }

    async fn delete_object<K>(&self, namespace: &str, name: &str) -> Result<(), ReconcileError>
    where
        K: Send + Sync + 'static,
        C: ObjectClient<K>,
    {
        self.bounded("delete", namespace, name, ObjectClient::<K>::delete(&self.client, namespace, name))
            .await
    }
}

fn reconcile_policy<K: Resource>(object: &K) -> Option<&str> {
    object
        .annotations()
        .get(RECONCILE_POLICY_ANNOTATION)
        .map(String::as_str)
}

fn not_done(future_type: FutureType, service_name: &str, namespace: &str, name: &str) -> ReconcileError {
    ReconcileError::not_done(Future {
        r#type: future_type,
        service_name: service_name.to_string(),
        name: name.to_string(),
        resource_group: namespace.to_string(),
        data: String::new(),
    })
}

fn namespace_of<K: Resource>(object: &K) -> Result<String, ReconcileError> {
    object.meta().namespace.clone().ok_or_else(|| {
        ReconcileError::terminal(format!(
            "backing object {} has no namespace",
            object.meta().name.clone().unwrap_or_default()
        ))
    })
}

/// Maps the operator's `Ready` condition to a reconcile outcome.
fn ready_outcome<K>(object: &K, service_name: &str, namespace: &str) -> Result<(), ReconcileError>
where
    K: Resource + AsoStatus,
{
    let name = object.meta().name.clone().unwrap_or_default();
    let generation = object.meta().generation;
    match object.ready_condition() {
        Some(ready) if ready.status == "True" => {
            let current = match (ready.observed_generation, generation) {
                (Some(observed), Some(generation)) => observed >= generation,
                _ => true,
            };
            if current {
                Ok(())
            } else {
                Err(not_done(FutureType::Put, service_name, namespace, &name))
            }
        }
        Some(ready) if ready.status == "False" => {
            let message = format!(
                "{}: {}",
                ready.reason.as_deref().unwrap_or("NotReady"),
                ready.message.as_deref().unwrap_or_default()
            );
            if ready.is_error_severity() {
                Err(ReconcileError::terminal(message))
            } else {
                Err(ReconcileError::transient(message))
            }
        }
        _ => Err(not_done(FutureType::Put, service_name, namespace, &name)),
    }
}

impl<C> AsoReconciler<C> {
    /// Switches a managed backing object to `reconcile-policy=skip`, remembering
    /// its current policy.
    ///
    /// # Errors
    ///
    /// Returns the Kubernetes API error of reading or applying the object.
    pub async fn pause_resource<S>(&self, spec: &S, service_name: &str) -> Result<(), ReconcileError>
    where
        S: AsoResourceSpecGetter,
        C: ObjectClient<S::Object>,
    {
        let reference = spec.resource_ref();
        let namespace = namespace_of(&reference)?;
        let name = reference.name_any();

        let Some(mut existing) = self.get_object::<S::Object>(&namespace, &name).await? else {
            return Ok(());
        };
        if !self.is_managed_object(&existing) {
            debug!(service = %service_name, namespace = %namespace, name = %name, "Skipping pause of unmanaged backing object");
            return Ok(());
        }

        let annotations = existing.annotations_mut();
        annotations.insert(
            PRE_PAUSE_RECONCILE_POLICY_ANNOTATION.to_string(),
            RECONCILE_POLICY_MANAGE.to_string(),
        );
        annotations.insert(
            RECONCILE_POLICY_ANNOTATION.to_string(),
            RECONCILE_POLICY_SKIP.to_string(),
        );
        self.apply_object(&namespace, &existing).await?;
        info!(service = %service_name, namespace = %namespace, name = %name, "Paused backing object");
        Ok(())
    }

    /// Whether the resources inside the spec's backing object must be deleted
    /// one by one. False only when the backing object is managed, in which case
    /// deleting it removes everything. Errors count as true.
    pub async fn should_delete_individual_resources<S>(&self, spec: &S) -> bool
    where
        S: AsoResourceSpecGetter,
        C: ObjectClient<S::Object>,
    {
        let reference = spec.resource_ref();
        let Ok(namespace) = namespace_of(&reference) else {
            return true;
        };
        match self
            .get_object::<S::Object>(&namespace, &reference.name_any())
            .await
        {
            Ok(Some(existing)) => !self.is_managed_object(&existing),
            Ok(None) | Err(_) => true,
        }
    }

    fn prepare<K: Resource>(&self, object: &mut K, existing: Option<&K>, requested: Option<String>) {
        let labels = object.labels_mut();
        labels.insert(CLUSTER_NAME_LABEL.to_string(), self.cluster_name.clone());
        labels.insert(OWNED_BY_CLUSTER_LABEL.to_string(), self.cluster_name.clone());

        let owner_references = object.owner_references_mut();
        if !owner_references.iter().any(|owner| owner.uid == self.owner.uid) {
            owner_references.push(self.owner.clone());
        }

        let restored = existing.and_then(|existing| {
            existing
                .annotations()
                .get(PRE_PAUSE_RECONCILE_POLICY_ANNOTATION)
                .cloned()
        });
        let current = existing.and_then(|existing| reconcile_policy(existing).map(ToString::to_string));
        let policy = restored
            .or(current)
            .or(requested)
            .unwrap_or_else(|| RECONCILE_POLICY_MANAGE.to_string());
        let annotations = object.annotations_mut();
        annotations.remove(PRE_PAUSE_RECONCILE_POLICY_ANNOTATION);
        annotations.insert(RECONCILE_POLICY_ANNOTATION.to_string(), policy);
    }
}

#[async_trait]
impl<S, C> Reconciler<S> for AsoReconciler<C>
where
    S: AsoResourceSpecGetter,
    C: ObjectClient<S::Object>,
{
    type Output = S::Object;

    async fn create_or_update_resource(
        &self,
        spec: &S,
        service_name: &str,
    ) -> Result<Option<S::Object>, ReconcileError> {
        let reference = spec.resource_ref();
        let namespace = namespace_of(&reference)?;
        let name = reference.name_any();

        if self.paused {
            self.pause_resource(spec, service_name).await?;
            return self.get_object(&namespace, &name).await;
        }

        let existing = self.get_object::<S::Object>(&namespace, &name).await.map_err(|e| {
            e.wrap(format!(
                "failed to get existing backing object {namespace}/{name} (service: {service_name})"
            ))
        })?;

        if let Some(existing) = &existing {
            if !self.is_managed_object(existing) && !self.is_paused_by_us(existing) {
                debug!(
                    service = %service_name,
                    namespace = %namespace,
                    name = %name,
                    "Backing object is not managed, skipping update"
                );
                return Ok(Some(existing.clone()));
            }
        }

        let unpausing = existing.as_ref().is_some_and(|e| self.is_paused_by_us(e));
        let parameters = spec.parameters(existing.as_ref())?;
        let parameters = match (parameters, &existing) {
            (Some(parameters), _) => Some(parameters),
            // Unpausing must write back the restored policy even without changes.
            (None, Some(existing)) if unpausing => Some(existing.clone()),
            (None, _) => None,
        };

        let result = match parameters {
            None => {
                debug!(
                    service = %service_name,
                    namespace = %namespace,
                    name = %name,
                    "Backing object is up to date"
                );
                existing
            }
            Some(mut desired) => {
                self.prepare(&mut desired, existing.as_ref(), spec.reconcile_policy());
                let applied_spec = serde_json::to_value(&desired)?
                    .get("spec")
                    .map(ToString::to_string)
                    .unwrap_or_default();
                desired
                    .annotations_mut()
                    .insert(LAST_APPLIED_SPEC_ANNOTATION.to_string(), applied_spec);

                let action = if existing.is_some() { "update" } else { "create" };
                let applied = self.apply_object(&namespace, &desired).await.map_err(|e| {
                    e.wrap(format!(
                        "failed to {action} backing object {namespace}/{name} (service: {service_name})"
                    ))
                })?;
                info!(
                    service = %service_name,
                    namespace = %namespace,
                    name = %name,
                    "Applied backing object"
                );
                Some(applied)
            }
        };

        let Some(result) = result else {
            return Ok(None);
        };
        ready_outcome(&result, service_name, &namespace)?;
        Ok(Some(result))
    }

    async fn delete_resource(&self, spec: &S, service_name: &str) -> Result<(), ReconcileError> {
        let reference = spec.resource_ref();
        let namespace = namespace_of(&reference)?;
        let name = reference.name_any();

        let Some(existing) = self.get_object::<S::Object>(&namespace, &name).await? else {
            debug!(service = %service_name, namespace = %namespace, name = %name, "Backing object already gone");
            return Ok(());
        };

        if !self.is_managed_object(&existing) {
            debug!(
                service = %service_name,
                namespace = %namespace,
                name = %name,
                "Backing object is not managed, skipping delete"
            );
            return Ok(());
        }

        if existing.meta().deletion_timestamp.is_none() {
            self.delete_object::<S::Object>(&namespace, &name).await.map_err(|e| {
                e.wrap(format!(
                    "failed to delete backing object {namespace}/{name} (service: {service_name})"
                ))
            })?;
            info!(service = %service_name, namespace = %namespace, name = %name, "Deleting backing object");
        }
        Err(not_done(FutureType::Delete, service_name, &namespace, &name))
    }
}

#[async_trait]
impl<S, C> ManagedChecker<S> for AsoReconciler<C>
where
    S: AsoResourceSpecGetter,
    C: ObjectClient<S::Object>,
{
    async fn is_managed(&self, spec: &S) -> Result<bool, ReconcileError> {
        let reference = spec.resource_ref();
        let namespace = namespace_of(&reference)?;
        Ok(self
            .get_object::<S::Object>(&namespace, &reference.name_any())
            .await?
            .is_some_and(|existing| self.is_managed_object(&existing)))
    }
}

#[cfg(test)]
#[path = "aso_tests.rs"]
mod aso_tests;
