// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Resource group service.
//!
//! The group can be reconciled directly against Azure or through an
//! operator-managed `ResourceGroup` backing object; [`GroupSpec`] supports both.
//! A group the cluster does not own (bring-your-own) is never deleted.

use crate::azure::models::{ResourceGroup as AzureResourceGroup, ResourceGroupProperties};
use crate::azure::resource_id::resource_group_id;
use crate::azure::{needs_create_or_update, ArmResource, ResourceRef, ResourceSpecGetter};
use crate::azure_errors::ReconcileError;
use crate::constants::{API_VERSION_RESOURCES, ROLE_COMMON};
use crate::crd::{ResourceGroup as AsoResourceGroup, ResourceGroupSpec};
use crate::labels::LIFECYCLE_OWNED;
use crate::reconcilers::aso::{last_applied_spec, AsoReconciler, AsoResourceSpecGetter};
use crate::reconcilers::resources::ObjectClient;
use crate::reconcilers::services::{
    record_operation, ServiceReconciler, OPERATION_DELETE, OPERATION_RECONCILE,
};
use crate::reconcilers::{ManagedChecker, Reconciler};
use crate::scope::AsyncStatusUpdater;
use crate::status_reasons::CONDITION_RESOURCE_GROUP_READY;
use crate::tags::{apply_diff, build_tags, tags_changed, BuildParams, Tags};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub const SERVICE_NAME: &str = "group";

/// Desired state of the cluster's resource group.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GroupSpec {
    pub name: String,
    /// Namespace of the backing object in operator-managed mode.
    pub namespace: String,
    pub location: String,
    pub cluster_name: String,
    pub additional_tags: Tags,
}

impl GroupSpec {
    fn desired_tags(&self) -> Tags {
        build_tags(&BuildParams {
            cluster_name: &self.cluster_name,
            lifecycle: LIFECYCLE_OWNED,
            name: &self.name,
            role: ROLE_COMMON,
            additional: &self.additional_tags,
        })
    }
}

impl ResourceRef for GroupSpec {
    type Resource = AzureResourceGroup;

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn resource_group_name(&self) -> String {
        self.name.clone()
    }
}

impl ArmResource for GroupSpec {
    fn resource_id(&self, subscription_id: &str) -> String {
        resource_group_id(subscription_id, &self.name)
    }

    fn api_version(&self) -> &'static str {
        API_VERSION_RESOURCES
    }
}

impl ResourceSpecGetter for GroupSpec {
    fn parameters(
        &self,
        existing: Option<&AzureResourceGroup>,
    ) -> Result<Option<AzureResourceGroup>, ReconcileError> {
        // Tags of an existing group are reconciled by the tags service.
        if !needs_create_or_update(existing) {
            return Ok(None);
        }
        Ok(Some(AzureResourceGroup {
            location: self.location.clone(),
            tags: Some(self.desired_tags()),
            properties: Some(ResourceGroupProperties::default()),
            ..Default::default()
        }))
    }
}

impl AsoResourceSpecGetter for GroupSpec {
    type Object = AsoResourceGroup;

    fn resource_ref(&self) -> AsoResourceGroup {
        let mut group = AsoResourceGroup::new(&self.name, ResourceGroupSpec::default());
        group.metadata.namespace = Some(self.namespace.clone());
        group
    }

    fn parameters(
        &self,
        existing: Option<&AsoResourceGroup>,
    ) -> Result<Option<AsoResourceGroup>, ReconcileError> {
        let desired = self.desired_tags();

        let Some(existing) = existing else {
            let mut group = self.resource_ref();
            group.spec = ResourceGroupSpec {
                azure_name: Some(self.name.clone()),
                location: Some(self.location.clone()),
                tags: Some(desired),
            };
            return Ok(Some(group));
        };

        // Three-way merge so tags added to the backing object by others survive.
        let last_applied = last_applied_spec::<_, ResourceGroupSpec>(existing)?
            .and_then(|spec| spec.tags)
            .unwrap_or_default();
        let observed = existing.spec.tags.clone().unwrap_or_default();
        let diff = tags_changed(&last_applied, &desired, &observed);
        if !diff.changed {
            return Ok(None);
        }

        let mut group = existing.clone();
        group.spec.tags = Some(apply_diff(&observed, &diff));
        Ok(Some(group))
    }
}

/// Scope of the resource group service.
pub trait GroupScope: AsyncStatusUpdater {
    fn group_spec(&self) -> GroupSpec;
}

/// Reconciles the cluster's resource group through `R`, gating deletes on `M`.
pub struct GroupService<Sc, R, M> {
    scope: Arc<Sc>,
    reconciler: R,
    managed: M,
}

impl<Sc, R, M> GroupService<Sc, R, M> {
    #[must_use]
    pub fn new(scope: Arc<Sc>, reconciler: R, managed: M) -> Self {
        Self {
            scope,
            reconciler,
            managed,
        }
    }
}

impl<Sc, C, M> GroupService<Sc, Arc<AsoReconciler<C>>, M>
where
    Sc: GroupScope,
    C: ObjectClient<AsoResourceGroup>,
{
    /// Whether resources inside the group must be deleted one by one. False
    /// when deleting the managed backing object removes them all.
    pub async fn should_delete_individual_resources(&self) -> bool {
        self.reconciler
            .should_delete_individual_resources(&self.scope.group_spec())
            .await
    }
}

#[async_trait]
impl<Sc, R, M> ServiceReconciler for GroupService<Sc, R, M>
where
    Sc: GroupScope,
    R: Reconciler<GroupSpec>,
    M: ManagedChecker<GroupSpec>,
{
    fn name(&self) -> &'static str {
        SERVICE_NAME
    }

    async fn reconcile(&self) -> Result<(), ReconcileError> {
        let started = Instant::now();
        let spec = self.scope.group_spec();

        let result = self
            .reconciler
            .create_or_update_resource(&spec, SERVICE_NAME)
            .await
            .map(|_| ());

        self.scope
            .update_put_status(CONDITION_RESOURCE_GROUP_READY, SERVICE_NAME, result.as_ref().err());
        record_operation(SERVICE_NAME, OPERATION_RECONCILE, started, &result);
        result
    }

    async fn delete(&self) -> Result<(), ReconcileError> {
        let started = Instant::now();
        let spec = self.scope.group_spec();

        let result = match self.managed.is_managed(&spec).await {
            Ok(true) => self.reconciler.delete_resource(&spec, SERVICE_NAME).await,
            Ok(false) => {
                debug!(
                    service = %SERVICE_NAME,
                    resource_group = %spec.name,
                    "Skipping deletion of unmanaged resource group"
                );
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e.wrap(format!(
                "failed to determine if resource group {} is managed",
                spec.name
            ))),
        };

        self.scope
            .update_delete_status(CONDITION_RESOURCE_GROUP_READY, SERVICE_NAME, result.as_ref().err());
        record_operation(SERVICE_NAME, OPERATION_DELETE, started, &result);
        result
    }
}

#[cfg(test)]
#[path = "groups_tests.rs"]
mod groups_tests;
