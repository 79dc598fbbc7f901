// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Virtual network service.

use crate::azure::models::{AddressSpace, ResourceType, VirtualNetwork, VirtualNetworkProperties};
use crate::azure::resource_id::resource_id;
use crate::azure::{needs_create_or_update, ArmResource, ResourceRef, ResourceSpecGetter};
use crate::azure_errors::ReconcileError;
use crate::constants::ROLE_COMMON;
use crate::labels::LIFECYCLE_OWNED;
use crate::reconcilers::services::{
    delete_all, into_result, record_operation, ServiceReconciler, OPERATION_DELETE,
    OPERATION_RECONCILE,
};
use crate::reconcilers::{ManagedChecker, Reconciler};
use crate::scope::AsyncStatusUpdater;
use crate::status_reasons::CONDITION_VNET_READY;
use crate::tags::{build_tags, BuildParams, Tags};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

pub const SERVICE_NAME: &str = "virtualnetwork";

/// Desired state of the cluster's virtual network.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VNetSpec {
    pub name: String,
    pub resource_group: String,
    pub cidr_blocks: Vec<String>,
    pub location: String,
    pub cluster_name: String,
    pub additional_tags: Tags,
}

impl ResourceRef for VNetSpec {
    type Resource = VirtualNetwork;

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn resource_group_name(&self) -> String {
        self.resource_group.clone()
    }
}

impl ArmResource for VNetSpec {
    fn resource_id(&self, subscription_id: &str) -> String {
        resource_id(
            subscription_id,
            &self.resource_group,
            VirtualNetwork::PROVIDER_TYPE,
            &self.name,
        )
    }

    fn api_version(&self) -> &'static str {
        VirtualNetwork::API_VERSION
    }
}

impl ResourceSpecGetter for VNetSpec {
    fn parameters(
        &self,
        existing: Option<&VirtualNetwork>,
    ) -> Result<Option<VirtualNetwork>, ReconcileError> {
        // Address space and subnets of an existing network are never updated.
        if !needs_create_or_update(existing) {
            return Ok(None);
        }
        Ok(Some(VirtualNetwork {
            location: Some(self.location.clone()),
            tags: Some(build_tags(&BuildParams {
                cluster_name: &self.cluster_name,
                lifecycle: LIFECYCLE_OWNED,
                name: &self.name,
                role: ROLE_COMMON,
                additional: &self.additional_tags,
            })),
            properties: Some(VirtualNetworkProperties {
                address_space: Some(AddressSpace {
                    address_prefixes: Some(self.cidr_blocks.clone()),
                }),
                ..Default::default()
            }),
            ..Default::default()
        }))
    }
}

pub trait VNetScope: AsyncStatusUpdater {
    fn vnet_spec(&self) -> VNetSpec;
}

/// Reconciles the cluster's virtual network. A network the cluster does not
/// own is used as is and never deleted.
pub struct VNetService<Sc, R, M> {
    scope: Arc<Sc>,
    reconciler: R,
    managed: M,
}

impl<Sc, R, M> VNetService<Sc, R, M> {
    #[must_use]
    pub fn new(scope: Arc<Sc>, reconciler: R, managed: M) -> Self {
        Self {
            scope,
            reconciler,
            managed,
        }
    }
}

#[async_trait]
impl<Sc, R, M> ServiceReconciler for VNetService<Sc, R, M>
where
    Sc: VNetScope,
    R: Reconciler<VNetSpec>,
    M: ManagedChecker<VNetSpec>,
{
    fn name(&self) -> &'static str {
        SERVICE_NAME
    }

    async fn reconcile(&self) -> Result<(), ReconcileError> {
        let started = Instant::now();
        let spec = self.scope.vnet_spec();

        let result = self
            .reconciler
            .create_or_update_resource(&spec, SERVICE_NAME)
            .await
            .map(|_| ());

        self.scope
            .update_put_status(CONDITION_VNET_READY, SERVICE_NAME, result.as_ref().err());
        record_operation(SERVICE_NAME, OPERATION_RECONCILE, started, &result);
        result
    }

    async fn delete(&self) -> Result<(), ReconcileError> {
        let started = Instant::now();
        let spec = self.scope.vnet_spec();
        let managed: &dyn ManagedChecker<VNetSpec> = &self.managed;

        let result = into_result(
            delete_all(
                &self.reconciler,
                Some(managed),
                std::slice::from_ref(&spec),
                SERVICE_NAME,
            )
            .await,
        );

        self.scope
            .update_delete_status(CONDITION_VNET_READY, SERVICE_NAME, result.as_ref().err());
        record_operation(SERVICE_NAME, OPERATION_DELETE, started, &result);
        result
    }
}

#[cfg(test)]
#[path = "virtualnetworks_tests.rs"]
mod virtualnetworks_tests;
