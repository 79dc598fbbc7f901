// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Network interface service.
//!
//! A NIC gets exactly one primary IP configuration in the machine's subnet,
//! optionally joined to the backend pools of the public and internal load
//! balancers and bound to a public IP. Existing NICs are left untouched.
//!
//! Accelerated networking follows the spec when set; otherwise it is enabled
//! when the machine's VM size supports it. The service resolves the VM SKU
//! through the shared [`SkuCache`] for specs that carry neither.

use crate::azure::models::{
    InterfaceDnsSettings, InterfaceIpConfiguration, InterfaceIpConfigurationProperties,
    InterfaceProperties, NetworkInterface, ResourceType, SubResource,
};
use crate::azure::resource_id::{address_pool_id, public_ip_id, resource_id, subnet_id};
use crate::azure::resourceskus::{Sku, SkuCache, VIRTUAL_MACHINES_RESOURCE_TYPE};
use crate::azure::{needs_create_or_update, ArmResource, ResourceRef, ResourceSpecGetter};
use crate::azure_errors::ReconcileError;
use crate::constants::CAPABILITY_ACCELERATED_NETWORKING;
use crate::labels::LIFECYCLE_OWNED;
use crate::reconcilers::services::{
    create_or_update_all, delete_all, into_result, record_operation, ServiceReconciler,
    OPERATION_DELETE, OPERATION_RECONCILE,
};
use crate::reconcilers::{aggregate_error, Reconciler};
use crate::scope::AsyncStatusUpdater;
use crate::status_reasons::CONDITION_NETWORK_INTERFACE_READY;
use crate::tags::{build_tags, BuildParams, Tags};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub const SERVICE_NAME: &str = "interfaces";

/// Name of the single IP configuration of every NIC.
pub const IP_CONFIGURATION_NAME: &str = "pipConfig";

const ALLOCATION_STATIC: &str = "Static";
const ALLOCATION_DYNAMIC: &str = "Dynamic";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NICSpec {
    pub name: String,
    pub resource_group: String,
    pub subscription_id: String,
    pub location: String,
    pub cluster_name: String,
    pub machine_name: String,
    pub vnet_name: String,
    pub vnet_resource_group: String,
    pub subnet_name: String,
    pub static_ip_address: Option<String>,
    pub public_lb_name: Option<String>,
    pub public_lb_address_pool_name: Option<String>,
    pub internal_lb_name: Option<String>,
    pub internal_lb_address_pool_name: Option<String>,
    pub public_ip_name: Option<String>,
    pub accelerated_networking: Option<bool>,
    pub ip_forwarding: bool,
    pub dns_servers: Vec<String>,
    pub vm_size: String,
    /// SKU of `vm_size`, consulted when `accelerated_networking` is unset.
    pub sku: Option<Sku>,
    pub additional_tags: Tags,
}

impl NICSpec {
    fn accelerated_networking_enabled(&self) -> Result<bool, ReconcileError> {
        if let Some(enabled) = self.accelerated_networking {
            return Ok(enabled);
        }
        self.sku
            .as_ref()
            .map(|sku| sku.has_capability(CAPABILITY_ACCELERATED_NETWORKING))
            .ok_or_else(|| {
                ReconcileError::terminal(format!(
                    "unable to determine accelerated networking for network interface {}: VM size {:?} has no SKU",
                    self.name, self.vm_size
                ))
            })
    }

    fn backend_pools(&self) -> Vec<SubResource> {
        [
            (&self.public_lb_name, &self.public_lb_address_pool_name),
            (&self.internal_lb_name, &self.internal_lb_address_pool_name),
        ]
        .into_iter()
        .filter_map(|(lb, pool)| match (lb, pool) {
            (Some(lb), Some(pool)) => Some(SubResource::new(address_pool_id(
                &self.subscription_id,
                &self.resource_group,
                lb,
                pool,
            ))),
            _ => None,
        })
        .collect()
    }
}

impl ResourceRef for NICSpec {
    type Resource = NetworkInterface;

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn resource_group_name(&self) -> String {
        self.resource_group.clone()
    }
}

impl ArmResource for NICSpec {
    fn resource_id(&self, subscription_id: &str) -> String {
        resource_id(
            subscription_id,
            &self.resource_group,
            NetworkInterface::PROVIDER_TYPE,
            &self.name,
        )
    }

    fn api_version(&self) -> &'static str {
        NetworkInterface::API_VERSION
    }
}

impl ResourceSpecGetter for NICSpec {
    fn parameters(
        &self,
        existing: Option<&NetworkInterface>,
    ) -> Result<Option<NetworkInterface>, ReconcileError> {
        if !needs_create_or_update(existing) {
            return Ok(None);
        }

        let (allocation, private_ip) = match &self.static_ip_address {
            Some(ip) => (ALLOCATION_STATIC, Some(ip.clone())),
            None => (ALLOCATION_DYNAMIC, None),
        };
        let pools = self.backend_pools();

        let ip_configuration = InterfaceIpConfiguration {
            name: Some(IP_CONFIGURATION_NAME.to_string()),
            properties: Some(InterfaceIpConfigurationProperties {
                primary: Some(true),
                private_ip_allocation_method: Some(allocation.to_string()),
                private_ip_address: private_ip,
                subnet: Some(SubResource::new(subnet_id(
                    &self.subscription_id,
                    &self.vnet_resource_group,
                    &self.vnet_name,
                    &self.subnet_name,
                ))),
                public_ip_address: self.public_ip_name.as_ref().map(|name| {
                    SubResource::new(public_ip_id(&self.subscription_id, &self.resource_group, name))
                }),
                load_balancer_backend_address_pools: (!pools.is_empty()).then_some(pools),
                ..Default::default()
            }),
            ..Default::default()
        };

        Ok(Some(NetworkInterface {
            location: Some(self.location.clone()),
            tags: Some(build_tags(&BuildParams {
                cluster_name: &self.cluster_name,
                lifecycle: LIFECYCLE_OWNED,
                name: &self.name,
                role: "",
                additional: &self.additional_tags,
            })),
            properties: Some(InterfaceProperties {
                ip_configurations: Some(vec![ip_configuration]),
                enable_accelerated_networking: Some(self.accelerated_networking_enabled()?),
                enable_ip_forwarding: Some(self.ip_forwarding),
                dns_settings: (!self.dns_servers.is_empty()).then(|| InterfaceDnsSettings {
                    dns_servers: Some(self.dns_servers.clone()),
                }),
                ..Default::default()
            }),
            ..Default::default()
        }))
    }
}

pub trait NICScope: AsyncStatusUpdater {
    fn nic_specs(&self) -> Vec<NICSpec>;
}

pub struct NICService<Sc, R> {
    scope: Arc<Sc>,
    reconciler: R,
    skus: Arc<SkuCache>,
}

impl<Sc, R> NICService<Sc, R> {
    #[must_use]
    pub fn new(scope: Arc<Sc>, reconciler: R, skus: Arc<SkuCache>) -> Self {
        Self {
            scope,
            reconciler,
            skus,
        }
    }

    /// Fills in the VM SKU of specs that need it to decide on accelerated
    /// networking.
    async fn resolve_sku(&self, mut spec: NICSpec) -> Result<NICSpec, ReconcileError> {
        if spec.accelerated_networking.is_some() || spec.sku.is_some() {
            return Ok(spec);
        }
        let sku = self
            .skus
            .get(&spec.vm_size, VIRTUAL_MACHINES_RESOURCE_TYPE, &spec.location)
            .await
            .map_err(|e| {
                e.wrap(format!(
                    "failed to get SKU {} in location {} for network interface {}",
                    spec.vm_size, spec.location, spec.name
                ))
            })?;
        spec.sku = Some(sku);
        Ok(spec)
    }
}

#[async_trait]
impl<Sc, R> ServiceReconciler for NICService<Sc, R>
where
    Sc: NICScope,
    R: Reconciler<NICSpec>,
{
    fn name(&self) -> &'static str {
        SERVICE_NAME
    }

    async fn reconcile(&self) -> Result<(), ReconcileError> {
        let specs = self.scope.nic_specs();
        if specs.is_empty() {
            debug!(service = %SERVICE_NAME, "No network interfaces to reconcile");
            return Ok(());
        }
        let started = Instant::now();

        let mut resolved = Vec::with_capacity(specs.len());
        let mut errors = Vec::new();
        for spec in specs {
            match self.resolve_sku(spec).await {
                Ok(spec) => resolved.push(spec),
                Err(e) => errors.push(e),
            }
        }
        let (_, err) = create_or_update_all(&self.reconciler, &resolved, SERVICE_NAME).await;
        errors.extend(err);
        let result = into_result(aggregate_error(errors));

        self.scope.update_put_status(
            CONDITION_NETWORK_INTERFACE_READY,
            SERVICE_NAME,
            result.as_ref().err(),
        );
        record_operation(SERVICE_NAME, OPERATION_RECONCILE, started, &result);
        result
    }

    async fn delete(&self) -> Result<(), ReconcileError> {
        let specs = self.scope.nic_specs();
        if specs.is_empty() {
            return Ok(());
        }
        let started = Instant::now();

        let result = into_result(delete_all(&self.reconciler, None, &specs, SERVICE_NAME).await);

        self.scope.update_delete_status(
            CONDITION_NETWORK_INTERFACE_READY,
            SERVICE_NAME,
            result.as_ref().err(),
        );
        record_operation(SERVICE_NAME, OPERATION_DELETE, started, &result);
        result
    }
}

#[cfg(test)]
#[path = "networkinterfaces_tests.rs"]
mod networkinterfaces_tests;
