// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Virtual machine scale set service.
//!
//! A new scale set is created from the full spec. Afterwards only the capacity
//! is reconciled: the observed scale set is sent back with the desired
//! capacity, everything else untouched.

use crate::azure::models::{
    AzureResource, ImageReference, LinuxConfiguration, ManagedDiskParameters, OsDisk, ResourceType,
    ScaleSetIpConfiguration, ScaleSetIpConfigurationProperties, ScaleSetNetworkConfiguration,
    ScaleSetNetworkConfigurationProperties, ScaleSetNetworkProfile, ScaleSetOsProfile,
    ScaleSetProperties, ScaleSetSku, ScaleSetVmProfile, SshConfiguration, SshPublicKey,
    StorageProfile, SubResource, UpgradePolicy, VirtualMachineScaleSet,
};
use crate::azure::resource_id::{address_pool_id, resource_id, subnet_id};
use crate::azure::{needs_create_or_update, ArmResource, ResourceRef, ResourceSpecGetter};
use crate::azure_errors::ReconcileError;
use crate::constants::ROLE_NODE;
use crate::crd::ProvisioningState;
use crate::labels::LIFECYCLE_OWNED;
use crate::reconcilers::services::{
    record_operation, ServiceReconciler, OPERATION_DELETE, OPERATION_RECONCILE,
};
use crate::reconcilers::Reconciler;
use crate::scope::AsyncStatusUpdater;
use crate::status_reasons::CONDITION_SCALE_SET_RUNNING;
use crate::tags::{build_tags, BuildParams, Tags};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

pub const SERVICE_NAME: &str = "scalesets";

const TIER_STANDARD: &str = "Standard";
const UPGRADE_MODE_MANUAL: &str = "Manual";
const ADMIN_USERNAME: &str = "capi";
const SSH_KEY_PATH: &str = "/home/capi/.ssh/authorized_keys";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScaleSetSpec {
    pub name: String,
    pub resource_group: String,
    pub subscription_id: String,
    pub location: String,
    pub cluster_name: String,
    pub size: String,
    pub capacity: i64,
    pub image: ImageReference,
    pub os_disk_size_gb: i32,
    pub os_disk_storage_account_type: String,
    pub ssh_public_key: String,
    pub bootstrap_data: String,
    pub vnet_name: String,
    pub vnet_resource_group: String,
    pub subnet_name: String,
    pub accelerated_networking: bool,
    /// `(load balancer, backend pool)` pairs every instance joins.
    pub backend_pools: Vec<(String, String)>,
    pub failure_domains: Vec<String>,
    pub additional_tags: Tags,
}

impl ScaleSetSpec {
    fn network_profile(&self) -> ScaleSetNetworkProfile {
        let pools: Vec<SubResource> = self
            .backend_pools
            .iter()
            .map(|(lb, pool)| {
                SubResource::new(address_pool_id(&self.subscription_id, &self.resource_group, lb, pool))
            })
            .collect();

        ScaleSetNetworkProfile {
            network_interface_configurations: Some(vec![ScaleSetNetworkConfiguration {
                name: Some(format!("{}-netconfig", self.name)),
                properties: Some(ScaleSetNetworkConfigurationProperties {
                    primary: Some(true),
                    enable_accelerated_networking: Some(self.accelerated_networking),
                    ip_configurations: Some(vec![ScaleSetIpConfiguration {
                        name: Some(format!("{}-ipconfig", self.name)),
                        properties: Some(ScaleSetIpConfigurationProperties {
                            primary: Some(true),
                            subnet: Some(SubResource::new(subnet_id(
                                &self.subscription_id,
                                &self.vnet_resource_group,
                                &self.vnet_name,
                                &self.subnet_name,
                            ))),
                            load_balancer_backend_address_pools: (!pools.is_empty())
                                .then_some(pools),
                        }),
                    }]),
                }),
            }]),
        }
    }

    fn new_scale_set(&self) -> VirtualMachineScaleSet {
        VirtualMachineScaleSet {
            location: Some(self.location.clone()),
            tags: Some(build_tags(&BuildParams {
                cluster_name: &self.cluster_name,
                lifecycle: LIFECYCLE_OWNED,
                name: &self.name,
                role: ROLE_NODE,
                additional: &self.additional_tags,
            })),
            zones: (!self.failure_domains.is_empty()).then(|| self.failure_domains.clone()),
            sku: Some(ScaleSetSku {
                name: Some(self.size.clone()),
                tier: Some(TIER_STANDARD.to_string()),
                capacity: Some(self.capacity),
            }),
            properties: Some(ScaleSetProperties {
                upgrade_policy: Some(UpgradePolicy {
                    mode: Some(UPGRADE_MODE_MANUAL.to_string()),
                }),
                overprovision: Some(false),
                virtual_machine_profile: Some(ScaleSetVmProfile {
                    os_profile: Some(ScaleSetOsProfile {
                        computer_name_prefix: Some(self.name.clone()),
                        admin_username: Some(ADMIN_USERNAME.to_string()),
                        custom_data: Some(self.bootstrap_data.clone()),
                        linux_configuration: Some(LinuxConfiguration {
                            disable_password_authentication: Some(true),
                            ssh: Some(SshConfiguration {
                                public_keys: Some(vec![SshPublicKey {
                                    path: Some(SSH_KEY_PATH.to_string()),
                                    key_data: Some(self.ssh_public_key.clone()),
                                }]),
                            }),
                        }),
                    }),
                    storage_profile: Some(StorageProfile {
                        image_reference: Some(self.image.clone()),
                        os_disk: Some(OsDisk {
                            create_option: Some("FromImage".to_string()),
                            disk_size_gb: Some(self.os_disk_size_gb),
                            managed_disk: Some(ManagedDiskParameters {
                                storage_account_type: Some(self.os_disk_storage_account_type.clone()),
                            }),
                            ..Default::default()
                        }),
                        data_disks: None,
                    }),
                    network_profile: Some(self.network_profile()),
                    priority: None,
                }),
                provisioning_state: None,
            }),
            ..Default::default()
        }
    }
}

impl ResourceRef for ScaleSetSpec {
    type Resource = VirtualMachineScaleSet;

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn resource_group_name(&self) -> String {
        self.resource_group.clone()
    }
}

impl ArmResource for ScaleSetSpec {
    fn resource_id(&self, subscription_id: &str) -> String {
        resource_id(
            subscription_id,
            &self.resource_group,
            VirtualMachineScaleSet::PROVIDER_TYPE,
            &self.name,
        )
    }

    fn api_version(&self) -> &'static str {
        VirtualMachineScaleSet::API_VERSION
    }
}

impl ResourceSpecGetter for ScaleSetSpec {
    fn parameters(
        &self,
        existing: Option<&VirtualMachineScaleSet>,
    ) -> Result<Option<VirtualMachineScaleSet>, ReconcileError> {
        let Some(existing) = existing else {
            return Ok(Some(self.new_scale_set()));
        };
        if needs_create_or_update(Some(existing)) {
            return Ok(Some(self.new_scale_set()));
        }
        // Only a settled scale set is scaled; one in flight is left alone.
        let settled = existing
            .provisioning_state()
            .map(ProvisioningState::from_azure)
            == Some(ProvisioningState::Succeeded);
        if !settled {
            return Ok(None);
        }

        let current = existing.sku.as_ref().and_then(|sku| sku.capacity);
        if current == Some(self.capacity) {
            return Ok(None);
        }

        let mut updated = existing.clone();
        updated.sku.get_or_insert_with(ScaleSetSku::default).capacity = Some(self.capacity);
        if let Some(properties) = updated.properties.as_mut() {
            properties.provisioning_state = None;
        }
        Ok(Some(updated))
    }
}

pub trait ScaleSetScope: AsyncStatusUpdater {
    fn scale_set_spec(&self) -> ScaleSetSpec;
    fn set_provisioning_state(&self, state: ProvisioningState);
}

pub struct ScaleSetService<Sc, R> {
    scope: Arc<Sc>,
    reconciler: R,
}

impl<Sc, R> ScaleSetService<Sc, R> {
    #[must_use]
    pub fn new(scope: Arc<Sc>, reconciler: R) -> Self {
        Self { scope, reconciler }
    }
}

#[async_trait]
impl<Sc, R> ServiceReconciler for ScaleSetService<Sc, R>
where
    Sc: ScaleSetScope,
    R: Reconciler<ScaleSetSpec, Output = VirtualMachineScaleSet>,
{
    fn name(&self) -> &'static str {
        SERVICE_NAME
    }

    async fn reconcile(&self) -> Result<(), ReconcileError> {
        let started = Instant::now();
        let spec = self.scope.scale_set_spec();

        let result = self
            .reconciler
            .create_or_update_resource(&spec, SERVICE_NAME)
            .await
            .map(|scale_set| {
                let state = scale_set
                    .as_ref()
                    .and_then(|s| s.properties.as_ref())
                    .and_then(|p| p.provisioning_state.as_deref())
                    .map_or(ProvisioningState::Unknown, ProvisioningState::from_azure);
                self.scope.set_provisioning_state(state);
                info!(
                    service = %SERVICE_NAME,
                    name = %spec.name,
                    capacity = spec.capacity,
                    "Scale set reconciled"
                );
            });

        self.scope
            .update_put_status(CONDITION_SCALE_SET_RUNNING, SERVICE_NAME, result.as_ref().err());
        record_operation(SERVICE_NAME, OPERATION_RECONCILE, started, &result);
        result
    }

    async fn delete(&self) -> Result<(), ReconcileError> {
        let started = Instant::now();
        let spec = self.scope.scale_set_spec();

        let result = self.reconciler.delete_resource(&spec, SERVICE_NAME).await;
        match &result {
            Ok(()) => self.scope.set_provisioning_state(ProvisioningState::Deleted),
            Err(e) if e.is_not_done() => self.scope.set_provisioning_state(ProvisioningState::Deleting),
            Err(_) => {}
        }

        self.scope
            .update_delete_status(CONDITION_SCALE_SET_RUNNING, SERVICE_NAME, result.as_ref().err());
        record_operation(SERVICE_NAME, OPERATION_DELETE, started, &result);
        result
    }
}

#[cfg(test)]
#[path = "scalesets_tests.rs"]
mod scalesets_tests;
