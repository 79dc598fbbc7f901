// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Virtual machine service.
//!
//! # Reconcile
//!
//! The VM is created once and never updated in place. A VM whose provider ID is
//! already recorded but that no longer exists in Azure was deleted out of band
//! and is not recreated.
//!
//! After the VM exists the service publishes, through [`VMScope`]:
//!
//! - the provider ID (`azure://<resource id>`, resource group lower-cased)
//! - the machine addresses: the VM name as internal DNS, then for every NIC IP
//!   configuration the private IP and, when bound, the public IP
//! - the VM provisioning state
//!
//! It then checks that every user-assigned identity the spec asks for is
//! attached to the VM, and reports a missing one on `VMIdentitiesReady`.
//!
//! # Delete
//!
//! The VM state follows the delete: `Deleting` while the operation runs,
//! `Deleted` once it is gone.

use crate::azure::client::ResourceLookup;
use crate::azure::identities::IdentityClient;
use crate::azure::models::{
    DataDisk, HardwareProfile, ImageReference, InterfaceIpConfiguration, LinuxConfiguration,
    ManagedDiskParameters, NetworkInterface, NetworkInterfaceReference,
    NetworkInterfaceReferenceProperties, NetworkProfile, OsDisk, OsProfile, PublicIpAddress,
    ResourceType, SshConfiguration, SshPublicKey, StorageProfile, UserAssignedIdentityValue,
    VirtualMachine, VirtualMachineIdentity, VirtualMachineProperties,
};
use crate::azure::resource_id::{
    network_interface_id, parse_resource_id, provider_id_from_resource_id, resource_id,
    resource_id_from_provider_id,
};
use crate::azure::{needs_create_or_update, ArmResource, Getter, ResourceRef, ResourceSpecGetter};
use crate::azure_errors::ReconcileError;
use crate::crd::{AddressType, ConditionSeverity, MachineAddress, ProvisioningState};
use crate::labels::LIFECYCLE_OWNED;
use crate::reconcilers::services::{
    record_operation, ServiceReconciler, OPERATION_DELETE, OPERATION_RECONCILE,
};
use crate::reconcilers::Reconciler;
use crate::scope::AsyncStatusUpdater;
use crate::status_reasons::{
    CONDITION_DISKS_READY, CONDITION_VM_IDENTITIES_READY, CONDITION_VM_RUNNING,
    MESSAGE_VM_MISSING_IDENTITY, REASON_USER_ASSIGNED_IDENTITY_MISSING,
};
use crate::tags::{build_tags, BuildParams, Tags};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

pub const SERVICE_NAME: &str = "virtualmachine";

const ADMIN_USERNAME: &str = "capi";
const SSH_KEY_PATH: &str = "/home/capi/.ssh/authorized_keys";
const OS_TYPE_LINUX: &str = "Linux";
const CREATE_FROM_IMAGE: &str = "FromImage";
const CREATE_EMPTY: &str = "Empty";
const CACHING_READ_WRITE: &str = "ReadWrite";
const PRIORITY_SPOT: &str = "Spot";

/// Managed identity requested for a VM.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VMIdentity {
    #[default]
    None,
    SystemAssigned,
    UserAssigned,
}

impl VMIdentity {
    fn azure_type(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::SystemAssigned => Some("SystemAssigned"),
            Self::UserAssigned => Some("UserAssigned"),
        }
    }
}

/// A data disk attached at creation; the Azure disk is named
/// `<vm name>_<name_suffix>`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataDiskSpec {
    pub name_suffix: String,
    pub disk_size_gb: i32,
    pub lun: i32,
    pub caching: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct VMSpec {
    pub name: String,
    pub resource_group: String,
    pub subscription_id: String,
    pub location: String,
    pub cluster_name: String,
    /// `control-plane` or `node`.
    pub role: String,
    /// Provider ID recorded on the machine by an earlier reconcile.
    pub provider_id: Option<String>,
    /// Attached NICs; the first one is primary.
    pub nic_names: Vec<String>,
    pub size: String,
    pub zone: Option<String>,
    pub image: ImageReference,
    pub os_disk_size_gb: i32,
    pub os_disk_storage_account_type: String,
    pub data_disks: Vec<DataDiskSpec>,
    pub ssh_public_key: String,
    /// Base64 encoded bootstrap data.
    pub bootstrap_data: String,
    pub identity: VMIdentity,
    /// Provider IDs of the user-assigned identities to attach.
    pub user_assigned_identities: Vec<String>,
    pub spot_eviction_policy: Option<String>,
    pub additional_tags: Tags,
}

impl VMSpec {
    fn os_disk_name(&self) -> String {
        format!("{}_OSDisk", self.name)
    }

    fn storage_profile(&self) -> StorageProfile {
        let data_disks = self
            .data_disks
            .iter()
            .map(|disk| DataDisk {
                name: Some(format!("{}_{}", self.name, disk.name_suffix)),
                lun: disk.lun,
                create_option: Some(CREATE_EMPTY.to_string()),
                disk_size_gb: Some(disk.disk_size_gb),
                caching: disk.caching.clone(),
                ..Default::default()
            })
            .collect::<Vec<_>>();

        StorageProfile {
            image_reference: Some(self.image.clone()),
            os_disk: Some(OsDisk {
                name: Some(self.os_disk_name()),
                os_type: Some(OS_TYPE_LINUX.to_string()),
                create_option: Some(CREATE_FROM_IMAGE.to_string()),
                disk_size_gb: Some(self.os_disk_size_gb),
                caching: Some(CACHING_READ_WRITE.to_string()),
                managed_disk: Some(ManagedDiskParameters {
                    storage_account_type: Some(self.os_disk_storage_account_type.clone()),
                }),
                ..Default::default()
            }),
            data_disks: (!data_disks.is_empty()).then_some(data_disks),
        }
    }

    fn network_profile(&self) -> NetworkProfile {
        let interfaces = self
            .nic_names
            .iter()
            .enumerate()
            .map(|(i, nic)| NetworkInterfaceReference {
                id: Some(network_interface_id(&self.subscription_id, &self.resource_group, nic)),
                properties: Some(NetworkInterfaceReferenceProperties {
                    primary: Some(i == 0),
                }),
            })
            .collect();
        NetworkProfile {
            network_interfaces: Some(interfaces),
        }
    }

    fn identity(&self) -> Result<Option<VirtualMachineIdentity>, ReconcileError> {
        let Some(identity_type) = self.identity.azure_type() else {
            return Ok(None);
        };

        let user_assigned_identities = if self.identity == VMIdentity::UserAssigned {
            let mut identities = BTreeMap::new();
            for provider_id in &self.user_assigned_identities {
                let id = resource_id_from_provider_id(provider_id).unwrap_or(provider_id);
                parse_resource_id(id)?;
                identities.insert(id.to_string(), UserAssignedIdentityValue::default());
            }
            Some(identities)
        } else {
            None
        };

        Ok(Some(VirtualMachineIdentity {
            identity_type: Some(identity_type.to_string()),
            user_assigned_identities,
            ..Default::default()
        }))
    }
}

impl ResourceRef for VMSpec {
    type Resource = VirtualMachine;

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn resource_group_name(&self) -> String {
        self.resource_group.clone()
    }
}

impl ArmResource for VMSpec {
    fn resource_id(&self, subscription_id: &str) -> String {
        resource_id(
            subscription_id,
            &self.resource_group,
            VirtualMachine::PROVIDER_TYPE,
            &self.name,
        )
    }

    fn api_version(&self) -> &'static str {
        VirtualMachine::API_VERSION
    }
}

impl ResourceSpecGetter for VMSpec {
    fn parameters(
        &self,
        existing: Option<&VirtualMachine>,
    ) -> Result<Option<VirtualMachine>, ReconcileError> {
        // An existing VM is never updated, only recreated once it has failed.
        if !needs_create_or_update(existing) {
            return Ok(None);
        }
        if existing.is_none() && self.provider_id.is_some() {
            return Err(ReconcileError::ResourceDeleted {
                resource_group: self.resource_group.clone(),
                name: self.name.clone(),
            });
        }

        let (priority, eviction_policy) = match &self.spot_eviction_policy {
            Some(policy) => (Some(PRIORITY_SPOT.to_string()), Some(policy.clone())),
            None => (None, None),
        };

        Ok(Some(VirtualMachine {
            location: Some(self.location.clone()),
            tags: Some(build_tags(&BuildParams {
                cluster_name: &self.cluster_name,
                lifecycle: LIFECYCLE_OWNED,
                name: &self.name,
                role: &self.role,
                additional: &self.additional_tags,
            })),
            zones: self.zone.clone().map(|zone| vec![zone]),
            identity: self.identity()?,
            properties: Some(VirtualMachineProperties {
                hardware_profile: Some(HardwareProfile {
                    vm_size: Some(self.size.clone()),
                }),
                storage_profile: Some(self.storage_profile()),
                os_profile: Some(OsProfile {
                    computer_name: Some(self.name.clone()),
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
                network_profile: Some(self.network_profile()),
                priority,
                eviction_policy,
                ..Default::default()
            }),
            ..Default::default()
        }))
    }
}

/// Scope of the VM service: the machine being reconciled.
pub trait VMScope: AsyncStatusUpdater {
    fn vm_spec(&self) -> VMSpec;
    fn set_provider_id(&self, provider_id: &str);
    fn set_addresses(&self, addresses: Vec<MachineAddress>);
    fn set_vm_state(&self, state: ProvisioningState);
}

/// Provider ID of the VM with `resource_id`. The resource group segment is
/// lower-cased to match the IDs reported by the cloud provider.
#[must_use]
pub fn vm_provider_id(resource_id: &str) -> String {
    let mut segments: Vec<String> = resource_id.split('/').map(ToString::to_string).collect();
    if let Some(i) = segments
        .iter()
        .position(|s| s.eq_ignore_ascii_case("resourceGroups"))
    {
        if let Some(group) = segments.get_mut(i + 1) {
            *group = group.to_lowercase();
        }
    }
    provider_id_from_resource_id(&segments.join("/"))
}

pub struct VMService<Sc, R> {
    scope: Arc<Sc>,
    reconciler: R,
    interfaces: Arc<dyn Getter<ResourceLookup<NetworkInterface>>>,
    public_ips: Arc<dyn Getter<ResourceLookup<PublicIpAddress>>>,
    identities: Arc<dyn IdentityClient>,
}

impl<Sc, R> VMService<Sc, R>
where
    Sc: VMScope,
{
    #[must_use]
    pub fn new(
        scope: Arc<Sc>,
        reconciler: R,
        interfaces: Arc<dyn Getter<ResourceLookup<NetworkInterface>>>,
        public_ips: Arc<dyn Getter<ResourceLookup<PublicIpAddress>>>,
        identities: Arc<dyn IdentityClient>,
    ) -> Self {
        Self {
            scope,
            reconciler,
            interfaces,
            public_ips,
            identities,
        }
    }

    /// Publishes provider ID, addresses and state of a reconciled VM, then
    /// checks its identities.
    async fn post_reconcile(&self, spec: &VMSpec, vm: &VirtualMachine) -> Result<(), ReconcileError> {
        if let Some(id) = &vm.id {
            self.scope.set_provider_id(&vm_provider_id(id));
        }

        let addresses = self
            .addresses(spec, vm)
            .await
            .map_err(|e| e.wrap("failed to fetch VM addresses"))?;
        self.scope.set_addresses(addresses);

        let state = vm
            .properties
            .as_ref()
            .and_then(|p| p.provisioning_state.as_deref())
            .map_or(ProvisioningState::Unknown, ProvisioningState::from_azure);
        self.scope.set_vm_state(state);

        if spec.identity == VMIdentity::UserAssigned {
            self.check_user_assigned_identities(spec, vm).await?;
        }
        Ok(())
    }

    async fn addresses(
        &self,
        spec: &VMSpec,
        vm: &VirtualMachine,
    ) -> Result<Vec<MachineAddress>, ReconcileError> {
        let mut addresses = vec![MachineAddress::new(AddressType::InternalDNS, &spec.name)];

        let nic_refs = vm
            .properties
            .as_ref()
            .and_then(|p| p.network_profile.as_ref())
            .and_then(|p| p.network_interfaces.as_deref())
            .unwrap_or_default();

        for nic_ref in nic_refs {
            let Some(id) = nic_ref.id.as_deref() else {
                continue;
            };
            let nic_name = parse_resource_id(id)?.name;
            let nic = self
                .interfaces
                .get(&ResourceLookup::new(&spec.resource_group, nic_name))
                .await?;

            let configurations: &[InterfaceIpConfiguration] = nic
                .properties
                .as_ref()
                .and_then(|p| p.ip_configurations.as_deref())
                .unwrap_or_default();

            for configuration in configurations {
                let Some(properties) = &configuration.properties else {
                    continue;
                };
                if let Some(ip) = &properties.private_ip_address {
                    addresses.push(MachineAddress::new(AddressType::InternalIP, ip));
                }

                let Some(public_id) = properties.public_ip_address.as_ref().and_then(|p| p.id.as_deref())
                else {
                    continue;
                };
                let public_ip = self
                    .public_ips
                    .get(&ResourceLookup::new(
                        &spec.resource_group,
                        parse_resource_id(public_id)?.name,
                    ))
                    .await?;
                if let Some(ip) = public_ip.properties.and_then(|p| p.ip_address) {
                    addresses.push(MachineAddress::new(AddressType::ExternalIP, ip));
                }
            }
        }

        Ok(addresses)
    }

    /// Sets `VMIdentitiesReady=False` for the first identity of the spec that
    /// the VM does not carry. Extra identities on the VM are fine.
    async fn check_user_assigned_identities(
        &self,
        spec: &VMSpec,
        vm: &VirtualMachine,
    ) -> Result<(), ReconcileError> {
        let actual: HashSet<&str> = vm
            .identity
            .as_ref()
            .and_then(|identity| identity.user_assigned_identities.as_ref())
            .into_iter()
            .flat_map(|identities| identities.values())
            .filter_map(|value| value.client_id.as_deref())
            .collect();

        for provider_id in &spec.user_assigned_identities {
            let client_id = self
                .identities
                .get_client_id(provider_id)
                .await
                .map_err(|e| e.wrap("failed to get client ID"))?;
            if !actual.contains(client_id.as_str()) {
                warn!(
                    service = %SERVICE_NAME,
                    name = %spec.name,
                    client_id = %client_id,
                    "VM is missing a user assigned identity"
                );
                self.scope.set_condition_false(
                    CONDITION_VM_IDENTITIES_READY,
                    REASON_USER_ASSIGNED_IDENTITY_MISSING,
                    ConditionSeverity::Warning,
                    &format!("{MESSAGE_VM_MISSING_IDENTITY}{client_id}"),
                );
                return Ok(());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<Sc, R> ServiceReconciler for VMService<Sc, R>
where
    Sc: VMScope,
    R: Reconciler<VMSpec, Output = VirtualMachine>,
{
    fn name(&self) -> &'static str {
        SERVICE_NAME
    }

    async fn reconcile(&self) -> Result<(), ReconcileError> {
        let started = Instant::now();
        let spec = self.scope.vm_spec();

        let result = self.reconciler.create_or_update_resource(&spec, SERVICE_NAME).await;
        let err = result.as_ref().err();
        self.scope
            .update_put_status(CONDITION_VM_RUNNING, SERVICE_NAME, err);
        self.scope
            .update_put_status(CONDITION_DISKS_READY, SERVICE_NAME, err);

        let result = match result {
            Ok(Some(vm)) => self.post_reconcile(&spec, &vm).await,
            Ok(None) => {
                debug!(service = %SERVICE_NAME, name = %spec.name, "No virtual machine to report on");
                Ok(())
            }
            Err(e) => Err(e),
        };
        record_operation(SERVICE_NAME, OPERATION_RECONCILE, started, &result);
        result
    }

    async fn delete(&self) -> Result<(), ReconcileError> {
        let started = Instant::now();
        let spec = self.scope.vm_spec();

        let result = self.reconciler.delete_resource(&spec, SERVICE_NAME).await;
        match &result {
            Ok(()) => self.scope.set_vm_state(ProvisioningState::Deleted),
            Err(e) if e.is_not_done() => self.scope.set_vm_state(ProvisioningState::Deleting),
            Err(_) => {}
        }
        self.scope
            .update_delete_status(CONDITION_VM_RUNNING, SERVICE_NAME, result.as_ref().err());
        record_operation(SERVICE_NAME, OPERATION_DELETE, started, &result);
        result
    }
}

#[cfg(test)]
#[path = "virtualmachines_tests.rs"]
mod virtualmachines_tests;
