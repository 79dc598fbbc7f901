// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Public IP address service.
//!
//! Every IP is a zone-redundant Standard SKU address with static allocation.
//! On delete each IP is checked for the cluster ownership tag on its own, so a
//! user-provided address listed next to owned ones survives.

use crate::azure::models::{
    PublicIpAddress, PublicIpAddressDnsSettings, PublicIpAddressProperties, PublicIpAddressSku,
    ResourceType,
};
use crate::azure::resource_id::resource_id;
use crate::azure::{needs_create_or_update, ArmResource, ResourceRef, ResourceSpecGetter};
use crate::azure_errors::ReconcileError;
use crate::labels::LIFECYCLE_OWNED;
use crate::reconcilers::services::{
    create_or_update_all, delete_all, into_result, record_operation, ServiceReconciler,
    OPERATION_DELETE, OPERATION_RECONCILE,
};
use crate::reconcilers::{ManagedChecker, Reconciler};
use crate::scope::AsyncStatusUpdater;
use crate::status_reasons::CONDITION_PUBLIC_IPS_READY;
use crate::tags::{build_tags, BuildParams, Tags};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub const SERVICE_NAME: &str = "publicips";

const SKU_STANDARD: &str = "Standard";
const ALLOCATION_STATIC: &str = "Static";
const IP_VERSION_V4: &str = "IPv4";
const IP_VERSION_V6: &str = "IPv6";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PublicIPSpec {
    pub name: String,
    pub resource_group: String,
    pub location: String,
    pub cluster_name: String,
    /// Fully qualified DNS name; its first label becomes the domain name label.
    pub dns_name: Option<String>,
    pub is_ipv6: bool,
    pub failure_domains: Vec<String>,
    pub additional_tags: Tags,
}

impl ResourceRef for PublicIPSpec {
    type Resource = PublicIpAddress;

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn resource_group_name(&self) -> String {
        self.resource_group.clone()
    }
}

impl ArmResource for PublicIPSpec {
    fn resource_id(&self, subscription_id: &str) -> String {
        resource_id(
            subscription_id,
            &self.resource_group,
            PublicIpAddress::PROVIDER_TYPE,
            &self.name,
        )
    }

    fn api_version(&self) -> &'static str {
        PublicIpAddress::API_VERSION
    }
}

impl ResourceSpecGetter for PublicIPSpec {
    fn parameters(
        &self,
        existing: Option<&PublicIpAddress>,
    ) -> Result<Option<PublicIpAddress>, ReconcileError> {
        if !needs_create_or_update(existing) {
            return Ok(None);
        }

        let dns_settings = self.dns_name.as_ref().map(|fqdn| PublicIpAddressDnsSettings {
            domain_name_label: fqdn.split('.').next().map(ToString::to_string),
            fqdn: Some(fqdn.clone()),
        });

        Ok(Some(PublicIpAddress {
            name: Some(self.name.clone()),
            location: Some(self.location.clone()),
            tags: Some(build_tags(&BuildParams {
                cluster_name: &self.cluster_name,
                lifecycle: LIFECYCLE_OWNED,
                name: &self.name,
                role: "",
                additional: &self.additional_tags,
            })),
            sku: Some(PublicIpAddressSku {
                name: Some(SKU_STANDARD.to_string()),
                tier: None,
            }),
            zones: (!self.failure_domains.is_empty()).then(|| self.failure_domains.clone()),
            properties: Some(PublicIpAddressProperties {
                public_ip_allocation_method: Some(ALLOCATION_STATIC.to_string()),
                public_ip_address_version: Some(
                    if self.is_ipv6 { IP_VERSION_V6 } else { IP_VERSION_V4 }.to_string(),
                ),
                dns_settings,
                ..Default::default()
            }),
            ..Default::default()
        }))
    }
}

pub trait PublicIPScope: AsyncStatusUpdater {
    fn public_ip_specs(&self) -> Vec<PublicIPSpec>;
}

pub struct PublicIPService<Sc, R, M> {
    scope: Arc<Sc>,
    reconciler: R,
    managed: M,
}

impl<Sc, R, M> PublicIPService<Sc, R, M> {
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
impl<Sc, R, M> ServiceReconciler for PublicIPService<Sc, R, M>
where
    Sc: PublicIPScope,
    R: Reconciler<PublicIPSpec>,
    M: ManagedChecker<PublicIPSpec>,
{
    fn name(&self) -> &'static str {
        SERVICE_NAME
    }

    async fn reconcile(&self) -> Result<(), ReconcileError> {
        let specs = self.scope.public_ip_specs();
        if specs.is_empty() {
            debug!(service = %SERVICE_NAME, "No public IPs to reconcile");
            return Ok(());
        }
        let started = Instant::now();

        let (_, err) = create_or_update_all(&self.reconciler, &specs, SERVICE_NAME).await;
        let result = into_result(err);

        self.scope
            .update_put_status(CONDITION_PUBLIC_IPS_READY, SERVICE_NAME, result.as_ref().err());
        record_operation(SERVICE_NAME, OPERATION_RECONCILE, started, &result);
        result
    }

    async fn delete(&self) -> Result<(), ReconcileError> {
        let specs = self.scope.public_ip_specs();
        if specs.is_empty() {
            return Ok(());
        }
        let started = Instant::now();
        let managed: &dyn ManagedChecker<PublicIPSpec> = &self.managed;

        let result =
            into_result(delete_all(&self.reconciler, Some(managed), &specs, SERVICE_NAME).await);

        self.scope
            .update_delete_status(CONDITION_PUBLIC_IPS_READY, SERVICE_NAME, result.as_ref().err());
        record_operation(SERVICE_NAME, OPERATION_DELETE, started, &result);
        result
    }
}

#[cfg(test)]
#[path = "publicips_tests.rs"]
mod publicips_tests;
