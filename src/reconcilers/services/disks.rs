// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Managed disk service. Disks are created as part of their virtual machine, so
//! this service only deletes them.

use crate::azure::models::{Disk, ResourceType};
use crate::azure::resource_id::resource_id;
use crate::azure::{ArmResource, ResourceRef, ResourceSpecGetter};
use crate::azure_errors::ReconcileError;
use crate::reconcilers::services::{
    delete_all, into_result, record_operation, ServiceReconciler, OPERATION_DELETE,
};
use crate::reconcilers::Reconciler;
use crate::scope::AsyncStatusUpdater;
use crate::status_reasons::CONDITION_DISKS_READY;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

pub const SERVICE_NAME: &str = "disks";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiskSpec {
    pub name: String,
    pub resource_group: String,
}

impl ResourceRef for DiskSpec {
    type Resource = Disk;

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn resource_group_name(&self) -> String {
        self.resource_group.clone()
    }
}

impl ArmResource for DiskSpec {
    fn resource_id(&self, subscription_id: &str) -> String {
        resource_id(subscription_id, &self.resource_group, Disk::PROVIDER_TYPE, &self.name)
    }

    fn api_version(&self) -> &'static str {
        Disk::API_VERSION
    }
}

impl ResourceSpecGetter for DiskSpec {
    fn parameters(&self, _existing: Option<&Disk>) -> Result<Option<Disk>, ReconcileError> {
        Ok(None)
    }
}

pub trait DiskScope: AsyncStatusUpdater {
    fn disk_specs(&self) -> Vec<DiskSpec>;
}

pub struct DiskService<Sc, R> {
    scope: Arc<Sc>,
    reconciler: R,
}

impl<Sc, R> DiskService<Sc, R> {
    #[must_use]
    pub fn new(scope: Arc<Sc>, reconciler: R) -> Self {
        Self { scope, reconciler }
    }
}

#[async_trait]
impl<Sc, R> ServiceReconciler for DiskService<Sc, R>
where
    Sc: DiskScope,
    R: Reconciler<DiskSpec>,
{
    fn name(&self) -> &'static str {
        SERVICE_NAME
    }

    async fn reconcile(&self) -> Result<(), ReconcileError> {
        Ok(())
    }

    async fn delete(&self) -> Result<(), ReconcileError> {
        let specs = self.scope.disk_specs();
        if specs.is_empty() {
            return Ok(());
        }
        let started = Instant::now();

        let result = into_result(delete_all(&self.reconciler, None, &specs, SERVICE_NAME).await);

        self.scope
            .update_delete_status(CONDITION_DISKS_READY, SERVICE_NAME, result.as_ref().err());
        record_operation(SERVICE_NAME, OPERATION_DELETE, started, &result);
        result
    }
}

#[cfg(test)]
#[path = "disks_tests.rs"]
mod disks_tests;
