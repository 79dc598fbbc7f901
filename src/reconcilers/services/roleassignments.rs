// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Role assignment service.
//!
//! Grants a role to the system assigned identity of a VM. The assignment is
//! created once and never updated. Its name is a GUID derived from the scope,
//! the machine and the role, so every reconcile addresses the same assignment.
//!
//! Deleting is a no-op: Azure removes the assignment together with the VM
//! identity it targets, so callers need not retry or wait for it.

use crate::azure::client::ResourceLookup;
use crate::azure::models::{
    RoleAssignment, RoleAssignmentProperties, VirtualMachine, ROLE_ASSIGNMENT_API_VERSION,
};
use crate::azure::resource_id::resource_group_id;
use crate::azure::{ArmResource, Getter, ResourceRef, ResourceSpecGetter};
use crate::azure_errors::ReconcileError;
use crate::reconcilers::services::{
    create_or_update_all, into_result, record_operation, ServiceReconciler, OPERATION_RECONCILE,
};
use crate::reconcilers::{aggregate_error, Reconciler};
use crate::scope::AsyncStatusUpdater;
use crate::status_reasons::CONDITION_ROLE_ASSIGNMENT_READY;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub const SERVICE_NAME: &str = "roleassignments";

const PRINCIPAL_TYPE_SERVICE_PRINCIPAL: &str = "ServicePrincipal";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoleAssignmentSpec {
    /// Assignment GUID. Derived when empty.
    pub name: String,
    /// VM whose system identity receives the role.
    pub machine_name: String,
    pub resource_group: String,
    pub subscription_id: String,
    /// ARM scope of the assignment. Defaults to the resource group.
    pub scope: String,
    /// Full ID of the role definition.
    pub role_definition_id: String,
    /// Principal of the VM identity. Resolved by the service before create.
    pub principal_id: Option<String>,
}

impl RoleAssignmentSpec {
    fn assignment_scope(&self) -> String {
        if self.scope.is_empty() {
            resource_group_id(&self.subscription_id, &self.resource_group)
        } else {
            self.scope.clone()
        }
    }
}

/// A GUID-formatted name that is stable for a given scope, machine and role.
#[must_use]
pub fn role_assignment_name(scope: &str, machine_name: &str, role_definition_id: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [scope, machine_name, role_definition_id] {
        hasher.update(part.to_lowercase().as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();

    let mut hex = String::with_capacity(32);
    for byte in &digest[..16] {
        let _ = write!(hex, "{byte:02x}");
    }
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

impl ResourceRef for RoleAssignmentSpec {
    type Resource = RoleAssignment;

    fn resource_name(&self) -> String {
        if self.name.is_empty() {
            role_assignment_name(
                &self.assignment_scope(),
                &self.machine_name,
                &self.role_definition_id,
            )
        } else {
            self.name.clone()
        }
    }

    fn resource_group_name(&self) -> String {
        self.resource_group.clone()
    }

    fn owner_resource_name(&self) -> String {
        self.machine_name.clone()
    }
}

impl ArmResource for RoleAssignmentSpec {
    fn resource_id(&self, _subscription_id: &str) -> String {
        format!(
            "{}/providers/Microsoft.Authorization/roleAssignments/{}",
            self.assignment_scope(),
            self.resource_name()
        )
    }

    fn api_version(&self) -> &'static str {
        ROLE_ASSIGNMENT_API_VERSION
    }
}

impl ResourceSpecGetter for RoleAssignmentSpec {
    fn parameters(
        &self,
        existing: Option<&RoleAssignment>,
    ) -> Result<Option<RoleAssignment>, ReconcileError> {
        if existing.is_some() {
            return Ok(None);
        }
        let Some(principal_id) = &self.principal_id else {
            return Err(ReconcileError::terminal(format!(
                "no principal to assign role {} to for machine {}",
                self.role_definition_id, self.machine_name
            )));
        };
        Ok(Some(RoleAssignment {
            properties: Some(RoleAssignmentProperties {
                role_definition_id: Some(self.role_definition_id.clone()),
                principal_id: Some(principal_id.clone()),
                principal_type: Some(PRINCIPAL_TYPE_SERVICE_PRINCIPAL.to_string()),
                scope: None,
            }),
            ..Default::default()
        }))
    }
}

pub trait RoleAssignmentScope: AsyncStatusUpdater {
    fn role_assignment_specs(&self) -> Vec<RoleAssignmentSpec>;
}

pub struct RoleAssignmentService<Sc, R> {
    scope: Arc<Sc>,
    reconciler: R,
    virtual_machines: Arc<dyn Getter<ResourceLookup<VirtualMachine>>>,
}

impl<Sc, R> RoleAssignmentService<Sc, R> {
    #[must_use]
    pub fn new(
        scope: Arc<Sc>,
        reconciler: R,
        virtual_machines: Arc<dyn Getter<ResourceLookup<VirtualMachine>>>,
    ) -> Self {
        Self {
            scope,
            reconciler,
            virtual_machines,
        }
    }

    /// Fills in the principal of the VM's system assigned identity.
    async fn resolve_principal(
        &self,
        mut spec: RoleAssignmentSpec,
    ) -> Result<RoleAssignmentSpec, ReconcileError> {
        if spec.principal_id.is_some() {
            return Ok(spec);
        }
        let vm = self
            .virtual_machines
            .get(&ResourceLookup::new(&spec.resource_group, &spec.machine_name))
            .await
            .map_err(|e| {
                e.wrap(format!(
                    "failed to get VM {}/{} for role assignment",
                    spec.resource_group, spec.machine_name
                ))
            })?;
        let principal = vm.identity.and_then(|identity| identity.principal_id);
        if principal.is_none() {
            return Err(ReconcileError::terminal(format!(
                "VM {}/{} has no system assigned identity",
                spec.resource_group, spec.machine_name
            )));
        }
        spec.principal_id = principal;
        Ok(spec)
    }
}

#[async_trait]
impl<Sc, R> ServiceReconciler for RoleAssignmentService<Sc, R>
where
    Sc: RoleAssignmentScope,
    R: Reconciler<RoleAssignmentSpec>,
{
    fn name(&self) -> &'static str {
        SERVICE_NAME
    }

    async fn reconcile(&self) -> Result<(), ReconcileError> {
        let specs = self.scope.role_assignment_specs();
        if specs.is_empty() {
            return Ok(());
        }
        let started = Instant::now();

        let mut resolved = Vec::with_capacity(specs.len());
        let mut errors = Vec::new();
        for spec in specs {
            match self.resolve_principal(spec).await {
                Ok(spec) => resolved.push(spec),
                Err(e) => errors.push(e),
            }
        }
        let (_, err) = create_or_update_all(&self.reconciler, &resolved, SERVICE_NAME).await;
        errors.extend(err);
        let result = into_result(aggregate_error(errors));

        self.scope.update_put_status(
            CONDITION_ROLE_ASSIGNMENT_READY,
            SERVICE_NAME,
            result.as_ref().err(),
        );
        record_operation(SERVICE_NAME, OPERATION_RECONCILE, started, &result);
        result
    }

    /// Always succeeds without calling Azure. The assignment goes away with
    /// the VM identity it was granted to.
    async fn delete(&self) -> Result<(), ReconcileError> {
        debug!(
            service = %SERVICE_NAME,
            "Role assignments are deleted with their virtual machine"
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "roleassignments_tests.rs"]
mod roleassignments_tests;
