// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Direct reconciliation against Azure with resumable long-running operations.
//!
//! Every call is bounded by the scope's service reconcile timeout. When an Azure
//! operation outlives it, the poller's resume token is persisted as a
//! [`Future`](crate::crd::Future) and `NotDone` is returned; the next tick resumes
//! polling from the future instead of starting a new operation.
//!
//! ```text
//! tick 1: get -> parameters -> begin PUT -> poll ... timeout -> persist future -> NotDone
//! tick 2: get -> parameters -> resume future -> poll ... done -> clear future -> Ok(resource)
//! ```

use crate::azure::models::AzureResource;
use crate::azure::{
    poll_until_done, Creator, Deleter, Getter, Poller, ResourceRef, ResourceSpecGetter,
};
use crate::azure_errors::ReconcileError;
use crate::constants::DEFAULT_LRO_POLL_FREQUENCY_MILLIS;
use crate::crd::FutureType;
use crate::future::{future_to_resume_token, resume_token_to_future};
use crate::metrics;
use crate::reconcilers::{ManagedChecker, Reconciler};
use crate::scope::{FutureScope, TimeoutsGetter};
use crate::tags::{is_owned, Tags};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

/// Reconciles specs directly against Azure through `C`.
pub struct AsyncReconciler<Sc, C> {
    scope: Arc<Sc>,
    client: C,
    poll_frequency: Duration,
}

impl<Sc, C> AsyncReconciler<Sc, C>
where
    Sc: FutureScope + TimeoutsGetter,
{
    #[must_use]
    pub fn new(scope: Arc<Sc>, client: C) -> Self {
        Self {
            scope,
            client,
            poll_frequency: Duration::from_millis(DEFAULT_LRO_POLL_FREQUENCY_MILLIS),
        }
    }

    /// Overrides the delay between polls when Azure sends no `Retry-After`.
    #[must_use]
    pub fn with_poll_frequency(mut self, poll_frequency: Duration) -> Self {
        self.poll_frequency = poll_frequency;
        self
    }

    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Rebuilds the poller of a persisted operation. A future that cannot be
    /// decoded is dropped so the next tick starts over.
    fn resume<T, F>(
        &self,
        future_type: FutureType,
        name: &str,
        service_name: &str,
        rebuild: F,
    ) -> Result<Option<Box<dyn Poller<T>>>, ReconcileError>
    where
        T: Send,
        F: FnOnce(&str) -> Result<Box<dyn Poller<T>>, ReconcileError>,
    {
        let Some(future) = self
            .scope
            .get_long_running_operation_state(name, service_name, future_type)
        else {
            return Ok(None);
        };

        match future_to_resume_token(&future).and_then(|token| rebuild(&token)) {
            Ok(poller) => {
                debug!(
                    service = %service_name,
                    resource_group = %future.resource_group,
                    name = %name,
                    operation = %future_type,
                    "Resuming long-running operation"
                );
                metrics::record_long_running_operation(
                    service_name,
                    &future_type.to_string(),
                    "resumed",
                );
                Ok(Some(poller))
            }
            Err(e) => {
                warn!(
                    service = %service_name,
                    name = %name,
                    operation = %future_type,
                    "Dropping unusable long-running operation state: {e}"
                );
                self.scope
                    .delete_long_running_operation_state(name, service_name, future_type);
                Err(e)
            }
        }
    }

    /// Polls until done or `deadline`. The future is cleared only once the
    /// operation has finished in Azure. On timeout, or when the operation state
    /// cannot be read, the operation is persisted so the next tick resumes it.
    async fn await_operation<T: Send>(
        &self,
        mut poller: Box<dyn Poller<T>>,
        deadline: Instant,
        future_type: FutureType,
        service_name: &str,
        name: &str,
        resource_group: &str,
    ) -> Result<T, ReconcileError> {
        let outcome = timeout_at(deadline, poll_until_done(poller.as_mut(), self.poll_frequency)).await;

        let poll_error = match outcome {
            Ok(Ok(result)) => {
                self.scope
                    .delete_long_running_operation_state(name, service_name, future_type);
                metrics::record_long_running_operation(
                    service_name,
                    &future_type.to_string(),
                    "completed",
                );
                return result;
            }
            Ok(Err(e)) => Some(e),
            Err(_) => None,
        };

        let token = poller.resume_token()?;
        let future = resume_token_to_future(future_type, service_name, name, resource_group, &token);
        self.scope.set_long_running_operation_state(future.clone());
        metrics::record_long_running_operation(service_name, &future_type.to_string(), "persisted");

        if let Some(e) = poll_error {
            warn!(
                service = %service_name,
                resource_group = %resource_group,
                name = %name,
                operation = %future_type,
                "Failed to read operation state, keeping it for the next attempt: {e}"
            );
            return Err(e);
        }

        info!(
            service = %service_name,
            resource_group = %resource_group,
            name = %name,
            operation = %future_type,
            "Operation still in progress, persisted its state"
        );
        Err(ReconcileError::NotDone {
            future,
            requeue_after: poller
                .retry_after()
                .unwrap_or_else(|| self.scope.defaulted_reconciler_requeue()),
        })
    }
}

fn timed_out(action: &str, resource_group: &str, name: &str, service_name: &str) -> ReconcileError {
    ReconcileError::transient(format!(
        "timed out trying to {action} resource {resource_group}/{name} (service: {service_name})"
    ))
}

#[async_trait]
impl<S, Sc, C> Reconciler<S> for AsyncReconciler<Sc, C>
where
    S: ResourceSpecGetter,
    Sc: FutureScope + TimeoutsGetter,
    C: Creator<S> + Deleter<S>,
{
    type Output = S::Resource;

    async fn create_or_update_resource(
        &self,
        spec: &S,
        service_name: &str,
    ) -> Result<Option<S::Resource>, ReconcileError> {
        let name = spec.resource_name();
        let resource_group = spec.resource_group_name();
        let deadline = Instant::now() + self.scope.defaulted_azure_service_reconcile_timeout();

        let existing = match timeout_at(deadline, self.client.get(spec)).await {
            Err(_) => return Err(timed_out("get", &resource_group, &name, service_name)),
            Ok(Ok(resource)) => Some(resource),
            Ok(Err(e)) if e.is_not_found() => None,
            Ok(Err(e)) => {
                return Err(e.wrap(format!(
                    "failed to get existing resource {resource_group}/{name} (service: {service_name})"
                )))
            }
        };
        let action = if existing.is_some() { "update" } else { "create" };
        let parameters = spec.parameters(existing.as_ref())?;

        // A persisted operation is finished before new parameters are applied, so
        // an in-flight PUT is never orphaned.
        let resumed = self.resume(FutureType::Put, &name, service_name, |token| {
            self.client.resume_create_or_update(spec, token)
        })?;

        let poller = match (resumed, parameters) {
            (Some(poller), _) => poller,
            (None, None) => {
                debug!(
                    service = %service_name,
                    resource_group = %resource_group,
                    name = %name,
                    "Resource is up to date"
                );
                return Ok(existing);
            }
            (None, Some(parameters)) => {
                debug!(
                    service = %service_name,
                    resource_group = %resource_group,
                    name = %name,
                    "Starting {action} of resource"
                );
                match timeout_at(deadline, self.client.create_or_update_async(spec, parameters)).await {
                    Err(_) => return Err(timed_out(action, &resource_group, &name, service_name)),
                    Ok(Err(e)) => {
                        return Err(e.wrap(format!(
                            "failed to {action} resource {resource_group}/{name} (service: {service_name})"
                        )))
                    }
                    Ok(Ok(poller)) => poller,
                }
            }
        };

        match self
            .await_operation(poller, deadline, FutureType::Put, service_name, &name, &resource_group)
            .await
        {
            Ok(resource) => {
                info!(
                    service = %service_name,
                    resource_group = %resource_group,
                    name = %name,
                    "Successfully {action}d resource"
                );
                Ok(Some(resource))
            }
            Err(e) if e.is_not_done() => Err(e),
            Err(e) => Err(e.wrap(format!(
                "failed to {action} resource {resource_group}/{name} (service: {service_name})"
            ))),
        }
    }

    async fn delete_resource(&self, spec: &S, service_name: &str) -> Result<(), ReconcileError> {
        let name = spec.resource_name();
        let resource_group = spec.resource_group_name();
        let deadline = Instant::now() + self.scope.defaulted_azure_service_reconcile_timeout();
        let failed = || format!("failed to delete resource {resource_group}/{name} (service: {service_name})");

        let resumed = self.resume(FutureType::Delete, &name, service_name, |token| {
            self.client.resume_delete(spec, token)
        })?;

        let poller = match resumed {
            Some(poller) => Some(poller),
            None => {
                debug!(
                    service = %service_name,
                    resource_group = %resource_group,
                    name = %name,
                    "Starting delete of resource"
                );
                match timeout_at(deadline, self.client.delete_async(spec)).await {
                    Err(_) => return Err(timed_out("delete", &resource_group, &name, service_name)),
                    Ok(Err(e)) if e.is_not_found() => None,
                    Ok(Err(e)) => return Err(e.wrap(failed())),
                    Ok(Ok(poller)) => Some(poller),
                }
            }
        };

        if let Some(poller) = poller {
            match self
                .await_operation(poller, deadline, FutureType::Delete, service_name, &name, &resource_group)
                .await
            {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) if e.is_not_done() => return Err(e),
                Err(e) => return Err(e.wrap(failed())),
            }
        }

        // Any create still tracked for the resource is moot now.
        self.scope
            .delete_long_running_operation_state(&name, service_name, FutureType::Delete);
        self.scope
            .delete_long_running_operation_state(&name, service_name, FutureType::Put);
        info!(
            service = %service_name,
            resource_group = %resource_group,
            name = %name,
            "Successfully deleted resource"
        );
        Ok(())
    }
}

/// Ownership check for directly reconciled resources: a resource is managed when
/// it carries the cluster's owned tag.
pub struct TagsManagedChecker<C> {
    client: C,
    cluster_name: String,
}

impl<C> TagsManagedChecker<C> {
    #[must_use]
    pub fn new(client: C, cluster_name: impl Into<String>) -> Self {
        Self {
            client,
            cluster_name: cluster_name.into(),
        }
    }
}

#[async_trait]
impl<S, C> ManagedChecker<S> for TagsManagedChecker<C>
where
    S: ResourceRef,
    S::Resource: AzureResource,
    C: Getter<S>,
{
    async fn is_managed(&self, spec: &S) -> Result<bool, ReconcileError> {
        match self.client.get(spec).await {
            Ok(resource) => {
                let empty = Tags::new();
                Ok(is_owned(resource.tags().unwrap_or(&empty), &self.cluster_name))
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.wrap(format!(
                "failed to get resource {}/{}",
                spec.resource_group_name(),
                spec.resource_name()
            ))),
        }
    }
}

#[cfg(test)]
#[path = "async_reconciler_tests.rs"]
mod async_reconciler_tests;
