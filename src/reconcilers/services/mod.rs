// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-service wrappers.
//!
//! Each wrapper asks its scope for specs, drives them through a
//! [`Reconciler`](crate::reconcilers::Reconciler) in order and publishes the
//! outcome as a condition on the owning object.
//!
//! | Service | Condition |
//! |---|---|
//! | [`groups`] | `ResourceGroupReady` |
//! | [`virtualnetworks`] | `VNetReady` |
//! | [`networkinterfaces`] | `NetworkInterfaceReady` |
//! | [`publicips`] | `PublicIPsReady` |
//! | [`disks`] | `DisksReady` |
//! | [`virtualmachines`] | `VMRunning`, `DisksReady`, `VMIdentitiesReady` |
//! | [`scalesets`] | `ScaleSetRunning` |
//! | [`loadbalancers`] | `LoadBalancersReady` |
//! | [`roleassignments`] | `RoleAssignmentReady` |
//! | [`tags`] | none |

pub mod disks;
pub mod groups;
pub mod loadbalancers;
pub mod networkinterfaces;
pub mod publicips;
pub mod roleassignments;
pub mod scalesets;
pub mod tags;
pub mod virtualmachines;
pub mod virtualnetworks;

use crate::azure_errors::ReconcileError;
use crate::metrics;
use crate::reconcilers::{aggregate_error, ManagedChecker, Reconciler};
use async_trait::async_trait;
use std::time::Instant;
use tracing::debug;

/// Operation label for reconciles.
pub const OPERATION_RECONCILE: &str = "reconcile";

/// Operation label for deletes.
pub const OPERATION_DELETE: &str = "delete";

/// The uniform surface of every service wrapper.
#[async_trait]
pub trait ServiceReconciler: Send + Sync {
    /// Service name used in futures, logs and metrics.
    fn name(&self) -> &'static str;

    /// Creates or updates the service's resources.
    ///
    /// # Errors
    ///
    /// Returns the most severe error across the service's specs.
    async fn reconcile(&self) -> Result<(), ReconcileError>;

    /// Deletes the service's resources.
    ///
    /// # Errors
    ///
    /// Returns the most severe error across the service's specs.
    async fn delete(&self) -> Result<(), ReconcileError>;
}

/// Records the outcome of one service operation started at `started`.
pub(crate) fn record_operation(
    service_name: &str,
    operation: &str,
    started: Instant,
    result: &Result<(), ReconcileError>,
) {
    let outcome = match result {
        Ok(()) => "success",
        Err(e) => e.error_type(),
    };
    metrics::record_service_operation(service_name, operation, outcome, started.elapsed());
}

/// Creates or updates every spec in order. Returns the results of the specs
/// that succeeded and the most severe error.
pub(crate) async fn create_or_update_all<S, R>(
    reconciler: &R,
    specs: &[S],
    service_name: &str,
) -> (Vec<R::Output>, Option<ReconcileError>)
where
    S: Send + Sync,
    R: Reconciler<S>,
{
    let mut results = Vec::with_capacity(specs.len());
    let mut errors = Vec::new();
    for spec in specs {
        match reconciler.create_or_update_resource(spec, service_name).await {
            Ok(Some(result)) => results.push(result),
            Ok(None) => {}
            Err(e) => errors.push(e),
        }
    }
    (results, aggregate_error(errors))
}

/// Deletes every spec in order, skipping those `managed` reports as not owned
/// by the cluster. Returns the most severe error.
pub(crate) async fn delete_all<S, R>(
    reconciler: &R,
    managed: Option<&(dyn ManagedChecker<S> + '_)>,
    specs: &[S],
    service_name: &str,
) -> Option<ReconcileError>
where
    S: Send + Sync,
    R: Reconciler<S>,
{
    let mut errors = Vec::new();
    for spec in specs {
        if let Some(managed) = managed {
            match managed.is_managed(spec).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(service = %service_name, "Skipping delete of unmanaged resource");
                    continue;
                }
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            }
        }
        if let Err(e) = reconciler.delete_resource(spec, service_name).await {
            errors.push(e);
        }
    }
    aggregate_error(errors)
}

/// `Ok` when `err` is `None`.
pub(crate) fn into_result(err: Option<ReconcileError>) -> Result<(), ReconcileError> {
    err.map_or(Ok(()), Err)
}
