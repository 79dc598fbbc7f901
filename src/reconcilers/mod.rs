// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation engines for Azure resources.
//!
//! A spec is brought to its desired state by one of two engines behind the same
//! [`Reconciler`] trait:
//!
//! - [`async_reconciler::AsyncReconciler`] - calls Azure directly and drives
//!   long-running operations across reconcile ticks
//! - [`aso::AsoReconciler`] - owns a backing Kubernetes object that the Azure
//!   service operator reconciles
//!
//! Per-service wrappers in [`services`] pick an engine, walk the specs their
//! scope yields and publish the outcome as conditions.
//!
//! # Error Aggregation
//!
//! A service with several specs reports one error. [`aggregate_error`] keeps the
//! most severe one: terminal errors beat other errors, which beat `NotDone`.
//! Among equally severe errors the first one wins.
//!
//! # Example: Reconciling one spec
//!
//! ```rust,ignore
//! use capz_core::reconcilers::Reconciler;
//!
//! async fn ensure<R: Reconciler<MySpec>>(reconciler: &R, spec: &MySpec) {
//!     match reconciler.create_or_update_resource(spec, "myservice").await {
//!         Ok(_) => println!("ready"),
//!         Err(e) if e.is_not_done() => println!("still provisioning"),
//!         Err(e) => println!("failed: {e}"),
//!     }
//! }
//! ```

pub mod aso;
pub mod async_reconciler;
pub mod resources;
pub mod services;
pub mod status;

use crate::azure_errors::ReconcileError;
use async_trait::async_trait;
use std::sync::Arc;

/// Create-or-update and delete of one spec.
#[async_trait]
pub trait Reconciler<S: Send + Sync>: Send + Sync {
    /// What a successful create-or-update returns.
    type Output: Send;

    /// Brings the resource described by `spec` to its desired state.
    ///
    /// Returns the resource as it exists after the call; `None` only when the
    /// spec asked for no change and nothing exists.
    ///
    /// # Errors
    ///
    /// Returns `NotDone` while the operation is still in progress, or the error
    /// that stopped it.
    async fn create_or_update_resource(
        &self,
        spec: &S,
        service_name: &str,
    ) -> Result<Option<Self::Output>, ReconcileError>;

    /// Deletes the resource described by `spec`. A missing resource is success.
    ///
    /// # Errors
    ///
    /// Returns `NotDone` while the deletion is still in progress, or the error
    /// that stopped it.
    async fn delete_resource(&self, spec: &S, service_name: &str) -> Result<(), ReconcileError>;
}

/// Decides whether the resource behind a spec is owned by this cluster.
#[async_trait]
pub trait ManagedChecker<S: Send + Sync>: Send + Sync {
    /// # Errors
    ///
    /// Returns the error of looking up the resource.
    async fn is_managed(&self, spec: &S) -> Result<bool, ReconcileError>;
}

#[async_trait]
impl<S, T> Reconciler<S> for Arc<T>
where
    S: Send + Sync,
    T: Reconciler<S> + ?Sized,
{
    type Output = T::Output;

    async fn create_or_update_resource(
        &self,
        spec: &S,
        service_name: &str,
    ) -> Result<Option<Self::Output>, ReconcileError> {
        (**self).create_or_update_resource(spec, service_name).await
    }

    async fn delete_resource(&self, spec: &S, service_name: &str) -> Result<(), ReconcileError> {
        (**self).delete_resource(spec, service_name).await
    }
}

#[async_trait]
impl<S, T> ManagedChecker<S> for Arc<T>
where
    S: Send + Sync,
    T: ManagedChecker<S> + ?Sized,
{
    async fn is_managed(&self, spec: &S) -> Result<bool, ReconcileError> {
        (**self).is_managed(spec).await
    }
}

/// The most severe of `errors`, the first among equals.
#[must_use]
pub fn aggregate_error<I>(errors: I) -> Option<ReconcileError>
where
    I: IntoIterator<Item = ReconcileError>,
{
    errors.into_iter().fold(None, |worst, err| match worst {
        Some(current) if current.precedence() >= err.precedence() => Some(current),
        _ => Some(err),
    })
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
