// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Azure resource contract and client shim.
//!
//! The reconcilers never name wire types. They see three things:
//!
//! - a spec, through [`ResourceRef`] and [`ResourceSpecGetter`], which knows its
//!   resource name and resource group and how to turn an observed resource into
//!   the parameters of a create-or-update call;
//! - a client, through [`Getter`], [`Creator`] and [`Deleter`];
//! - a [`Poller`] for each long-running operation the client starts.
//!
//! [`client::Client`] is the generic ARM REST implementation of the client
//! traits. [`models`] holds the wire shapes.
//!
//! # Parameters contract
//!
//! [`ResourceSpecGetter::parameters`] returns:
//!
//! - `Ok(Some(p))`: create or update the resource with `p`
//! - `Ok(None)`: the resource is up to date, no Azure call is made
//! - `Err(_)`: refuse the operation. A spec that already recorded a provider ID
//!   but observes no resource returns
//!   [`ReconcileError::ResourceDeleted`](crate::azure_errors::ReconcileError::ResourceDeleted).

pub mod client;
pub mod identities;
pub mod models;
pub mod poller;
pub mod resource_id;
pub mod resourceskus;
pub mod tags_client;

use crate::azure_errors::ReconcileError;
use crate::crd::ProvisioningState;
use async_trait::async_trait;
use models::AzureResource;
use std::time::Duration;

/// Identity of one Azure resource.
pub trait ResourceRef: Send + Sync {
    /// The Azure-shaped resource this spec describes.
    type Resource: Send + Sync + 'static;

    fn resource_name(&self) -> String;
    fn resource_group_name(&self) -> String;

    /// Owner of a scoped sub-resource (for example the VM a role assignment is
    /// attached to). Empty when not applicable.
    fn owner_resource_name(&self) -> String {
        String::new()
    }
}

/// A spec reconciled directly against Azure.
pub trait ResourceSpecGetter: ResourceRef {
    /// Desired parameters given the observed resource.
    ///
    /// # Errors
    ///
    /// Returns a terminal error when the spec cannot be satisfied.
    fn parameters(
        &self,
        existing: Option<&Self::Resource>,
    ) -> Result<Option<Self::Resource>, ReconcileError>;
}

/// ARM addressing of a spec.
pub trait ArmResource: ResourceRef {
    /// Full ARM resource ID, starting with `/subscriptions/`.
    fn resource_id(&self, subscription_id: &str) -> String;
    fn api_version(&self) -> &'static str;
}

/// Whether an observed resource should be (re)created.
///
/// Resources that are being created, updated or deleted, or that already
/// succeeded, are left alone. Failed, canceled and state-less resources are
/// treated as missing.
#[must_use]
pub fn needs_create_or_update<R: AzureResource>(existing: Option<&R>) -> bool {
    let Some(existing) = existing else {
        return true;
    };
    match existing
        .provisioning_state()
        .map(ProvisioningState::from_azure)
    {
        Some(
            ProvisioningState::Creating
            | ProvisioningState::Updating
            | ProvisioningState::Deleting
            | ProvisioningState::Succeeded,
        ) => false,
        Some(
            ProvisioningState::Failed
            | ProvisioningState::Canceled
            | ProvisioningState::Deleted
            | ProvisioningState::Unknown,
        )
        | None => true,
    }
}

/// Outcome of one poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus<T> {
    Done(T),
    /// The operation finished unsuccessfully in Azure.
    Failed(ReconcileError),
    InProgress,
}

/// Handle to one Azure long-running operation.
#[async_trait]
pub trait Poller<T: Send>: Send {
    /// Checks the operation once.
    ///
    /// # Errors
    ///
    /// Returns an error when the operation state could not be read. The
    /// operation itself may still be running.
    async fn poll(&mut self) -> Result<PollStatus<T>, ReconcileError>;

    /// Opaque token from which the operation can be resumed on a later tick.
    ///
    /// # Errors
    ///
    /// Returns an error when the poller state cannot be encoded.
    fn resume_token(&self) -> Result<String, ReconcileError>;

    /// Delay Azure asked for before the next poll.
    fn retry_after(&self) -> Option<Duration>;
}

/// Polls until the operation finishes, sleeping `frequency` (or the delay Azure
/// asked for) between polls. Callers bound this with a timeout.
///
/// The inner result is the outcome of the finished operation.
///
/// # Errors
///
/// Returns the error of the first poll that could not read the operation state.
pub async fn poll_until_done<T: Send>(
    poller: &mut (dyn Poller<T> + '_),
    frequency: Duration,
) -> Result<Result<T, ReconcileError>, ReconcileError> {
    loop {
        match poller.poll().await? {
            PollStatus::Done(result) => return Ok(Ok(result)),
            PollStatus::Failed(err) => return Ok(Err(err)),
            PollStatus::InProgress => {
                tokio::time::sleep(poller.retry_after().unwrap_or(frequency)).await;
            }
        }
    }
}

#[async_trait]
pub trait Getter<S: ResourceRef>: Send + Sync {
    /// # Errors
    ///
    /// Returns `NotFound` when the resource does not exist.
    async fn get(&self, spec: &S) -> Result<S::Resource, ReconcileError>;
}

#[async_trait]
pub trait Creator<S: ResourceRef>: Getter<S> {
    /// Starts a create-or-update.
    ///
    /// # Errors
    ///
    /// Returns the mapped Azure error when the request is rejected.
    async fn create_or_update_async(
        &self,
        spec: &S,
        parameters: S::Resource,
    ) -> Result<Box<dyn Poller<S::Resource>>, ReconcileError>;

    /// Rebuilds the poller of a create-or-update from its resume token.
    ///
    /// # Errors
    ///
    /// Returns a transient error when the token cannot be decoded.
    fn resume_create_or_update(
        &self,
        spec: &S,
        resume_token: &str,
    ) -> Result<Box<dyn Poller<S::Resource>>, ReconcileError>;
}

#[async_trait]
pub trait Deleter<S: ResourceRef>: Send + Sync {
    /// Starts a delete.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the resource is already gone.
    async fn delete_async(&self, spec: &S) -> Result<Box<dyn Poller<()>>, ReconcileError>;

    /// Rebuilds the poller of a delete from its resume token.
    ///
    /// # Errors
    ///
    /// Returns a transient error when the token cannot be decoded.
    fn resume_delete(
        &self,
        spec: &S,
        resume_token: &str,
    ) -> Result<Box<dyn Poller<()>>, ReconcileError>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
