// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes access for backing objects.
//!
//! The operator-managed reconciler talks to the Kubernetes API only through
//! [`ObjectClient`], so it can run against an in-memory fake in tests.
//! [`kube::Client`] implements it with server-side apply.
//!
//! # Example
//!
//! ```rust,no_run
//! use capz_core::crd::{ResourceGroup, ResourceGroupSpec};
//! use capz_core::reconcilers::resources::ObjectClient;
//! use kube::Client;
//!
//! async fn example(client: Client) -> Result<(), capz_core::azure_errors::ReconcileError> {
//!     let group = ResourceGroup::new(
//!         "my-cluster",
//!         ResourceGroupSpec {
//!             azure_name: Some("my-cluster".to_string()),
//!             location: Some("westus".to_string()),
//!             tags: None,
//!         },
//!     );
//!     ObjectClient::<ResourceGroup>::apply(&client, "default", &group).await?;
//!     Ok(())
//! }
//! ```

use crate::azure_errors::ReconcileError;
use crate::constants::FIELD_MANAGER;
use crate::http_errors::map_kube_error;
use async_trait::async_trait;
use kube::api::{DeleteParams, Patch, PatchParams};
use kube::core::NamespaceResourceScope;
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, info};

/// Namespaced get, apply and delete of objects of kind `K`.
#[async_trait]
pub trait ObjectClient<K>: Send + Sync
where
    K: Send + Sync + 'static,
{
    /// The object, or `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns the mapped Kubernetes API error.
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, ReconcileError>;

    /// Creates or updates `object` and returns the stored version.
    ///
    /// # Errors
    ///
    /// Returns the mapped Kubernetes API error.
    async fn apply(&self, namespace: &str, object: &K) -> Result<K, ReconcileError>;

    /// Requests deletion. Deleting a missing object is not an error.
    ///
    /// # Errors
    ///
    /// Returns the mapped Kubernetes API error.
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ReconcileError>;
}

#[async_trait]
impl<K> ObjectClient<K> for Client
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + ResourceExt
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, ReconcileError> {
        let api: Api<K> = Api::namespaced(self.clone(), namespace);
        api.get_opt(name).await.map_err(map_kube_error)
    }

    async fn apply(&self, namespace: &str, object: &K) -> Result<K, ReconcileError> {
        let name = object.name_any();
        let api: Api<K> = Api::namespaced(self.clone(), namespace);

        // Server-side apply rejects bodies that carry managed fields or a stale
        // resource version.
        let mut body = object.clone();
        body.meta_mut().managed_fields = None;
        body.meta_mut().resource_version = None;

        debug!(
            namespace = %namespace,
            name = %name,
            kind = %K::kind(&()),
            "Applying backing object"
        );
        let applied = api
            .patch(
                &name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(&body),
            )
            .await
            .map_err(map_kube_error)?;
        info!("Applied {} {}/{}", K::kind(&()), namespace, name);
        Ok(applied)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ReconcileError> {
        let api: Api<K> = Api::namespaced(self.clone(), namespace);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => {
                info!("Requested deletion of {} {}/{}", K::kind(&()), namespace, name);
                Ok(())
            }
            Err(e) => match map_kube_error(e) {
                err if err.is_not_found() => Ok(()),
                err => Err(err),
            },
        }
    }
}
