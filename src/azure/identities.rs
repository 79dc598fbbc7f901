// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! User-assigned managed identity lookups.
//!
//! VM specs name identities by provider ID while the VM reports them keyed by
//! resource ID with a client ID. [`IdentityClient::get_client_id`] resolves a
//! provider ID to its client ID; [`CachedIdentityClient`] memoises the answers
//! for all reconcilers of the process.

use super::client::ArmClient;
use super::models::{UserAssignedIdentity, USER_ASSIGNED_IDENTITY_API_VERSION};
use super::resource_id::resource_id_from_provider_id;
use crate::azure_errors::ReconcileError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Client ID of the identity named by `provider_id`
    /// (`azure:///subscriptions/.../userAssignedIdentities/<name>`).
    ///
    /// # Errors
    ///
    /// Returns a terminal error for a malformed provider ID, otherwise the mapped
    /// Azure error.
    async fn get_client_id(&self, provider_id: &str) -> Result<String, ReconcileError>;
}

/// ARM implementation of [`IdentityClient`].
#[derive(Clone, Debug)]
pub struct ArmIdentityClient {
    arm: ArmClient,
}

impl ArmIdentityClient {
    #[must_use]
    pub fn new(arm: ArmClient) -> Self {
        Self { arm }
    }
}

#[async_trait]
impl IdentityClient for ArmIdentityClient {
    async fn get_client_id(&self, provider_id: &str) -> Result<String, ReconcileError> {
        let id = resource_id_from_provider_id(provider_id).unwrap_or(provider_id);
        if !id.starts_with('/') {
            return Err(ReconcileError::terminal(format!(
                "invalid user assigned identity provider ID {provider_id:?}"
            )));
        }

        let identity: UserAssignedIdentity = self
            .arm
            .get_json(id, USER_ASSIGNED_IDENTITY_API_VERSION)
            .await?;
        identity
            .properties
            .and_then(|p| p.client_id)
            .ok_or_else(|| {
                ReconcileError::terminal(format!("identity {provider_id} has no client ID"))
            })
    }
}

/// Process-wide memoising wrapper around an [`IdentityClient`].
///
/// Client IDs never change for a given identity, so entries are never evicted.
pub struct CachedIdentityClient<C> {
    inner: C,
    cache: Arc<RwLock<HashMap<String, String>>>,
}

impl<C> CachedIdentityClient<C> {
    #[must_use]
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of memoised identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl<C: IdentityClient> IdentityClient for CachedIdentityClient<C> {
    async fn get_client_id(&self, provider_id: &str) -> Result<String, ReconcileError> {
        let cached = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(provider_id)
            .cloned();
        if let Some(client_id) = cached {
            return Ok(client_id);
        }

        let client_id = self.inner.get_client_id(provider_id).await?;
        debug!(provider_id = %provider_id, client_id = %client_id, "cached identity client ID");
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(provider_id.to_string(), client_id.clone());
        Ok(client_id)
    }
}

#[cfg(test)]
#[path = "identities_tests.rs"]
mod identities_tests;
