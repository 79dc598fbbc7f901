// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared Azure context for the per-object service wrappers.
//!
//! The outer controller builds one `AzureContext` per subscription and hands an
//! `Arc<AzureContext>` to every reconcile. It holds:
//! - the authenticated ARM client
//! - the SKU cache used for capability lookups
//! - the identity cache used to resolve user assigned identities
//!
//! The caches are shared across objects and safe for concurrent use.

use crate::azure::client::{ArmClient, Client, TokenCredential};
use crate::azure::identities::{ArmIdentityClient, CachedIdentityClient};
use crate::azure::resourceskus::{ArmSkuLister, SkuCache};
use crate::azure::tags_client::ArmTagsClient;
use crate::config::AzureConfig;
use crate::reconcilers::aso::AsoReconciler;
use crate::reconcilers::async_reconciler::{AsyncReconciler, TagsManagedChecker};
use crate::scope::{FutureScope, TimeoutsGetter};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use std::sync::Arc;

#[derive(Clone)]
pub struct AzureContext {
    pub config: AzureConfig,
    pub arm: ArmClient,
    pub skus: Arc<SkuCache>,
    pub identities: Arc<CachedIdentityClient<ArmIdentityClient>>,
}

impl AzureContext {
    /// # Errors
    ///
    /// Returns an error when the ARM client cannot be built from `config`.
    pub fn new(config: AzureConfig, credential: Arc<dyn TokenCredential>) -> anyhow::Result<Self> {
        let arm = ArmClient::from_config(&config, credential)?;
        Ok(Self::with_client(config, arm))
    }

    /// Wraps an already built ARM client.
    #[must_use]
    pub fn with_client(config: AzureConfig, arm: ArmClient) -> Self {
        Self {
            skus: Arc::new(SkuCache::new(Arc::new(ArmSkuLister::new(arm.clone())))),
            identities: Arc::new(CachedIdentityClient::new(ArmIdentityClient::new(arm.clone()))),
            config,
            arm,
        }
    }

    /// Generic ARM client for the spec type `S`.
    #[must_use]
    pub fn client<S>(&self) -> Client<S> {
        Client::new(self.arm.clone())
    }

    #[must_use]
    pub fn tags_client(&self) -> ArmTagsClient {
        ArmTagsClient::new(self.arm.clone())
    }

    /// Direct reconciler for specs of type `S`, polling at the configured
    /// frequency.
    #[must_use]
    pub fn reconciler<Sc, S>(&self, scope: Arc<Sc>) -> AsyncReconciler<Sc, Client<S>>
    where
        Sc: FutureScope + TimeoutsGetter,
    {
        AsyncReconciler::new(scope, self.client())
            .with_poll_frequency(self.config.lro_poll_frequency)
    }

    /// Operator-backed reconciler whose Kubernetes calls are bounded by the
    /// configured service reconcile timeout.
    #[must_use]
    pub fn aso_reconciler<C>(
        &self,
        client: C,
        cluster_name: &str,
        owner: OwnerReference,
    ) -> AsoReconciler<C> {
        AsoReconciler::new(client, cluster_name, owner)
            .with_timeout(self.config.defaulted_azure_service_reconcile_timeout())
    }

    /// Ownership check by cluster tag for specs of type `S`.
    #[must_use]
    pub fn managed_checker<S>(&self, cluster_name: &str) -> TagsManagedChecker<Client<S>> {
        TagsManagedChecker::new(self.client(), cluster_name)
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
