// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Compute resource SKUs and a per-location cache of them.
//!
//! Listing SKUs is slow (thousands of entries per region), so the list is
//! fetched once per location and shared by every reconciler in the process.

use super::client::ArmClient;
use super::models::{ResourceSku, ResourceSkusPage};
use crate::azure_errors::ReconcileError;
use crate::constants::API_VERSION_SKUS;
use async_trait::async_trait;
use reqwest::Method;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;
use url::Url;

/// Resource type of virtual machine SKUs.
pub const VIRTUAL_MACHINES_RESOURCE_TYPE: &str = "virtualMachines";

/// Resource type of managed disk SKUs.
pub const DISKS_RESOURCE_TYPE: &str = "disks";

/// One SKU with capability helpers.
#[derive(Clone, Debug, PartialEq)]
pub struct Sku(pub ResourceSku);

impl Sku {
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.name.as_deref().unwrap_or_default()
    }

    /// Raw value of capability `name`.
    #[must_use]
    pub fn capability(&self, name: &str) -> Option<&str> {
        self.0
            .capabilities
            .as_ref()?
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
    }

    /// True when capability `name` is present with the value `True`.
    #[must_use]
    pub fn has_capability(&self, name: &str) -> bool {
        self.capability(name)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }
}

/// Source of the SKU list of one location.
#[async_trait]
pub trait SkuLister: Send + Sync {
    /// # Errors
    ///
    /// Returns the mapped Azure error.
    async fn list(&self, location: &str) -> Result<Vec<ResourceSku>, ReconcileError>;
}

/// ARM implementation of [`SkuLister`], following `nextLink` pagination.
#[derive(Clone, Debug)]
pub struct ArmSkuLister {
    arm: ArmClient,
}

impl ArmSkuLister {
    #[must_use]
    pub fn new(arm: ArmClient) -> Self {
        Self { arm }
    }
}

#[async_trait]
impl SkuLister for ArmSkuLister {
    async fn list(&self, location: &str) -> Result<Vec<ResourceSku>, ReconcileError> {
        let path = format!(
            "/subscriptions/{}/providers/Microsoft.Compute/skus",
            self.arm.subscription_id()
        );
        let mut url = self.arm.url(&path, API_VERSION_SKUS)?;
        url.query_pairs_mut()
            .append_pair("$filter", &format!("location eq '{location}'"));

        let mut skus = Vec::new();
        let mut next = Some(url);
        while let Some(url) = next.take() {
            let page: ResourceSkusPage = self.arm.send::<()>(Method::GET, url, None).await?.json()?;
            skus.extend(page.value);
            next = page
                .next_link
                .filter(|link| !link.is_empty())
                .map(|link| {
                    Url::parse(&link).map_err(|e| {
                        ReconcileError::transient(format!("invalid SKU nextLink {link:?}: {e}"))
                    })
                })
                .transpose()?;
        }

        debug!(location = %location, count = skus.len(), "listed resource SKUs");
        Ok(skus)
    }
}

/// Per-location memoised SKU lists.
pub struct SkuCache {
    lister: Arc<dyn SkuLister>,
    locations: RwLock<HashMap<String, Arc<Vec<ResourceSku>>>>,
}

impl SkuCache {
    #[must_use]
    pub fn new(lister: Arc<dyn SkuLister>) -> Self {
        Self {
            lister,
            locations: RwLock::new(HashMap::new()),
        }
    }

    async fn skus(&self, location: &str) -> Result<Arc<Vec<ResourceSku>>, ReconcileError> {
        let cached = self
            .locations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(location)
            .cloned();
        if let Some(skus) = cached {
            return Ok(skus);
        }

        let skus = Arc::new(self.lister.list(location).await?);
        self.locations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(location.to_string(), Arc::clone(&skus));
        Ok(skus)
    }

    /// The SKU `name` of `resource_type` available in `location`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no such SKU exists in the location, or the error
    /// of listing the SKUs.
    pub async fn get(
        &self,
        name: &str,
        resource_type: &str,
        location: &str,
    ) -> Result<Sku, ReconcileError> {
        let skus = self.skus(location).await?;
        skus.iter()
            .find(|sku| {
                sku.name.as_deref() == Some(name)
                    && sku.resource_type.as_deref() == Some(resource_type)
            })
            .cloned()
            .map(Sku)
            .ok_or_else(|| ReconcileError::NotFound {
                message: format!(
                    "resource SKU with name {name:?} and resource type {resource_type:?} not found in location {location:?}"
                ),
            })
    }
}

#[cfg(test)]
#[path = "resourceskus_tests.rs"]
mod resourceskus_tests;
