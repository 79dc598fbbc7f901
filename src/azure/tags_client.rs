// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Client for the tags-at-scope API (`Microsoft.Resources/tags/default`).

use super::client::ArmClient;
use super::models::{TagsPatchResource, TagsResource};
use crate::azure_errors::ReconcileError;
use crate::constants::API_VERSION_TAGS;
use async_trait::async_trait;
use reqwest::Method;

/// Reads and patches the tags of any ARM resource.
#[async_trait]
pub trait TagsClient: Send + Sync {
    /// Tags of the resource identified by `scope` (an ARM resource ID).
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the resource does not exist.
    async fn get_at_scope(&self, scope: &str) -> Result<TagsResource, ReconcileError>;

    /// Applies a merge, delete or replace patch.
    ///
    /// # Errors
    ///
    /// Returns the mapped Azure error.
    async fn update_at_scope(
        &self,
        scope: &str,
        parameters: TagsPatchResource,
    ) -> Result<TagsResource, ReconcileError>;
}

#[async_trait]
impl<T: TagsClient + ?Sized> TagsClient for std::sync::Arc<T> {
    async fn get_at_scope(&self, scope: &str) -> Result<TagsResource, ReconcileError> {
        (**self).get_at_scope(scope).await
    }

    async fn update_at_scope(
        &self,
        scope: &str,
        parameters: TagsPatchResource,
    ) -> Result<TagsResource, ReconcileError> {
        (**self).update_at_scope(scope, parameters).await
    }
}

/// ARM implementation of [`TagsClient`].
#[derive(Clone, Debug)]
pub struct ArmTagsClient {
    arm: ArmClient,
}

impl ArmTagsClient {
    #[must_use]
    pub fn new(arm: ArmClient) -> Self {
        Self { arm }
    }
}

fn tags_path(scope: &str) -> String {
    format!(
        "{}/providers/Microsoft.Resources/tags/default",
        scope.trim_end_matches('/')
    )
}

#[async_trait]
impl TagsClient for ArmTagsClient {
    async fn get_at_scope(&self, scope: &str) -> Result<TagsResource, ReconcileError> {
        self.arm.get_json(&tags_path(scope), API_VERSION_TAGS).await
    }

    async fn update_at_scope(
        &self,
        scope: &str,
        parameters: TagsPatchResource,
    ) -> Result<TagsResource, ReconcileError> {
        let url = self.arm.url(&tags_path(scope), API_VERSION_TAGS)?;
        self.arm
            .send(Method::PATCH, url, Some(&parameters))
            .await?
            .json()
    }
}

#[cfg(test)]
#[path = "tags_client_tests.rs"]
mod tags_client_tests;
