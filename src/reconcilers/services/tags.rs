// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Tag reconciler.
//!
//! Keeps user supplied tags on resources the cluster owns. The tags applied
//! last time are kept in a JSON annotation on the owning object, so that tags
//! removed from the desired set are removed from Azure while tags added by
//! someone else are left alone.

use crate::azure::models::{TagsPatchOperation, TagsPatchResource, TagsProperties};
use crate::azure::tags_client::TagsClient;
use crate::azure_errors::ReconcileError;
use crate::reconcilers::services::{record_operation, ServiceReconciler, OPERATION_RECONCILE};
use crate::scope::{AnnotationJson, ClusterDescriber, TimeoutsGetter};
use crate::tags::{is_owned, tags_changed, Tags};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, info};

pub const SERVICE_NAME: &str = "tags";

/// Desired tags of one Azure resource.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TagsSpec {
    /// ARM resource ID the tags live on.
    pub scope: String,
    pub tags: Tags,
    /// Annotation holding the tags applied last time.
    pub annotation: String,
}

pub trait TagsScope: AnnotationJson + ClusterDescriber + TimeoutsGetter {
    fn tags_specs(&self) -> Vec<TagsSpec>;
}

pub struct TagsService<Sc, C> {
    scope: Arc<Sc>,
    client: C,
}

impl<Sc, C> TagsService<Sc, C>
where
    Sc: TagsScope,
    C: TagsClient,
{
    #[must_use]
    pub fn new(scope: Arc<Sc>, client: C) -> Self {
        Self { scope, client }
    }

    async fn patch(
        &self,
        spec: &TagsSpec,
        operation: TagsPatchOperation,
        tags: Tags,
    ) -> Result<(), ReconcileError> {
        let parameters = TagsPatchResource {
            operation,
            properties: TagsProperties { tags },
        };
        self.client
            .update_at_scope(&spec.scope, parameters)
            .await
            .map(|_| ())
            .map_err(|e| e.wrap(format!("cannot update tags on {}", spec.scope)))
    }

    async fn reconcile_spec(&self, spec: &TagsSpec) -> Result<(), ReconcileError> {
        let existing = match self.client.get_at_scope(&spec.scope).await {
            Ok(existing) => existing,
            Err(e) if e.is_not_found() => {
                debug!(service = %SERVICE_NAME, scope = %spec.scope, "Resource not found, skipping tags");
                return Ok(());
            }
            Err(e) => return Err(e.wrap(format!("failed to get existing tags on {}", spec.scope))),
        };
        let observed = existing.properties.tags;

        if !is_owned(&observed, &self.scope.cluster_name()) {
            debug!(service = %SERVICE_NAME, scope = %spec.scope, "Skipping tags of unmanaged resource");
            return Ok(());
        }

        let last_applied = self.scope.annotation_json(&spec.annotation)?;
        let diff = tags_changed(&last_applied, &spec.tags, &observed);

        if let Some(merge) = diff.create_or_update {
            self.patch(spec, TagsPatchOperation::Merge, merge).await?;
        }
        if let Some(delete) = diff.delete {
            self.patch(spec, TagsPatchOperation::Delete, delete).await?;
        }
        if diff.changed {
            info!(service = %SERVICE_NAME, scope = %spec.scope, "Updated tags");
        }

        // Written even when nothing changed so drift in the annotation heals.
        self.scope
            .update_annotation_json(&spec.annotation, &diff.new_annotation)
    }
}

#[async_trait]
impl<Sc, C> ServiceReconciler for TagsService<Sc, C>
where
    Sc: TagsScope,
    C: TagsClient,
{
    fn name(&self) -> &'static str {
        SERVICE_NAME
    }

    async fn reconcile(&self) -> Result<(), ReconcileError> {
        let started = Instant::now();
        let limit = self.scope.defaulted_azure_service_reconcile_timeout();

        let mut result = Ok(());
        for spec in self.scope.tags_specs() {
            result = match timeout(limit, self.reconcile_spec(&spec)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ReconcileError::transient(format!(
                    "timed out reconciling tags on {}",
                    spec.scope
                ))),
            };
            if result.is_err() {
                break;
            }
        }

        record_operation(SERVICE_NAME, OPERATION_RECONCILE, started, &result);
        result
    }

    /// Tags go away with the resources that carry them.
    async fn delete(&self) -> Result<(), ReconcileError> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "tags_tests.rs"]
mod tags_tests;
