// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `tags.rs`

#[cfg(test)]
mod tests {
    use super::super::{TagsScope, TagsService, TagsSpec};
    use crate::azure::models::{TagsPatchOperation, TagsPatchResource, TagsProperties, TagsResource};
    use crate::azure::tags_client::TagsClient;
    use crate::azure_errors::ReconcileError;
    use crate::labels::last_applied_tags_annotation;
    use crate::reconcilers::services::ServiceReconciler;
    use crate::scope::AnnotationJson;
    use crate::tags::{cluster_tag_key, Tags};
    use crate::test_utils::FakeScope;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    const VM_ID: &str =
        "/subscriptions/123/resourceGroups/my-rg/providers/Microsoft.Compute/virtualMachines/my-vm";

    impl TagsScope for FakeScope<Vec<TagsSpec>> {
        fn tags_specs(&self) -> Vec<TagsSpec> {
            self.specs.clone()
        }
    }

    #[derive(Default)]
    struct FakeTagsClient {
        observed: Mutex<Option<Tags>>,
        get_error: Option<ReconcileError>,
        patches: Mutex<Vec<TagsPatchResource>>,
    }

    #[async_trait]
    impl TagsClient for FakeTagsClient {
        async fn get_at_scope(&self, scope: &str) -> Result<TagsResource, ReconcileError> {
            if let Some(err) = self.get_error.clone() {
                return Err(err);
            }
            let tags = self.observed.lock().unwrap().clone().ok_or_else(|| ReconcileError::NotFound {
                message: format!("{scope} not found"),
            })?;
            Ok(TagsResource {
                properties: TagsProperties { tags },
                ..Default::default()
            })
        }

        async fn update_at_scope(
            &self,
            _scope: &str,
            parameters: TagsPatchResource,
        ) -> Result<TagsResource, ReconcileError> {
            self.patches.lock().unwrap().push(parameters);
            Ok(TagsResource::default())
        }
    }

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    /// Observed tags of a resource owned by the fake scope's cluster.
    fn owned(pairs: &[(&str, &str)]) -> Tags {
        let mut observed = tags(pairs);
        observed.insert(cluster_tag_key("test-cluster"), "owned".to_string());
        observed
    }

    fn setup(
        desired: Tags,
        observed: Option<Tags>,
        last_applied: &Tags,
    ) -> (
        Arc<FakeScope<Vec<TagsSpec>>>,
        Arc<FakeTagsClient>,
        TagsService<FakeScope<Vec<TagsSpec>>, Arc<FakeTagsClient>>,
    ) {
        let annotation = last_applied_tags_annotation("vm");
        let scope = Arc::new(FakeScope::with_specs(vec![TagsSpec {
            scope: VM_ID.to_string(),
            tags: desired,
            annotation: annotation.clone(),
        }]));
        scope.update_annotation_json(&annotation, last_applied).unwrap();
        let client = Arc::new(FakeTagsClient {
            observed: Mutex::new(observed),
            ..Default::default()
        });
        let service = TagsService::new(Arc::clone(&scope), Arc::clone(&client));
        (scope, client, service)
    }

    #[tokio::test]
    async fn test_external_delete_is_merged_back() {
        let desired = tags(&[("foo", "hello"), ("bar", "welcome")]);
        let (scope, client, service) =
            setup(desired.clone(), Some(owned(&[("foo", "hello")])), &desired);

        service.reconcile().await.unwrap();

        let patches = client.patches.lock().unwrap().clone();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].operation, TagsPatchOperation::Merge);
        assert_eq!(patches[0].properties.tags, tags(&[("bar", "welcome")]));
        assert_eq!(
            scope
                .annotation_json(&last_applied_tags_annotation("vm"))
                .unwrap(),
            desired
        );
    }

    #[tokio::test]
    async fn test_removed_tag_is_deleted_after_merge() {
        let last_applied = tags(&[("foo", "hello"), ("old", "value")]);
        let desired = tags(&[("foo", "bye")]);
        let (scope, client, service) = setup(
            desired.clone(),
            Some(owned(&[("foo", "hello"), ("old", "value"), ("external", "x")])),
            &last_applied,
        );

        service.reconcile().await.unwrap();

        let patches = client.patches.lock().unwrap().clone();
        let operations: Vec<TagsPatchOperation> = patches.iter().map(|p| p.operation).collect();
        assert_eq!(
            operations,
            vec![TagsPatchOperation::Merge, TagsPatchOperation::Delete]
        );
        assert_eq!(patches[0].properties.tags, tags(&[("foo", "bye")]));
        assert_eq!(patches[1].properties.tags, tags(&[("old", "value")]));
        assert_eq!(
            scope
                .annotation_json(&last_applied_tags_annotation("vm"))
                .unwrap(),
            desired
        );
    }

    #[tokio::test]
    async fn test_unchanged_tags_still_write_annotation() {
        let desired = tags(&[("foo", "hello")]);
        let (scope, client, service) =
            setup(desired.clone(), Some(owned(&[("foo", "hello")])), &Tags::new());

        service.reconcile().await.unwrap();

        assert!(client.patches.lock().unwrap().is_empty());
        assert_eq!(
            scope
                .annotation_json(&last_applied_tags_annotation("vm"))
                .unwrap(),
            desired
        );
    }

    #[tokio::test]
    async fn test_unmanaged_resource_is_skipped() {
        let (scope, client, service) = setup(
            tags(&[("foo", "hello")]),
            Some(tags(&[("other", "tag")])),
            &Tags::new(),
        );

        service.reconcile().await.unwrap();

        assert!(client.patches.lock().unwrap().is_empty());
        assert!(scope
            .annotation_json(&last_applied_tags_annotation("vm"))
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_missing_resource_is_skipped() {
        let (_, client, service) = setup(tags(&[("foo", "hello")]), None, &Tags::new());

        service.reconcile().await.unwrap();

        assert!(client.patches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_error_is_surfaced() {
        let scope = Arc::new(FakeScope::with_specs(vec![TagsSpec {
            scope: VM_ID.to_string(),
            tags: tags(&[("foo", "hello")]),
            annotation: last_applied_tags_annotation("vm"),
        }]));
        let client = Arc::new(FakeTagsClient {
            get_error: Some(ReconcileError::transient("throttled")),
            ..Default::default()
        });
        let service = TagsService::new(scope, Arc::clone(&client));

        let err = service.reconcile().await.unwrap_err();

        assert!(err.is_transient());
        assert!(err.to_string().contains("failed to get existing tags"));
    }
}
