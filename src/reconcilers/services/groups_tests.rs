// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `groups.rs`

#[cfg(test)]
mod tests {
    use super::super::{GroupScope, GroupService, GroupSpec};
    use crate::azure::models::{ResourceGroup as AzureResourceGroup, ResourceGroupProperties};
    use crate::azure::ResourceSpecGetter;
    use crate::crd::{AsoCondition, ResourceGroup, ResourceGroupSpec, ResourceGroupStatus};
    use crate::labels::{LAST_APPLIED_SPEC_ANNOTATION, TAG_NAME, TAG_ROLE};
    use crate::reconcilers::aso::{AsoReconciler, AsoResourceSpecGetter};
    use crate::reconcilers::async_reconciler::{AsyncReconciler, TagsManagedChecker};
    use crate::reconcilers::services::ServiceReconciler;
    use crate::status_reasons::CONDITION_RESOURCE_GROUP_READY;
    use crate::tags::{cluster_tag_key, Tags};
    use crate::test_utils::{FakeAzureClient, FakeObjectClient, FakeScope};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
    use kube::ResourceExt;
    use std::sync::Arc;

    impl GroupScope for FakeScope<GroupSpec> {
        fn group_spec(&self) -> GroupSpec {
            self.specs.clone()
        }
    }

    fn group_spec() -> GroupSpec {
        GroupSpec {
            name: "test-group".to_string(),
            namespace: "default".to_string(),
            location: "test-location".to_string(),
            cluster_name: "test-cluster".to_string(),
            additional_tags: Tags::from([("foo".to_string(), "bar".to_string())]),
        }
    }

    fn expected_tags() -> Tags {
        Tags::from([
            ("foo".to_string(), "bar".to_string()),
            (cluster_tag_key("test-cluster"), "owned".to_string()),
            (TAG_ROLE.to_string(), "common".to_string()),
            (TAG_NAME.to_string(), "test-group".to_string()),
        ])
    }

    fn azure_group(tags: Tags, state: &str) -> AzureResourceGroup {
        AzureResourceGroup {
            name: Some("test-group".to_string()),
            location: "test-location".to_string(),
            tags: Some(tags),
            properties: Some(ResourceGroupProperties {
                provisioning_state: Some(state.to_string()),
            }),
            ..Default::default()
        }
    }

    type DirectService = GroupService<
        FakeScope<GroupSpec>,
        AsyncReconciler<FakeScope<GroupSpec>, FakeAzureClient<AzureResourceGroup>>,
        TagsManagedChecker<FakeAzureClient<AzureResourceGroup>>,
    >;

    fn direct_service(client: &FakeAzureClient<AzureResourceGroup>) -> (Arc<FakeScope<GroupSpec>>, DirectService) {
        let scope = Arc::new(FakeScope::with_specs(group_spec()));
        let service = GroupService::new(
            Arc::clone(&scope),
            AsyncReconciler::new(Arc::clone(&scope), client.clone()),
            TagsManagedChecker::new(client.clone(), "test-cluster"),
        );
        (scope, service)
    }

    #[test]
    fn test_parameters_for_missing_group() {
        let params = ResourceSpecGetter::parameters(&group_spec(), None)
            .unwrap()
            .unwrap();

        assert_eq!(params.location, "test-location");
        assert_eq!(params.tags, Some(expected_tags()));
    }

    #[test]
    fn test_parameters_skip_existing_group() {
        let existing = azure_group(Tags::new(), "Succeeded");
        assert!(ResourceSpecGetter::parameters(&group_spec(), Some(&existing))
            .unwrap()
            .is_none());

        let failed = azure_group(Tags::new(), "Failed");
        assert!(ResourceSpecGetter::parameters(&group_spec(), Some(&failed))
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_reconcile_creates_group() {
        let client = FakeAzureClient::default();
        let (scope, service) = direct_service(&client);

        service.reconcile().await.unwrap();

        let state = client.lock();
        assert_eq!(state.create_calls, 1);
        let params = state.last_parameters.clone().unwrap();
        assert_eq!(params.location, "test-location");
        assert_eq!(params.tags, Some(expected_tags()));
        drop(state);
        assert_eq!(
            scope.condition(CONDITION_RESOURCE_GROUP_READY),
            Some(("True".to_string(), None))
        );
    }

    #[tokio::test]
    async fn test_reconcile_failure_marks_condition_false() {
        let client = FakeAzureClient::default();
        client.lock().begin_error = Some(crate::azure_errors::ReconcileError::terminal("quota"));
        let (scope, service) = direct_service(&client);

        let err = service.reconcile().await.unwrap_err();

        assert!(err.is_terminal());
        let (status, reason) = scope.condition(CONDITION_RESOURCE_GROUP_READY).unwrap();
        assert_eq!(status, "False");
        assert_eq!(reason.as_deref(), Some("Failed"));
    }

    #[tokio::test]
    async fn test_delete_skips_unmanaged_group() {
        // Bring-your-own group: no cluster ownership tag.
        let existing = azure_group(
            Tags::from([("foo".to_string(), "bar".to_string())]),
            "Succeeded",
        );
        let client = FakeAzureClient::with_existing(existing);
        let (scope, service) = direct_service(&client);

        service.delete().await.unwrap();

        assert_eq!(client.lock().delete_calls, 0);
        assert!(client.lock().existing.is_some());
        assert_eq!(
            scope.condition(CONDITION_RESOURCE_GROUP_READY),
            Some(("True".to_string(), None))
        );
    }

    #[tokio::test]
    async fn test_delete_managed_group() {
        let client = FakeAzureClient::with_existing(azure_group(expected_tags(), "Succeeded"));
        let (scope, service) = direct_service(&client);

        service.delete().await.unwrap();

        assert_eq!(client.lock().delete_calls, 1);
        assert!(client.lock().existing.is_none());
        assert_eq!(
            scope.condition(CONDITION_RESOURCE_GROUP_READY),
            Some(("True".to_string(), None))
        );
    }

    #[tokio::test]
    async fn test_delete_missing_group_is_success() {
        let client = FakeAzureClient::default();
        let (_scope, service) = direct_service(&client);

        service.delete().await.unwrap();

        assert_eq!(client.lock().delete_calls, 0);
    }

    // ------------------------------------------------------------------------
    // Operator-managed mode
    // ------------------------------------------------------------------------

    fn owner() -> OwnerReference {
        OwnerReference {
            api_version: "infrastructure.cluster.x-k8s.io/v1beta1".to_string(),
            kind: "AzureCluster".to_string(),
            name: "test-cluster".to_string(),
            uid: "uid-1".to_string(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        }
    }

    fn set_ready(group: &mut ResourceGroup) {
        group.status = Some(ResourceGroupStatus {
            conditions: vec![AsoCondition {
                r#type: "Ready".to_string(),
                status: "True".to_string(),
                observed_generation: group.metadata.generation,
                ..Default::default()
            }],
            ..Default::default()
        });
    }

    fn with_last_applied(mut group: ResourceGroup, tags: &Tags) -> ResourceGroup {
        let last = ResourceGroupSpec {
            tags: Some(tags.clone()),
            ..Default::default()
        };
        group.annotations_mut().insert(
            LAST_APPLIED_SPEC_ANNOTATION.to_string(),
            serde_json::to_string(&last).unwrap(),
        );
        group
    }

    #[test]
    fn test_aso_parameters_for_new_object() {
        let group = AsoResourceSpecGetter::parameters(&group_spec(), None)
            .unwrap()
            .unwrap();

        assert_eq!(group.name_any(), "test-group");
        assert_eq!(group.namespace().as_deref(), Some("default"));
        assert_eq!(group.spec.azure_name.as_deref(), Some("test-group"));
        assert_eq!(group.spec.location.as_deref(), Some("test-location"));
        assert_eq!(group.spec.tags, Some(expected_tags()));
    }

    #[test]
    fn test_aso_parameters_unchanged_object() {
        let spec = group_spec();
        let mut existing = spec.resource_ref();
        existing.spec.tags = Some(expected_tags());
        let existing = with_last_applied(existing, &expected_tags());

        assert!(AsoResourceSpecGetter::parameters(&spec, Some(&existing))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_aso_parameters_keep_foreign_tags() {
        let spec = group_spec();
        let mut last = expected_tags();
        last.insert("stale".to_string(), "1".to_string());
        let mut observed = last.clone();
        observed.insert("someone-else".to_string(), "x".to_string());
        let mut existing = spec.resource_ref();
        existing.spec.tags = Some(observed);
        let existing = with_last_applied(existing, &last);

        let updated = AsoResourceSpecGetter::parameters(&spec, Some(&existing))
            .unwrap()
            .unwrap();

        let tags = updated.spec.tags.unwrap();
        assert!(!tags.contains_key("stale"));
        assert_eq!(tags.get("someone-else").map(String::as_str), Some("x"));
        assert_eq!(tags.get("foo").map(String::as_str), Some("bar"));
    }

    #[tokio::test]
    async fn test_aso_reconcile_and_individual_delete() {
        let scope = Arc::new(FakeScope::with_specs(group_spec()));
        let objects = FakeObjectClient {
            on_apply: Some(set_ready as fn(&mut ResourceGroup)),
            ..Default::default()
        };
        let reconciler = Arc::new(AsoReconciler::new(objects, "test-cluster", owner()));
        let service = GroupService::new(
            Arc::clone(&scope),
            Arc::clone(&reconciler),
            Arc::clone(&reconciler),
        );

        // Nothing exists yet, so resources are deleted one by one.
        assert!(service.should_delete_individual_resources().await);

        service.reconcile().await.unwrap();

        assert_eq!(
            scope.condition(CONDITION_RESOURCE_GROUP_READY),
            Some(("True".to_string(), None))
        );
        // The managed group takes its contents with it.
        assert!(!service.should_delete_individual_resources().await);
    }
}
