// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `scalesets.rs`

#[cfg(test)]
mod tests {
    use super::super::{ScaleSetScope, ScaleSetService, ScaleSetSpec};
    use crate::azure::models::{
        ScaleSetProperties, ScaleSetSku, SubResource, VirtualMachineScaleSet,
    };
    use crate::azure::ResourceSpecGetter;
    use crate::crd::ProvisioningState;
    use crate::reconcilers::async_reconciler::AsyncReconciler;
    use crate::reconcilers::services::ServiceReconciler;
    use crate::status_reasons::CONDITION_SCALE_SET_RUNNING;
    use crate::test_utils::{FakeAzureClient, FakeScope};
    use std::sync::Arc;

    impl ScaleSetScope for FakeScope<ScaleSetSpec> {
        fn scale_set_spec(&self) -> ScaleSetSpec {
            self.specs.clone()
        }

        fn set_provisioning_state(&self, state: ProvisioningState) {
            *self.provisioning_state.lock().unwrap() = Some(state);
        }
    }

    fn spec(capacity: i64) -> ScaleSetSpec {
        ScaleSetSpec {
            name: "my-vmss".to_string(),
            resource_group: "my-rg".to_string(),
            subscription_id: "123".to_string(),
            location: "test-location".to_string(),
            cluster_name: "my-cluster".to_string(),
            size: "Standard_D2s_v3".to_string(),
            capacity,
            vnet_name: "my-vnet".to_string(),
            vnet_resource_group: "my-rg".to_string(),
            subnet_name: "my-subnet".to_string(),
            backend_pools: vec![("my-lb".to_string(), "my-pool".to_string())],
            ..Default::default()
        }
    }

    fn existing(capacity: i64) -> VirtualMachineScaleSet {
        existing_in_state(capacity, "Succeeded")
    }

    fn existing_in_state(capacity: i64, state: &str) -> VirtualMachineScaleSet {
        VirtualMachineScaleSet {
            name: Some("my-vmss".to_string()),
            sku: Some(ScaleSetSku {
                name: Some("Standard_D2s_v3".to_string()),
                tier: Some("Standard".to_string()),
                capacity: Some(capacity),
            }),
            properties: Some(ScaleSetProperties {
                overprovision: Some(false),
                provisioning_state: Some(state.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_parameters_for_new_scale_set() {
        let vmss = spec(3).parameters(None).unwrap().unwrap();

        assert_eq!(vmss.sku.as_ref().and_then(|s| s.capacity), Some(3));
        let network = vmss
            .properties
            .and_then(|p| p.virtual_machine_profile)
            .and_then(|p| p.network_profile)
            .and_then(|p| p.network_interface_configurations)
            .unwrap();
        let ip_config = network[0]
            .properties
            .as_ref()
            .and_then(|p| p.ip_configurations.as_ref())
            .unwrap()[0]
            .properties
            .clone()
            .unwrap();
        assert_eq!(
            ip_config.load_balancer_backend_address_pools,
            Some(vec![SubResource::new(
                "/subscriptions/123/resourceGroups/my-rg/providers/Microsoft.Network/loadBalancers/my-lb/backendAddressPools/my-pool"
            )])
        );
    }

    #[test]
    fn test_parameters_same_capacity_is_unchanged() {
        assert!(spec(3).parameters(Some(&existing(3))).unwrap().is_none());
    }

    #[test]
    fn test_parameters_patch_capacity_only() {
        let updated = spec(5).parameters(Some(&existing(3))).unwrap().unwrap();

        assert_eq!(updated.sku.as_ref().and_then(|s| s.capacity), Some(5));
        let properties = updated.properties.unwrap();
        assert_eq!(properties.overprovision, Some(false));
        assert!(properties.provisioning_state.is_none());
    }

    #[test]
    fn test_parameters_in_flight_set_is_left_alone() {
        for state in ["Creating", "Updating", "Deleting"] {
            assert!(
                spec(5).parameters(Some(&existing_in_state(3, state))).unwrap().is_none(),
                "{state} scale set must not be updated"
            );
        }
    }

    #[test]
    fn test_parameters_failed_set_is_recreated() {
        for state in ["Failed", "Canceled"] {
            let vmss = spec(3)
                .parameters(Some(&existing_in_state(3, state)))
                .unwrap()
                .expect("failed scale set is recreated");
            assert_eq!(vmss.sku.as_ref().and_then(|s| s.capacity), Some(3));
            assert_eq!(vmss.location.as_deref(), Some("test-location"));
            assert!(vmss
                .properties
                .and_then(|p| p.virtual_machine_profile)
                .is_some());
        }
    }

    #[tokio::test]
    async fn test_reconcile_scales_existing_set() {
        let client = FakeAzureClient::with_existing(existing(3));
        let scope = Arc::new(FakeScope::with_specs(spec(5)));
        let service = ScaleSetService::new(
            Arc::clone(&scope),
            AsyncReconciler::new(Arc::clone(&scope), client.clone()),
        );

        service.reconcile().await.unwrap();

        let sent = client.lock().last_parameters.clone().unwrap();
        assert_eq!(sent.sku.and_then(|s| s.capacity), Some(5));
        assert_eq!(
            scope.condition(CONDITION_SCALE_SET_RUNNING),
            Some(("True".to_string(), None))
        );
        // The fake echoes the request, which carries no provisioning state.
        assert_eq!(
            *scope.provisioning_state.lock().unwrap(),
            Some(ProvisioningState::Unknown)
        );
    }

    #[tokio::test]
    async fn test_delete_marks_state_deleted() {
        let client = FakeAzureClient::with_existing(existing(3));
        let scope = Arc::new(FakeScope::with_specs(spec(3)));
        let service = ScaleSetService::new(
            Arc::clone(&scope),
            AsyncReconciler::new(Arc::clone(&scope), client.clone()),
        );

        service.delete().await.unwrap();

        assert_eq!(
            *scope.provisioning_state.lock().unwrap(),
            Some(ProvisioningState::Deleted)
        );
        assert_eq!(
            scope.condition(CONDITION_SCALE_SET_RUNNING),
            Some(("True".to_string(), None))
        );
    }
}
