// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `crd.rs`

#[cfg(test)]
mod tests {
    use crate::crd::*;

    #[test]
    fn test_future_type_serializes_as_http_verb() {
        assert_eq!(serde_json::to_value(FutureType::Put).unwrap(), "PUT");
        assert_eq!(serde_json::to_value(FutureType::Patch).unwrap(), "PATCH");
        assert_eq!(serde_json::to_value(FutureType::Delete).unwrap(), "DELETE");
    }

    #[test]
    fn test_future_uses_camel_case_fields() {
        let future = Future {
            r#type: FutureType::Delete,
            service_name: "disks".to_string(),
            name: "os-disk".to_string(),
            resource_group: "rg".to_string(),
            data: "abc".to_string(),
        };

        let json = serde_json::to_value(&future).unwrap();
        assert_eq!(json["serviceName"], "disks");
        assert_eq!(json["resourceGroup"], "rg");

        let back: Future = serde_json::from_value(json).unwrap();
        assert_eq!(back, future);
    }

    #[test]
    fn test_condition_omits_empty_optional_fields() {
        let condition = Condition {
            r#type: "VMRunning".to_string(),
            status: "True".to_string(),
            ..Default::default()
        };

        let json = serde_json::to_value(&condition).unwrap();
        assert_eq!(json["type"], "VMRunning");
        assert!(json.get("reason").is_none());
        assert!(json.get("severity").is_none());
    }

    #[test]
    fn test_provisioning_state_from_azure() {
        assert_eq!(
            ProvisioningState::from_azure("Succeeded"),
            ProvisioningState::Succeeded
        );
        assert_eq!(
            ProvisioningState::from_azure("Failed"),
            ProvisioningState::Failed
        );
        assert_eq!(
            ProvisioningState::from_azure("Migrating"),
            ProvisioningState::Unknown
        );
    }

    #[test]
    fn test_resource_group_ready_condition_lookup() {
        let mut group = ResourceGroup::new("rg", ResourceGroupSpec::default());
        assert!(group.ready_condition().is_none());

        group.status = Some(ResourceGroupStatus {
            conditions: vec![AsoCondition {
                r#type: "Ready".to_string(),
                status: "False".to_string(),
                severity: Some("Error".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        });

        let ready = group.ready_condition().unwrap();
        assert_eq!(ready.status, "False");
        assert!(ready.is_error_severity());
    }
}
