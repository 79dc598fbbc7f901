// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `status.rs`

#[cfg(test)]
mod tests {
    use crate::azure_errors::ReconcileError;
    use crate::crd::{ConditionSeverity, Future, FutureType};
    use crate::reconcilers::status::{
        conditions_equal, create_condition, find_condition, update_condition_in_memory,
        ReconcileStatus, ServiceState,
    };
    use crate::scope::{AnnotationJson, AsyncStatusUpdater, FutureScope};
    use crate::tags::Tags;
    use std::collections::BTreeMap;

    const CONDITION: &str = "VMRunning";

    fn future(future_type: FutureType) -> Future {
        Future {
            r#type: future_type,
            service_name: "virtualmachine".to_string(),
            name: "vm".to_string(),
            resource_group: "rg".to_string(),
            data: "dG9rZW4=".to_string(),
        }
    }

    #[test]
    fn test_create_condition_basic() {
        let condition = create_condition(
            CONDITION,
            "False",
            Some(ConditionSeverity::Warning),
            Some("Something"),
            Some("details"),
        );

        assert_eq!(condition.r#type, CONDITION);
        assert_eq!(condition.status, "False");
        assert_eq!(condition.severity, Some(ConditionSeverity::Warning));
        assert_eq!(condition.reason.as_deref(), Some("Something"));
        assert!(condition.last_transition_time.is_some());
    }

    #[test]
    fn test_update_condition_preserves_transition_time_when_status_unchanged() {
        let mut conditions = vec![create_condition(CONDITION, "False", None, Some("A"), None)];
        conditions[0].last_transition_time = Some("2024-01-01T00:00:00+00:00".to_string());

        update_condition_in_memory(&mut conditions, CONDITION, "False", None, Some("B"), None);
        assert_eq!(
            conditions[0].last_transition_time.as_deref(),
            Some("2024-01-01T00:00:00+00:00")
        );
        assert_eq!(conditions[0].reason.as_deref(), Some("B"));

        update_condition_in_memory(&mut conditions, CONDITION, "True", None, None, None);
        assert_ne!(
            conditions[0].last_transition_time.as_deref(),
            Some("2024-01-01T00:00:00+00:00")
        );
        assert!(conditions[0].reason.is_none());
        assert_eq!(conditions.len(), 1);
    }

    #[test]
    fn test_conditions_equal_ignores_timestamps() {
        let a = vec![create_condition(CONDITION, "True", None, None, None)];
        let mut b = a.clone();
        b[0].last_transition_time = Some("other".to_string());
        assert!(conditions_equal(&a, &b));

        b[0].status = "False".to_string();
        assert!(!conditions_equal(&a, &b));
        assert!(find_condition(&a, CONDITION).is_some());
    }

    #[test]
    fn test_put_status_success_marks_true() {
        let status = ReconcileStatus::default();
        status.update_put_status(CONDITION, "virtualmachine", None);

        let condition = status.condition(CONDITION).unwrap();
        assert_eq!(condition.status, "True");
        assert_eq!(
            status.service_status("virtualmachine").unwrap().state,
            ServiceState::Ready
        );
    }

    #[test]
    fn test_put_status_not_done_is_info() {
        let status = ReconcileStatus::default();
        let err = ReconcileError::not_done(future(FutureType::Put));
        status.update_put_status(CONDITION, "virtualmachine", Some(&err));

        let condition = status.condition(CONDITION).unwrap();
        assert_eq!(condition.status, "False");
        assert_eq!(condition.reason.as_deref(), Some("OperationNotDone"));
        assert_eq!(condition.severity, Some(ConditionSeverity::Info));
        assert!(condition.message.unwrap().contains("rg/vm"));
    }

    #[test]
    fn test_put_status_failure_is_error() {
        let status = ReconcileStatus::default();
        let err = ReconcileError::terminal("bad image");
        status.update_put_status(CONDITION, "virtualmachine", Some(&err));

        let condition = status.condition(CONDITION).unwrap();
        assert_eq!(condition.reason.as_deref(), Some("Failed"));
        assert_eq!(condition.severity, Some(ConditionSeverity::Error));
        assert_eq!(
            status.service_status("virtualmachine").unwrap().error.as_deref(),
            Some("bad image")
        );
    }

    #[test]
    fn test_delete_status() {
        let status = ReconcileStatus::default();
        let err = ReconcileError::not_done(future(FutureType::Delete));
        status.update_delete_status(CONDITION, "virtualmachine", Some(&err));
        assert_eq!(
            status.service_status("virtualmachine").unwrap().state,
            ServiceState::Deleting
        );

        status.update_delete_status(CONDITION, "virtualmachine", Some(&ReconcileError::transient("x")));
        assert_eq!(
            status.condition(CONDITION).unwrap().reason.as_deref(),
            Some("DeletionFailed")
        );

        status.update_delete_status(CONDITION, "virtualmachine", None);
        assert_eq!(status.condition(CONDITION).unwrap().status, "True");
    }

    #[test]
    fn test_future_scope_round_trip() {
        let status = ReconcileStatus::default();
        status.set_long_running_operation_state(future(FutureType::Put));

        assert!(status
            .get_long_running_operation_state("vm", "virtualmachine", FutureType::Put)
            .is_some());
        assert!(status
            .get_long_running_operation_state("vm", "virtualmachine", FutureType::Delete)
            .is_none());

        status.delete_long_running_operation_state("vm", "virtualmachine", FutureType::Put);
        assert!(status.long_running_operation_states().is_empty());
    }

    #[test]
    fn test_has_changes_tracks_seeded_state() {
        let status = ReconcileStatus::new(
            vec![create_condition(CONDITION, "True", None, None, None)],
            vec![],
            BTreeMap::new(),
        );
        assert!(!status.has_changes());

        status.update_put_status(CONDITION, "virtualmachine", None);
        assert!(!status.has_changes());

        status.set_long_running_operation_state(future(FutureType::Put));
        assert!(status.has_changes());
    }

    #[test]
    fn test_status_patch_shape() {
        let status = ReconcileStatus::default();
        status.set_long_running_operation_state(future(FutureType::Delete));
        status.update_put_status(CONDITION, "virtualmachine", None);

        let patch = status.status_patch();
        assert_eq!(patch["status"]["conditions"][0]["type"], CONDITION);
        assert_eq!(
            patch["status"]["longRunningOperationStates"][0]["type"],
            "DELETE"
        );
    }

    #[test]
    fn test_annotation_json() {
        let status = ReconcileStatus::default();
        assert!(status.annotation_json("sigs.k8s.io/last-applied-tags-vm").unwrap().is_empty());

        let mut tags = Tags::new();
        tags.insert("foo".to_string(), "bar".to_string());
        status
            .update_annotation_json("sigs.k8s.io/last-applied-tags-vm", &tags)
            .unwrap();
        assert_eq!(
            status.annotation("sigs.k8s.io/last-applied-tags-vm").as_deref(),
            Some(r#"{"foo":"bar"}"#)
        );
        assert_eq!(
            status.annotation_json("sigs.k8s.io/last-applied-tags-vm").unwrap(),
            tags
        );

        status.set_annotation("broken", "{not json".to_string());
        assert!(status.annotation_json("broken").unwrap_err().is_terminal());
    }
}
