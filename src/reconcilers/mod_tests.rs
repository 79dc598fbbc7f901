// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for error aggregation.

#[cfg(test)]
mod tests {
    use super::super::aggregate_error;
    use crate::azure_errors::ReconcileError;
    use crate::crd::{Future, FutureType};

    fn not_done() -> ReconcileError {
        ReconcileError::not_done(Future {
            r#type: FutureType::Put,
            service_name: "svc".to_string(),
            name: "a".to_string(),
            resource_group: "rg".to_string(),
            data: String::new(),
        })
    }

    #[test]
    fn test_aggregate_error_empty_is_success() {
        assert!(aggregate_error(Vec::new()).is_none());
    }

    #[test]
    fn test_aggregate_error_terminal_wins_in_any_order() {
        // Arrange: the successful spec contributes no error
        let orders = [
            vec![not_done(), ReconcileError::terminal("bad")],
            vec![ReconcileError::terminal("bad"), not_done()],
        ];

        for errors in orders {
            // Act
            let err = aggregate_error(errors).unwrap();

            // Assert
            assert!(err.is_terminal(), "terminal error must win, got {err}");
        }
    }

    #[test]
    fn test_aggregate_error_transient_beats_not_done() {
        let err = aggregate_error(vec![not_done(), ReconcileError::transient("flaky")]).unwrap();
        assert!(err.is_transient());
    }

    #[test]
    fn test_aggregate_error_first_among_equals() {
        let err = aggregate_error(vec![
            ReconcileError::transient("first"),
            ReconcileError::transient("second"),
        ])
        .unwrap();
        assert!(err.to_string().contains("first"));
    }

    #[test]
    fn test_aggregate_error_only_not_done() {
        let err = aggregate_error(vec![not_done()]).unwrap();
        assert!(err.is_not_done());
    }

    #[test]
    fn test_aggregate_error_resource_deleted_ranks_as_terminal() {
        let err = aggregate_error(vec![
            ReconcileError::transient("flaky"),
            ReconcileError::ResourceDeleted {
                resource_group: "rg".to_string(),
                name: "vm".to_string(),
            },
        ])
        .unwrap();
        assert!(matches!(err, ReconcileError::ResourceDeleted { .. }));
    }
}
