// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `azure/mod.rs`

#[cfg(test)]
mod tests {
    use crate::azure::models::{PublicIpAddress, PublicIpAddressProperties};
    use crate::azure::{needs_create_or_update, poll_until_done, PollStatus, Poller};
    use crate::azure_errors::ReconcileError;
    use async_trait::async_trait;
    use std::time::Duration;

    fn pip(state: Option<&str>) -> PublicIpAddress {
        PublicIpAddress {
            properties: Some(PublicIpAddressProperties {
                provisioning_state: state.map(str::to_string),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_needs_create_when_missing() {
        assert!(needs_create_or_update::<PublicIpAddress>(None));
    }

    #[test]
    fn test_in_flight_and_succeeded_states_are_left_alone() {
        for state in ["Creating", "Updating", "Deleting", "Succeeded"] {
            assert!(
                !needs_create_or_update(Some(&pip(Some(state)))),
                "{state} should not be recreated"
            );
        }
    }

    #[test]
    fn test_failed_and_stateless_are_recreated() {
        assert!(needs_create_or_update(Some(&pip(Some("Failed")))));
        assert!(needs_create_or_update(Some(&pip(Some("Canceled")))));
        assert!(needs_create_or_update(Some(&pip(None))));
        assert!(needs_create_or_update(Some(&PublicIpAddress::default())));
    }

    struct CountdownPoller {
        remaining: u32,
    }

    #[async_trait]
    impl Poller<u32> for CountdownPoller {
        async fn poll(&mut self) -> Result<PollStatus<u32>, ReconcileError> {
            if self.remaining == 0 {
                return Ok(PollStatus::Done(42));
            }
            self.remaining -= 1;
            Ok(PollStatus::InProgress)
        }

        fn resume_token(&self) -> Result<String, ReconcileError> {
            Ok(self.remaining.to_string())
        }

        fn retry_after(&self) -> Option<Duration> {
            None
        }
    }

    #[tokio::test]
    async fn test_poll_until_done() {
        let mut poller = CountdownPoller { remaining: 3 };
        let result = poll_until_done(&mut poller, Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(result, Ok(42));
        assert_eq!(poller.resume_token().unwrap(), "0");
    }

    #[tokio::test]
    async fn test_poll_until_done_can_be_bounded() {
        let mut poller = CountdownPoller { remaining: u32::MAX };
        let result = tokio::time::timeout(
            Duration::from_millis(20),
            poll_until_done(&mut poller, Duration::from_millis(5)),
        )
        .await;
        assert!(result.is_err());
        assert!(poller.remaining < u32::MAX);
    }

    struct FailingPoller;

    #[async_trait]
    impl Poller<u32> for FailingPoller {
        async fn poll(&mut self) -> Result<PollStatus<u32>, ReconcileError> {
            Ok(PollStatus::Failed(ReconcileError::terminal("QuotaExceeded")))
        }

        fn resume_token(&self) -> Result<String, ReconcileError> {
            Ok(String::new())
        }

        fn retry_after(&self) -> Option<Duration> {
            None
        }
    }

    #[tokio::test]
    async fn test_poll_until_done_reports_failed_operation() {
        let outcome = poll_until_done(&mut FailingPoller, Duration::from_millis(1))
            .await
            .unwrap();
        assert!(outcome.unwrap_err().is_terminal());
    }
}
