// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `client.rs` and `poller.rs` against a mock resource manager.

#[cfg(test)]
mod tests {
    use crate::azure::client::{ArmClient, Client, ResourceLookup, StaticTokenCredential};
    use crate::azure::models::PublicIpAddress;
    use crate::azure::poller::PollerState;
    use crate::azure::{poll_until_done, Creator, Deleter, Getter, PollStatus};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PIP_PATH: &str =
        "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Network/publicIPAddresses/pip-1";

    type PipClient = Client<ResourceLookup<PublicIpAddress>>;

    fn client(server: &MockServer) -> PipClient {
        let arm = ArmClient::new(
            reqwest::Client::new(),
            &server.uri(),
            "sub",
            Arc::new(StaticTokenCredential::new("secret")),
        )
        .unwrap();
        Client::new(arm)
    }

    fn spec() -> ResourceLookup<PublicIpAddress> {
        ResourceLookup::new("rg", "pip-1")
    }

    fn pip_body(state: &str) -> serde_json::Value {
        json!({
            "id": PIP_PATH,
            "name": "pip-1",
            "location": "westus",
            "properties": {"ipAddress": "10.0.0.6", "provisioningState": state}
        })
    }

    #[tokio::test]
    async fn test_get_decodes_resource_and_sends_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PIP_PATH))
            .and(query_param("api-version", "2023-05-01"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(pip_body("Succeeded")))
            .mount(&server)
            .await;

        let pip = client(&server).get(&spec()).await.unwrap();
        assert_eq!(
            pip.properties.unwrap().ip_address.as_deref(),
            Some("10.0.0.6")
        );
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PIP_PATH))
            .respond_with(ResponseTemplate::new(404).set_body_json(
                json!({"error": {"code": "ResourceNotFound", "message": "not found"}}),
            ))
            .mount(&server)
            .await;

        let err = client(&server).get(&spec()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_get_throttled_honours_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PIP_PATH))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
            .mount(&server)
            .await;

        let err = client(&server).get(&spec()).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.requeue_after(), Some(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_get_undecodable_body_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PIP_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("[1, 2, 3]"))
            .mount(&server)
            .await;

        let err = client(&server).get(&spec()).await.unwrap_err();
        assert!(err.is_terminal());
    }

    #[tokio::test]
    async fn test_put_with_async_operation_polls_to_completion() {
        let server = MockServer::start().await;
        let operation_url = format!("{}/operations/op-1", server.uri());

        Mock::given(method("PUT"))
            .and(path(PIP_PATH))
            .and(body_partial_json(json!({"location": "westus"})))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("Azure-AsyncOperation", operation_url.as_str())
                    .set_body_json(pip_body("Updating")),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operations/op-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Retry-After", "5")
                    .set_body_json(json!({"status": "InProgress"})),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operations/op-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "Succeeded"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(PIP_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(pip_body("Succeeded")))
            .mount(&server)
            .await;

        let parameters = PublicIpAddress {
            location: Some("westus".to_string()),
            ..Default::default()
        };
        let mut poller = client(&server)
            .create_or_update_async(&spec(), parameters)
            .await
            .unwrap();

        assert!(matches!(poller.poll().await.unwrap(), PollStatus::InProgress));
        assert_eq!(poller.retry_after(), Some(Duration::from_secs(5)));

        let PollStatus::Done(pip) = poller.poll().await.unwrap() else {
            panic!("operation should be done");
        };
        assert_eq!(pip.name.as_deref(), Some("pip-1"));
    }

    #[tokio::test]
    async fn test_resume_token_rebuilds_poller() {
        let server = MockServer::start().await;
        let operation_url = format!("{}/operations/op-2", server.uri());

        Mock::given(method("PUT"))
            .and(path(PIP_PATH))
            .respond_with(
                ResponseTemplate::new(201).insert_header("Azure-AsyncOperation", operation_url.as_str()),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operations/op-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "Succeeded"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(PIP_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(pip_body("Succeeded")))
            .mount(&server)
            .await;

        let pip_client = client(&server);
        let poller = pip_client
            .create_or_update_async(&spec(), PublicIpAddress::default())
            .await
            .unwrap();
        let token = poller.resume_token().unwrap();

        let state = PollerState::decode(&token).unwrap();
        assert_eq!(state.method, "PUT");
        assert_eq!(state.async_operation_url.as_deref(), Some(operation_url.as_str()));

        let mut resumed = pip_client.resume_create_or_update(&spec(), &token).unwrap();
        let pip = poll_until_done(resumed.as_mut(), Duration::from_millis(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pip.name.as_deref(), Some("pip-1"));
    }

    #[tokio::test]
    async fn test_failed_operation_is_an_error() {
        let server = MockServer::start().await;
        let operation_url = format!("{}/operations/op-3", server.uri());

        Mock::given(method("PUT"))
            .and(path(PIP_PATH))
            .respond_with(
                ResponseTemplate::new(201).insert_header("Azure-AsyncOperation", operation_url.as_str()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operations/op-3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "Failed",
                "error": {"code": "QuotaExceeded", "message": "no quota"}
            })))
            .mount(&server)
            .await;

        let mut poller = client(&server)
            .create_or_update_async(&spec(), PublicIpAddress::default())
            .await
            .unwrap();
        let PollStatus::Failed(err) = poller.poll().await.unwrap() else {
            panic!("expected a failed operation");
        };
        assert!(err.is_transient());
        assert!(err.to_string().contains("QuotaExceeded"));
    }

    #[tokio::test]
    async fn test_synchronous_put_uses_provisioning_state() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(PIP_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(pip_body("Updating")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(PIP_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(pip_body("Updating")))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(PIP_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(pip_body("Succeeded")))
            .mount(&server)
            .await;

        let mut poller = client(&server)
            .create_or_update_async(&spec(), PublicIpAddress::default())
            .await
            .unwrap();
        assert!(matches!(poller.poll().await.unwrap(), PollStatus::InProgress));
        assert!(matches!(poller.poll().await.unwrap(), PollStatus::Done(_)));
    }

    #[tokio::test]
    async fn test_delete_with_location_header() {
        let server = MockServer::start().await;
        let location = format!("{}/operationResults/del-1", server.uri());

        Mock::given(method("DELETE"))
            .and(path(PIP_PATH))
            .respond_with(ResponseTemplate::new(202).insert_header("Location", location.as_str()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operationResults/del-1"))
            .respond_with(ResponseTemplate::new(202))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operationResults/del-1"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut poller = client(&server).delete_async(&spec()).await.unwrap();
        assert!(matches!(poller.poll().await.unwrap(), PollStatus::InProgress));
        assert!(matches!(poller.poll().await.unwrap(), PollStatus::Done(())));
    }

    #[tokio::test]
    async fn test_delete_of_missing_resource() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(PIP_PATH))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let mut poller = client(&server).delete_async(&spec()).await.unwrap();
        assert!(matches!(poller.poll().await.unwrap(), PollStatus::Done(())));
    }

    #[test]
    fn test_invalid_resume_token_is_transient() {
        let err = PollerState::decode("not json").unwrap_err();
        assert!(err.is_transient());
    }
}
