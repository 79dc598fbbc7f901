// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `identities.rs`

#[cfg(test)]
mod tests {
    use crate::azure::client::{ArmClient, StaticTokenCredential};
    use crate::azure::identities::{ArmIdentityClient, CachedIdentityClient, IdentityClient};
    use crate::azure_errors::ReconcileError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const IDENTITY_ID: &str = "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.ManagedIdentity/userAssignedIdentities/id-1";

    struct CountingClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl IdentityClient for CountingClient {
        async fn get_client_id(&self, provider_id: &str) -> Result<String, ReconcileError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("client-of-{provider_id}"))
        }
    }

    #[tokio::test]
    async fn test_cache_memoises_lookups() {
        let cached = CachedIdentityClient::new(CountingClient {
            calls: AtomicUsize::new(0),
        });
        assert!(cached.is_empty());

        let first = cached.get_client_id("azure:///a").await.unwrap();
        let second = cached.get_client_id("azure:///a").await.unwrap();
        cached.get_client_id("azure:///b").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(cached.len(), 2);
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_arm_client_resolves_provider_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(IDENTITY_ID))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": IDENTITY_ID,
                "properties": {"clientId": "1234", "principalId": "5678"}
            })))
            .mount(&server)
            .await;

        let client = ArmIdentityClient::new(
            ArmClient::new(
                reqwest::Client::new(),
                &server.uri(),
                "sub",
                Arc::new(StaticTokenCredential::new("t")),
            )
            .unwrap(),
        );
        let client_id = client
            .get_client_id(&format!("azure://{IDENTITY_ID}"))
            .await
            .unwrap();
        assert_eq!(client_id, "1234");
    }

    #[tokio::test]
    async fn test_arm_client_rejects_malformed_provider_id() {
        let client = ArmIdentityClient::new(
            ArmClient::new(
                reqwest::Client::new(),
                "http://127.0.0.1:1",
                "sub",
                Arc::new(StaticTokenCredential::new("t")),
            )
            .unwrap(),
        );
        let err = client.get_client_id("not-a-provider-id").await.unwrap_err();
        assert!(err.is_terminal());
    }
}
