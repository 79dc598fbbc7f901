// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Generic Azure Resource Manager REST client.
//!
//! [`ArmClient`] issues authenticated JSON requests against the resource manager
//! endpoint and maps failures onto [`ReconcileError`] at the boundary.
//! [`Client<S>`] implements the [`Getter`], [`Creator`] and [`Deleter`] traits for
//! every spec that knows its ARM address ([`ArmResource`]).
//!
//! # Example
//!
//! ```rust,no_run
//! use capz_core::azure::client::{ArmClient, StaticTokenCredential};
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), capz_core::azure_errors::ReconcileError> {
//! let arm = ArmClient::new(
//!     reqwest::Client::new(),
//!     "https://management.azure.com",
//!     "00000000-0000-0000-0000-000000000000",
//!     Arc::new(StaticTokenCredential::new("token")),
//! )?;
//! # Ok(())
//! # }
//! ```

use super::models::ResourceType;
use super::poller::{DeletePoller, PollerState, PutPoller};
use super::resource_id::resource_id;
use super::{ArmResource, Creator, Deleter, Getter, Poller, ResourceRef};
use crate::azure_errors::ReconcileError;
use crate::config::AzureConfig;
use crate::constants::HEADER_RETRY_AFTER;
use crate::http_errors::{map_arm_error, map_transport_error, parse_retry_after};
use crate::metrics;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Source of bearer tokens for the resource manager.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// # Errors
    ///
    /// Returns a transient error when no token can be obtained.
    async fn token(&self) -> Result<String, ReconcileError>;
}

/// A fixed bearer token, e.g. one injected by a workload identity sidecar.
#[derive(Clone)]
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for StaticTokenCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticTokenCredential")
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn token(&self) -> Result<String, ReconcileError> {
        Ok(self.token.clone())
    }
}

/// A successful ARM response.
#[derive(Debug, Clone)]
pub struct ArmResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl ArmResponse {
    /// The `Retry-After` header, if present and given in seconds.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        retry_after_header(&self.headers)
    }

    /// Decodes the body.
    ///
    /// # Errors
    ///
    /// Returns a terminal error when the body does not decode into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ReconcileError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

pub(crate) fn retry_after_header(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(HEADER_RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after)
}

/// Authenticated client for one subscription.
#[derive(Clone)]
pub struct ArmClient {
    http: reqwest::Client,
    endpoint: Url,
    subscription_id: String,
    credential: Arc<dyn TokenCredential>,
}

impl fmt::Debug for ArmClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArmClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("subscription_id", &self.subscription_id)
            .finish_non_exhaustive()
    }
}

impl ArmClient {
    /// # Errors
    ///
    /// Returns a terminal error when `endpoint` is not a valid URL.
    pub fn new(
        http: reqwest::Client,
        endpoint: &str,
        subscription_id: &str,
        credential: Arc<dyn TokenCredential>,
    ) -> Result<Self, ReconcileError> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            ReconcileError::terminal(format!("invalid resource manager endpoint {endpoint:?}: {e}"))
        })?;
        Ok(Self {
            http,
            endpoint,
            subscription_id: subscription_id.to_string(),
            credential,
        })
    }

    /// Builds a client from the loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be built or the endpoint is
    /// invalid.
    pub fn from_config(
        config: &AzureConfig,
        credential: Arc<dyn TokenCredential>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_request_timeout)
            .build()?;
        Ok(Self::new(
            http,
            &config.resource_manager_endpoint,
            &config.subscription_id,
            credential,
        )?)
    }

    #[must_use]
    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// Absolute URL of `path` with the `api-version` query parameter set.
    ///
    /// # Errors
    ///
    /// Returns a terminal error when `path` does not form a valid URL.
    pub fn url(&self, path: &str, api_version: &str) -> Result<Url, ReconcileError> {
        let mut url = self
            .endpoint
            .join(path)
            .map_err(|e| ReconcileError::terminal(format!("invalid resource path {path:?}: {e}")))?;
        url.query_pairs_mut().append_pair("api-version", api_version);
        Ok(url)
    }

    /// Sends one request. Non-2xx responses are mapped to errors.
    ///
    /// # Errors
    ///
    /// Returns the mapped error for transport failures and non-2xx responses.
    pub async fn send<B: Serialize + Sync>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<ArmResponse, ReconcileError> {
        let token = self.credential.token().await?;

        debug!(method = %method, url = %url, "Azure API request");

        let mut request = self.http.request(method.clone(), url.clone()).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            let err = map_transport_error(&e);
            metrics::record_azure_api_error(method.as_str(), err.error_type());
            err
        })?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(|e| map_transport_error(&e))?;

        if !(200..300).contains(&status) {
            let err = map_arm_error(status, &body, retry_after_header(&headers));
            if !err.is_not_found() {
                warn!(method = %method, url = %url, status = status, error = %err, "Azure API request failed");
            }
            metrics::record_azure_api_error(method.as_str(), err.error_type());
            return Err(err);
        }

        debug!(method = %method, url = %url, status = status, "Azure API response");
        Ok(ArmResponse {
            status,
            headers,
            body,
        })
    }

    /// `GET` a resource and decode it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the resource does not exist, or the mapped error.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        api_version: &str,
    ) -> Result<T, ReconcileError> {
        let url = self.url(path, api_version)?;
        self.send::<()>(Method::GET, url, None).await?.json()
    }
}

/// Reference to an existing resource by name, used for lookups that have no
/// spec of their own (for example the NICs and public IPs of a VM).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceLookup<R> {
    pub name: String,
    pub resource_group: String,
    _resource: PhantomData<fn() -> R>,
}

impl<R> ResourceLookup<R> {
    #[must_use]
    pub fn new(resource_group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource_group: resource_group.into(),
            _resource: PhantomData,
        }
    }
}

impl<R: ResourceType + Send + Sync + 'static> ResourceRef for ResourceLookup<R> {
    type Resource = R;

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn resource_group_name(&self) -> String {
        self.resource_group.clone()
    }
}

impl<R: ResourceType + Send + Sync + 'static> ArmResource for ResourceLookup<R> {
    fn resource_id(&self, subscription_id: &str) -> String {
        resource_id(subscription_id, &self.resource_group, R::PROVIDER_TYPE, &self.name)
    }

    fn api_version(&self) -> &'static str {
        R::API_VERSION
    }
}

/// ARM implementation of the client traits for specs of type `S`.
pub struct Client<S> {
    arm: ArmClient,
    _spec: PhantomData<fn() -> S>,
}

impl<S> Client<S> {
    #[must_use]
    pub fn new(arm: ArmClient) -> Self {
        Self {
            arm,
            _spec: PhantomData,
        }
    }
}

impl<S> Clone for Client<S> {
    fn clone(&self) -> Self {
        Self::new(self.arm.clone())
    }
}

impl<S> fmt::Debug for Client<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client").field("arm", &self.arm).finish()
    }
}

#[async_trait]
impl<S> Getter<S> for Client<S>
where
    S: ArmResource,
    S::Resource: DeserializeOwned,
{
    async fn get(&self, spec: &S) -> Result<S::Resource, ReconcileError> {
        let path = spec.resource_id(self.arm.subscription_id());
        self.arm.get_json(&path, spec.api_version()).await
    }
}

#[async_trait]
impl<S> Creator<S> for Client<S>
where
    S: ArmResource,
    S::Resource: Serialize + DeserializeOwned,
{
    async fn create_or_update_async(
        &self,
        spec: &S,
        parameters: S::Resource,
    ) -> Result<Box<dyn Poller<S::Resource>>, ReconcileError> {
        let path = spec.resource_id(self.arm.subscription_id());
        let url = self.arm.url(&path, spec.api_version())?;
        let response = self
            .arm
            .send(Method::PUT, url.clone(), Some(&parameters))
            .await?;
        let state = PollerState::from_response(Method::PUT, &url, &response.headers);
        Ok(Box::new(PutPoller::new(
            self.arm.clone(),
            state,
            response.retry_after(),
        )))
    }

    fn resume_create_or_update(
        &self,
        _spec: &S,
        resume_token: &str,
    ) -> Result<Box<dyn Poller<S::Resource>>, ReconcileError> {
        let state = PollerState::decode(resume_token)?;
        Ok(Box::new(PutPoller::new(self.arm.clone(), state, None)))
    }
}

#[async_trait]
impl<S> Deleter<S> for Client<S>
where
    S: ArmResource,
{
    async fn delete_async(&self, spec: &S) -> Result<Box<dyn Poller<()>>, ReconcileError> {
        let path = spec.resource_id(self.arm.subscription_id());
        let url = self.arm.url(&path, spec.api_version())?;
        let response = self.arm.send::<()>(Method::DELETE, url.clone(), None).await?;
        let state = PollerState::from_response(Method::DELETE, &url, &response.headers);
        Ok(Box::new(DeletePoller::new(
            self.arm.clone(),
            state,
            response.retry_after(),
        )))
    }

    fn resume_delete(
        &self,
        _spec: &S,
        resume_token: &str,
    ) -> Result<Box<dyn Poller<()>>, ReconcileError> {
        let state = PollerState::decode(resume_token)?;
        Ok(Box::new(DeletePoller::new(self.arm.clone(), state, None)))
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod client_tests;
