// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Runtime configuration loaded from the environment.
//!
//! | Variable | Default |
//! |---|---|
//! | `AZURE_SUBSCRIPTION_ID` | required |
//! | `AZURE_RESOURCE_MANAGER_ENDPOINT` | `https://management.azure.com` |
//! | `AZURE_HTTP_REQUEST_TIMEOUT_SECS` | 30 |
//! | `AZURE_SERVICE_RECONCILE_TIMEOUT_SECS` | 15 |
//! | `AZURE_RECONCILER_REQUEUE_SECS` | 15 |
//! | `AZURE_LRO_POLL_FREQUENCY_MILLIS` | 1000 |

use crate::constants::{
    DEFAULT_AZURE_SERVICE_RECONCILE_TIMEOUT_SECS, DEFAULT_HTTP_REQUEST_TIMEOUT_SECS,
    DEFAULT_LRO_POLL_FREQUENCY_MILLIS, DEFAULT_RECONCILER_REQUEUE_SECS,
    DEFAULT_RESOURCE_MANAGER_ENDPOINT,
};
use crate::scope::TimeoutsGetter;
use anyhow::{bail, Context as _, Result};
use std::time::Duration;

pub const ENV_SUBSCRIPTION_ID: &str = "AZURE_SUBSCRIPTION_ID";
pub const ENV_RESOURCE_MANAGER_ENDPOINT: &str = "AZURE_RESOURCE_MANAGER_ENDPOINT";
pub const ENV_HTTP_REQUEST_TIMEOUT_SECS: &str = "AZURE_HTTP_REQUEST_TIMEOUT_SECS";
pub const ENV_SERVICE_RECONCILE_TIMEOUT_SECS: &str = "AZURE_SERVICE_RECONCILE_TIMEOUT_SECS";
pub const ENV_RECONCILER_REQUEUE_SECS: &str = "AZURE_RECONCILER_REQUEUE_SECS";
pub const ENV_LRO_POLL_FREQUENCY_MILLIS: &str = "AZURE_LRO_POLL_FREQUENCY_MILLIS";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AzureConfig {
    pub subscription_id: String,
    pub resource_manager_endpoint: String,
    /// Timeout of a single HTTP request to Azure.
    pub http_request_timeout: Duration,
    /// Upper bound on the Azure work done for one spec within one reconcile.
    pub service_reconcile_timeout: Duration,
    /// Requeue delay used when Azure gives no hint.
    pub requeue: Duration,
    /// Interval between polls of a long-running operation.
    pub lro_poll_frequency: Duration,
}

impl AzureConfig {
    /// Loads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error when the subscription is missing or a number does not
    /// parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration through `lookup`, which returns the value of a
    /// variable if it is set.
    ///
    /// # Errors
    ///
    /// See [`AzureConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let subscription_id = lookup(ENV_SUBSCRIPTION_ID)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        if subscription_id.is_empty() {
            bail!("{ENV_SUBSCRIPTION_ID} must be set");
        }

        let resource_manager_endpoint = lookup(ENV_RESOURCE_MANAGER_ENDPOINT)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_RESOURCE_MANAGER_ENDPOINT.to_string());

        let number = |key: &str, default: u64| -> Result<u64> {
            match lookup(key) {
                None => Ok(default),
                Some(raw) if raw.trim().is_empty() => Ok(default),
                Some(raw) => raw
                    .trim()
                    .parse()
                    .with_context(|| format!("{key} must be a non-negative integer, got {raw:?}")),
            }
        };

        Ok(Self {
            subscription_id,
            resource_manager_endpoint,
            http_request_timeout: Duration::from_secs(number(
                ENV_HTTP_REQUEST_TIMEOUT_SECS,
                DEFAULT_HTTP_REQUEST_TIMEOUT_SECS,
            )?),
            service_reconcile_timeout: Duration::from_secs(number(
                ENV_SERVICE_RECONCILE_TIMEOUT_SECS,
                DEFAULT_AZURE_SERVICE_RECONCILE_TIMEOUT_SECS,
            )?),
            requeue: Duration::from_secs(number(
                ENV_RECONCILER_REQUEUE_SECS,
                DEFAULT_RECONCILER_REQUEUE_SECS,
            )?),
            lro_poll_frequency: Duration::from_millis(number(
                ENV_LRO_POLL_FREQUENCY_MILLIS,
                DEFAULT_LRO_POLL_FREQUENCY_MILLIS,
            )?),
        })
    }
}

/// Scopes delegate to the loaded configuration for their timing knobs.
impl TimeoutsGetter for AzureConfig {
    fn defaulted_azure_service_reconcile_timeout(&self) -> Duration {
        self.service_reconcile_timeout
    }

    fn defaulted_reconciler_requeue(&self) -> Duration {
        self.requeue
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
