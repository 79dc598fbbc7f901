// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Load balancer service.
//!
//! Builds public and internal load balancers: frontends, one backend pool, and
//! for API server balancers the HTTPS health check and rule. Public balancers also get
//! an outbound rule so that pool members can reach the internet.

use crate::azure::models::{
    BackendAddressPool, FrontendIpConfiguration, FrontendIpConfigurationProperties, LoadBalancer,
    LoadBalancerProperties, LoadBalancerSku, LoadBalancingRule, LoadBalancingRuleProperties,
    OutboundRule, OutboundRuleProperties, HealthCheck, HealthCheckProperties, ResourceType, SubResource,
};
use crate::azure::resource_id::{
    address_pool_id, frontend_ip_config_id, health_check_id, public_ip_id, resource_id, subnet_id,
};
use crate::azure::{needs_create_or_update, ArmResource, ResourceRef, ResourceSpecGetter};
use crate::azure_errors::ReconcileError;
use crate::labels::LIFECYCLE_OWNED;
use crate::reconcilers::services::{
    create_or_update_all, delete_all, into_result, record_operation, ServiceReconciler,
    OPERATION_DELETE, OPERATION_RECONCILE,
};
use crate::reconcilers::Reconciler;
use crate::scope::AsyncStatusUpdater;
use crate::status_reasons::CONDITION_LOAD_BALANCERS_READY;
use crate::tags::{build_tags, BuildParams, Tags};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub const SERVICE_NAME: &str = "loadbalancers";

pub const SKU_STANDARD: &str = "Standard";
pub const HTTPS_HEALTH_CHECK_NAME: &str = "HTTPSHealthCheck";
pub const API_SERVER_RULE_NAME: &str = "LBRuleHTTPS";
pub const OUTBOUND_RULE_NAME: &str = "OutboundNATAllProtocols";

const API_SERVER_HEALTH_PATH: &str = "/readyz";
const HEALTH_CHECK_INTERVAL_SECS: i32 = 15;
const HEALTH_CHECK_THRESHOLD: i32 = 4;
const DEFAULT_IDLE_TIMEOUT_MINUTES: i32 = 4;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoadBalancerType {
    #[default]
    Public,
    Internal,
}

/// One frontend. Public balancers reference a public IP by name; internal
/// balancers take a static private address in the spec's subnet.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrontendIpSpec {
    pub name: String,
    pub public_ip_name: Option<String>,
    pub private_ip_address: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LBSpec {
    pub name: String,
    pub resource_group: String,
    pub subscription_id: String,
    pub location: String,
    pub cluster_name: String,
    /// Value of the role tag (`apiserver`, `nodeOutbound`, ...).
    pub role: String,
    pub lb_type: LoadBalancerType,
    pub frontend_ip_configs: Vec<FrontendIpSpec>,
    pub backend_pool_name: String,
    pub vnet_name: String,
    pub vnet_resource_group: String,
    pub subnet_name: String,
    /// Set for API server balancers; adds the HTTPS health check and rule.
    pub api_server_port: Option<i32>,
    pub idle_timeout_in_minutes: Option<i32>,
    pub additional_tags: Tags,
}

impl LBSpec {
    fn frontend(&self, frontend: &FrontendIpSpec) -> FrontendIpConfiguration {
        let properties = match self.lb_type {
            LoadBalancerType::Public => FrontendIpConfigurationProperties {
                public_ip_address: frontend.public_ip_name.as_deref().map(|pip| {
                    SubResource::new(public_ip_id(&self.subscription_id, &self.resource_group, pip))
                }),
                ..Default::default()
            },
            LoadBalancerType::Internal => FrontendIpConfigurationProperties {
                private_ip_address: frontend.private_ip_address.clone(),
                private_ip_allocation_method: Some("Static".to_string()),
                subnet: Some(SubResource::new(subnet_id(
                    &self.subscription_id,
                    &self.vnet_resource_group,
                    &self.vnet_name,
                    &self.subnet_name,
                ))),
                ..Default::default()
            },
        };
        FrontendIpConfiguration {
            name: Some(frontend.name.clone()),
            zones: None,
            properties: Some(properties),
        }
    }

    fn frontend_ids(&self) -> Vec<SubResource> {
        self.frontend_ip_configs
            .iter()
            .map(|f| {
                SubResource::new(frontend_ip_config_id(
                    &self.subscription_id,
                    &self.resource_group,
                    &self.name,
                    &f.name,
                ))
            })
            .collect()
    }

    fn backend_pool_ref(&self) -> SubResource {
        SubResource::new(address_pool_id(
            &self.subscription_id,
            &self.resource_group,
            &self.name,
            &self.backend_pool_name,
        ))
    }

    fn idle_timeout(&self) -> i32 {
        self.idle_timeout_in_minutes
            .unwrap_or(DEFAULT_IDLE_TIMEOUT_MINUTES)
    }

    /// Health check and rule for the API server port, if this balancer fronts it.
    fn api_server_rules(&self) -> (Vec<HealthCheck>, Vec<LoadBalancingRule>) {
        let (Some(port), Some(frontend)) =
            (self.api_server_port, self.frontend_ids().into_iter().next())
        else {
            return (Vec::new(), Vec::new());
        };

        let health_check = HealthCheck {
            name: Some(HTTPS_HEALTH_CHECK_NAME.to_string()),
            properties: Some(HealthCheckProperties {
                protocol: Some("Https".to_string()),
                port: Some(port),
                request_path: Some(API_SERVER_HEALTH_PATH.to_string()),
                interval_in_seconds: Some(HEALTH_CHECK_INTERVAL_SECS),
                unhealthy_threshold: Some(HEALTH_CHECK_THRESHOLD),
            }),
        };
        let rule = LoadBalancingRule {
            name: Some(API_SERVER_RULE_NAME.to_string()),
            properties: Some(LoadBalancingRuleProperties {
                protocol: Some("Tcp".to_string()),
                frontend_port: Some(port),
                backend_port: Some(port),
                idle_timeout_in_minutes: Some(self.idle_timeout()),
                enable_floating_ip: Some(false),
                load_distribution: Some("Default".to_string()),
                // Public balancers carry an explicit outbound rule instead.
                disable_outbound_snat: Some(self.lb_type == LoadBalancerType::Public),
                frontend_ip_configuration: Some(frontend),
                backend_address_pool: Some(self.backend_pool_ref()),
                health_check: Some(SubResource::new(health_check_id(
                    &self.subscription_id,
                    &self.resource_group,
                    &self.name,
                    HTTPS_HEALTH_CHECK_NAME,
                ))),
            }),
        };
        (vec![health_check], vec![rule])
    }

    fn outbound_rules(&self) -> Vec<OutboundRule> {
        if self.lb_type != LoadBalancerType::Public {
            return Vec::new();
        }
        vec![OutboundRule {
            name: Some(OUTBOUND_RULE_NAME.to_string()),
            properties: Some(OutboundRuleProperties {
                protocol: Some("All".to_string()),
                frontend_ip_configurations: Some(self.frontend_ids()),
                backend_address_pool: Some(self.backend_pool_ref()),
                idle_timeout_in_minutes: Some(self.idle_timeout()),
            }),
        }]
    }
}

impl ResourceRef for LBSpec {
    type Resource = LoadBalancer;

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn resource_group_name(&self) -> String {
        self.resource_group.clone()
    }
}

impl ArmResource for LBSpec {
    fn resource_id(&self, subscription_id: &str) -> String {
        resource_id(
            subscription_id,
            &self.resource_group,
            LoadBalancer::PROVIDER_TYPE,
            &self.name,
        )
    }

    fn api_version(&self) -> &'static str {
        LoadBalancer::API_VERSION
    }
}

impl ResourceSpecGetter for LBSpec {
    fn parameters(
        &self,
        existing: Option<&LoadBalancer>,
    ) -> Result<Option<LoadBalancer>, ReconcileError> {
        if !needs_create_or_update(existing) {
            return Ok(None);
        }
        if self.frontend_ip_configs.is_empty() {
            return Err(ReconcileError::terminal(format!(
                "load balancer {} has no frontend IP configurations",
                self.name
            )));
        }

        let (health_checks, rules) = self.api_server_rules();
        let outbound = self.outbound_rules();
        Ok(Some(LoadBalancer {
            location: Some(self.location.clone()),
            tags: Some(build_tags(&BuildParams {
                cluster_name: &self.cluster_name,
                lifecycle: LIFECYCLE_OWNED,
                name: &self.name,
                role: &self.role,
                additional: &self.additional_tags,
            })),
            sku: Some(LoadBalancerSku {
                name: Some(SKU_STANDARD.to_string()),
            }),
            properties: Some(LoadBalancerProperties {
                frontend_ip_configurations: Some(
                    self.frontend_ip_configs
                        .iter()
                        .map(|f| self.frontend(f))
                        .collect(),
                ),
                backend_address_pools: Some(vec![BackendAddressPool {
                    name: Some(self.backend_pool_name.clone()),
                }]),
                load_balancing_rules: (!rules.is_empty()).then_some(rules),
                health_checks: (!health_checks.is_empty()).then_some(health_checks),
                outbound_rules: (!outbound.is_empty()).then_some(outbound),
                provisioning_state: None,
            }),
            ..Default::default()
        }))
    }
}

pub trait LBScope: AsyncStatusUpdater {
    fn lb_specs(&self) -> Vec<LBSpec>;
}

pub struct LBService<Sc, R> {
    scope: Arc<Sc>,
    reconciler: R,
}

impl<Sc, R> LBService<Sc, R> {
    #[must_use]
    pub fn new(scope: Arc<Sc>, reconciler: R) -> Self {
        Self { scope, reconciler }
    }
}

#[async_trait]
impl<Sc, R> ServiceReconciler for LBService<Sc, R>
where
    Sc: LBScope,
    R: Reconciler<LBSpec>,
{
    fn name(&self) -> &'static str {
        SERVICE_NAME
    }

    async fn reconcile(&self) -> Result<(), ReconcileError> {
        let specs = self.scope.lb_specs();
        if specs.is_empty() {
            debug!(service = %SERVICE_NAME, "No load balancers to reconcile");
            return Ok(());
        }
        let started = Instant::now();

        let (_, err) = create_or_update_all(&self.reconciler, &specs, SERVICE_NAME).await;
        let result = into_result(err);

        self.scope.update_put_status(
            CONDITION_LOAD_BALANCERS_READY,
            SERVICE_NAME,
            result.as_ref().err(),
        );
        record_operation(SERVICE_NAME, OPERATION_RECONCILE, started, &result);
        result
    }

    async fn delete(&self) -> Result<(), ReconcileError> {
        let specs = self.scope.lb_specs();
        if specs.is_empty() {
            return Ok(());
        }
        let started = Instant::now();

        let result = into_result(delete_all(&self.reconciler, None, &specs, SERVICE_NAME).await);

        self.scope.update_delete_status(
            CONDITION_LOAD_BALANCERS_READY,
            SERVICE_NAME,
            result.as_ref().err(),
        );
        record_operation(SERVICE_NAME, OPERATION_DELETE, started, &result);
        result
    }
}

#[cfg(test)]
#[path = "loadbalancers_tests.rs"]
mod loadbalancers_tests;
