// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! ARM resource ID construction and parsing, and provider-ID conversion.

use crate::azure_errors::ReconcileError;
use crate::constants::PROVIDER_ID_PREFIX;

/// `/subscriptions/{sub}/resourceGroups/{rg}`
#[must_use]
pub fn resource_group_id(subscription_id: &str, resource_group: &str) -> String {
    format!("/subscriptions/{subscription_id}/resourceGroups/{resource_group}")
}

/// `/subscriptions/{sub}/resourceGroups/{rg}/providers/{provider_type}/{name}`
#[must_use]
pub fn resource_id(
    subscription_id: &str,
    resource_group: &str,
    provider_type: &str,
    name: &str,
) -> String {
    format!(
        "{}/providers/{provider_type}/{name}",
        resource_group_id(subscription_id, resource_group)
    )
}

/// ID of a child resource, e.g. a subnet of a virtual network.
#[must_use]
pub fn child_resource_id(
    subscription_id: &str,
    resource_group: &str,
    provider_type: &str,
    parent: &str,
    child_type: &str,
    child: &str,
) -> String {
    format!(
        "{}/{child_type}/{child}",
        resource_id(subscription_id, resource_group, provider_type, parent)
    )
}

#[must_use]
pub fn subnet_id(subscription_id: &str, resource_group: &str, vnet: &str, subnet: &str) -> String {
    child_resource_id(
        subscription_id,
        resource_group,
        "Microsoft.Network/virtualNetworks",
        vnet,
        "subnets",
        subnet,
    )
}

#[must_use]
pub fn address_pool_id(
    subscription_id: &str,
    resource_group: &str,
    load_balancer: &str,
    pool: &str,
) -> String {
    child_resource_id(
        subscription_id,
        resource_group,
        "Microsoft.Network/loadBalancers",
        load_balancer,
        "backendAddressPools",
        pool,
    )
}

#[must_use]
pub fn frontend_ip_config_id(
    subscription_id: &str,
    resource_group: &str,
    load_balancer: &str,
    frontend: &str,
) -> String {
    child_resource_id(
        subscription_id,
        resource_group,
        "Microsoft.Network/loadBalancers",
        load_balancer,
        "frontendIPConfigurations",
        frontend,
    )
}

#[must_use]
pub fn health_check_id(subscription_id: &str, resource_group: &str, load_balancer: &str, health_check: &str) -> String {
    child_resource_id(
        subscription_id,
        resource_group,
        "Microsoft.Network/loadBalancers",
        load_balancer,
        "probes",
        health_check,
    )
}

#[must_use]
pub fn nat_rule_id(subscription_id: &str, resource_group: &str, load_balancer: &str, rule: &str) -> String {
    child_resource_id(
        subscription_id,
        resource_group,
        "Microsoft.Network/loadBalancers",
        load_balancer,
        "inboundNatRules",
        rule,
    )
}

#[must_use]
pub fn public_ip_id(subscription_id: &str, resource_group: &str, name: &str) -> String {
    resource_id(subscription_id, resource_group, "Microsoft.Network/publicIPAddresses", name)
}

#[must_use]
pub fn network_interface_id(subscription_id: &str, resource_group: &str, name: &str) -> String {
    resource_id(subscription_id, resource_group, "Microsoft.Network/networkInterfaces", name)
}

/// The components of an ARM resource ID.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedResourceId {
    pub subscription_id: String,
    pub resource_group: String,
    /// `<namespace>/<type>[/<child type>]`, empty for a resource group ID.
    pub provider_type: String,
    /// The last name segment.
    pub name: String,
}

/// Parses an ARM resource ID.
///
/// Segment keywords are matched case-insensitively since Azure is inconsistent
/// about `resourceGroups` vs `resourcegroups`.
///
/// # Errors
///
/// Returns a terminal error when the ID is not a resource-group scoped ID.
pub fn parse_resource_id(id: &str) -> Result<ParsedResourceId, ReconcileError> {
    let invalid = || ReconcileError::terminal(format!("invalid Azure resource ID {id:?}"));
    let segments: Vec<&str> = id.trim_matches('/').split('/').collect();

    if segments.len() < 4
        || !segments[0].eq_ignore_ascii_case("subscriptions")
        || !segments[2].eq_ignore_ascii_case("resourceGroups")
        || segments.iter().any(|s| s.is_empty())
    {
        return Err(invalid());
    }

    let subscription_id = segments[1].to_string();
    let resource_group = segments[3].to_string();

    if segments.len() == 4 {
        return Ok(ParsedResourceId {
            subscription_id,
            resource_group: resource_group.clone(),
            provider_type: String::new(),
            name: resource_group,
        });
    }

    // providers/<namespace>/<type>/<name>[/<child type>/<child name>]...
    if segments.len() < 8
        || !segments[4].eq_ignore_ascii_case("providers")
        || segments.len() % 2 != 0
    {
        return Err(invalid());
    }

    let mut types = vec![segments[5], segments[6]];
    types.extend(segments[8..].iter().step_by(2));

    Ok(ParsedResourceId {
        subscription_id,
        resource_group,
        provider_type: types.join("/"),
        name: segments[segments.len() - 1].to_string(),
    })
}

/// `azure://<resource id>`, keeping the leading slash of the ID.
#[must_use]
pub fn provider_id_from_resource_id(resource_id: &str) -> String {
    format!("{PROVIDER_ID_PREFIX}{resource_id}")
}

/// The ARM resource ID inside a provider ID, or `None` if it is not an Azure
/// provider ID.
#[must_use]
pub fn resource_id_from_provider_id(provider_id: &str) -> Option<&str> {
    provider_id
        .strip_prefix(PROVIDER_ID_PREFIX)
        .filter(|id| id.starts_with('/'))
}

#[cfg(test)]
#[path = "resource_id_tests.rs"]
mod resource_id_tests;
