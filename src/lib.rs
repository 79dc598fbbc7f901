// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # capz-core - Azure resource reconciliation for Cluster API
//!
//! `capz-core` brings the Azure resources behind a Kubernetes cluster (resource
//! groups, virtual networks, network interfaces, public IPs, disks, virtual
//! machines, scale sets, load balancers, role assignments and tags) into the
//! state declared by Cluster API custom resources, and keeps them there.
//!
//! ## Overview
//!
//! The crate is the engine underneath a controller, not the controller itself:
//!
//! - Specs describe one desired Azure resource each
//! - Reconcilers create, update and delete them, either by calling Azure
//!   directly or through Azure Service Operator objects
//! - Long-running Azure operations never block a reconcile; their state is
//!   persisted on the owning object and resumed on the next tick
//! - Service wrappers publish the outcome as status conditions
//!
//! ## Modules
//!
//! - [`azure`] - ARM client, wire models, pollers, SKU and identity caches
//! - [`azure_errors`] - The error taxonomy shared by every layer
//! - [`reconcilers`] - Direct and operator-backed reconcilers, service wrappers
//! - [`scope`] - Traits through which reconcilers read and write the owning object
//! - [`tags`] - Tag building and three-way tag diffs
//! - [`crd`] - Status types and the operator-backed `ResourceGroup` resource
//! - [`config`] / [`logging`] / [`metrics`] - Ambient runtime support
//!
//! ## Example
//!
//! ```rust,ignore
//! use capz_core::config::AzureConfig;
//! use capz_core::context::AzureContext;
//! use capz_core::reconcilers::services::virtualnetworks::{VNetService, VNetSpec};
//! use capz_core::reconcilers::services::ServiceReconciler;
//!
//! let context = AzureContext::new(AzureConfig::from_env()?, credential)?;
//! let service = VNetService::new(
//!     scope.clone(),
//!     context.reconciler::<_, VNetSpec>(scope.clone()),
//!     context.managed_checker::<VNetSpec>("my-cluster"),
//! );
//! service.reconcile().await?;
//! ```

pub mod azure;
pub mod azure_errors;
pub mod config;
pub mod constants;
pub mod context;
pub mod crd;
pub mod future;
pub mod http_errors;
pub mod labels;
pub mod logging;
pub mod metrics;
pub mod reconcilers;
pub mod scope;
pub mod status_reasons;
pub mod tags;

#[cfg(test)]
pub(crate) mod test_utils;
