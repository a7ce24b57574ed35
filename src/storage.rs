// Copyright (c) 2025 azenv contributors
// SPDX-License-Identifier: MIT

//! Storage account component.
//!
//! Registers the storage account and, when private networking is enabled,
//! one private endpoint per (zone, group-id) pair. AzureML storage needs
//! endpoints for the `blob`, `file` and `dfs` sub-resources, each with its
//! own private DNS zone, so the pairs arrive as a list and each produces a
//! [`PrivateEndpoint`] with exactly one zone.

use crate::constants::{DEFAULT_STORAGE_SKU, STORAGE_API_VERSION};
use crate::private_endpoint::{PrivateEndpoint, PrivateEndpointArgs};
use crate::stack::{output, NodeHandle, NodeKind, ResourceNode, ResourceOptions, Stack};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// A private DNS zone paired with the connection group id it serves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZoneGroupPair {
    /// Private DNS zone name
    pub dns_zone: String,
    /// Connection group id (`blob`, `file`, `dfs`)
    pub group_id: String,
}

/// Arguments for the storage account component.
#[derive(Clone, Debug)]
pub struct StorageArgs {
    /// Resource group the account is created in.
    pub resource_group_name: String,

    /// When true, public network access is disabled and the network ACL
    /// default action is Deny; endpoints are created per pair.
    pub enable_private_endpoints_access_only: bool,

    /// Subnet id for the endpoints (required when private access is on).
    pub subnet_id: Option<Value>,

    /// Resource group hosting the private DNS zones.
    pub dns_resource_group_name: String,

    /// (zone, group-id) pairs needing private endpoints.
    pub private_dns_zones_and_group_ids: Vec<ZoneGroupPair>,

    /// Account SKU name.
    pub sku: String,

    /// Whether hierarchical namespace (Data Lake gen2) is enabled.
    pub is_hns_enabled: bool,

    /// Descriptive tags.
    pub tags: BTreeMap<String, String>,

    /// Azure region.
    pub location: String,
}

impl StorageArgs {
    /// Args for a public account with no endpoints.
    #[must_use]
    pub fn public(resource_group_name: &str, location: &str) -> Self {
        StorageArgs {
            resource_group_name: resource_group_name.to_string(),
            enable_private_endpoints_access_only: false,
            subnet_id: None,
            dns_resource_group_name: String::new(),
            private_dns_zones_and_group_ids: Vec::new(),
            sku: DEFAULT_STORAGE_SKU.to_string(),
            is_hns_enabled: false,
            tags: BTreeMap::new(),
            location: location.to_string(),
        }
    }
}

/// Handles for a registered storage account and its endpoints.
#[derive(Clone, Debug)]
pub struct Storage {
    /// The storage account node.
    pub account: NodeHandle,

    /// The account name (also the relative record-set name downstream).
    pub account_name: String,

    /// One endpoint per configured (zone, group-id) pair.
    pub endpoints: Vec<(ZoneGroupPair, PrivateEndpoint)>,
}

impl Storage {
    /// Register the account and its private endpoints.
    pub fn register(stack: &mut Stack, name: &str, args: &StorageArgs) -> Storage {
        let private = args.enable_private_endpoints_access_only;
        let body = json!({
            "kind": "StorageV2",
            "sku": { "name": args.sku },
            "tags": args.tags,
            "properties": {
                "publicNetworkAccess": if private { "Disabled" } else { "Enabled" },
                "networkAcls": {
                    "defaultAction": if private { "Deny" } else { "Allow" },
                    "bypass": "AzureServices",
                },
                "isHnsEnabled": args.is_hns_enabled,
                "minimumTlsVersion": "TLS1_2",
                "supportsHttpsTrafficOnly": true,
            },
        });

        let account = stack.register(ResourceNode {
            name: name.to_string(),
            kind: NodeKind::Resource {
                arm_type: "Microsoft.Storage/storageAccounts".to_string(),
                api_version: STORAGE_API_VERSION.to_string(),
                arm_path: format!("Microsoft.Storage/storageAccounts/{name}"),
                resource_group: args.resource_group_name.clone(),
                location: Some(args.location.clone()),
                body,
            },
            depends_on: Vec::new(),
            options: ResourceOptions::default(),
        });

        let mut endpoints = Vec::new();
        if private {
            // One endpoint per sub-resource, each bound to a single zone.
            for pair in &args.private_dns_zones_and_group_ids {
                let endpoint_name = format!("{name}-{}-pe", pair.group_id);
                let endpoint = PrivateEndpoint::register(
                    stack,
                    &endpoint_name,
                    &PrivateEndpointArgs {
                        resource_group_name: args.resource_group_name.clone(),
                        private_link_service_id: output(account, "id"),
                        subnet_id: args.subnet_id.clone().unwrap_or(Value::Null),
                        dns_resource_group_name: args.dns_resource_group_name.clone(),
                        group_id: pair.group_id.clone(),
                        private_dns_zones: vec![pair.dns_zone.clone()],
                        location: args.location.clone(),
                    },
                );
                endpoints.push((pair.clone(), endpoint));
            }
        }

        Storage {
            account,
            account_name: name.to_string(),
            endpoints,
        }
    }

    /// Output expression for the account's resource id.
    #[must_use]
    pub fn resource_id(&self) -> Value {
        output(self.account, "id")
    }

    /// Output expression for the private IP registered in `zone`.
    ///
    /// Returns `None` when no endpoint covers that zone (private networking
    /// disabled, or the zone is not configured).
    #[must_use]
    pub fn private_ip(&self, zone: &str) -> Option<Value> {
        self.endpoints
            .iter()
            .find(|(pair, _)| pair.dns_zone == zone)
            .and_then(|(_, endpoint)| endpoint.private_ip(zone))
    }
}
