// Copyright (c) 2025 azenv contributors
// SPDX-License-Identifier: MIT

//! Private-endpoint component.
//!
//! Registers, for one target resource and connection group, a private
//! endpoint with a single link-service connection, one private-DNS-zone
//! lookup per required zone, and the DNS zone group binding the endpoint to
//! the resolved zone ids. The zone group's applied state carries the
//! resolved record sets (zone name → fqdn → private IP addresses), exposed
//! here as output expressions for downstream consumers.
//!
//! The endpoint carries recreate-on-change semantics: the provider cannot
//! update these fields in place, so any change forces delete-then-recreate,
//! while drift on descriptive tags is ignored.

use crate::constants::NETWORK_API_VERSION;
use crate::stack::{
    output, LookupQuery, NodeHandle, NodeKind, ResourceNode, ResourceOptions, Stack,
};
use serde_json::{json, Value};

/// Arguments for one private endpoint.
#[derive(Clone, Debug)]
pub struct PrivateEndpointArgs {
    /// Resource group the endpoint and zone group are created in.
    pub resource_group_name: String,

    /// Resource id of the target (an output expression or literal string).
    pub private_link_service_id: Value,

    /// Subnet id the endpoint NIC is placed in (expression or literal).
    pub subnet_id: Value,

    /// Resource group hosting the private DNS zones.
    pub dns_resource_group_name: String,

    /// Connection group id, e.g. `blob`, `vault`, `amlworkspace`.
    pub group_id: String,

    /// Private DNS zones the endpoint registers into.
    pub private_dns_zones: Vec<String>,

    /// Azure region of the endpoint.
    pub location: String,
}

/// Handles for a registered private endpoint.
#[derive(Clone, Debug)]
pub struct PrivateEndpoint {
    /// The endpoint node.
    pub endpoint: NodeHandle,

    /// The DNS zone group node.
    pub dns_group: NodeHandle,

    /// Name of the zone group, `{prefix-of-parent}-{group_id}-dnsgrp`.
    pub dns_group_name: String,

    /// Zone names, in zone-config order.
    zones: Vec<String>,
}

impl PrivateEndpoint {
    /// Register the endpoint, its zone lookups and the DNS zone group.
    pub fn register(stack: &mut Stack, name: &str, args: &PrivateEndpointArgs) -> PrivateEndpoint {
        let connection_name = format!("{name}-plsc");
        let endpoint = stack.register(ResourceNode {
            name: name.to_string(),
            kind: NodeKind::Resource {
                arm_type: "Microsoft.Network/privateEndpoints".to_string(),
                api_version: NETWORK_API_VERSION.to_string(),
                arm_path: format!("Microsoft.Network/privateEndpoints/{name}"),
                resource_group: args.resource_group_name.clone(),
                location: Some(args.location.clone()),
                body: json!({
                    "properties": {
                        "privateLinkServiceConnections": [{
                            "name": connection_name,
                            "properties": {
                                "privateLinkServiceId": args.private_link_service_id,
                                "groupIds": [args.group_id],
                            },
                        }],
                        // Keeping this list empty pins the applied state, so
                        // the zone group is not re-created on every deploy
                        // (which would cascade into endpoint re-creation).
                        "customDnsConfigs": [],
                        "subnet": { "id": args.subnet_id },
                    },
                }),
            },
            depends_on: Vec::new(),
            options: ResourceOptions::replace_all_ignore_tags(),
        });

        // The zone group needs each zone's id to register the endpoint IP.
        let mut zone_configs = Vec::with_capacity(args.private_dns_zones.len());
        for zone in &args.private_dns_zones {
            let lookup = stack.register_lookup(
                format!("{name}-{zone}-zone"),
                LookupQuery::PrivateDnsZone {
                    resource_group: args.dns_resource_group_name.clone(),
                    zone: zone.clone(),
                },
            );
            zone_configs.push(json!({
                "name": zone,
                "properties": { "privateDnsZoneId": output(lookup, "id") },
            }));
        }

        // Parent-name prefix plus group id keeps names unique when one
        // resource carries several endpoints.
        let dns_group_name = dns_zone_group_name(name, &args.group_id);
        let dns_group = stack.register(ResourceNode {
            name: dns_group_name.clone(),
            kind: NodeKind::Resource {
                arm_type: "Microsoft.Network/privateEndpoints/privateDnsZoneGroups".to_string(),
                api_version: NETWORK_API_VERSION.to_string(),
                arm_path: format!(
                    "Microsoft.Network/privateEndpoints/{name}/privateDnsZoneGroups/{dns_group_name}"
                ),
                resource_group: args.resource_group_name.clone(),
                location: None,
                body: json!({
                    "properties": { "privateDnsZoneConfigs": zone_configs },
                }),
            },
            depends_on: vec![endpoint],
            options: ResourceOptions::delete_before_replace(),
        });

        PrivateEndpoint {
            endpoint,
            dns_group,
            dns_group_name,
            zones: args.private_dns_zones.clone(),
        }
    }

    /// Output expression for the endpoint's resource id.
    #[must_use]
    pub fn resource_id(&self) -> Value {
        output(self.endpoint, "id")
    }

    /// Output expression for the zone group's resolved zone configs.
    #[must_use]
    pub fn dns_zone_configs(&self) -> Value {
        output(self.dns_group, "properties.privateDnsZoneConfigs")
    }

    /// Output expression for the first private IP registered in `zone`.
    ///
    /// Returns `None` when the endpoint does not cover that zone.
    #[must_use]
    pub fn private_ip(&self, zone: &str) -> Option<Value> {
        let index = self.zones.iter().position(|z| z == zone)?;
        Some(output(
            self.dns_group,
            &format!("properties.privateDnsZoneConfigs.{index}.properties.recordSets.0.ipAddresses.0"),
        ))
    }
}

/// Derive the zone-group name from the endpoint name and group id.
///
/// The parent-name prefix is everything before the first dash, so
/// `devstg-pe` with group `blob` becomes `devstg-blob-dnsgrp`.
#[must_use]
pub fn dns_zone_group_name(endpoint_name: &str, group_id: &str) -> String {
    let prefix = endpoint_name.split('-').next().unwrap_or(endpoint_name);
    format!("{prefix}-{group_id}-dnsgrp")
}
