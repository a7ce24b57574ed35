// Copyright (c) 2025 azenv contributors
// SPDX-License-Identifier: MIT

//! Unit tests for the private-endpoint component.

#[cfg(test)]
mod tests {
    use crate::private_endpoint::*;
    use crate::stack::{output, LookupQuery, NodeKind, Stack, OUTPUT_REF_KEY};
    use serde_json::json;

    fn args(zones: &[&str], group_id: &str) -> PrivateEndpointArgs {
        PrivateEndpointArgs {
            resource_group_name: "rg-workload".to_string(),
            private_link_service_id: json!("/subscriptions/s/targets/t"),
            subnet_id: json!("/subscriptions/s/subnets/snet-pe"),
            dns_resource_group_name: "rg-hub-dns".to_string(),
            group_id: group_id.to_string(),
            private_dns_zones: zones.iter().map(ToString::to_string).collect(),
            location: "eastus".to_string(),
        }
    }

    #[test]
    fn test_zone_group_name_uses_first_dash_segment() {
        assert_eq!(dns_zone_group_name("devstg-blob-pe", "blob"), "devstg-blob-dnsgrp");
        assert_eq!(dns_zone_group_name("devazmlkv-pe", "vault"), "devazmlkv-vault-dnsgrp");
        assert_eq!(dns_zone_group_name("nodash", "registry"), "nodash-registry-dnsgrp");
    }

    #[test]
    fn test_register_creates_endpoint_lookup_and_zone_group() {
        let mut stack = Stack::new();
        let pe = PrivateEndpoint::register(
            &mut stack,
            "devkv-pe",
            &args(&["privatelink.vaultcore.azure.net"], "vault"),
        );

        // endpoint + one zone lookup + zone group
        assert_eq!(stack.len(), 3);
        assert_eq!(pe.dns_group_name, "devkv-vault-dnsgrp");

        let endpoint = stack.node(pe.endpoint);
        assert_eq!(endpoint.name, "devkv-pe");
        let NodeKind::Resource { arm_type, arm_path, body, .. } = &endpoint.kind else {
            panic!("endpoint must be a resource node");
        };
        assert_eq!(arm_type, "Microsoft.Network/privateEndpoints");
        assert_eq!(arm_path, "Microsoft.Network/privateEndpoints/devkv-pe");

        let connections = &body["properties"]["privateLinkServiceConnections"];
        assert_eq!(connections[0]["name"], json!("devkv-pe-plsc"));
        assert_eq!(connections[0]["properties"]["groupIds"], json!(["vault"]));
        assert_eq!(body["properties"]["customDnsConfigs"], json!([]));
        assert_eq!(
            body["properties"]["subnet"]["id"],
            json!("/subscriptions/s/subnets/snet-pe")
        );
    }

    #[test]
    fn test_endpoint_carries_recreate_semantics() {
        let mut stack = Stack::new();
        let pe = PrivateEndpoint::register(
            &mut stack,
            "devkv-pe",
            &args(&["privatelink.vaultcore.azure.net"], "vault"),
        );

        let endpoint = stack.node(pe.endpoint);
        assert_eq!(endpoint.options.replace_on_changes, vec!["*"]);
        assert!(endpoint.options.delete_before_replace);
        assert_eq!(endpoint.options.ignore_changes, vec!["tags"]);

        let group = stack.node(pe.dns_group);
        assert!(group.options.delete_before_replace);
        assert!(group.options.replace_on_changes.is_empty());
    }

    #[test]
    fn test_zone_group_references_each_zone_lookup() {
        let mut stack = Stack::new();
        let pe = PrivateEndpoint::register(
            &mut stack,
            "devmlw-pe",
            &args(
                &["privatelink.api.azureml.ms", "privatelink.notebooks.azure.net"],
                "amlworkspace",
            ),
        );

        // Both zone lookups registered, by name.
        let lookups: Vec<&str> = stack
            .nodes()
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Lookup(_)))
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(
            lookups,
            [
                "devmlw-pe-privatelink.api.azureml.ms-zone",
                "devmlw-pe-privatelink.notebooks.azure.net-zone",
            ]
        );

        let group = stack.node(pe.dns_group);
        let NodeKind::Resource { arm_path, body, location, .. } = &group.kind else {
            panic!("zone group must be a resource node");
        };
        assert_eq!(
            arm_path,
            "Microsoft.Network/privateEndpoints/devmlw-pe/privateDnsZoneGroups/devmlw-amlworkspace-dnsgrp"
        );
        assert!(location.is_none());

        let configs = body["properties"]["privateDnsZoneConfigs"].as_array().unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0]["name"], json!("privatelink.api.azureml.ms"));
        // Each config's zone id is a reference into the matching lookup.
        assert!(configs[0]["properties"]["privateDnsZoneId"]
            .get(OUTPUT_REF_KEY)
            .is_some());

        // Zone group waits on the endpoint plus both lookups.
        assert!(group.depends_on.contains(&pe.endpoint));
        assert_eq!(group.depends_on.len(), 3);
    }

    #[test]
    fn test_zone_lookup_queries_hub_resource_group() {
        let mut stack = Stack::new();
        PrivateEndpoint::register(
            &mut stack,
            "devacr-pe",
            &args(&["privatelink.azurecr.io"], "registry"),
        );

        let lookup = stack
            .nodes()
            .iter()
            .find(|n| matches!(n.kind, NodeKind::Lookup(_)))
            .unwrap();
        match &lookup.kind {
            NodeKind::Lookup(LookupQuery::PrivateDnsZone { resource_group, zone }) => {
                assert_eq!(resource_group, "rg-hub-dns");
                assert_eq!(zone, "privatelink.azurecr.io");
            }
            other => panic!("unexpected lookup kind: {other:?}"),
        }
    }

    #[test]
    fn test_private_ip_paths_index_zone_configs() {
        let mut stack = Stack::new();
        let pe = PrivateEndpoint::register(
            &mut stack,
            "devmlw-pe",
            &args(
                &["privatelink.api.azureml.ms", "privatelink.notebooks.azure.net"],
                "amlworkspace",
            ),
        );

        let first = pe.private_ip("privatelink.api.azureml.ms").unwrap();
        assert_eq!(
            first,
            output(
                pe.dns_group,
                "properties.privateDnsZoneConfigs.0.properties.recordSets.0.ipAddresses.0"
            )
        );

        let second = pe.private_ip("privatelink.notebooks.azure.net").unwrap();
        assert_eq!(
            second,
            output(
                pe.dns_group,
                "properties.privateDnsZoneConfigs.1.properties.recordSets.0.ipAddresses.0"
            )
        );

        assert!(pe.private_ip("privatelink.blob.core.windows.net").is_none());
    }

    #[test]
    fn test_endpoint_implicit_dependency_on_target_expression() {
        let mut stack = Stack::new();
        // Simulate the target resource being an earlier node.
        let target = stack.register_lookup(
            "target",
            LookupQuery::PrivateDnsZone {
                resource_group: "rg".to_string(),
                zone: "z".to_string(),
            },
        );
        let mut endpoint_args = args(&["privatelink.azurecr.io"], "registry");
        endpoint_args.private_link_service_id = output(target, "id");

        let pe = PrivateEndpoint::register(&mut stack, "devacr-pe", &endpoint_args);
        assert!(stack.node(pe.endpoint).depends_on.contains(&target));
    }
}
