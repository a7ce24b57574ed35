// Copyright (c) 2025 azenv contributors
// SPDX-License-Identifier: MIT

//! AzureML environment aggregate.
//!
//! Composes the whole environment into one resource graph, in dependency
//! order: storage account (plus its private endpoints and hub record sets),
//! container registry, key vault, application-insights component, the ML
//! workspace bound to all of them, per-user compute instances and
//! auto-scaling compute clusters.
//!
//! All networking branches are gated on the private-endpoint toggle. When
//! it is off, no endpoint, lookup, zone-group or record-set node exists
//! anywhere in the graph and every data-plane resource carries
//! `publicNetworkAccess: Enabled`.

use crate::config::{ComputeClusterItem, ComputeInstanceItem, Settings};
use crate::constants::{
    APP_INSIGHTS_API_VERSION, CLUSTER_NAME_SUFFIX_LEN, CONTAINER_REGISTRY_API_VERSION,
    DEFAULT_LOCATION, DEFAULT_STORAGE_SKU, GROUP_ID_AML_WORKSPACE, GROUP_ID_BLOB, GROUP_ID_DFS,
    GROUP_ID_FILE, GROUP_ID_REGISTRY, GROUP_ID_VAULT, KEY_VAULT_API_VERSION,
    KV_SOFT_DELETE_RETENTION_DAYS, MACHINE_LEARNING_API_VERSION, PRIVATE_DNS_API_VERSION,
    PRIVATE_DNS_ZONE_AZUREML_API, PRIVATE_DNS_ZONE_AZUREML_NOTEBOOK,
    PRIVATE_DNS_ZONE_CONTAINER_REGISTRY, PRIVATE_DNS_ZONE_KEY_VAULT,
    PRIVATE_DNS_ZONE_STORAGE_BLOB, PRIVATE_DNS_ZONE_STORAGE_DFS, PRIVATE_DNS_ZONE_STORAGE_FILE,
    RECORD_SET_TTL, RECORD_SET_TYPE,
};
use crate::private_endpoint::{PrivateEndpoint, PrivateEndpointArgs};
use crate::stack::{
    output, LookupQuery, NodeHandle, NodeKind, ResourceNode, ResourceOptions, Stack,
};
use crate::storage::{Storage, StorageArgs, ZoneGroupPair};
use rand::distr::Alphanumeric;
use rand::RngExt;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Arguments for the environment aggregate.
#[derive(Clone, Debug)]
pub struct AzureMlArgs {
    /// Resource group all workload resources are created in.
    pub resource_group_name: String,

    /// Resource group owning the virtual network.
    pub vnet_resource_group_name: String,

    /// Virtual network holding the endpoint and compute subnets.
    pub vnet_name: String,

    /// Master toggle for private networking.
    pub enable_private_endpoint: bool,

    /// Resource group hosting the private DNS zones (the hub).
    pub dns_resource_group_name: String,

    /// Subnet private endpoints are placed in.
    pub private_endpoint_subnet_name: String,

    /// Subnet for personal compute instances.
    pub compute_instance_subnet_name: Option<String>,

    /// Subnet for compute clusters.
    pub compute_cluster_subnet_name: Option<String>,

    /// Personal compute instances, keyed by logical name.
    pub compute_instance_config: BTreeMap<String, ComputeInstanceItem>,

    /// Auto-scaling compute clusters, keyed by logical name.
    pub compute_cluster_config: BTreeMap<String, ComputeClusterItem>,

    /// Entra tenant id for the vault and assigned users.
    pub tenant_id: String,

    /// Azure region.
    pub location: String,
}

impl AzureMlArgs {
    /// Build aggregate args from validated settings.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> AzureMlArgs {
        AzureMlArgs {
            resource_group_name: settings.common.resource_group_name.clone(),
            vnet_resource_group_name: settings.common.vnet_resource_group_name.clone(),
            vnet_name: settings.common.vnet_name.clone(),
            enable_private_endpoint: settings.enable_private_endpoint,
            dns_resource_group_name: settings.common.dns_resource_group_name.clone(),
            private_endpoint_subnet_name: settings.common.private_endpoint_subnet_name.clone(),
            compute_instance_subnet_name: settings.azureml.compute_instance_subnet_name.clone(),
            compute_cluster_subnet_name: settings.azureml.compute_cluster_subnet_name.clone(),
            compute_instance_config: settings.azureml.compute_instance_config.clone(),
            compute_cluster_config: settings.azureml.compute_cluster_config.clone(),
            tenant_id: settings.common.tenant_id.clone(),
            location: settings
                .common
                .location
                .clone()
                .unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
        }
    }
}

/// Handles for the registered environment.
#[derive(Clone, Debug)]
pub struct AzureMl {
    /// Storage account component (with its endpoints, when private).
    pub storage: Storage,

    /// Hub "A" record sets, one per (storage, zone) pair.
    pub record_sets: Vec<NodeHandle>,

    /// Container registry node.
    pub registry: NodeHandle,

    /// Key vault node.
    pub vault: NodeHandle,

    /// Application-insights component node.
    pub insights: NodeHandle,

    /// ML workspace node.
    pub workspace: NodeHandle,

    /// Registry endpoint, when private networking is on.
    pub registry_endpoint: Option<PrivateEndpoint>,

    /// Vault endpoint, when private networking is on.
    pub vault_endpoint: Option<PrivateEndpoint>,

    /// Workspace endpoint, when private networking is on.
    pub workspace_endpoint: Option<PrivateEndpoint>,

    /// Compute-instance nodes, in config order.
    pub compute_instances: Vec<NodeHandle>,

    /// Compute-cluster nodes with their suffixed names, in config order.
    pub compute_clusters: Vec<(String, NodeHandle)>,
}

impl AzureMl {
    /// Register the whole environment onto the stack.
    ///
    /// `name` is the environment base name (typically `{prefix}azml`); all
    /// child resource names derive from it.
    #[allow(clippy::too_many_lines)]
    pub fn register(stack: &mut Stack, name: &str, args: &AzureMlArgs) -> AzureMl {
        let private = args.enable_private_endpoint;
        let public_access = if private { "Disabled" } else { "Enabled" };

        // 1. Subnet for private endpoints, looked up once and shared.
        let pe_subnet_id = private.then(|| {
            let lookup = stack.register_lookup(
                format!("{name}-pe-subnet"),
                LookupQuery::Subnet {
                    resource_group: args.vnet_resource_group_name.clone(),
                    vnet: args.vnet_name.clone(),
                    subnet: args.private_endpoint_subnet_name.clone(),
                },
            );
            output(lookup, "id")
        });

        // 2. Storage account with blob/file/dfs endpoints.
        let storage_name = format!("{name}stg");
        let zone_pairs = if private {
            vec![
                ZoneGroupPair {
                    dns_zone: PRIVATE_DNS_ZONE_STORAGE_BLOB.to_string(),
                    group_id: GROUP_ID_BLOB.to_string(),
                },
                ZoneGroupPair {
                    dns_zone: PRIVATE_DNS_ZONE_STORAGE_FILE.to_string(),
                    group_id: GROUP_ID_FILE.to_string(),
                },
                ZoneGroupPair {
                    dns_zone: PRIVATE_DNS_ZONE_STORAGE_DFS.to_string(),
                    group_id: GROUP_ID_DFS.to_string(),
                },
            ]
        } else {
            Vec::new()
        };
        let storage = Storage::register(
            stack,
            &storage_name,
            &StorageArgs {
                resource_group_name: args.resource_group_name.clone(),
                enable_private_endpoints_access_only: private,
                subnet_id: pe_subnet_id.clone(),
                dns_resource_group_name: args.dns_resource_group_name.clone(),
                private_dns_zones_and_group_ids: zone_pairs.clone(),
                sku: DEFAULT_STORAGE_SKU.to_string(),
                is_hns_enabled: false,
                tags: BTreeMap::new(),
                location: args.location.clone(),
            },
        );

        // 3. Hub record sets linking each storage private IP into the hub
        // DNS zone, sequenced after the storage account.
        let mut record_sets = Vec::new();
        for pair in &zone_pairs {
            let Some(ip) = storage.private_ip(&pair.dns_zone) else {
                continue;
            };
            let record_set = stack.register(ResourceNode {
                name: format!("{storage_name}-{}-rs", pair.group_id),
                kind: NodeKind::Resource {
                    arm_type: format!(
                        "Microsoft.Network/privateDnsZones/{RECORD_SET_TYPE}"
                    ),
                    api_version: PRIVATE_DNS_API_VERSION.to_string(),
                    arm_path: format!(
                        "Microsoft.Network/privateDnsZones/{}/{}/{}",
                        pair.dns_zone, RECORD_SET_TYPE, storage_name
                    ),
                    resource_group: args.dns_resource_group_name.clone(),
                    location: None,
                    body: json!({
                        "properties": {
                            "ttl": RECORD_SET_TTL,
                            "aRecords": [{ "ipv4Address": ip }],
                        },
                    }),
                },
                depends_on: vec![storage.account],
                options: ResourceOptions::default(),
            });
            record_sets.push(record_set);
        }

        // 4. Container registry and key vault.
        let registry_name = format!("{name}acr");
        let registry = stack.register(ResourceNode {
            name: registry_name.clone(),
            kind: NodeKind::Resource {
                arm_type: "Microsoft.ContainerRegistry/registries".to_string(),
                api_version: CONTAINER_REGISTRY_API_VERSION.to_string(),
                arm_path: format!("Microsoft.ContainerRegistry/registries/{registry_name}"),
                resource_group: args.resource_group_name.clone(),
                location: Some(args.location.clone()),
                body: json!({
                    // Private link requires the Premium tier.
                    "sku": { "name": "Premium" },
                    "properties": {
                        "adminUserEnabled": false,
                        "publicNetworkAccess": public_access,
                    },
                }),
            },
            depends_on: Vec::new(),
            options: ResourceOptions::default(),
        });

        let vault_name = format!("{name}kv");
        let vault = stack.register(ResourceNode {
            name: vault_name.clone(),
            kind: NodeKind::Resource {
                arm_type: "Microsoft.KeyVault/vaults".to_string(),
                api_version: KEY_VAULT_API_VERSION.to_string(),
                arm_path: format!("Microsoft.KeyVault/vaults/{vault_name}"),
                resource_group: args.resource_group_name.clone(),
                location: Some(args.location.clone()),
                body: json!({
                    "properties": {
                        "tenantId": args.tenant_id,
                        "sku": { "family": "A", "name": "standard" },
                        "softDeleteRetentionInDays": KV_SOFT_DELETE_RETENTION_DAYS,
                        "enableRbacAuthorization": true,
                        "publicNetworkAccess": public_access,
                    },
                }),
            },
            depends_on: Vec::new(),
            options: ResourceOptions::default(),
        });

        // 5. Application insights.
        let insights_name = format!("{name}appi");
        let insights = stack.register(ResourceNode {
            name: insights_name.clone(),
            kind: NodeKind::Resource {
                arm_type: "Microsoft.Insights/components".to_string(),
                api_version: APP_INSIGHTS_API_VERSION.to_string(),
                arm_path: format!("Microsoft.Insights/components/{insights_name}"),
                resource_group: args.resource_group_name.clone(),
                location: Some(args.location.clone()),
                body: json!({
                    "kind": "web",
                    "properties": { "Application_Type": "web" },
                }),
            },
            depends_on: Vec::new(),
            options: ResourceOptions::default(),
        });

        // 6. The ML workspace, bound to everything above by resource id.
        let workspace_name = format!("{name}mlw");
        let workspace = stack.register(ResourceNode {
            name: workspace_name.clone(),
            kind: NodeKind::Resource {
                arm_type: "Microsoft.MachineLearningServices/workspaces".to_string(),
                api_version: MACHINE_LEARNING_API_VERSION.to_string(),
                arm_path: format!(
                    "Microsoft.MachineLearningServices/workspaces/{workspace_name}"
                ),
                resource_group: args.resource_group_name.clone(),
                location: Some(args.location.clone()),
                body: json!({
                    "identity": { "type": "SystemAssigned" },
                    "properties": {
                        "friendlyName": name,
                        "storageAccount": storage.resource_id(),
                        "keyVault": output(vault, "id"),
                        "applicationInsights": output(insights, "id"),
                        "containerRegistry": output(registry, "id"),
                        "publicNetworkAccess": public_access,
                    },
                }),
            },
            depends_on: Vec::new(),
            options: ResourceOptions::default(),
        });

        // 7. Endpoints for registry, vault and workspace.
        let mut registry_endpoint = None;
        let mut vault_endpoint = None;
        let mut workspace_endpoint = None;
        if private {
            let subnet_id = pe_subnet_id.clone().unwrap_or(Value::Null);
            registry_endpoint = Some(PrivateEndpoint::register(
                stack,
                &format!("{registry_name}-pe"),
                &PrivateEndpointArgs {
                    resource_group_name: args.resource_group_name.clone(),
                    private_link_service_id: output(registry, "id"),
                    subnet_id: subnet_id.clone(),
                    dns_resource_group_name: args.dns_resource_group_name.clone(),
                    group_id: GROUP_ID_REGISTRY.to_string(),
                    private_dns_zones: vec![PRIVATE_DNS_ZONE_CONTAINER_REGISTRY.to_string()],
                    location: args.location.clone(),
                },
            ));
            vault_endpoint = Some(PrivateEndpoint::register(
                stack,
                &format!("{vault_name}-pe"),
                &PrivateEndpointArgs {
                    resource_group_name: args.resource_group_name.clone(),
                    private_link_service_id: output(vault, "id"),
                    subnet_id: subnet_id.clone(),
                    dns_resource_group_name: args.dns_resource_group_name.clone(),
                    group_id: GROUP_ID_VAULT.to_string(),
                    private_dns_zones: vec![PRIVATE_DNS_ZONE_KEY_VAULT.to_string()],
                    location: args.location.clone(),
                },
            ));
            workspace_endpoint = Some(PrivateEndpoint::register(
                stack,
                &format!("{workspace_name}-pe"),
                &PrivateEndpointArgs {
                    resource_group_name: args.resource_group_name.clone(),
                    private_link_service_id: output(workspace, "id"),
                    subnet_id,
                    dns_resource_group_name: args.dns_resource_group_name.clone(),
                    group_id: GROUP_ID_AML_WORKSPACE.to_string(),
                    private_dns_zones: vec![
                        PRIVATE_DNS_ZONE_AZUREML_API.to_string(),
                        PRIVATE_DNS_ZONE_AZUREML_NOTEBOOK.to_string(),
                    ],
                    location: args.location.clone(),
                },
            ));
        }

        // 8. Personal compute instances, one per configured user.
        let instance_subnet_id = subnet_lookup_if(
            stack,
            private,
            args,
            args.compute_instance_subnet_name.as_deref(),
            !args.compute_instance_config.is_empty(),
            &format!("{name}-ci-subnet"),
        );
        let mut compute_instances = Vec::new();
        for (entry_name, item) in &args.compute_instance_config {
            let user_lookup = stack.register_lookup(
                format!("{entry_name}-user"),
                LookupQuery::UserObjectId {
                    email: item.user_email.clone(),
                },
            );
            let mut properties = json!({
                "vmSize": item.vm_size,
                "personalComputeInstanceSettings": {
                    "assignedUser": {
                        "objectId": output(user_lookup, "id"),
                        "tenantId": args.tenant_id,
                    },
                },
            });
            if item.auto_pause.enabled {
                properties["idleTimeBeforeShutdown"] =
                    json!(format!("PT{}M", item.auto_pause.delay_in_minutes));
            }
            if let Some(subnet) = &instance_subnet_id {
                properties["subnet"] = json!({ "id": subnet });
            }
            debug!(instance = %entry_name, vm_size = %item.vm_size, "Registering compute instance");
            let compute = stack.register(ResourceNode {
                name: entry_name.clone(),
                kind: NodeKind::Resource {
                    arm_type: "Microsoft.MachineLearningServices/workspaces/computes".to_string(),
                    api_version: MACHINE_LEARNING_API_VERSION.to_string(),
                    arm_path: format!(
                        "Microsoft.MachineLearningServices/workspaces/{workspace_name}/computes/{entry_name}"
                    ),
                    resource_group: args.resource_group_name.clone(),
                    location: Some(args.location.clone()),
                    body: json!({
                        "properties": {
                            "computeType": "ComputeInstance",
                            "properties": properties,
                        },
                    }),
                },
                depends_on: vec![workspace],
                options: ResourceOptions::default(),
            });
            compute_instances.push(compute);
        }

        // 9. Compute clusters. The random suffix keeps generated names
        // unique across parallel deployments of the same config.
        let cluster_subnet_id = subnet_lookup_if(
            stack,
            private,
            args,
            args.compute_cluster_subnet_name.as_deref(),
            !args.compute_cluster_config.is_empty(),
            &format!("{name}-cc-subnet"),
        );
        let mut compute_clusters = Vec::new();
        for (entry_name, item) in &args.compute_cluster_config {
            let cluster_name = format!("{entry_name}-{}", random_suffix());
            let mut properties = json!({
                "vmSize": item.vm_size,
                "vmPriority": item.vm_priority,
                "scaleSettings": {
                    "maxNodeCount": item.max_node_count,
                    "minNodeCount": item.min_node_count,
                    "nodeIdleTimeBeforeScaleDown": item.node_idle_time_before_scale_down,
                },
            });
            if let Some(subnet) = &cluster_subnet_id {
                properties["subnet"] = json!({ "id": subnet });
            }
            debug!(cluster = %cluster_name, vm_size = %item.vm_size, "Registering compute cluster");
            let compute = stack.register(ResourceNode {
                name: cluster_name.clone(),
                kind: NodeKind::Resource {
                    arm_type: "Microsoft.MachineLearningServices/workspaces/computes".to_string(),
                    api_version: MACHINE_LEARNING_API_VERSION.to_string(),
                    arm_path: format!(
                        "Microsoft.MachineLearningServices/workspaces/{workspace_name}/computes/{cluster_name}"
                    ),
                    resource_group: args.resource_group_name.clone(),
                    location: Some(args.location.clone()),
                    body: json!({
                        "properties": {
                            "computeType": "AmlCompute",
                            "properties": properties,
                        },
                    }),
                },
                depends_on: vec![workspace],
                options: ResourceOptions::default(),
            });
            compute_clusters.push((cluster_name, compute));
        }

        AzureMl {
            storage,
            record_sets,
            registry,
            vault,
            insights,
            workspace,
            registry_endpoint,
            vault_endpoint,
            workspace_endpoint,
            compute_instances,
            compute_clusters,
        }
    }
}

/// Register a compute-subnet lookup when private networking is on, the
/// subnet is named, and at least one compute uses it.
fn subnet_lookup_if(
    stack: &mut Stack,
    private: bool,
    args: &AzureMlArgs,
    subnet_name: Option<&str>,
    has_computes: bool,
    lookup_name: &str,
) -> Option<Value> {
    if !private || !has_computes {
        return None;
    }
    let subnet = subnet_name.filter(|s| !s.trim().is_empty())?;
    let lookup = stack.register_lookup(
        lookup_name.to_string(),
        LookupQuery::Subnet {
            resource_group: args.vnet_resource_group_name.clone(),
            vnet: args.vnet_name.clone(),
            subnet: subnet.to_string(),
        },
    );
    Some(output(lookup, "id"))
}

/// Random lowercase-alphanumeric suffix for cluster names.
fn random_suffix() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .map(|b| (b as char).to_ascii_lowercase())
        .take(CLUSTER_NAME_SUFFIX_LEN)
        .collect()
}
