// Copyright (c) 2025 azenv contributors
// SPDX-License-Identifier: MIT

//! Global constants for the azenv deployer.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Azure endpoints
// ============================================================================

/// Base URL for the Azure Resource Manager REST API
pub const ARM_BASE_URL: &str = "https://management.azure.com";

/// Base URL for the Microsoft Graph API (directory user lookups)
pub const GRAPH_BASE_URL: &str = "https://graph.microsoft.com";

/// Default Azure region for all resources
pub const DEFAULT_LOCATION: &str = "eastus";

// ============================================================================
// ARM api-versions per provider
// ============================================================================

/// api-version for Microsoft.Network resources (endpoints, subnets, zone groups)
pub const NETWORK_API_VERSION: &str = "2023-09-01";

/// api-version for Microsoft.Network/privateDnsZones and record sets
pub const PRIVATE_DNS_API_VERSION: &str = "2020-06-01";

/// api-version for Microsoft.Storage resources
pub const STORAGE_API_VERSION: &str = "2023-01-01";

/// api-version for Microsoft.ContainerRegistry resources
pub const CONTAINER_REGISTRY_API_VERSION: &str = "2023-07-01";

/// api-version for Microsoft.KeyVault resources
pub const KEY_VAULT_API_VERSION: &str = "2023-07-01";

/// api-version for Microsoft.Insights components
pub const APP_INSIGHTS_API_VERSION: &str = "2020-02-02";

/// api-version for Microsoft.MachineLearningServices resources
pub const MACHINE_LEARNING_API_VERSION: &str = "2023-10-01";

// ============================================================================
// Private DNS zones
// ============================================================================

/// Private DNS zone for storage blob endpoints
pub const PRIVATE_DNS_ZONE_STORAGE_BLOB: &str = "privatelink.blob.core.windows.net";

/// Private DNS zone for storage file endpoints
pub const PRIVATE_DNS_ZONE_STORAGE_FILE: &str = "privatelink.file.core.windows.net";

/// Private DNS zone for storage data-lake (dfs) endpoints
pub const PRIVATE_DNS_ZONE_STORAGE_DFS: &str = "privatelink.dfs.core.windows.net";

/// Private DNS zone for container registry endpoints
pub const PRIVATE_DNS_ZONE_CONTAINER_REGISTRY: &str = "privatelink.azurecr.io";

/// Private DNS zone for key vault endpoints
pub const PRIVATE_DNS_ZONE_KEY_VAULT: &str = "privatelink.vaultcore.azure.net";

/// Private DNS zone for AzureML notebook endpoints
pub const PRIVATE_DNS_ZONE_AZUREML_NOTEBOOK: &str = "privatelink.notebooks.azure.net";

/// Private DNS zone for the AzureML workspace API
pub const PRIVATE_DNS_ZONE_AZUREML_API: &str = "privatelink.api.azureml.ms";

// ============================================================================
// Resource defaults
// ============================================================================

/// Default VM size for compute instances
pub const STANDARD_DS11_V2: &str = "Standard_DS11_v2";

/// Default storage account SKU
pub const DEFAULT_STORAGE_SKU: &str = "Standard_GZRS";

/// Key vault soft-delete retention window in days
pub const KV_SOFT_DELETE_RETENTION_DAYS: u32 = 7;

/// Record type for the hub DNS record sets created per storage endpoint
pub const RECORD_SET_TYPE: &str = "A";

/// TTL in seconds for hub DNS record sets
pub const RECORD_SET_TTL: u64 = 3600;

/// Default auto-pause delay for compute instances, in minutes
pub const DEFAULT_AUTO_PAUSE_DELAY_MINUTES: u32 = 60;

/// Length of the random suffix appended to compute cluster names
pub const CLUSTER_NAME_SUFFIX_LEN: usize = 4;

// ============================================================================
// Private-endpoint connection group ids
// ============================================================================

/// Connection group id for storage blob endpoints
pub const GROUP_ID_BLOB: &str = "blob";

/// Connection group id for storage file endpoints
pub const GROUP_ID_FILE: &str = "file";

/// Connection group id for storage dfs endpoints
pub const GROUP_ID_DFS: &str = "dfs";

/// Connection group id for container registry endpoints
pub const GROUP_ID_REGISTRY: &str = "registry";

/// Connection group id for key vault endpoints
pub const GROUP_ID_VAULT: &str = "vault";

/// Connection group id for ML workspace endpoints
pub const GROUP_ID_AML_WORKSPACE: &str = "amlworkspace";

// ============================================================================
// Provisioner behavior
// ============================================================================

/// Maximum number of polls for a terminal provisioningState after PUT
pub const PROVISION_POLL_MAX_ATTEMPTS: u32 = 30;

/// Delay between provisioningState polls, in seconds
pub const PROVISION_POLL_INTERVAL_SECS: u64 = 2;

// ============================================================================
// Validation bounds
// ============================================================================

/// Minimum length (inclusive) for resource-name prefixes
pub const PREFIX_MIN_LEN: usize = 3;

/// Maximum length (inclusive) for resource-name prefixes
pub const PREFIX_MAX_LEN: usize = 9;
