// Copyright (c) 2025 azenv contributors
// SPDX-License-Identifier: MIT

//! Settings-file model and fail-fast validation.
//!
//! The deployer is driven by a single YAML settings file:
//!
//! ```yaml
//! prefix: dsci01
//! enable_private_endpoint: true
//! common:
//!   resource_group_name: rg-workload
//!   dns_resource_group_name: rg-hub-dns
//!   vnet_resource_group_name: rg-network
//!   vnet_name: vnet-spoke
//!   private_endpoint_subnet_name: snet-pe
//!   tenant_id: 00000000-0000-0000-0000-000000000000
//! azureml:
//!   compute_instance_subnet_name: snet-ci
//!   compute_cluster_subnet_name: snet-cc
//!   compute_instance_config:
//!     alice:
//!       user_email: alice@example.com
//!       vm_size: Standard_DS11_v2
//!   compute_cluster_config:
//!     training:
//!       max_node_count: 4
//!       min_node_count: 0
//!       node_idle_time_before_scale_down: PT30M
//!       vm_priority: Dedicated
//!       vm_size: Standard_DS3_v2
//! ```
//!
//! Every predicate check (prefix format, private-networking prerequisites,
//! non-empty cluster VM sizes) runs during [`Settings::from_path`], before a
//! single provisioning call is made.

use crate::constants::{
    DEFAULT_AUTO_PAUSE_DELAY_MINUTES, PREFIX_MAX_LEN, PREFIX_MIN_LEN, STANDARD_DS11_V2,
};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Top-level settings, one per deployed environment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    /// Resource-name prefix, 3-9 lowercase alphanumerics with at least one
    /// letter. Embedded into every generated resource name.
    pub prefix: String,

    /// When true, resources are reachable only through private endpoints and
    /// the private-DNS graph is constructed. When false, everything is
    /// exposed on the public network and no endpoint/DNS objects exist.
    #[serde(default = "default_true")]
    pub enable_private_endpoint: bool,

    /// Names shared by every component of the environment.
    pub common: CommonSettings,

    /// AzureML-specific settings (subnets and compute maps).
    #[serde(default)]
    pub azureml: AzureMlSettings,
}

/// Common arguments shared across components.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommonSettings {
    /// Resource group hosting the private DNS zones (the "hub").
    pub dns_resource_group_name: String,

    /// Resource group all workload resources are created in.
    pub resource_group_name: String,

    /// Resource group owning the virtual network.
    pub vnet_resource_group_name: String,

    /// Virtual network holding the private-endpoint and compute subnets.
    pub vnet_name: String,

    /// Subnet private endpoints are placed in.
    pub private_endpoint_subnet_name: String,

    /// Entra tenant id, used for the key vault and compute-instance
    /// assigned-user bindings.
    #[serde(default)]
    pub tenant_id: String,

    /// Azure region; falls back to the deployer default when omitted.
    #[serde(default)]
    pub location: Option<String>,
}

/// AzureML component settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AzureMlSettings {
    /// Subnet for personal compute instances.
    #[serde(default)]
    pub compute_instance_subnet_name: Option<String>,

    /// Subnet for compute clusters.
    #[serde(default)]
    pub compute_cluster_subnet_name: Option<String>,

    /// Personal compute instances, keyed by logical name.
    #[serde(default)]
    pub compute_instance_config: BTreeMap<String, ComputeInstanceItem>,

    /// Auto-scaling compute clusters, keyed by logical name.
    #[serde(default)]
    pub compute_cluster_config: BTreeMap<String, ComputeClusterItem>,
}

/// Auto-pause policy of a personal compute instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AutoPause {
    /// Whether idle shutdown is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Idle minutes before the instance is paused.
    #[serde(default = "default_auto_pause_delay")]
    pub delay_in_minutes: u32,
}

impl Default for AutoPause {
    fn default() -> Self {
        AutoPause {
            enabled: true,
            delay_in_minutes: DEFAULT_AUTO_PAUSE_DELAY_MINUTES,
        }
    }
}

/// Config for one personal compute instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ComputeInstanceItem {
    /// Email of the user the instance is assigned to, resolved to a
    /// directory object id at deploy time.
    pub user_email: String,

    /// VM size for the instance.
    #[serde(default = "default_vm_size")]
    pub vm_size: String,

    /// Idle shutdown policy.
    #[serde(default)]
    pub auto_pause: AutoPause,
}

/// Config for one auto-scaling compute cluster.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ComputeClusterItem {
    /// Upper node bound for auto-scaling.
    pub max_node_count: u32,

    /// Lower node bound for auto-scaling.
    pub min_node_count: u32,

    /// Scale-down idle timeout, ISO-8601 duration (e.g. `PT30M`).
    pub node_idle_time_before_scale_down: String,

    /// `Dedicated` or `LowPriority`.
    pub vm_priority: String,

    /// VM size for cluster nodes. Must be non-empty.
    pub vm_size: String,
}

fn default_true() -> bool {
    true
}

fn default_vm_size() -> String {
    STANDARD_DS11_V2.to_string()
}

fn default_auto_pause_delay() -> u32 {
    DEFAULT_AUTO_PAUSE_DELAY_MINUTES
}

impl Settings {
    /// Load settings from a YAML file and run all predicate validation.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, is not valid
    /// YAML, or any validation predicate fails.
    pub fn from_path(path: &Path) -> Result<Settings, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let settings: Settings =
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Yaml {
                path: path.display().to_string(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Run every construction-time predicate check.
    ///
    /// # Errors
    ///
    /// Returns the first failing predicate as a [`ConfigError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_prefix(&self.prefix)?;
        if self.enable_private_endpoint {
            validate_private_endpoint_config(
                self.enable_private_endpoint,
                &self.common.private_endpoint_subnet_name,
                &self.common.dns_resource_group_name,
            )?;
        }
        for (name, cluster) in &self.azureml.compute_cluster_config {
            validate_cluster_vm_size(name, &cluster.vm_size)?;
        }
        Ok(())
    }
}

/// Validate the format of the resource-name prefix.
///
/// Accepts 3-9 lowercase ASCII letters and/or digits with at least one
/// letter. Rejects everything else: too short, too long, uppercase,
/// special characters, digit-only strings.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidPrefix`] on any violation.
pub fn validate_prefix(prefix: &str) -> Result<(), ConfigError> {
    let len_ok = (PREFIX_MIN_LEN..=PREFIX_MAX_LEN).contains(&prefix.len());
    let charset_ok = prefix
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    let has_letter = prefix.chars().any(|c| c.is_ascii_lowercase());

    if len_ok && charset_ok && has_letter {
        Ok(())
    } else {
        Err(ConfigError::InvalidPrefix {
            prefix: prefix.to_string(),
        })
    }
}

/// Validate the prerequisites for private-endpoint creation.
///
/// When `enable_private_endpoint` is true, both the endpoint subnet name and
/// the DNS-hosting resource group name must be non-empty and not
/// whitespace-only. When the toggle is false the other arguments are not
/// inspected.
///
/// # Errors
///
/// Returns [`ConfigError::MissingPrivateEndpointSettings`] when a
/// prerequisite is missing.
pub fn validate_private_endpoint_config(
    enable_private_endpoint: bool,
    private_endpoint_subnet_name: &str,
    dns_resource_group_name: &str,
) -> Result<(), ConfigError> {
    if enable_private_endpoint
        && (private_endpoint_subnet_name.trim().is_empty()
            || dns_resource_group_name.trim().is_empty())
    {
        return Err(ConfigError::MissingPrivateEndpointSettings);
    }
    Ok(())
}

/// Validate that a compute cluster's VM size is non-empty.
///
/// # Errors
///
/// Returns [`ConfigError::EmptyVmSize`] when the size is empty or
/// whitespace-only.
pub fn validate_cluster_vm_size(cluster: &str, vm_size: &str) -> Result<(), ConfigError> {
    if vm_size.trim().is_empty() {
        return Err(ConfigError::EmptyVmSize {
            cluster: cluster.to_string(),
        });
    }
    Ok(())
}
