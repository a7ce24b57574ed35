// Copyright (c) 2025 azenv contributors
// SPDX-License-Identifier: MIT

//! Error types for configuration validation and provisioning.
//!
//! This module provides specialized error types for:
//! - Settings-file parsing and predicate validation (raised before any
//!   provisioning call is made)
//! - ARM/Graph lookup failures (unknown DNS zone, subnet or directory user)
//! - Provisioning transport and resource-graph errors
//!
//! Structured variants keep the failing identifiers (zone, subnet, node name)
//! available for operator-facing messages.

use thiserror::Error;

/// Errors detected while loading or validating the settings file.
///
/// All of these are raised synchronously, before the resource graph is
/// constructed or any provisioning call is issued.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The resource-name prefix failed format validation.
    ///
    /// The prefix is embedded into globally-unique resource names (storage
    /// accounts, registries), so Azure's strictest naming rules apply.
    #[error(
        "invalid prefix '{prefix}': must be 3-9 lowercase letters and/or digits \
         with at least one letter"
    )]
    InvalidPrefix {
        /// The rejected prefix value
        prefix: String,
    },

    /// Private networking is enabled but a prerequisite field is empty.
    ///
    /// Endpoint placement needs the subnet name; zone-group construction
    /// needs the resource group hosting the private DNS zones.
    #[error(
        "`private_endpoint_subnet_name` or `dns_resource_group_name` can not be empty \
         when private endpoints are enabled"
    )]
    MissingPrivateEndpointSettings,

    /// A compute-cluster entry has an empty or whitespace-only VM size.
    #[error("vm_size in compute cluster '{cluster}' can't be empty")]
    EmptyVmSize {
        /// Name of the offending cluster config entry
        cluster: String,
    },

    /// The settings file could not be read.
    #[error("failed to read settings file '{path}'")]
    Io {
        /// Path of the settings file
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid YAML or is missing required fields.
    #[error("failed to parse settings file '{path}'")]
    Yaml {
        /// Path of the settings file
        path: String,
        /// Underlying deserialization error
        #[source]
        source: serde_yaml::Error,
    },
}

/// Errors that can occur while applying the resource graph.
///
/// Lookup failures and remote provisioning failures are fatal; there is no
/// local recovery or retry beyond what the transport implementation does.
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// A named private DNS zone does not exist in the DNS-hosting group.
    #[error("private DNS zone '{zone}' not found in resource group '{resource_group}'")]
    ZoneNotFound {
        /// The zone name that was looked up
        zone: String,
        /// The resource group that was searched
        resource_group: String,
    },

    /// A named subnet does not exist in the given virtual network.
    #[error(
        "subnet '{subnet}' not found in virtual network '{vnet}' \
         (resource group '{resource_group}')"
    )]
    SubnetNotFound {
        /// The subnet name that was looked up
        subnet: String,
        /// The virtual network that was searched
        vnet: String,
        /// The resource group owning the virtual network
        resource_group: String,
    },

    /// A directory user could not be resolved by email.
    #[error("directory user '{email}' not found")]
    UserNotFound {
        /// The email address that was looked up
        email: String,
    },

    /// The remote API rejected a request.
    #[error("{method} {url} failed with HTTP {status}: {body}")]
    RequestFailed {
        /// HTTP method of the failing request
        method: String,
        /// Full request URL
        url: String,
        /// HTTP status code returned
        status: u16,
        /// Response body, as returned by the API
        body: String,
    },

    /// A network-level failure while talking to the remote API.
    #[error("transport error calling {url}")]
    Transport {
        /// Full request URL
        url: String,
        /// Underlying reqwest error
        #[source]
        source: reqwest::Error,
    },

    /// The declared dependencies contain a cycle.
    #[error("dependency cycle involving resource '{node}'")]
    DependencyCycle {
        /// Name of a node on the cycle
        node: String,
    },

    /// An output reference could not be resolved against applied state.
    ///
    /// Either the referenced node has not been applied (ordering bug) or the
    /// path does not exist in its returned state.
    #[error("unresolved output reference '{path}' on resource '{node}'")]
    UnresolvedReference {
        /// Name of the node whose properties hold the reference
        node: String,
        /// The reference path that failed to resolve
        path: String,
    },

    /// A resource did not reach a terminal provisioning state in time.
    #[error("resource '{name}' stuck in provisioningState '{state}' after {attempts} polls")]
    ProvisioningTimeout {
        /// Name of the resource
        name: String,
        /// Last observed provisioning state
        state: String,
        /// Number of polls performed
        attempts: u32,
    },

    /// No access token was supplied for an authenticated run.
    #[error("missing access token: set AZURE_ACCESS_TOKEN or pass --token")]
    MissingToken,
}
