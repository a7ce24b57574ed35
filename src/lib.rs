// Copyright (c) 2025 azenv contributors
// SPDX-License-Identifier: MIT

//! # azenv - Azure ML environment deployer
//!
//! azenv deploys a complete, optionally network-isolated Azure Machine
//! Learning environment from a single YAML settings file: storage account,
//! container registry, key vault, application insights, the ML workspace,
//! and its compute instances and clusters, with private endpoints and hub
//! DNS wiring when isolation is enabled.
//!
//! ## Overview
//!
//! This library provides:
//!
//! - A declarative resource graph with cross-resource output references
//! - Deterministic dependency ordering and graph execution
//! - An ARM REST provisioner with upsert, replace and lookup semantics
//! - Environment components for storage, private endpoints and Azure ML
//!
//! ## Modules
//!
//! - [`config`] - YAML settings model and validation
//! - [`stack`] - Resource graph, output references, deploy ordering
//! - [`engine`] - Graph execution against a [`engine::Provisioner`]
//! - [`arm`] - ARM and Microsoft Graph REST provisioner
//! - [`private_endpoint`] - Private endpoint plus DNS zone group component
//! - [`storage`] - Storage account component
//! - [`azureml`] - The full environment aggregate
//!
//! ## Example
//!
//! ```rust,no_run
//! use azenv::azureml::{AzureMl, AzureMlArgs};
//! use azenv::config::Settings;
//! use azenv::stack::Stack;
//!
//! let settings = Settings::from_path("settings.yaml".as_ref()).unwrap();
//! settings.validate().unwrap();
//!
//! let mut stack = Stack::new();
//! let name = format!("{}azml", settings.prefix);
//! let env = AzureMl::register(&mut stack, &name, &AzureMlArgs::from_settings(&settings));
//! println!("workspace node: {}", stack.node(env.workspace).name);
//! ```

pub mod arm;
pub mod azureml;
pub mod config;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod private_endpoint;
pub mod stack;
pub mod storage;

#[cfg(test)]
mod arm_tests;
#[cfg(test)]
mod private_endpoint_tests;
