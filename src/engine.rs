// Copyright (c) 2025 azenv contributors
// SPDX-License-Identifier: MIT

//! Provisioning-engine boundary and deployment driver.
//!
//! [`Provisioner`] is the seam between the desired-state graph and the
//! remote declarative API: one call to apply a managed resource, one call to
//! resolve a read-only lookup. The production implementation lives in
//! [`crate::arm`]; tests substitute an in-memory recorder.
//!
//! [`Deployment::run`] walks the graph in [`crate::stack::Stack::deploy_order`]
//! order, resolves output references against already-applied state, and
//! issues one apply/lookup per node. The first failure aborts the run; retry
//! and convergence are the remote engine's concern, not this driver's.

use crate::errors::ProvisionError;
use crate::stack::{LookupQuery, NodeHandle, NodeKind, ResourceOptions, Stack, OUTPUT_REF_KEY};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

/// Desired state for one managed resource, handed to the provisioner.
#[derive(Clone, Debug)]
pub struct ApplyRequest {
    /// Logical node name (logs and errors)
    pub name: String,
    /// Fully qualified ARM type
    pub arm_type: String,
    /// api-version for all calls on this resource
    pub api_version: String,
    /// Provider-relative path including the resource name
    pub arm_path: String,
    /// Resource group the resource lives in
    pub resource_group: String,
    /// Azure region, when the resource type has one
    pub location: Option<String>,
    /// Fully resolved PUT body (no remaining output references)
    pub body: Value,
    /// Replace-semantics options
    pub options: ResourceOptions,
}

/// Provider-assigned state of an applied resource or resolved lookup.
#[derive(Clone, Debug)]
pub struct ResourceState {
    /// Provider-assigned resource id (empty for lookups without one)
    pub id: String,
    /// Logical node name
    pub name: String,
    /// Full response body; output references resolve against this
    pub outputs: Value,
}

/// Boundary to the external declarative provisioning engine.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Converge one managed resource to its desired state.
    async fn apply(&self, request: ApplyRequest) -> Result<ResourceState, ProvisionError>;

    /// Resolve a read-only lookup.
    async fn lookup(&self, query: &LookupQuery) -> Result<Value, ProvisionError>;
}

/// Result of a completed deployment: applied state per node.
#[derive(Debug, Default)]
pub struct DeploymentResult {
    states: Vec<Option<ResourceState>>,
}

impl DeploymentResult {
    /// Applied state of a node, if it was reached.
    #[must_use]
    pub fn state(&self, handle: NodeHandle) -> Option<&ResourceState> {
        self.states.get(handle.index()).and_then(Option::as_ref)
    }

    /// Resolve a value against this result, substituting output references.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::UnresolvedReference`] when a reference
    /// points at unapplied state or a missing path.
    pub fn resolve(&self, node_name: &str, value: &Value) -> Result<Value, ProvisionError> {
        resolve_refs(node_name, value, &self.states)
    }
}

/// Deployment driver: applies a [`Stack`] through a [`Provisioner`].
pub struct Deployment;

impl Deployment {
    /// Apply every node of the stack in dependency order.
    ///
    /// # Errors
    ///
    /// Returns the first [`ProvisionError`] encountered: a dependency cycle,
    /// an unresolved reference, a failed lookup or a failed apply.
    pub async fn run(
        stack: &Stack,
        provisioner: &dyn Provisioner,
    ) -> Result<DeploymentResult, ProvisionError> {
        let order = stack.deploy_order()?;
        let mut result = DeploymentResult {
            states: vec![None; stack.len()],
        };

        info!(nodes = stack.len(), "Applying resource graph");

        for handle in order {
            let node = stack.node(handle);
            match &node.kind {
                NodeKind::Lookup(query) => {
                    debug!(name = %node.name, "Resolving lookup");
                    let outputs = provisioner.lookup(query).await?;
                    let id = outputs
                        .get("id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    result.states[handle.index()] = Some(ResourceState {
                        id,
                        name: node.name.clone(),
                        outputs,
                    });
                }
                NodeKind::Resource {
                    arm_type,
                    api_version,
                    arm_path,
                    resource_group,
                    location,
                    body,
                } => {
                    let resolved = resolve_refs(&node.name, body, &result.states)?;
                    debug!(name = %node.name, arm_type = %arm_type, "Applying resource");
                    let state = provisioner
                        .apply(ApplyRequest {
                            name: node.name.clone(),
                            arm_type: arm_type.clone(),
                            api_version: api_version.clone(),
                            arm_path: arm_path.clone(),
                            resource_group: resource_group.clone(),
                            location: location.clone(),
                            body: resolved,
                            options: node.options.clone(),
                        })
                        .await?;
                    info!(name = %node.name, id = %state.id, "Resource applied");
                    result.states[handle.index()] = Some(state);
                }
            }
        }

        Ok(result)
    }
}

/// Substitute every output reference in `value` with applied state.
fn resolve_refs(
    node_name: &str,
    value: &Value,
    states: &[Option<ResourceState>],
) -> Result<Value, ProvisionError> {
    match value {
        Value::Object(map) => {
            if let Some(Value::Object(reference)) = map.get(OUTPUT_REF_KEY) {
                let index = reference
                    .get("node")
                    .and_then(Value::as_u64)
                    .map(|n| n as usize);
                let path = reference
                    .get("path")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let state = index
                    .and_then(|i| states.get(i))
                    .and_then(Option::as_ref)
                    .ok_or_else(|| ProvisionError::UnresolvedReference {
                        node: node_name.to_string(),
                        path: path.to_string(),
                    })?;
                return follow_path(&state.outputs, path).ok_or_else(|| {
                    ProvisionError::UnresolvedReference {
                        node: node_name.to_string(),
                        path: path.to_string(),
                    }
                });
            }
            let mut resolved = serde_json::Map::with_capacity(map.len());
            for (key, nested) in map {
                resolved.insert(key.clone(), resolve_refs(node_name, nested, states)?);
            }
            Ok(Value::Object(resolved))
        }
        Value::Array(items) => {
            let resolved = items
                .iter()
                .map(|item| resolve_refs(node_name, item, states))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(resolved))
        }
        other => Ok(other.clone()),
    }
}

/// Navigate a dot-separated path through a JSON value.
///
/// Numeric segments index arrays; everything else keys objects.
fn follow_path(value: &Value, path: &str) -> Option<Value> {
    let mut current = value;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = match current {
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            Value::Object(_) => current.get(segment)?,
            _ => return None,
        };
    }
    Some(current.clone())
}
