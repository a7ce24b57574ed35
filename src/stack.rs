// Copyright (c) 2025 azenv contributors
// SPDX-License-Identifier: MIT

//! Desired-state resource graph.
//!
//! A [`Stack`] collects nodes in registration order. Each node is either a
//! managed ARM resource (provider path + api-version + JSON body) or a
//! read-only lookup (subnet id, private DNS zone, directory user). Nodes may
//! reference the applied outputs of earlier nodes by embedding an
//! [`output`] expression in their body; every reference implies a dependency
//! edge, and explicit edges can be added on top for sequencing-only
//! relationships (e.g. a record set waiting on its storage account).
//!
//! [`Stack::deploy_order`] produces a deterministic topological ordering of
//! the graph: among nodes whose dependencies are satisfied, registration
//! order wins. A cycle is a fatal error naming a node on the cycle.

use crate::errors::ProvisionError;
use serde_json::{json, Value};

/// Key marking an embedded output reference inside a property body.
pub const OUTPUT_REF_KEY: &str = "$azenvRef";

/// Handle to a registered node, returned by [`Stack::register`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub(crate) usize);

impl NodeHandle {
    /// Zero-based registration index of the node.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Read-only data-source queries resolved by the provisioner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LookupQuery {
    /// Resolve a subnet to its resource id.
    Subnet {
        /// Resource group owning the virtual network
        resource_group: String,
        /// Virtual network name
        vnet: String,
        /// Subnet name
        subnet: String,
    },
    /// Resolve a private DNS zone to its resource id.
    PrivateDnsZone {
        /// DNS-hosting resource group
        resource_group: String,
        /// Zone name, e.g. `privatelink.blob.core.windows.net`
        zone: String,
    },
    /// Resolve a directory user to its object id.
    UserObjectId {
        /// User principal name / email
        email: String,
    },
}

/// What a node declares: a managed resource or a lookup.
#[derive(Clone, Debug)]
pub enum NodeKind {
    /// A managed ARM resource, applied with PUT.
    Resource {
        /// Fully qualified ARM type, e.g. `Microsoft.Storage/storageAccounts`
        arm_type: String,
        /// api-version used for all calls on this resource
        api_version: String,
        /// Provider-relative path including the resource name (and any
        /// parent segments), e.g.
        /// `Microsoft.Network/privateEndpoints/foo-pe/privateDnsZoneGroups/foo-blob-dnsgrp`
        arm_path: String,
        /// Resource group the resource lives in
        resource_group: String,
        /// Azure region; `None` for proxy resources without a location
        location: Option<String>,
        /// Full PUT body (minus `location`, merged in by the provisioner).
        /// May embed [`output`] references.
        body: Value,
    },
    /// A read-only lookup resolved before dependents are applied.
    Lookup(LookupQuery),
}

/// Replace-semantics options attached to a node.
///
/// The underlying provider does not support in-place updates for some
/// resource types (private endpoints in particular), so changed fields must
/// force a delete-then-recreate instead of leaving orphaned state.
#[derive(Clone, Debug, Default)]
pub struct ResourceOptions {
    /// Body paths whose change forces recreation; `"*"` means any field.
    pub replace_on_changes: Vec<String>,

    /// Delete the live resource before re-creating it when replacement is
    /// required.
    pub delete_before_replace: bool,

    /// Body paths excluded from drift comparison (descriptive tags).
    pub ignore_changes: Vec<String>,
}

impl ResourceOptions {
    /// Options forcing recreation on any field change, ignoring tags.
    #[must_use]
    pub fn replace_all_ignore_tags() -> Self {
        ResourceOptions {
            replace_on_changes: vec!["*".to_string()],
            delete_before_replace: true,
            ignore_changes: vec!["tags".to_string()],
        }
    }

    /// Options forcing delete-before-replace without drift-based triggers.
    #[must_use]
    pub fn delete_before_replace() -> Self {
        ResourceOptions {
            delete_before_replace: true,
            ..ResourceOptions::default()
        }
    }
}

/// One registered node of the graph.
#[derive(Clone, Debug)]
pub struct ResourceNode {
    /// Logical name, used in logs, plans and error messages.
    pub name: String,

    /// Resource or lookup payload.
    pub kind: NodeKind,

    /// Dependency edges (implicit from output references plus explicit).
    pub depends_on: Vec<NodeHandle>,

    /// Replace-semantics options.
    pub options: ResourceOptions,
}

impl ResourceNode {
    /// Short kind tag for plan output.
    #[must_use]
    pub fn kind_tag(&self) -> &'static str {
        match &self.kind {
            NodeKind::Resource { .. } => "resource",
            NodeKind::Lookup(_) => "lookup",
        }
    }
}

/// Build an output-reference expression pointing at `path` within the
/// applied state of `handle`.
///
/// Paths are dot-separated; numeric segments index into arrays:
/// `properties.privateDnsZoneConfigs.0.properties.recordSets.0.ipAddresses.0`.
#[must_use]
pub fn output(handle: NodeHandle, path: &str) -> Value {
    json!({ OUTPUT_REF_KEY: { "node": handle.0, "path": path } })
}

/// Collect the node indices of every output reference embedded in `value`.
fn collect_refs(value: &Value, into: &mut Vec<usize>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::Object(reference)) = map.get(OUTPUT_REF_KEY) {
                if let Some(node) = reference.get("node").and_then(Value::as_u64) {
                    into.push(node as usize);
                    return;
                }
            }
            for nested in map.values() {
                collect_refs(nested, into);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_refs(item, into);
            }
        }
        _ => {}
    }
}

/// The desired-state graph under construction.
#[derive(Debug, Default)]
pub struct Stack {
    nodes: Vec<ResourceNode>,
}

impl Stack {
    /// Create an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Stack::default()
    }

    /// Register a node and return its handle.
    ///
    /// Output references embedded in a resource body are scanned and
    /// recorded as dependency edges automatically, de-duplicated against the
    /// explicit `depends_on` list.
    pub fn register(&mut self, mut node: ResourceNode) -> NodeHandle {
        if let NodeKind::Resource { body, .. } = &node.kind {
            let mut referenced = Vec::new();
            collect_refs(body, &mut referenced);
            for index in referenced {
                node.depends_on.push(NodeHandle(index));
            }
        }
        node.depends_on.sort_unstable();
        node.depends_on.dedup();
        self.nodes.push(node);
        NodeHandle(self.nodes.len() - 1)
    }

    /// Register a lookup node.
    pub fn register_lookup(&mut self, name: impl Into<String>, query: LookupQuery) -> NodeHandle {
        self.register(ResourceNode {
            name: name.into(),
            kind: NodeKind::Lookup(query),
            depends_on: Vec::new(),
            options: ResourceOptions::default(),
        })
    }

    /// All registered nodes, in registration order.
    #[must_use]
    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    /// A single node by handle.
    #[must_use]
    pub fn node(&self, handle: NodeHandle) -> &ResourceNode {
        &self.nodes[handle.0]
    }

    /// Number of registered nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the stack has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Deterministic topological ordering of the graph.
    ///
    /// Kahn's algorithm; among ready nodes, the lowest registration index is
    /// applied first, so orderings are stable across runs for the same
    /// settings.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::DependencyCycle`] naming a node on the
    /// cycle when the declared dependencies are not acyclic.
    pub fn deploy_order(&self) -> Result<Vec<NodeHandle>, ProvisionError> {
        let total = self.nodes.len();
        // indegree[i] = number of unapplied dependencies of node i
        let mut indegree: Vec<usize> = self.nodes.iter().map(|n| n.depends_on.len()).collect();

        let mut order = Vec::with_capacity(total);
        let mut applied = vec![false; total];

        while order.len() < total {
            let next = (0..total).find(|&i| !applied[i] && indegree[i] == 0);
            let Some(ready) = next else {
                // Every remaining node waits on another remaining node.
                let stuck = (0..total)
                    .find(|&i| !applied[i])
                    .map(|i| self.nodes[i].name.clone())
                    .unwrap_or_default();
                return Err(ProvisionError::DependencyCycle { node: stuck });
            };
            applied[ready] = true;
            order.push(NodeHandle(ready));
            for (index, node) in self.nodes.iter().enumerate() {
                if !applied[index] && node.depends_on.contains(&NodeHandle(ready)) {
                    indegree[index] -= 1;
                }
            }
        }

        Ok(order)
    }
}
