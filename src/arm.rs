// Copyright (c) 2025 azenv contributors
// SPDX-License-Identifier: MIT

//! Azure Resource Manager provisioner.
//!
//! Implements [`Provisioner`] against the ARM REST API (and Microsoft Graph
//! for directory user lookups). Managed resources are applied with PUT,
//! which ARM treats as an upsert; replace semantics are emulated by reading
//! the live resource first and issuing DELETE-then-PUT when a watched field
//! drifted. Lookups are plain GETs with 404 mapped to the typed not-found
//! errors.
//!
//! There is no retry policy here: a failed call surfaces as a fatal
//! [`ProvisionError`], and state convergence is ARM's job. The only local
//! waiting is a bounded poll for a terminal `provisioningState` after PUT,
//! so downstream readers (zone-group record sets) observe populated outputs.

use crate::constants::{
    ARM_BASE_URL, GRAPH_BASE_URL, NETWORK_API_VERSION, PRIVATE_DNS_API_VERSION,
    PROVISION_POLL_INTERVAL_SECS, PROVISION_POLL_MAX_ATTEMPTS,
};
use crate::engine::{ApplyRequest, Provisioner, ResourceState};
use crate::errors::ProvisionError;
use crate::stack::{LookupQuery, ResourceOptions};
use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Provisioner backed by the ARM and Graph REST APIs.
#[derive(Debug)]
pub struct ArmProvisioner {
    http: HttpClient,
    arm_base_url: String,
    graph_base_url: String,
    subscription_id: String,
    token: String,
}

impl ArmProvisioner {
    /// Create a provisioner for a subscription.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::MissingToken`] when no access token is
    /// supplied.
    pub fn new(
        subscription_id: impl Into<String>,
        token: Option<String>,
    ) -> Result<Self, ProvisionError> {
        Self::with_base_urls(subscription_id, token, ARM_BASE_URL, GRAPH_BASE_URL)
    }

    /// Create a provisioner with explicit base URLs (used by tests).
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::MissingToken`] when no access token is
    /// supplied.
    pub fn with_base_urls(
        subscription_id: impl Into<String>,
        token: Option<String>,
        arm_base_url: impl Into<String>,
        graph_base_url: impl Into<String>,
    ) -> Result<Self, ProvisionError> {
        let token = token.ok_or(ProvisionError::MissingToken)?;
        Ok(ArmProvisioner {
            http: HttpClient::new(),
            arm_base_url: arm_base_url.into().trim_end_matches('/').to_string(),
            graph_base_url: graph_base_url.into().trim_end_matches('/').to_string(),
            subscription_id: subscription_id.into(),
            token,
        })
    }

    /// Full URL for a managed resource.
    fn resource_url(&self, resource_group: &str, arm_path: &str, api_version: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/{}?api-version={}",
            self.arm_base_url, self.subscription_id, resource_group, arm_path, api_version
        )
    }

    /// Issue one HTTP request and return (status, body text).
    async fn send(
        &self,
        method: &str,
        url: &str,
        body: Option<&Value>,
    ) -> Result<(StatusCode, String), ProvisionError> {
        debug!(method = %method, url = %url, "ARM request");

        let mut request = match method {
            "GET" => self.http.get(url),
            "PUT" => self.http.put(url),
            "DELETE" => self.http.delete(url),
            other => {
                // Only the three verbs above are ever built internally.
                unreachable!("unsupported HTTP method: {other}")
            }
        };
        if let Some(json_body) = body {
            request = request.json(json_body);
        }
        request = request.header("Authorization", format!("Bearer {}", self.token));

        let response = request
            .send()
            .await
            .map_err(|source| ProvisionError::Transport {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|source| ProvisionError::Transport {
                url: url.to_string(),
                source,
            })?;

        debug!(method = %method, url = %url, status = %status, "ARM response");
        Ok((status, text))
    }

    /// GET a resource, returning `None` on 404.
    async fn get_existing(&self, url: &str) -> Result<Option<Value>, ProvisionError> {
        let (status, text) = self.send("GET", url, None).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ProvisionError::RequestFailed {
                method: "GET".to_string(),
                url: url.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }
        let parsed = serde_json::from_str(&text).unwrap_or(Value::Null);
        Ok(Some(parsed))
    }

    /// Wait for a terminal `provisioningState` on the applied resource.
    async fn await_terminal_state(
        &self,
        name: &str,
        url: &str,
        mut current: Value,
    ) -> Result<Value, ProvisionError> {
        let mut attempts = 0;
        loop {
            let state = current
                .pointer("/properties/provisioningState")
                .and_then(Value::as_str)
                .unwrap_or("Succeeded")
                .to_string();
            match state.as_str() {
                "Succeeded" => return Ok(current),
                "Failed" | "Canceled" => {
                    return Err(ProvisionError::RequestFailed {
                        method: "PUT".to_string(),
                        url: url.to_string(),
                        status: 200,
                        body: format!("resource '{name}' ended in provisioningState {state}"),
                    });
                }
                _ => {
                    attempts += 1;
                    if attempts > PROVISION_POLL_MAX_ATTEMPTS {
                        return Err(ProvisionError::ProvisioningTimeout {
                            name: name.to_string(),
                            state,
                            attempts: attempts - 1,
                        });
                    }
                    debug!(name = %name, state = %state, attempt = attempts, "Waiting for terminal provisioningState");
                    tokio::time::sleep(Duration::from_secs(PROVISION_POLL_INTERVAL_SECS)).await;
                    current = self
                        .get_existing(url)
                        .await?
                        .unwrap_or(Value::Null);
                }
            }
        }
    }
}

#[async_trait]
impl Provisioner for ArmProvisioner {
    async fn apply(&self, request: ApplyRequest) -> Result<ResourceState, ProvisionError> {
        let url = self.resource_url(
            &request.resource_group,
            &request.arm_path,
            &request.api_version,
        );

        // Merge location into the PUT body; tracked resources require it.
        let mut desired = request.body.clone();
        if let (Some(location), Value::Object(map)) = (&request.location, &mut desired) {
            map.entry("location")
                .or_insert_with(|| Value::String(location.clone()));
        }

        // Replace semantics: the provider cannot update these types in
        // place, so a drifted watched field means delete-then-recreate.
        if !request.options.replace_on_changes.is_empty() {
            if let Some(existing) = self.get_existing(&url).await? {
                if requires_replacement(&desired, &existing, &request.options) {
                    warn!(
                        name = %request.name,
                        arm_type = %request.arm_type,
                        "Watched field changed, deleting resource before re-create"
                    );
                    if request.options.delete_before_replace {
                        let (status, text) = self.send("DELETE", &url, None).await?;
                        if !status.is_success() && status != StatusCode::NOT_FOUND {
                            return Err(ProvisionError::RequestFailed {
                                method: "DELETE".to_string(),
                                url: url.clone(),
                                status: status.as_u16(),
                                body: text,
                            });
                        }
                    }
                }
            }
        }

        let (status, text) = self.send("PUT", &url, Some(&desired)).await?;
        if !status.is_success() {
            return Err(ProvisionError::RequestFailed {
                method: "PUT".to_string(),
                url,
                status: status.as_u16(),
                body: text,
            });
        }

        let applied: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        let applied = self.await_terminal_state(&request.name, &url, applied).await?;

        let id = applied
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        info!(name = %request.name, id = %id, "ARM resource converged");

        Ok(ResourceState {
            id,
            name: request.name,
            outputs: applied,
        })
    }

    async fn lookup(&self, query: &LookupQuery) -> Result<Value, ProvisionError> {
        match query {
            LookupQuery::Subnet {
                resource_group,
                vnet,
                subnet,
            } => {
                let path = format!(
                    "Microsoft.Network/virtualNetworks/{vnet}/subnets/{subnet}"
                );
                let url = self.resource_url(resource_group, &path, NETWORK_API_VERSION);
                self.get_existing(&url)
                    .await?
                    .ok_or_else(|| ProvisionError::SubnetNotFound {
                        subnet: subnet.clone(),
                        vnet: vnet.clone(),
                        resource_group: resource_group.clone(),
                    })
            }
            LookupQuery::PrivateDnsZone {
                resource_group,
                zone,
            } => {
                let path = format!("Microsoft.Network/privateDnsZones/{zone}");
                let url = self.resource_url(resource_group, &path, PRIVATE_DNS_API_VERSION);
                self.get_existing(&url)
                    .await?
                    .ok_or_else(|| ProvisionError::ZoneNotFound {
                        zone: zone.clone(),
                        resource_group: resource_group.clone(),
                    })
            }
            LookupQuery::UserObjectId { email } => {
                let url = format!("{}/v1.0/users/{}", self.graph_base_url, email);
                let (status, text) = self.send("GET", &url, None).await?;
                if status == StatusCode::NOT_FOUND {
                    return Err(ProvisionError::UserNotFound {
                        email: email.clone(),
                    });
                }
                if !status.is_success() {
                    return Err(ProvisionError::RequestFailed {
                        method: "GET".to_string(),
                        url,
                        status: status.as_u16(),
                        body: text,
                    });
                }
                Ok(serde_json::from_str(&text).unwrap_or(Value::Null))
            }
        }
    }
}

/// Decide whether a live resource must be recreated.
///
/// With `replace_on_changes: ["*"]`, every desired field outside
/// `ignore_changes` is compared; otherwise only the listed paths are. A
/// desired field missing from the live resource, or present with a
/// different value, triggers replacement. Server-populated fields absent
/// from the desired body never do.
fn requires_replacement(desired: &Value, existing: &Value, options: &ResourceOptions) -> bool {
    let ignored: Vec<&str> = options.ignore_changes.iter().map(String::as_str).collect();

    if options.replace_on_changes.iter().any(|p| p == "*") {
        let Value::Object(desired_map) = desired else {
            return desired != existing;
        };
        return desired_map.iter().any(|(key, value)| {
            if ignored.contains(&key.as_str()) {
                return false;
            }
            !is_subset(value, existing.get(key).unwrap_or(&Value::Null))
        });
    }

    options.replace_on_changes.iter().any(|path| {
        if ignored.contains(&path.as_str()) {
            return false;
        }
        let desired_at = value_at(desired, path);
        let existing_at = value_at(existing, path);
        match (desired_at, existing_at) {
            (Some(want), Some(have)) => !is_subset(&want, &have),
            (Some(_), None) => true,
            (None, _) => false,
        }
    })
}

/// Subset comparison: every field of `desired` must match `existing`.
///
/// Objects compare per key (extra keys in `existing` are fine, since the
/// provider adds read-only fields); arrays compare by length and position;
/// scalars compare by equality.
fn is_subset(desired: &Value, existing: &Value) -> bool {
    match (desired, existing) {
        (Value::Object(want), Value::Object(have)) => want
            .iter()
            .all(|(key, value)| is_subset(value, have.get(key).unwrap_or(&Value::Null))),
        (Value::Array(want), Value::Array(have)) => {
            want.len() == have.len()
                && want.iter().zip(have.iter()).all(|(w, h)| is_subset(w, h))
        }
        (want, have) => want == have,
    }
}

/// Follow a dot-separated path through a JSON value.
fn value_at(value: &Value, path: &str) -> Option<Value> {
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
