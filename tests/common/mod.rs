// Common test utilities for integration tests

use async_trait::async_trait;
use azenv::engine::{ApplyRequest, Provisioner, ResourceState};
use azenv::errors::ProvisionError;
use azenv::stack::LookupQuery;
use serde_json::{json, Value};
use std::sync::Mutex;

/// In-memory provisioner recording every apply and answering lookups with
/// canned state shaped like the live APIs would return it.
#[derive(Default)]
pub struct MockProvisioner {
    pub applied: Mutex<Vec<ApplyRequest>>,
    pub lookups: Mutex<Vec<LookupQuery>>,
}

#[async_trait]
impl Provisioner for MockProvisioner {
    async fn apply(&self, request: ApplyRequest) -> Result<ResourceState, ProvisionError> {
        let id = format!(
            "/subscriptions/sub/resourceGroups/{}/providers/{}",
            request.resource_group,
            request.arm_path.split('?').next().unwrap_or_default()
        );

        // Zone groups come back with their resolved record sets, which is
        // what downstream record-set nodes read their IPs from.
        let outputs = if request.arm_type == "Microsoft.Network/privateEndpoints/privateDnsZoneGroups" {
            let configs: Vec<Value> = request.body["properties"]["privateDnsZoneConfigs"]
                .as_array()
                .cloned()
                .unwrap_or_default()
                .iter()
                .map(|config| {
                    json!({
                        "name": config["name"],
                        "properties": {
                            "privateDnsZoneId": config["properties"]["privateDnsZoneId"],
                            "recordSets": [{
                                "fqdn": format!("{}.example", request.name),
                                "ipAddresses": ["10.0.0.4"],
                            }],
                        },
                    })
                })
                .collect();
            json!({
                "id": id,
                "name": request.name,
                "properties": { "privateDnsZoneConfigs": configs },
            })
        } else {
            json!({
                "id": id,
                "name": request.name,
                "properties": { "provisioningState": "Succeeded" },
            })
        };

        let state = ResourceState {
            id,
            name: request.name.clone(),
            outputs,
        };
        self.applied.lock().unwrap().push(request);
        Ok(state)
    }

    async fn lookup(&self, query: &LookupQuery) -> Result<Value, ProvisionError> {
        self.lookups.lock().unwrap().push(query.clone());
        let outputs = match query {
            LookupQuery::Subnet { vnet, subnet, .. } => json!({
                "id": format!("/subscriptions/sub/virtualNetworks/{vnet}/subnets/{subnet}"),
                "name": subnet,
            }),
            LookupQuery::PrivateDnsZone { zone, .. } => json!({
                "id": format!("/subscriptions/sub/privateDnsZones/{zone}"),
                "name": zone,
            }),
            LookupQuery::UserObjectId { email } => json!({
                "id": "11111111-2222-3333-4444-555555555555",
                "userPrincipalName": email,
            }),
        };
        Ok(outputs)
    }
}

impl MockProvisioner {
    /// Names of applied resources, in apply order.
    pub fn applied_names(&self) -> Vec<String> {
        self.applied
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.name.clone())
            .collect()
    }

    /// Position of a resource in the apply order.
    pub fn position_of(&self, name: &str) -> usize {
        self.applied_names()
            .iter()
            .position(|n| n == name)
            .unwrap_or_else(|| panic!("resource '{name}' was never applied"))
    }

    /// The recorded apply request for a resource.
    pub fn request_for(&self, name: &str) -> ApplyRequest {
        self.applied
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.name == name)
            .cloned()
            .unwrap_or_else(|| panic!("resource '{name}' was never applied"))
    }
}
