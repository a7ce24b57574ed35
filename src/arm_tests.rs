// Copyright (c) 2025 azenv contributors
// SPDX-License-Identifier: MIT

//! Unit tests for the ARM provisioner, against a mock HTTP server.

#[cfg(test)]
mod tests {
    use crate::arm::ArmProvisioner;
    use crate::engine::{ApplyRequest, Provisioner};
    use crate::errors::ProvisionError;
    use crate::stack::{LookupQuery, ResourceOptions};
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SUB: &str = "00000000-0000-0000-0000-00000000abcd";

    async fn provisioner(server: &MockServer) -> ArmProvisioner {
        ArmProvisioner::with_base_urls(
            SUB,
            Some("test-token".to_string()),
            server.uri(),
            server.uri(),
        )
        .unwrap()
    }

    fn apply_request(options: ResourceOptions) -> ApplyRequest {
        ApplyRequest {
            name: "devstg".to_string(),
            arm_type: "Microsoft.Storage/storageAccounts".to_string(),
            api_version: "2023-01-01".to_string(),
            arm_path: "Microsoft.Storage/storageAccounts/devstg".to_string(),
            resource_group: "rg-workload".to_string(),
            location: Some("eastus".to_string()),
            body: json!({
                "sku": { "name": "Standard_GZRS" },
                "properties": { "publicNetworkAccess": "Disabled" },
            }),
            options,
        }
    }

    #[test]
    fn test_missing_token_is_rejected() {
        let err = ArmProvisioner::new(SUB, None).unwrap_err();
        assert!(matches!(err, ProvisionError::MissingToken));
    }

    #[tokio::test]
    async fn test_apply_puts_to_arm_url_with_auth() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(format!(
                "/subscriptions/{SUB}/resourceGroups/rg-workload/providers/Microsoft.Storage/storageAccounts/devstg"
            )))
            .and(query_param("api-version", "2023-01-01"))
            .and(header("Authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "/subscriptions/s/devstg",
                "name": "devstg",
                "properties": { "provisioningState": "Succeeded" },
            })))
            .expect(1)
            .mount(&server)
            .await;

        let state = provisioner(&server)
            .await
            .apply(apply_request(ResourceOptions::default()))
            .await
            .unwrap();

        assert_eq!(state.id, "/subscriptions/s/devstg");
        assert_eq!(state.name, "devstg");
        assert_eq!(
            state.outputs["properties"]["provisioningState"],
            json!("Succeeded")
        );
    }

    #[tokio::test]
    async fn test_apply_merges_location_into_body() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(wiremock::matchers::body_json(json!({
                "location": "eastus",
                "sku": { "name": "Standard_GZRS" },
                "properties": { "publicNetworkAccess": "Disabled" },
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "/subscriptions/s/devstg",
            })))
            .expect(1)
            .mount(&server)
            .await;

        provisioner(&server)
            .await
            .apply(apply_request(ResourceOptions::default()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_apply_without_options_skips_precheck_get() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "x" })))
            .mount(&server)
            .await;

        provisioner(&server)
            .await
            .apply(apply_request(ResourceOptions::default()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_drifted_resource_deleted_before_recreate() {
        let server = MockServer::start().await;
        // Live resource disagrees on a watched field.
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "/subscriptions/s/devstg",
                "sku": { "name": "Standard_LRS" },
                "properties": { "publicNetworkAccess": "Disabled" },
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "/subscriptions/s/devstg",
            })))
            .expect(1)
            .mount(&server)
            .await;

        provisioner(&server)
            .await
            .apply(apply_request(ResourceOptions::replace_all_ignore_tags()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_matching_resource_not_deleted() {
        let server = MockServer::start().await;
        // Live resource matches the desired body (plus server-added fields).
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "/subscriptions/s/devstg",
                "location": "eastus",
                "sku": { "name": "Standard_GZRS", "tier": "Standard" },
                "properties": {
                    "publicNetworkAccess": "Disabled",
                    "provisioningState": "Succeeded",
                },
                "tags": { "owner": "someone-else" },
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "/subscriptions/s/devstg",
            })))
            .expect(1)
            .mount(&server)
            .await;

        provisioner(&server)
            .await
            .apply(apply_request(ResourceOptions::replace_all_ignore_tags()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_failed_put_surfaces_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(409).set_body_string("name taken"))
            .mount(&server)
            .await;

        let err = provisioner(&server)
            .await
            .apply(apply_request(ResourceOptions::default()))
            .await
            .unwrap_err();

        match err {
            ProvisionError::RequestFailed { method, status, body, .. } => {
                assert_eq!(method, "PUT");
                assert_eq!(status, 409);
                assert_eq!(body, "name taken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_failed_provisioning_state_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "/subscriptions/s/devstg",
                "properties": { "provisioningState": "Failed" },
            })))
            .mount(&server)
            .await;

        let err = provisioner(&server)
            .await
            .apply(apply_request(ResourceOptions::default()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed"));
    }

    #[tokio::test]
    async fn test_subnet_lookup_builds_network_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!(
                "/subscriptions/{SUB}/resourceGroups/rg-net/providers/Microsoft.Network/virtualNetworks/vnet-spoke/subnets/snet-pe"
            )))
            .and(query_param("api-version", "2023-09-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "/subscriptions/s/subnets/snet-pe",
                "name": "snet-pe",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outputs = provisioner(&server)
            .await
            .lookup(&LookupQuery::Subnet {
                resource_group: "rg-net".to_string(),
                vnet: "vnet-spoke".to_string(),
                subnet: "snet-pe".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(outputs["id"], json!("/subscriptions/s/subnets/snet-pe"));
    }

    #[tokio::test]
    async fn test_missing_subnet_is_typed_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = provisioner(&server)
            .await
            .lookup(&LookupQuery::Subnet {
                resource_group: "rg-net".to_string(),
                vnet: "vnet-spoke".to_string(),
                subnet: "snet-missing".to_string(),
            })
            .await
            .unwrap_err();

        match err {
            ProvisionError::SubnetNotFound { subnet, vnet, resource_group } => {
                assert_eq!(subnet, "snet-missing");
                assert_eq!(vnet, "vnet-spoke");
                assert_eq!(resource_group, "rg-net");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_zone_is_typed_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = provisioner(&server)
            .await
            .lookup(&LookupQuery::PrivateDnsZone {
                resource_group: "rg-hub-dns".to_string(),
                zone: "privatelink.blob.core.windows.net".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::ZoneNotFound { .. }));
    }

    #[tokio::test]
    async fn test_user_lookup_uses_graph_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.0/users/alice@example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "11111111-2222-3333-4444-555555555555",
                "userPrincipalName": "alice@example.com",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outputs = provisioner(&server)
            .await
            .lookup(&LookupQuery::UserObjectId {
                email: "alice@example.com".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(outputs["id"], json!("11111111-2222-3333-4444-555555555555"));
    }

    #[tokio::test]
    async fn test_unknown_user_is_typed_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = provisioner(&server)
            .await
            .lookup(&LookupQuery::UserObjectId {
                email: "ghost@example.com".to_string(),
            })
            .await
            .unwrap_err();

        match err {
            ProvisionError::UserNotFound { email } => assert_eq!(email, "ghost@example.com"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
