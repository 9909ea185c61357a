//! alicloud_security_group

use async_trait::async_trait;
use std::time::Duration;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceWithConfigure, UpdateResourceRequest,
    UpdateResourceResponse, ValidateResourceConfigRequest,
};
use tfplug::{
    AttributeBuilder, AttributeType, Diagnostic, Diagnostics, DynamicValue, Schema,
    SchemaBuilder, Timeouts,
};

use crate::api::ecs::{
    CreateSecurityGroupRequest, ModifySecurityGroupAttributeRequest, SecurityGroup,
    SecurityGroupAttribute,
};
use crate::api::response::{map_to_tags, tags_to_map};
use crate::api::{ClientToken, InnerAccessPolicy};
use crate::handler::{
    changed_bool, changed_string, extract_provider_data, path, set_optional_string, string_map,
    Deadline, HandlerError, HandlerResult,
};
use crate::AlicloudProviderData;

const TYPE_NAME: &str = "alicloud_security_group";
const GROUP_TYPES: &[&str] = &["normal", "enterprise"];

#[derive(Default)]
pub struct SecurityGroupResource {
    provider_data: Option<AlicloudProviderData>,
}

impl SecurityGroupResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> HandlerResult<&AlicloudProviderData> {
        self.provider_data.as_ref().ok_or(HandlerError::NotConfigured)
    }

    fn apply(
        state: &mut DynamicValue,
        group: &SecurityGroup,
        attribute: &SecurityGroupAttribute,
    ) -> HandlerResult<()> {
        state.set_string(&path("id"), group.security_group_id.as_str())?;
        set_optional_string(state, "name", &group.security_group_name)?;
        set_optional_string(state, "description", &group.description)?;
        set_optional_string(state, "vpc_id", &group.vpc_id)?;
        state.set_string(&path("security_group_type"), group.security_group_type.as_str())?;
        set_optional_string(state, "resource_group_id", &group.resource_group_id)?;
        state.set_bool(&path("inner_access"), attribute.inner_access_policy.into())?;
        state.set_map(&path("tags"), string_map(&tags_to_map(&group.tags)))?;
        Ok(())
    }

    /// Both describes are needed for a full read; the inner access policy
    /// only comes back from DescribeSecurityGroupAttribute
    async fn read_group(&self, id: &str, state: &mut DynamicValue) -> HandlerResult<()> {
        let api = self.data()?.ecs()?;
        let (group, attribute) = futures::try_join!(
            api.describe_security_group(id),
            api.describe_security_group_attribute(id)
        )?;
        Self::apply(state, &group, &attribute)
    }

    async fn create_group(
        &self,
        request: &CreateResourceRequest,
        state: &mut DynamicValue,
    ) -> HandlerResult<()> {
        let api = self.data()?.ecs()?;
        let deadline = Deadline::after(request.timeout);
        let config = &request.config;

        let create = CreateSecurityGroupRequest {
            vpc_id: config.get_string_opt(&path("vpc_id")),
            security_group_name: config.get_string_opt(&path("name")),
            description: config.get_string_opt(&path("description")),
            security_group_type: config.get_string_opt(&path("security_group_type")),
            resource_group_id: config.get_string_opt(&path("resource_group_id")),
            tag: map_to_tags(&config.get_string_map(&path("tags"))),
            client_token: Some(ClientToken::new()),
        };
        let id = api
            .create_security_group(create, deadline.remaining())
            .await?;
        state.set_string(&path("id"), id.as_str())?;

        if let Some(inner_access) = config.get_bool_opt(&path("inner_access")) {
            api.set_inner_access(&id, InnerAccessPolicy::from(inner_access), deadline.remaining())
                .await?;
        }

        self.read_group(&id, state).await
    }

    async fn update_group(
        &self,
        request: &UpdateResourceRequest,
        state: &mut DynamicValue,
    ) -> HandlerResult<()> {
        let api = self.data()?.ecs()?;
        let deadline = Deadline::after(request.timeout);
        let prior = &request.prior_state;
        let config = &request.config;
        let id = prior.get_string(&path("id"))?;
        state.set_string(&path("id"), id.as_str())?;

        let modify = ModifySecurityGroupAttributeRequest {
            security_group_id: id.clone(),
            security_group_name: changed_string(prior, config, "name"),
            description: changed_string(prior, config, "description"),
        };
        if !modify.is_empty() {
            api.modify_security_group(&modify, deadline.remaining())
                .await?;
        }
        if let Some(inner_access) = changed_bool(prior, config, "inner_access") {
            api.set_inner_access(&id, InnerAccessPolicy::from(inner_access), deadline.remaining())
                .await?;
        }

        self.read_group(&id, state).await
    }

    async fn delete_group(&self, request: &DeleteResourceRequest) -> HandlerResult<()> {
        let api = self.data()?.ecs()?;
        let id = request.prior_state.get_string(&path("id"))?;
        api.delete_security_group(&id, request.timeout).await?;
        Ok(())
    }
}

#[async_trait]
impl Resource for SecurityGroupResource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Manages an ECS security group")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vpc_id", AttributeType::String)
                    .description("VPC the group belongs to")
                    .optional()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("security_group_type", AttributeType::String)
                    .description("normal or enterprise")
                    .optional()
                    .computed()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("resource_group_id", AttributeType::String)
                    .optional()
                    .computed()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("inner_access", AttributeType::Bool)
                    .description("Whether instances in the group can reach each other")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("tags", AttributeType::Map(Box::new(AttributeType::String)))
                    .optional()
                    .force_new()
                    .build(),
            )
            .timeouts(Timeouts::new().delete(Duration::from_secs(10 * 60)))
            .build()
    }

    async fn validate(&self, request: ValidateResourceConfigRequest) -> Diagnostics {
        let mut diagnostics = self.schema().validate(&request.config);
        let config = &request.config;

        let group_type = config.get_string_opt(&path("security_group_type"));
        if let Some(group_type) = &group_type {
            if !GROUP_TYPES.contains(&group_type.as_str()) {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid security_group_type",
                        format!("expected one of {:?}, got {}", GROUP_TYPES, group_type),
                    )
                    .with_attribute(path("security_group_type")),
                );
            }
        }
        if group_type.as_deref() == Some("enterprise")
            && config.get_bool_opt(&path("inner_access")) == Some(true)
        {
            diagnostics.push(
                Diagnostic::error(
                    "Invalid inner_access",
                    "enterprise security groups do not support inner access",
                )
                .with_attribute(path("inner_access")),
            );
        }

        diagnostics
    }

    async fn create(&self, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut new_state = request.planned_state.clone();
        let mut diagnostics = Diagnostics::new();

        if let Err(e) = self.create_group(&request, &mut new_state).await {
            diagnostics.push(e.to_diagnostic("Failed to create security group"));
        }

        CreateResourceResponse {
            new_state,
            diagnostics,
        }
    }

    async fn read(&self, request: ReadResourceRequest) -> ReadResourceResponse {
        let mut diagnostics = Diagnostics::new();

        let id = match request.current_state.get_string(&path("id")) {
            Ok(id) => id,
            Err(_) => {
                return ReadResourceResponse {
                    new_state: None,
                    diagnostics,
                }
            }
        };

        let mut new_state = request.current_state.clone();
        match self.read_group(&id, &mut new_state).await {
            Ok(()) => ReadResourceResponse {
                new_state: Some(new_state),
                diagnostics,
            },
            Err(e) if e.is_not_found() => {
                tracing::warn!(security_group_id = %id, "security group not found, removing from state");
                ReadResourceResponse {
                    new_state: None,
                    diagnostics,
                }
            }
            Err(e) => {
                diagnostics.push(e.to_diagnostic("Failed to read security group"));
                ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics,
                }
            }
        }
    }

    async fn update(&self, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let mut new_state = request.planned_state.clone();
        let mut diagnostics = Diagnostics::new();

        if let Err(e) = self.update_group(&request, &mut new_state).await {
            diagnostics.push(e.to_diagnostic("Failed to update security group"));
        }

        UpdateResourceResponse {
            new_state,
            diagnostics,
        }
    }

    async fn delete(&self, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = Diagnostics::new();

        if let Err(e) = self.delete_group(&request).await {
            diagnostics.push(e.to_diagnostic("Failed to delete security group"));
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for SecurityGroupResource {
    async fn configure(&mut self, request: ConfigureResourceRequest) -> ConfigureResourceResponse {
        let mut diagnostics = Diagnostics::new();

        match extract_provider_data(request.provider_data) {
            Ok(data) => self.provider_data = Some(data),
            Err(diag) => diagnostics.push(diag),
        }

        ConfigureResourceResponse { diagnostics }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{AliyunClient, Config, RetryPolicy};
    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;
    use std::sync::Arc;

    async fn resource(server: &ServerGuard) -> SecurityGroupResource {
        let config = Config::new("cn-hangzhou", "ak", "sk").with_endpoint("ecs", &server.url());
        let data = AlicloudProviderData::new(AliyunClient::new(config).unwrap()).with_retry_policy(
            RetryPolicy::incremental(Duration::from_millis(1), Duration::from_millis(1)),
        );

        let mut resource = SecurityGroupResource::new();
        resource
            .configure(ConfigureResourceRequest {
                provider_data: Some(Arc::new(data)),
            })
            .await;
        resource
    }

    async fn mock_describes(server: &mut ServerGuard, policy: &str) {
        server
            .mock("POST", "/")
            .match_body(Matcher::UrlEncoded("Action".into(), "DescribeSecurityGroups".into()))
            .with_body(r#"{"RequestId":"R","TotalCount":1,"SecurityGroups":{"SecurityGroup":[{"SecurityGroupId":"sg-1","SecurityGroupName":"web","VpcId":"vpc-1","SecurityGroupType":"normal","Tags":{"Tag":[{"TagKey":"team","TagValue":"edge"}]}}]}}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/")
            .match_body(Matcher::UrlEncoded("Action".into(), "DescribeSecurityGroupAttribute".into()))
            .with_body(format!(
                r#"{{"RequestId":"R","SecurityGroupId":"sg-1","SecurityGroupName":"web","VpcId":"vpc-1","InnerAccessPolicy":"{policy}"}}"#
            ))
            .create_async()
            .await;
    }

    #[tokio::test]
    async fn enterprise_groups_reject_inner_access() {
        let diagnostics = SecurityGroupResource::new()
            .validate(ValidateResourceConfigRequest {
                type_name: TYPE_NAME.to_string(),
                config: DynamicValue::from_json(json!({
                    "security_group_type": "enterprise",
                    "inner_access": true
                })),
            })
            .await;

        let errors: Vec<_> = diagnostics.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].attribute, Some(path("inner_access")));
    }

    #[tokio::test]
    async fn create_applies_inner_access_policy() {
        let mut server = Server::new_async().await;
        let create = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("Action".into(), "CreateSecurityGroup".into()),
                Matcher::UrlEncoded("VpcId".into(), "vpc-1".into()),
                Matcher::Regex("ClientToken=".into()),
            ]))
            .with_body(r#"{"RequestId":"R","SecurityGroupId":"sg-1"}"#)
            .expect(1)
            .create_async()
            .await;
        let policy = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("Action".into(), "ModifySecurityGroupPolicy".into()),
                Matcher::UrlEncoded("InnerAccessPolicy".into(), "Drop".into()),
            ]))
            .with_body(r#"{"RequestId":"R"}"#)
            .expect(1)
            .create_async()
            .await;
        mock_describes(&mut server, "Drop").await;

        let config = json!({"name": "web", "vpc_id": "vpc-1", "inner_access": false});
        let response = resource(&server)
            .await
            .create(CreateResourceRequest {
                type_name: TYPE_NAME.to_string(),
                config: DynamicValue::from_json(config.clone()),
                planned_state: DynamicValue::from_json(config),
                timeout: Duration::from_secs(10),
            })
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.new_state;
        assert_eq!(state.get_string(&path("id")).unwrap(), "sg-1");
        assert!(!state.get_bool(&path("inner_access")).unwrap());
        assert_eq!(state.get_string(&path("security_group_type")).unwrap(), "normal");
        create.assert_async().await;
        policy.assert_async().await;
    }

    #[tokio::test]
    async fn read_maps_both_describes() {
        let mut server = Server::new_async().await;
        mock_describes(&mut server, "Accept").await;

        let response = resource(&server)
            .await
            .read(ReadResourceRequest {
                type_name: TYPE_NAME.to_string(),
                current_state: DynamicValue::from_json(json!({"id": "sg-1"})),
                timeout: Duration::from_secs(10),
            })
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.new_state.unwrap();
        assert!(state.get_bool(&path("inner_access")).unwrap());
        assert_eq!(state.get_string(&path("vpc_id")).unwrap(), "vpc-1");
        assert!(state.get(&path("description")).unwrap().is_null());
    }

    #[tokio::test]
    async fn read_of_missing_group_drops_state() {
        let mut server = Server::new_async().await;
        let _list = server
            .mock("POST", "/")
            .match_body(Matcher::UrlEncoded("Action".into(), "DescribeSecurityGroups".into()))
            .with_body(r#"{"RequestId":"R","TotalCount":0,"SecurityGroups":{"SecurityGroup":[]}}"#)
            .create_async()
            .await;
        let _attribute = server
            .mock("POST", "/")
            .match_body(Matcher::UrlEncoded("Action".into(), "DescribeSecurityGroupAttribute".into()))
            .with_status(404)
            .with_body(r#"{"Code":"InvalidSecurityGroupId.NotFound","Message":"gone","RequestId":"R"}"#)
            .create_async()
            .await;

        let response = resource(&server)
            .await
            .read(ReadResourceRequest {
                type_name: TYPE_NAME.to_string(),
                current_state: DynamicValue::from_json(json!({"id": "sg-1"})),
                timeout: Duration::from_secs(10),
            })
            .await;

        assert!(response.new_state.is_none());
        assert!(response.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn update_only_touches_inner_access_when_it_changed() {
        let mut server = Server::new_async().await;
        let modify = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("Action".into(), "ModifySecurityGroupAttribute".into()),
                Matcher::UrlEncoded("Description".into(), "frontend".into()),
            ]))
            .with_body(r#"{"RequestId":"R"}"#)
            .expect(1)
            .create_async()
            .await;
        let policy = server
            .mock("POST", "/")
            .match_body(Matcher::UrlEncoded("Action".into(), "ModifySecurityGroupPolicy".into()))
            .expect(0)
            .create_async()
            .await;
        mock_describes(&mut server, "Accept").await;

        let prior = json!({"id": "sg-1", "name": "web", "inner_access": true});
        let config = json!({"name": "web", "description": "frontend", "inner_access": true});
        let response = resource(&server)
            .await
            .update(UpdateResourceRequest {
                type_name: TYPE_NAME.to_string(),
                prior_state: DynamicValue::from_json(prior),
                planned_state: DynamicValue::from_json(config.clone()),
                config: DynamicValue::from_json(config),
                timeout: Duration::from_secs(10),
            })
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        modify.assert_async().await;
        policy.assert_async().await;
    }
}
