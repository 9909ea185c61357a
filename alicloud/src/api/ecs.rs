//! ECS security groups

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::client::{Idempotency, Product, RpcAction, RpcClient};
use super::common::{ClientToken, InnerAccessPolicy};
use super::error::ApiError;
use super::paginate::{collect_pages, DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE};
use super::response::{string_or_u64, wrapped_list, Empty, Tag};
use super::retry::{default_classifier, retry_on, RetryPolicy, READ_RETRY_TIMEOUT};

pub const SECURITY_GROUP_NOT_FOUND: &[&str] = &["InvalidSecurityGroupId.NotFound"];

const SECURITY_GROUP_DELETE_RETRY: &[&str] = &["DependencyViolation"];

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SecurityGroup {
    pub security_group_id: String,
    pub security_group_name: String,
    pub description: String,
    pub vpc_id: String,
    pub security_group_type: String,
    pub resource_group_id: String,
    pub creation_time: String,
    #[serde(deserialize_with = "wrapped_list")]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateSecurityGroupRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_group_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_group_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tag: Vec<Tag>,
    pub client_token: Option<ClientToken>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateSecurityGroupResponse {
    pub security_group_id: String,
}

impl RpcAction for CreateSecurityGroupRequest {
    type Response = CreateSecurityGroupResponse;
    const ACTION: &'static str = "CreateSecurityGroup";
    const PRODUCT: Product = Product::Ecs;
    const IDEMPOTENCY: Idempotency = Idempotency::ClientToken;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeSecurityGroupAttributeRequest {
    pub security_group_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecurityGroupAttribute {
    pub security_group_id: String,
    #[serde(default)]
    pub security_group_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub vpc_id: String,
    pub inner_access_policy: InnerAccessPolicy,
}

impl RpcAction for DescribeSecurityGroupAttributeRequest {
    type Response = SecurityGroupAttribute;
    const ACTION: &'static str = "DescribeSecurityGroupAttribute";
    const PRODUCT: Product = Product::Ecs;
    const IDEMPOTENCY: Idempotency = Idempotency::ReadOnly;
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeSecurityGroupsRequest {
    /// JSON encoded id list, e.g. `["sg-1","sg-2"]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_group_ids: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
    pub page_number: u32,
    pub page_size: u32,
}

impl DescribeSecurityGroupsRequest {
    pub fn by_ids(ids: &[&str]) -> Result<Self, ApiError> {
        let encoded =
            serde_json::to_string(ids).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        Ok(Self {
            security_group_ids: Some(encoded),
            ..Default::default()
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeSecurityGroupsResponse {
    #[serde(default, deserialize_with = "string_or_u64::deserialize")]
    pub total_count: u64,
    #[serde(default, deserialize_with = "wrapped_list")]
    pub security_groups: Vec<SecurityGroup>,
}

impl RpcAction for DescribeSecurityGroupsRequest {
    type Response = DescribeSecurityGroupsResponse;
    const ACTION: &'static str = "DescribeSecurityGroups";
    const PRODUCT: Product = Product::Ecs;
    const IDEMPOTENCY: Idempotency = Idempotency::ReadOnly;
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifySecurityGroupAttributeRequest {
    pub security_group_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_group_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ModifySecurityGroupAttributeRequest {
    pub fn is_empty(&self) -> bool {
        self.security_group_name.is_none() && self.description.is_none()
    }
}

impl RpcAction for ModifySecurityGroupAttributeRequest {
    type Response = Empty;
    const ACTION: &'static str = "ModifySecurityGroupAttribute";
    const PRODUCT: Product = Product::Ecs;
    const IDEMPOTENCY: Idempotency = Idempotency::Natural;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifySecurityGroupPolicyRequest {
    pub security_group_id: String,
    pub inner_access_policy: InnerAccessPolicy,
}

impl RpcAction for ModifySecurityGroupPolicyRequest {
    type Response = Empty;
    const ACTION: &'static str = "ModifySecurityGroupPolicy";
    const PRODUCT: Product = Product::Ecs;
    const IDEMPOTENCY: Idempotency = Idempotency::Natural;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteSecurityGroupRequest {
    pub security_group_id: String,
}

impl RpcAction for DeleteSecurityGroupRequest {
    type Response = Empty;
    const ACTION: &'static str = "DeleteSecurityGroup";
    const PRODUCT: Product = Product::Ecs;
    const IDEMPOTENCY: Idempotency = Idempotency::Natural;
}

pub struct EcsApi {
    rpc: RpcClient,
    policy: RetryPolicy,
}

impl EcsApi {
    pub fn new(rpc: RpcClient) -> Self {
        Self {
            rpc,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn create_security_group(
        &self,
        mut request: CreateSecurityGroupRequest,
        timeout: Duration,
    ) -> Result<String, ApiError> {
        request.client_token.get_or_insert_with(ClientToken::new);
        let response = self
            .rpc
            .call_with_retry(&request, timeout, &self.policy, default_classifier)
            .await
            .map_err(|e| e.context("", CreateSecurityGroupRequest::ACTION))?;
        tracing::info!(security_group_id = %response.security_group_id, "created security group");
        Ok(response.security_group_id)
    }

    pub async fn describe_security_group(&self, id: &str) -> Result<SecurityGroup, ApiError> {
        let mut request = DescribeSecurityGroupsRequest::by_ids(&[id])?;
        request.page_number = 1;
        request.page_size = DEFAULT_PAGE_SIZE as u32;

        let response = self
            .rpc
            .call_with_retry(&request, READ_RETRY_TIMEOUT, &self.policy, default_classifier)
            .await
            .map_err(|e| e.context(id, DescribeSecurityGroupsRequest::ACTION))?;

        response
            .security_groups
            .into_iter()
            .find(|group| group.security_group_id == id)
            .ok_or_else(|| ApiError::not_found("SecurityGroup", id))
    }

    pub async fn describe_security_group_attribute(
        &self,
        id: &str,
    ) -> Result<SecurityGroupAttribute, ApiError> {
        let request = DescribeSecurityGroupAttributeRequest {
            security_group_id: id.to_string(),
        };
        self.rpc
            .call_with_retry(&request, READ_RETRY_TIMEOUT, &self.policy, default_classifier)
            .await
            .map_err(|e| {
                if e.is_expected(SECURITY_GROUP_NOT_FOUND) {
                    ApiError::not_found("SecurityGroup", id)
                } else {
                    e.context(id, DescribeSecurityGroupAttributeRequest::ACTION)
                }
            })
    }

    pub async fn list_security_groups(
        &self,
        vpc_id: Option<&str>,
    ) -> Result<Vec<SecurityGroup>, ApiError> {
        collect_pages(DEFAULT_PAGE_SIZE, DEFAULT_MAX_PAGES, |page| {
            let request = DescribeSecurityGroupsRequest {
                vpc_id: vpc_id.map(str::to_string),
                page_number: page,
                page_size: DEFAULT_PAGE_SIZE as u32,
                ..Default::default()
            };
            async move {
                self.rpc
                    .call_with_retry(&request, READ_RETRY_TIMEOUT, &self.policy, default_classifier)
                    .await
                    .map(|response| response.security_groups)
                    .map_err(|e| e.context("", DescribeSecurityGroupsRequest::ACTION))
            }
        })
        .await
    }

    pub async fn modify_security_group(
        &self,
        request: &ModifySecurityGroupAttributeRequest,
        timeout: Duration,
    ) -> Result<(), ApiError> {
        self.rpc
            .call_with_retry(request, timeout, &self.policy, default_classifier)
            .await
            .map_err(|e| {
                e.context(
                    &request.security_group_id,
                    ModifySecurityGroupAttributeRequest::ACTION,
                )
            })?;
        Ok(())
    }

    pub async fn set_inner_access(
        &self,
        id: &str,
        policy: InnerAccessPolicy,
        timeout: Duration,
    ) -> Result<(), ApiError> {
        let request = ModifySecurityGroupPolicyRequest {
            security_group_id: id.to_string(),
            inner_access_policy: policy,
        };
        self.rpc
            .call_with_retry(&request, timeout, &self.policy, default_classifier)
            .await
            .map_err(|e| e.context(id, ModifySecurityGroupPolicyRequest::ACTION))?;
        Ok(())
    }

    pub async fn delete_security_group(&self, id: &str, timeout: Duration) -> Result<(), ApiError> {
        let request = DeleteSecurityGroupRequest {
            security_group_id: id.to_string(),
        };
        match self
            .rpc
            .call_with_retry(
                &request,
                timeout,
                &self.policy,
                retry_on(SECURITY_GROUP_DELETE_RETRY),
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_expected(SECURITY_GROUP_NOT_FOUND) => Ok(()),
            Err(e) => Err(e.context(id, DeleteSecurityGroupRequest::ACTION)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::AliyunClient;
    use crate::api::config::Config;
    use mockito::{Matcher, Server};

    fn api(server: &Server) -> EcsApi {
        let config = Config::new("eu-central-1", "ak", "sk").with_endpoint("ecs", &server.url());
        AliyunClient::new(config)
            .unwrap()
            .ecs()
            .unwrap()
            .with_retry_policy(RetryPolicy::incremental(
                Duration::from_millis(1),
                Duration::from_millis(1),
            ))
    }

    #[tokio::test]
    async fn create_mints_a_client_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("Action".into(), "CreateSecurityGroup".into()),
                Matcher::UrlEncoded("Version".into(), "2014-05-26".into()),
                Matcher::UrlEncoded("RegionId".into(), "eu-central-1".into()),
                Matcher::UrlEncoded("VpcId".into(), "vpc-1".into()),
                Matcher::Regex("ClientToken=[0-9a-f-]{36}".into()),
            ]))
            .with_body(r#"{"RequestId":"R","SecurityGroupId":"sg-1"}"#)
            .create_async()
            .await;

        let id = api(&server)
            .create_security_group(
                CreateSecurityGroupRequest {
                    vpc_id: Some("vpc-1".to_string()),
                    ..Default::default()
                },
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        assert_eq!(id, "sg-1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn attribute_decodes_inner_access_policy() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_body(r#"{"RequestId":"R","SecurityGroupId":"sg-1","SecurityGroupName":"web","VpcId":"vpc-1","InnerAccessPolicy":"Drop","Permissions":{"Permission":[]}}"#)
            .create_async()
            .await;

        let attribute = api(&server)
            .describe_security_group_attribute("sg-1")
            .await
            .unwrap();
        assert_eq!(attribute.inner_access_policy, InnerAccessPolicy::Drop);
        assert!(!bool::from(attribute.inner_access_policy));
    }

    #[tokio::test]
    async fn describe_by_id_sends_json_id_list() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .match_body(Matcher::UrlEncoded(
                "SecurityGroupIds".into(),
                r#"["sg-1"]"#.into(),
            ))
            .with_body(r#"{"TotalCount":0,"SecurityGroups":{"SecurityGroup":[]}}"#)
            .create_async()
            .await;

        let err = api(&server).describe_security_group("sg-1").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn delete_retries_dependency_violation() {
        let mut server = Server::new_async().await;
        let busy = server
            .mock("POST", "/")
            .with_status(403)
            .with_body(r#"{"RequestId":"R1","Code":"DependencyViolation","Message":"instances attached"}"#)
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("POST", "/")
            .with_body(r#"{"RequestId":"R2"}"#)
            .expect(1)
            .create_async()
            .await;

        api(&server)
            .delete_security_group("sg-1", Duration::from_secs(5))
            .await
            .unwrap();
        busy.assert_async().await;
        ok.assert_async().await;
    }
}
