//! VPC product: virtual private clouds and elastic IP addresses

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::client::{Idempotency, Product, RpcAction, RpcClient};
use super::common::{ClientToken, PaymentType};
use super::error::ApiError;
use super::paginate::{collect_pages, DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE};
use super::response::{string_or_u64, wrapped_list, Empty, Tag};
use super::retry::{default_classifier, retry_on, RetryPolicy, READ_RETRY_TIMEOUT};
use super::waiter::Refresh;

pub const VPC_NOT_FOUND: &[&str] = &["InvalidVpcID.NotFound", "Forbidden.VpcNotFound"];
pub const EIP_NOT_FOUND: &[&str] = &["InvalidAllocationId.NotFound"];

const VPC_CREATE_RETRY: &[&str] = &["TaskConflict", "UnknownError"];
const VPC_DELETE_RETRY: &[&str] = &["DependencyViolation.*", "TaskConflict", "IncorrectVpcStatus"];
const EIP_RELEASE_RETRY: &[&str] = &["IncorrectEipStatus", "TaskConflict"];
const EIP_MODIFY_RETRY: &[&str] = &["TaskConflict"];

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Vpc {
    pub vpc_id: String,
    pub vpc_name: String,
    pub cidr_block: String,
    pub description: String,
    pub status: String,
    pub region_id: String,
    #[serde(rename = "VRouterId")]
    pub router_id: String,
    pub is_default: bool,
    pub resource_group_id: String,
    pub ipv6_cidr_block: String,
    pub creation_time: String,
    #[serde(deserialize_with = "wrapped_list")]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateVpcRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cidr_block: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group_id: Option<String>,
    #[serde(rename = "EnableIpv6", skip_serializing_if = "Option::is_none")]
    pub enable_ipv6: Option<bool>,
    pub client_token: Option<ClientToken>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateVpcResponse {
    pub vpc_id: String,
    #[serde(default)]
    pub request_id: String,
}

impl RpcAction for CreateVpcRequest {
    type Response = CreateVpcResponse;
    const ACTION: &'static str = "CreateVpc";
    const PRODUCT: Product = Product::Vpc;
    const IDEMPOTENCY: Idempotency = Idempotency::ClientToken;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeVpcAttributeRequest {
    pub vpc_id: String,
}

impl RpcAction for DescribeVpcAttributeRequest {
    type Response = Vpc;
    const ACTION: &'static str = "DescribeVpcAttribute";
    const PRODUCT: Product = Product::Vpc;
    const IDEMPOTENCY: Idempotency = Idempotency::ReadOnly;
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeVpcsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group_id: Option<String>,
    pub page_number: u32,
    pub page_size: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeVpcsResponse {
    #[serde(default, deserialize_with = "string_or_u64::deserialize")]
    pub total_count: u64,
    #[serde(default, deserialize_with = "wrapped_list")]
    pub vpcs: Vec<Vpc>,
}

impl RpcAction for DescribeVpcsRequest {
    type Response = DescribeVpcsResponse;
    const ACTION: &'static str = "DescribeVpcs";
    const PRODUCT: Product = Product::Vpc;
    const IDEMPOTENCY: Idempotency = Idempotency::ReadOnly;
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyVpcAttributeRequest {
    pub vpc_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cidr_block: Option<String>,
}

impl ModifyVpcAttributeRequest {
    pub fn is_empty(&self) -> bool {
        self.vpc_name.is_none() && self.description.is_none() && self.cidr_block.is_none()
    }
}

impl RpcAction for ModifyVpcAttributeRequest {
    type Response = Empty;
    const ACTION: &'static str = "ModifyVpcAttribute";
    const PRODUCT: Product = Product::Vpc;
    const IDEMPOTENCY: Idempotency = Idempotency::Natural;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteVpcRequest {
    pub vpc_id: String,
}

impl RpcAction for DeleteVpcRequest {
    type Response = Empty;
    const ACTION: &'static str = "DeleteVpc";
    const PRODUCT: Product = Product::Vpc;
    const IDEMPOTENCY: Idempotency = Idempotency::Natural;
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EipAddress {
    pub allocation_id: String,
    pub ip_address: String,
    pub status: String,
    pub name: String,
    pub description: String,
    #[serde(deserialize_with = "string_or_u64::deserialize")]
    pub bandwidth: u64,
    pub internet_charge_type: String,
    pub charge_type: String,
    #[serde(rename = "ISP")]
    pub isp: String,
    pub instance_id: String,
    pub resource_group_id: String,
}

impl EipAddress {
    pub fn payment_type(&self) -> Option<PaymentType> {
        self.charge_type.parse().ok()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AllocateEipAddressRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internet_charge_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_charge_type: Option<PaymentType>,
    #[serde(rename = "ISP", skip_serializing_if = "Option::is_none")]
    pub isp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group_id: Option<String>,
    pub client_token: Option<ClientToken>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AllocateEipAddressResponse {
    pub allocation_id: String,
    #[serde(default)]
    pub eip_address: String,
}

impl RpcAction for AllocateEipAddressRequest {
    type Response = AllocateEipAddressResponse;
    const ACTION: &'static str = "AllocateEipAddress";
    const PRODUCT: Product = Product::Vpc;
    const IDEMPOTENCY: Idempotency = Idempotency::ClientToken;
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeEipAddressesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocation_id: Option<String>,
    pub page_number: u32,
    pub page_size: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeEipAddressesResponse {
    #[serde(default, deserialize_with = "string_or_u64::deserialize")]
    pub total_count: u64,
    #[serde(default, deserialize_with = "wrapped_list")]
    pub eip_addresses: Vec<EipAddress>,
}

impl RpcAction for DescribeEipAddressesRequest {
    type Response = DescribeEipAddressesResponse;
    const ACTION: &'static str = "DescribeEipAddresses";
    const PRODUCT: Product = Product::Vpc;
    const IDEMPOTENCY: Idempotency = Idempotency::ReadOnly;
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyEipAddressAttributeRequest {
    pub allocation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ModifyEipAddressAttributeRequest {
    pub fn is_empty(&self) -> bool {
        self.bandwidth.is_none() && self.name.is_none() && self.description.is_none()
    }
}

impl RpcAction for ModifyEipAddressAttributeRequest {
    type Response = Empty;
    const ACTION: &'static str = "ModifyEipAddressAttribute";
    const PRODUCT: Product = Product::Vpc;
    const IDEMPOTENCY: Idempotency = Idempotency::Natural;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReleaseEipAddressRequest {
    pub allocation_id: String,
}

impl RpcAction for ReleaseEipAddressRequest {
    type Response = Empty;
    const ACTION: &'static str = "ReleaseEipAddress";
    const PRODUCT: Product = Product::Vpc;
    const IDEMPOTENCY: Idempotency = Idempotency::Natural;
}

pub struct VpcApi {
    rpc: RpcClient,
    policy: RetryPolicy,
}

impl VpcApi {
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

    /// Creates a VPC and returns its id. A token is minted when the caller
    /// did not supply one, before the first attempt.
    pub async fn create_vpc(
        &self,
        mut request: CreateVpcRequest,
        timeout: Duration,
    ) -> Result<String, ApiError> {
        request.client_token.get_or_insert_with(ClientToken::new);
        let response = self
            .rpc
            .call_with_retry(&request, timeout, &self.policy, retry_on(VPC_CREATE_RETRY))
            .await
            .map_err(|e| e.context("", CreateVpcRequest::ACTION))?;
        tracing::info!(vpc_id = %response.vpc_id, "created VPC");
        Ok(response.vpc_id)
    }

    pub async fn describe_vpc(&self, vpc_id: &str) -> Result<Vpc, ApiError> {
        let request = DescribeVpcAttributeRequest {
            vpc_id: vpc_id.to_string(),
        };
        let vpc = self
            .rpc
            .call_with_retry(&request, READ_RETRY_TIMEOUT, &self.policy, default_classifier)
            .await
            .map_err(|e| {
                if e.is_expected(VPC_NOT_FOUND) {
                    ApiError::not_found("Vpc", vpc_id)
                } else {
                    e.context(vpc_id, DescribeVpcAttributeRequest::ACTION)
                }
            })?;

        if vpc.vpc_id != vpc_id {
            return Err(ApiError::not_found("Vpc", vpc_id));
        }
        Ok(vpc)
    }

    pub async fn vpc_refresh(&self, vpc_id: &str) -> Result<Refresh<Vpc>, ApiError> {
        Refresh::from_result(self.describe_vpc(vpc_id).await, |vpc| vpc.status.clone())
    }

    /// Every VPC matching `filter`, across all pages
    pub async fn list_vpcs(&self, filter: &DescribeVpcsRequest) -> Result<Vec<Vpc>, ApiError> {
        collect_pages(DEFAULT_PAGE_SIZE, DEFAULT_MAX_PAGES, |page| {
            let request = DescribeVpcsRequest {
                page_number: page,
                page_size: DEFAULT_PAGE_SIZE as u32,
                ..filter.clone()
            };
            async move {
                self.rpc
                    .call_with_retry(&request, READ_RETRY_TIMEOUT, &self.policy, default_classifier)
                    .await
                    .map(|response| response.vpcs)
                    .map_err(|e| e.context("", DescribeVpcsRequest::ACTION))
            }
        })
        .await
    }

    pub async fn modify_vpc(
        &self,
        request: &ModifyVpcAttributeRequest,
        timeout: Duration,
    ) -> Result<(), ApiError> {
        self.rpc
            .call_with_retry(request, timeout, &self.policy, default_classifier)
            .await
            .map_err(|e| e.context(&request.vpc_id, ModifyVpcAttributeRequest::ACTION))?;
        Ok(())
    }

    /// Deletes the VPC. A VPC that is already gone counts as deleted.
    pub async fn delete_vpc(&self, vpc_id: &str, timeout: Duration) -> Result<(), ApiError> {
        let request = DeleteVpcRequest {
            vpc_id: vpc_id.to_string(),
        };
        match self
            .rpc
            .call_with_retry(&request, timeout, &self.policy, retry_on(VPC_DELETE_RETRY))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_expected(VPC_NOT_FOUND) => Ok(()),
            Err(e) => Err(e.context(vpc_id, DeleteVpcRequest::ACTION)),
        }
    }

    pub async fn allocate_eip(
        &self,
        mut request: AllocateEipAddressRequest,
        timeout: Duration,
    ) -> Result<AllocateEipAddressResponse, ApiError> {
        request.client_token.get_or_insert_with(ClientToken::new);
        let response = self
            .rpc
            .call_with_retry(&request, timeout, &self.policy, default_classifier)
            .await
            .map_err(|e| e.context("", AllocateEipAddressRequest::ACTION))?;
        tracing::info!(allocation_id = %response.allocation_id, "allocated EIP");
        Ok(response)
    }

    pub async fn describe_eip(&self, allocation_id: &str) -> Result<EipAddress, ApiError> {
        let request = DescribeEipAddressesRequest {
            allocation_id: Some(allocation_id.to_string()),
            page_number: 1,
            page_size: DEFAULT_PAGE_SIZE as u32,
        };
        let response = self
            .rpc
            .call_with_retry(&request, READ_RETRY_TIMEOUT, &self.policy, default_classifier)
            .await
            .map_err(|e| {
                if e.is_expected(EIP_NOT_FOUND) {
                    ApiError::not_found("EipAddress", allocation_id)
                } else {
                    e.context(allocation_id, DescribeEipAddressesRequest::ACTION)
                }
            })?;

        response
            .eip_addresses
            .into_iter()
            .find(|eip| eip.allocation_id == allocation_id)
            .ok_or_else(|| ApiError::not_found("EipAddress", allocation_id))
    }

    pub async fn eip_refresh(&self, allocation_id: &str) -> Result<Refresh<EipAddress>, ApiError> {
        Refresh::from_result(self.describe_eip(allocation_id).await, |eip| {
            eip.status.clone()
        })
    }

    pub async fn modify_eip(
        &self,
        request: &ModifyEipAddressAttributeRequest,
        timeout: Duration,
    ) -> Result<(), ApiError> {
        self.rpc
            .call_with_retry(request, timeout, &self.policy, retry_on(EIP_MODIFY_RETRY))
            .await
            .map_err(|e| {
                e.context(
                    &request.allocation_id,
                    ModifyEipAddressAttributeRequest::ACTION,
                )
            })?;
        Ok(())
    }

    pub async fn release_eip(&self, allocation_id: &str, timeout: Duration) -> Result<(), ApiError> {
        let request = ReleaseEipAddressRequest {
            allocation_id: allocation_id.to_string(),
        };
        match self
            .rpc
            .call_with_retry(&request, timeout, &self.policy, retry_on(EIP_RELEASE_RETRY))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_expected(EIP_NOT_FOUND) => Ok(()),
            Err(e) => Err(e.context(allocation_id, ReleaseEipAddressRequest::ACTION)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::AliyunClient;
    use crate::api::config::Config;
    use mockito::{Matcher, Server};

    fn api(server: &Server) -> VpcApi {
        let config = Config::new("cn-hangzhou", "ak", "sk").with_endpoint("vpc", &server.url());
        AliyunClient::new(config)
            .unwrap()
            .vpc()
            .unwrap()
            .with_retry_policy(RetryPolicy::incremental(
                Duration::from_millis(1),
                Duration::from_millis(1),
            ))
    }

    #[tokio::test]
    async fn create_vpc_reuses_one_token_across_retries() {
        let mut server = Server::new_async().await;
        let token = ClientToken::new();
        let same_token = || {
            Matcher::AllOf(vec![
                Matcher::UrlEncoded("Action".into(), "CreateVpc".into()),
                Matcher::UrlEncoded("ClientToken".into(), token.as_str().into()),
                Matcher::UrlEncoded("CidrBlock".into(), "172.16.0.0/12".into()),
            ])
        };
        let conflict = server
            .mock("POST", "/")
            .match_body(same_token())
            .with_status(400)
            .with_body(r#"{"RequestId":"R1","Code":"TaskConflict","Message":"busy"}"#)
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("POST", "/")
            .match_body(same_token())
            .with_body(r#"{"RequestId":"R2","VpcId":"vpc-1","VRouterId":"vrt-1"}"#)
            .expect(1)
            .create_async()
            .await;

        let request = CreateVpcRequest {
            cidr_block: Some("172.16.0.0/12".to_string()),
            vpc_name: Some("main".to_string()),
            client_token: Some(token.clone()),
            ..Default::default()
        };
        let vpc_id = api(&server)
            .create_vpc(request, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(vpc_id, "vpc-1");
        conflict.assert_async().await;
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn describe_vpc_maps_not_found_codes() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(404)
            .with_body(r#"{"RequestId":"R1","Code":"InvalidVpcID.NotFound","Message":"The specified VPC does not exist."}"#)
            .create_async()
            .await;

        let err = api(&server).describe_vpc("vpc-gone").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound { ref id, .. } if id == "vpc-gone"));

        let refresh = api(&server).vpc_refresh("vpc-gone").await.unwrap();
        assert_eq!(refresh, Refresh::NotFound);
    }

    #[tokio::test]
    async fn list_vpcs_walks_pages() {
        let mut server = Server::new_async().await;
        let first: Vec<String> = (0..DEFAULT_PAGE_SIZE)
            .map(|i| format!(r#"{{"VpcId":"vpc-{i}","VpcName":"n{i}","Status":"Available"}}"#))
            .collect();
        let page1 = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("Action".into(), "DescribeVpcs".into()),
                Matcher::UrlEncoded("PageNumber".into(), "1".into()),
                Matcher::UrlEncoded("IsDefault".into(), "false".into()),
            ]))
            .with_body(format!(
                r#"{{"TotalCount":51,"Vpcs":{{"Vpc":[{}]}}}}"#,
                first.join(",")
            ))
            .create_async()
            .await;
        let page2 = server
            .mock("POST", "/")
            .match_body(Matcher::UrlEncoded("PageNumber".into(), "2".into()))
            .with_body(r#"{"TotalCount":51,"Vpcs":{"Vpc":[{"VpcId":"vpc-last","Status":"Pending"}]}}"#)
            .create_async()
            .await;

        let vpcs = api(&server)
            .list_vpcs(&DescribeVpcsRequest {
                is_default: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(vpcs.len(), DEFAULT_PAGE_SIZE + 1);
        assert_eq!(vpcs.last().unwrap().vpc_id, "vpc-last");
        page1.assert_async().await;
        page2.assert_async().await;
    }

    #[tokio::test]
    async fn delete_vpc_retries_dependency_violation() {
        let mut server = Server::new_async().await;
        let blocked = server
            .mock("POST", "/")
            .with_status(400)
            .with_body(r#"{"RequestId":"R1","Code":"DependencyViolation.VSwitch","Message":"vswitch left"}"#)
            .expect(2)
            .create_async()
            .await;
        let deleted = server
            .mock("POST", "/")
            .with_body(r#"{"RequestId":"R2"}"#)
            .expect(1)
            .create_async()
            .await;

        api(&server)
            .delete_vpc("vpc-1", Duration::from_secs(5))
            .await
            .unwrap();
        blocked.assert_async().await;
        deleted.assert_async().await;
    }

    #[tokio::test]
    async fn delete_vpc_treats_not_found_as_deleted() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(404)
            .with_body(r#"{"RequestId":"R1","Code":"Forbidden.VpcNotFound","Message":"gone"}"#)
            .create_async()
            .await;

        api(&server)
            .delete_vpc("vpc-1", Duration::from_secs(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn describe_eip_treats_empty_list_as_not_found() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .match_body(Matcher::UrlEncoded("AllocationId".into(), "eip-1".into()))
            .with_body(r#"{"RequestId":"R1","TotalCount":0,"EipAddresses":{"EipAddress":[]}}"#)
            .create_async()
            .await;

        let err = api(&server).describe_eip("eip-1").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn describe_eip_decodes_string_bandwidth() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_body(
                r#"{"EipAddresses":{"EipAddress":[{"AllocationId":"eip-1","IpAddress":"47.0.0.1","Status":"Available","Bandwidth":"5","ChargeType":"PostPaid","InternetChargeType":"PayByTraffic","ISP":"BGP"}]}}"#,
            )
            .create_async()
            .await;

        let eip = api(&server).describe_eip("eip-1").await.unwrap();
        assert_eq!(eip.bandwidth, 5);
        assert_eq!(eip.isp, "BGP");
        assert_eq!(eip.payment_type(), Some(PaymentType::PayAsYouGo));
    }
}
