//! Cloud Enterprise Network

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::client::{Idempotency, Product, RpcAction, RpcClient};
use super::common::{diff_tags, ClientToken};
use super::error::ApiError;
use super::paginate::{collect_pages, DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE};
use super::response::{string_or_u64, wrapped_list, Empty, Tag};
use super::retry::{default_classifier, retry_on, RetryPolicy, READ_RETRY_TIMEOUT};
use super::waiter::Refresh;

pub const CEN_RESOURCE_TYPE: &str = "cen";

const CEN_DELETE_RETRY: &[&str] = &["Operation.Blocking", "InvalidOperation.CenInstanceStatus"];
const CEN_MODIFY_RETRY: &[&str] = &["Operation.Blocking"];

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Cen {
    pub cen_id: String,
    pub name: String,
    pub description: String,
    pub status: String,
    pub protection_level: String,
    pub creation_time: String,
    #[serde(deserialize_with = "wrapped_list")]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateCenRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protection_level: Option<String>,
    pub client_token: Option<ClientToken>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateCenResponse {
    pub cen_id: String,
}

impl RpcAction for CreateCenRequest {
    type Response = CreateCenResponse;
    const ACTION: &'static str = "CreateCen";
    const PRODUCT: Product = Product::Cbn;
    const IDEMPOTENCY: Idempotency = Idempotency::ClientToken;
    const REGIONAL: bool = false;
}

/// `Filter.N.Key` / `Filter.N.Value.M`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CenFilter {
    pub key: String,
    pub value: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeCensRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filter: Vec<CenFilter>,
    pub page_number: u32,
    pub page_size: u32,
}

impl DescribeCensRequest {
    pub fn by_ids(ids: &[String]) -> Self {
        let filter = if ids.is_empty() {
            Vec::new()
        } else {
            vec![CenFilter {
                key: "CenId".to_string(),
                value: ids.to_vec(),
            }]
        };
        Self {
            filter,
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeCensResponse {
    #[serde(default, deserialize_with = "string_or_u64::deserialize")]
    pub total_count: u64,
    #[serde(default, deserialize_with = "wrapped_list")]
    pub cens: Vec<Cen>,
}

impl RpcAction for DescribeCensRequest {
    type Response = DescribeCensResponse;
    const ACTION: &'static str = "DescribeCens";
    const PRODUCT: Product = Product::Cbn;
    const IDEMPOTENCY: Idempotency = Idempotency::ReadOnly;
    const REGIONAL: bool = false;
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyCenAttributeRequest {
    pub cen_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protection_level: Option<String>,
}

impl ModifyCenAttributeRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.protection_level.is_none()
    }
}

impl RpcAction for ModifyCenAttributeRequest {
    type Response = Empty;
    const ACTION: &'static str = "ModifyCenAttribute";
    const PRODUCT: Product = Product::Cbn;
    const IDEMPOTENCY: Idempotency = Idempotency::Natural;
    const REGIONAL: bool = false;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteCenRequest {
    pub cen_id: String,
}

impl RpcAction for DeleteCenRequest {
    type Response = Empty;
    const ACTION: &'static str = "DeleteCen";
    const PRODUCT: Product = Product::Cbn;
    const IDEMPOTENCY: Idempotency = Idempotency::Natural;
    const REGIONAL: bool = false;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TagResourcesRequest {
    pub resource_type: String,
    pub resource_id: Vec<String>,
    pub tag: Vec<Tag>,
}

impl RpcAction for TagResourcesRequest {
    type Response = Empty;
    const ACTION: &'static str = "TagResources";
    const PRODUCT: Product = Product::Cbn;
    const IDEMPOTENCY: Idempotency = Idempotency::Natural;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UntagResourcesRequest {
    pub resource_type: String,
    pub resource_id: Vec<String>,
    pub tag_key: Vec<String>,
}

impl RpcAction for UntagResourcesRequest {
    type Response = Empty;
    const ACTION: &'static str = "UntagResources";
    const PRODUCT: Product = Product::Cbn;
    const IDEMPOTENCY: Idempotency = Idempotency::Natural;
}

pub struct CbnApi {
    rpc: RpcClient,
    policy: RetryPolicy,
}

impl CbnApi {
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

    pub async fn create_cen(
        &self,
        mut request: CreateCenRequest,
        timeout: Duration,
    ) -> Result<String, ApiError> {
        request.client_token.get_or_insert_with(ClientToken::new);
        let response = self
            .rpc
            .call_with_retry(&request, timeout, &self.policy, default_classifier)
            .await
            .map_err(|e| e.context("", CreateCenRequest::ACTION))?;
        tracing::info!(cen_id = %response.cen_id, "created CEN instance");
        Ok(response.cen_id)
    }

    /// Looks one instance up through the `CenId` filter. An empty result or a
    /// different id means the instance does not exist.
    pub async fn describe_cen(&self, cen_id: &str) -> Result<Cen, ApiError> {
        let mut request = DescribeCensRequest::by_ids(&[cen_id.to_string()]);
        request.page_number = 1;
        request.page_size = DEFAULT_PAGE_SIZE as u32;

        let response = self
            .rpc
            .call_with_retry(&request, READ_RETRY_TIMEOUT, &self.policy, default_classifier)
            .await
            .map_err(|e| e.context(cen_id, DescribeCensRequest::ACTION))?;

        response
            .cens
            .into_iter()
            .find(|cen| cen.cen_id == cen_id)
            .ok_or_else(|| ApiError::not_found("CenInstance", cen_id))
    }

    pub async fn cen_refresh(&self, cen_id: &str) -> Result<Refresh<Cen>, ApiError> {
        Refresh::from_result(self.describe_cen(cen_id).await, |cen| cen.status.clone())
    }

    pub async fn list_cens(&self, ids: &[String]) -> Result<Vec<Cen>, ApiError> {
        let base = DescribeCensRequest::by_ids(ids);
        collect_pages(DEFAULT_PAGE_SIZE, DEFAULT_MAX_PAGES, |page| {
            let request = DescribeCensRequest {
                page_number: page,
                page_size: DEFAULT_PAGE_SIZE as u32,
                ..base.clone()
            };
            async move {
                self.rpc
                    .call_with_retry(&request, READ_RETRY_TIMEOUT, &self.policy, default_classifier)
                    .await
                    .map(|response| response.cens)
                    .map_err(|e| e.context("", DescribeCensRequest::ACTION))
            }
        })
        .await
    }

    pub async fn modify_cen(
        &self,
        request: &ModifyCenAttributeRequest,
        timeout: Duration,
    ) -> Result<(), ApiError> {
        self.rpc
            .call_with_retry(request, timeout, &self.policy, retry_on(CEN_MODIFY_RETRY))
            .await
            .map_err(|e| e.context(&request.cen_id, ModifyCenAttributeRequest::ACTION))?;
        Ok(())
    }

    pub async fn delete_cen(&self, cen_id: &str, timeout: Duration) -> Result<(), ApiError> {
        let request = DeleteCenRequest {
            cen_id: cen_id.to_string(),
        };
        match self
            .rpc
            .call_with_retry(&request, timeout, &self.policy, retry_on(CEN_DELETE_RETRY))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e.context(cen_id, DeleteCenRequest::ACTION)),
        }
    }

    /// Converges the instance tags from `old` to `new`: removed keys first,
    /// then added or changed values
    pub async fn set_tags(
        &self,
        cen_id: &str,
        old: &HashMap<String, String>,
        new: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<(), ApiError> {
        let (removed, added) = diff_tags(old, new);

        if !removed.is_empty() {
            let request = UntagResourcesRequest {
                resource_type: CEN_RESOURCE_TYPE.to_string(),
                resource_id: vec![cen_id.to_string()],
                tag_key: removed,
            };
            self.rpc
                .call_with_retry(&request, timeout, &self.policy, default_classifier)
                .await
                .map_err(|e| e.context(cen_id, UntagResourcesRequest::ACTION))?;
        }

        if !added.is_empty() {
            let request = TagResourcesRequest {
                resource_type: CEN_RESOURCE_TYPE.to_string(),
                resource_id: vec![cen_id.to_string()],
                tag: added,
            };
            self.rpc
                .call_with_retry(&request, timeout, &self.policy, default_classifier)
                .await
                .map_err(|e| e.context(cen_id, TagResourcesRequest::ACTION))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::AliyunClient;
    use crate::api::config::Config;
    use crate::api::request::RpcParams;
    use mockito::{Matcher, Server};

    fn api(server: &Server) -> CbnApi {
        let config = Config::new("cn-hangzhou", "ak", "sk").with_endpoint("cbn", &server.url());
        AliyunClient::new(config)
            .unwrap()
            .cbn()
            .unwrap()
            .with_retry_policy(RetryPolicy::incremental(
                Duration::from_millis(1),
                Duration::from_millis(1),
            ))
    }

    #[test]
    fn id_filter_flattens_to_indexed_params() {
        let mut request = DescribeCensRequest::by_ids(&["cen-1".to_string(), "cen-2".to_string()]);
        request.page_number = 1;
        request.page_size = 50;
        let params = RpcParams::from_request(&request).unwrap();

        assert_eq!(params.get("Filter.1.Key"), Some("CenId"));
        assert_eq!(params.get("Filter.1.Value.1"), Some("cen-1"));
        assert_eq!(params.get("Filter.1.Value.2"), Some("cen-2"));

        let params = RpcParams::from_request(&DescribeCensRequest::by_ids(&[])).unwrap();
        assert!(!params.contains("Filter.1.Key"));
    }

    #[tokio::test]
    async fn describe_cen_filters_by_id() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("Action".into(), "DescribeCens".into()),
                Matcher::UrlEncoded("Version".into(), "2017-09-12".into()),
                Matcher::UrlEncoded("Filter.1.Key".into(), "CenId".into()),
                Matcher::UrlEncoded("Filter.1.Value.1".into(), "cen-abc".into()),
            ]))
            .with_body(
                r#"{"RequestId":"R1","TotalCount":1,"Cens":{"Cen":[{"CenId":"cen-abc","Name":"core","Status":"Active","ProtectionLevel":"REDUCED","Tags":{"Tag":[{"Key":"env","Value":"prod"}]}}]}}"#,
            )
            .create_async()
            .await;

        let cen = api(&server).describe_cen("cen-abc").await.unwrap();
        assert_eq!(cen.name, "core");
        assert_eq!(cen.status, "Active");
        assert_eq!(cen.tags, vec![Tag::new("env", "prod")]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn empty_or_mismatched_result_is_not_found() {
        let mut server = Server::new_async().await;
        let _empty = server
            .mock("POST", "/")
            .with_body(r#"{"RequestId":"R1","TotalCount":0,"Cens":{"Cen":[]}}"#)
            .expect(1)
            .create_async()
            .await;
        let _other = server
            .mock("POST", "/")
            .with_body(r#"{"RequestId":"R2","TotalCount":1,"Cens":{"Cen":[{"CenId":"cen-other","Status":"Active"}]}}"#)
            .create_async()
            .await;

        let api = api(&server);
        assert!(api.describe_cen("cen-abc").await.unwrap_err().is_not_found());
        assert_eq!(api.cen_refresh("cen-abc").await.unwrap(), Refresh::NotFound);
    }

    #[tokio::test]
    async fn delete_retries_blocking_operation() {
        let mut server = Server::new_async().await;
        let blocked = server
            .mock("POST", "/")
            .with_status(400)
            .with_body(r#"{"RequestId":"R1","Code":"Operation.Blocking","Message":"locked"}"#)
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("POST", "/")
            .match_body(Matcher::UrlEncoded("CenId".into(), "cen-abc".into()))
            .with_body(r#"{"RequestId":"R2"}"#)
            .expect(1)
            .create_async()
            .await;

        api(&server)
            .delete_cen("cen-abc", Duration::from_secs(5))
            .await
            .unwrap();
        blocked.assert_async().await;
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn set_tags_untags_then_tags() {
        let mut server = Server::new_async().await;
        let untag = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("Action".into(), "UntagResources".into()),
                Matcher::UrlEncoded("ResourceType".into(), "cen".into()),
                Matcher::UrlEncoded("ResourceId.1".into(), "cen-abc".into()),
                Matcher::UrlEncoded("TagKey.1".into(), "team".into()),
            ]))
            .with_body(r#"{"RequestId":"R1"}"#)
            .create_async()
            .await;
        let tag = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("Action".into(), "TagResources".into()),
                Matcher::UrlEncoded("Tag.1.Key".into(), "env".into()),
                Matcher::UrlEncoded("Tag.1.Value".into(), "prod".into()),
            ]))
            .with_body(r#"{"RequestId":"R2"}"#)
            .create_async()
            .await;

        let old: HashMap<String, String> = [("env", "dev"), ("team", "net")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let new: HashMap<String, String> = [("env".to_string(), "prod".to_string())].into();

        api(&server)
            .set_tags("cen-abc", &old, &new, Duration::from_secs(5))
            .await
            .unwrap();
        untag.assert_async().await;
        tag.assert_async().await;
    }
}
