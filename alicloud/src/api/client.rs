use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use super::config::Config;
use super::error::ApiError;
use super::pool::ConnectionPoolConfig;
use super::request::RpcParams;
use super::response::decode;
use super::retry::{retry, RetryDecision, RetryPolicy};
use super::signer::Signer;

/// Services the provider talks to, with their RPC API versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Product {
    Ecs,
    Vpc,
    Cbn,
    Ram,
}

impl Product {
    pub fn code(&self) -> &'static str {
        match self {
            Product::Ecs => "ecs",
            Product::Vpc => "vpc",
            Product::Cbn => "cbn",
            Product::Ram => "ram",
        }
    }

    pub fn version(&self) -> &'static str {
        match self {
            Product::Ecs => "2014-05-26",
            Product::Vpc => "2016-04-28",
            Product::Cbn => "2017-09-12",
            Product::Ram => "2015-05-01",
        }
    }

    /// Central endpoint for global services and mainland regions, regional
    /// endpoint otherwise
    pub fn default_endpoint(&self, region: &str) -> Option<String> {
        match self {
            Product::Cbn | Product::Ram => Some(format!("{}.aliyuncs.com", self.code())),
            Product::Ecs | Product::Vpc => {
                if region.is_empty() {
                    None
                } else if region.starts_with("cn-") {
                    Some(format!("{}.aliyuncs.com", self.code()))
                } else {
                    Some(format!("{}.{}.aliyuncs.com", self.code(), region))
                }
            }
        }
    }
}

/// How a retried action avoids duplicate side effects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Idempotency {
    /// Describe/List/Get actions
    ReadOnly,
    /// Repeating the call converges on the same state (modify, delete, or
    /// create with a caller chosen unique name)
    Natural,
    /// Must carry a `ClientToken` minted once per logical operation
    ClientToken,
}

/// A typed RPC action: the request struct serializes to the action's
/// parameters and the response is decoded once into `Response`
pub trait RpcAction: Serialize + Send + Sync {
    type Response: DeserializeOwned + Send;

    const ACTION: &'static str;
    const PRODUCT: Product;
    const IDEMPOTENCY: Idempotency;
    /// Whether `RegionId` is added automatically
    const REGIONAL: bool = true;
}

/// Client registry built from the connectivity config and passed explicitly
/// to every resource. All product clients share one connection pool.
#[derive(Clone)]
pub struct AliyunClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: Config,
    http_client: reqwest::Client,
}

impl AliyunClient {
    pub fn new(config: Config) -> Result<Self, ApiError> {
        for (product, endpoint) in &config.endpoints {
            normalize_endpoint(endpoint).map_err(|reason| ApiError::InvalidEndpoint {
                endpoint: format!("{}={}", product, endpoint),
                reason,
            })?;
        }

        let http_client = ConnectionPoolConfig::from(&config).build_client()?;
        tracing::debug!(region = %config.region, "created Alibaba Cloud client");

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                http_client,
            }),
        })
    }

    pub fn region(&self) -> &str {
        &self.inner.config.region
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Endpoint resolution: configured override, then the product default
    pub fn endpoint(&self, product: Product) -> Result<String, ApiError> {
        let config = &self.inner.config;
        let endpoint = match config.endpoints.get(product.code()) {
            Some(endpoint) => endpoint.clone(),
            None => product
                .default_endpoint(&config.region)
                .ok_or_else(|| ApiError::MissingEndpoint(product.code().to_string()))?,
        };
        normalize_endpoint(&endpoint).map_err(|reason| ApiError::InvalidEndpoint { endpoint, reason })
    }

    pub fn rpc(&self, product: Product) -> Result<RpcClient, ApiError> {
        Ok(RpcClient {
            inner: self.inner.clone(),
            product,
            endpoint: self.endpoint(product)?,
        })
    }

    pub fn ecs(&self) -> Result<crate::api::ecs::EcsApi, ApiError> {
        Ok(crate::api::ecs::EcsApi::new(self.rpc(Product::Ecs)?))
    }

    pub fn vpc(&self) -> Result<crate::api::vpc::VpcApi, ApiError> {
        Ok(crate::api::vpc::VpcApi::new(self.rpc(Product::Vpc)?))
    }

    pub fn cbn(&self) -> Result<crate::api::cbn::CbnApi, ApiError> {
        Ok(crate::api::cbn::CbnApi::new(self.rpc(Product::Cbn)?))
    }

    pub fn ram(&self) -> Result<crate::api::ram::RamApi, ApiError> {
        Ok(crate::api::ram::RamApi::new(self.rpc(Product::Ram)?))
    }
}

/// Adds a scheme to bare hosts and validates the result
fn normalize_endpoint(endpoint: &str) -> Result<String, String> {
    let with_scheme = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("https://{}", endpoint)
    };
    let url = url::Url::parse(&with_scheme).map_err(|e| e.to_string())?;
    if url.host_str().is_none() {
        return Err("endpoint has no host".to_string());
    }
    Ok(with_scheme.trim_end_matches('/').to_string())
}

/// RPC client for one product. Each call is a single signed attempt; retry
/// and polling are layered on top by the caller.
#[derive(Clone)]
pub struct RpcClient {
    inner: Arc<ClientInner>,
    product: Product,
    endpoint: String,
}

impl RpcClient {
    pub fn product(&self) -> Product {
        self.product
    }

    pub fn region(&self) -> &str {
        &self.inner.config.region
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Generic envelope for actions without a typed request
    pub async fn do_request(
        &self,
        action: &str,
        params: RpcParams,
    ) -> Result<serde_json::Value, ApiError> {
        let (status, body) = self.send(action, params).await?;
        decode(status, &body)
    }

    /// Typed call: flattens the request, enforces the idempotency contract and
    /// decodes the response
    pub async fn call<A: RpcAction>(&self, request: &A) -> Result<A::Response, ApiError> {
        if A::PRODUCT != self.product {
            return Err(ApiError::InvalidRequest(format!(
                "{} belongs to {}, not {}",
                A::ACTION,
                A::PRODUCT.code(),
                self.product.code()
            )));
        }

        let mut params = RpcParams::from_request(request)?;
        if A::IDEMPOTENCY == Idempotency::ClientToken
            && params.get("ClientToken").map_or(true, str::is_empty)
        {
            return Err(ApiError::MissingClientToken(A::ACTION.to_string()));
        }
        if A::REGIONAL && !params.contains("RegionId") {
            params.insert("RegionId", self.region());
        }

        let (status, body) = self.send(A::ACTION, params).await?;
        decode(status, &body)
    }

    /// Typed call wrapped in the retrying invoker. The request is borrowed, so
    /// every attempt sends identical parameters, including any `ClientToken`.
    pub async fn call_with_retry<A, C>(
        &self,
        request: &A,
        timeout: std::time::Duration,
        policy: &RetryPolicy,
        classify: C,
    ) -> Result<A::Response, ApiError>
    where
        A: RpcAction,
        C: Fn(&ApiError) -> RetryDecision,
    {
        retry(timeout, policy, || self.call(request), classify).await
    }

    async fn send(&self, action: &str, params: RpcParams) -> Result<(u16, String), ApiError> {
        let config = &self.inner.config;
        tracing::debug!(
            product = self.product.code(),
            action,
            params = ?redacted(&params),
            "RPC request"
        );

        let signer = Signer {
            access_key: &config.access_key,
            secret_key: &config.secret_key,
            security_token: config.security_token.as_deref(),
        };
        let mut params = params.into_inner();
        let body = signer.sign_request("POST", action, self.product.version(), &mut params);

        let response = self
            .inner
            .http_client
            .post(format!("{}/", self.endpoint))
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;
        tracing::debug!(action, status, body = %text, "RPC response");
        Ok((status, text))
    }
}

fn redacted(params: &RpcParams) -> Vec<(String, String)> {
    params
        .clone()
        .into_inner()
        .into_iter()
        .map(|(k, v)| {
            if k.contains("Password") || k.contains("Secret") {
                (k, "<redacted>".to_string())
            } else {
                (k, v)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::common::ClientToken;
    use crate::api::response::Empty;
    use mockito::{Matcher, Server};
    use serde::Deserialize;

    #[derive(Serialize)]
    #[serde(rename_all = "PascalCase")]
    struct CreateThing {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        client_token: Option<ClientToken>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct CreateThingResponse {
        thing_id: String,
    }

    impl RpcAction for CreateThing {
        type Response = CreateThingResponse;
        const ACTION: &'static str = "CreateThing";
        const PRODUCT: Product = Product::Vpc;
        const IDEMPOTENCY: Idempotency = Idempotency::ClientToken;
    }

    #[derive(Serialize)]
    struct ListGlobal {}

    impl RpcAction for ListGlobal {
        type Response = Empty;
        const ACTION: &'static str = "ListGlobal";
        const PRODUCT: Product = Product::Ram;
        const IDEMPOTENCY: Idempotency = Idempotency::ReadOnly;
        const REGIONAL: bool = false;
    }

    fn client_for(server: &Server, product: &str) -> AliyunClient {
        let config = Config::new("cn-hangzhou", "test-ak", "test-sk").with_endpoint(product, &server.url());
        AliyunClient::new(config).unwrap()
    }

    #[test]
    fn products_carry_versions_and_endpoints() {
        assert_eq!(Product::Cbn.version(), "2017-09-12");
        assert_eq!(Product::Ram.default_endpoint("eu-central-1").unwrap(), "ram.aliyuncs.com");
        assert_eq!(Product::Vpc.default_endpoint("cn-beijing").unwrap(), "vpc.aliyuncs.com");
        assert_eq!(
            Product::Ecs.default_endpoint("ap-southeast-1").unwrap(),
            "ecs.ap-southeast-1.aliyuncs.com"
        );
        assert!(Product::Ecs.default_endpoint("").is_none());
    }

    #[test]
    fn endpoint_resolution_prefers_override() {
        let config = Config::new("cn-hangzhou", "AK", "SK").with_endpoint("vpc", "vpc.internal.example.com");
        let client = AliyunClient::new(config).unwrap();
        assert_eq!(
            client.endpoint(Product::Vpc).unwrap(),
            "https://vpc.internal.example.com"
        );
        assert_eq!(client.endpoint(Product::Cbn).unwrap(), "https://cbn.aliyuncs.com");
    }

    #[test]
    fn missing_region_without_override_has_no_endpoint() {
        let client = AliyunClient::new(Config::new("", "AK", "SK")).unwrap();
        assert!(matches!(client.endpoint(Product::Ecs), Err(ApiError::MissingEndpoint(_))));
    }

    #[test]
    fn invalid_override_is_rejected_at_construction() {
        let config = Config::new("cn-hangzhou", "AK", "SK").with_endpoint("vpc", "http://");
        assert!(matches!(
            AliyunClient::new(config),
            Err(ApiError::InvalidEndpoint { .. })
        ));
    }

    #[tokio::test]
    async fn typed_call_signs_and_decodes() {
        let mut server = Server::new_async().await;
        let token = ClientToken::new();
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("Action".into(), "CreateThing".into()),
                Matcher::UrlEncoded("Version".into(), "2016-04-28".into()),
                Matcher::UrlEncoded("AccessKeyId".into(), "test-ak".into()),
                Matcher::UrlEncoded("RegionId".into(), "cn-hangzhou".into()),
                Matcher::UrlEncoded("Name".into(), "my thing".into()),
                Matcher::UrlEncoded("ClientToken".into(), token.as_str().into()),
                Matcher::Regex("Signature=".into()),
            ]))
            .with_body(r#"{"RequestId":"R1","ThingId":"thing-1"}"#)
            .create_async()
            .await;

        let rpc = client_for(&server, "vpc").rpc(Product::Vpc).unwrap();
        let response = rpc
            .call(&CreateThing {
                name: "my thing".to_string(),
                client_token: Some(token),
            })
            .await
            .unwrap();

        assert_eq!(response.thing_id, "thing-1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn client_token_actions_without_token_never_hit_the_network() {
        let mut server = Server::new_async().await;
        let mock = server.mock("POST", "/").expect(0).create_async().await;

        let rpc = client_for(&server, "vpc").rpc(Product::Vpc).unwrap();
        let result = rpc
            .call(&CreateThing {
                name: "x".to_string(),
                client_token: None,
            })
            .await;

        assert!(matches!(result, Err(ApiError::MissingClientToken(ref a)) if a == "CreateThing"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn global_actions_skip_region() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::Regex("RegionId".into()))
            .expect(0)
            .create_async()
            .await;
        let fallback = server
            .mock("POST", "/")
            .with_body(r#"{"RequestId":"R2"}"#)
            .create_async()
            .await;

        let rpc = client_for(&server, "ram").rpc(Product::Ram).unwrap();
        let response = rpc.call(&ListGlobal {}).await.unwrap();

        assert_eq!(response.request_id, "R2");
        mock.assert_async().await;
        fallback.assert_async().await;
    }

    #[tokio::test]
    async fn action_for_another_product_is_rejected() {
        let server = Server::new_async().await;
        let rpc = client_for(&server, "vpc").rpc(Product::Vpc).unwrap();
        let result = rpc.call(&ListGlobal {}).await;
        assert!(matches!(result, Err(ApiError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn service_errors_are_decoded() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(400)
            .with_body(r#"{"RequestId":"R3","HostId":"vpc.aliyuncs.com","Code":"Throttling.User","Message":"slow down"}"#)
            .create_async()
            .await;

        let rpc = client_for(&server, "vpc").rpc(Product::Vpc).unwrap();
        let mut params = RpcParams::new();
        params.insert("VpcId", "vpc-1");
        let err = rpc.do_request("DescribeVpcAttribute", params).await.unwrap_err();

        assert_eq!(err.code(), Some("Throttling.User"));
        assert!(err.need_retry());
    }
}
