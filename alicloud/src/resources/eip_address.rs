//! alicloud_eip_address

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

use crate::api::vpc::{AllocateEipAddressRequest, EipAddress, ModifyEipAddressAttributeRequest};
use crate::api::{ApiError, ClientToken, PaymentType};
use crate::handler::{
    changed_number, changed_string, extract_provider_data, path, set_optional_string, Deadline,
    HandlerError, HandlerResult,
};
use crate::AlicloudProviderData;

const TYPE_NAME: &str = "alicloud_eip_address";
const INTERNET_CHARGE_TYPES: &[&str] = &["PayByBandwidth", "PayByTraffic"];

#[derive(Default)]
pub struct EipAddressResource {
    provider_data: Option<AlicloudProviderData>,
}

impl EipAddressResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> HandlerResult<&AlicloudProviderData> {
        self.provider_data.as_ref().ok_or(HandlerError::NotConfigured)
    }

    fn apply(state: &mut DynamicValue, eip: &EipAddress) -> HandlerResult<()> {
        state.set_string(&path("id"), eip.allocation_id.as_str())?;
        state.set_string(&path("ip_address"), eip.ip_address.as_str())?;
        set_optional_string(state, "address_name", &eip.name)?;
        set_optional_string(state, "description", &eip.description)?;
        state.set_number(&path("bandwidth"), eip.bandwidth as f64)?;
        state.set_string(&path("internet_charge_type"), eip.internet_charge_type.as_str())?;
        match eip.payment_type() {
            Some(payment) => state.set_string(&path("payment_type"), payment.as_terraform())?,
            None => state.set_null(&path("payment_type"))?,
        }
        set_optional_string(state, "isp", &eip.isp)?;
        set_optional_string(state, "resource_group_id", &eip.resource_group_id)?;
        set_optional_string(state, "instance_id", &eip.instance_id)?;
        state.set_string(&path("status"), eip.status.as_str())?;
        Ok(())
    }

    fn payment_type(config: &DynamicValue) -> HandlerResult<Option<PaymentType>> {
        config
            .get_string_opt(&path("payment_type"))
            .map(|value| {
                value
                    .parse::<PaymentType>()
                    .map_err(|e| HandlerError::invalid("payment_type", e))
            })
            .transpose()
    }

    async fn allocate(
        &self,
        request: &CreateResourceRequest,
        state: &mut DynamicValue,
    ) -> HandlerResult<()> {
        let data = self.data()?;
        let api = data.vpc()?;
        let deadline = Deadline::after(request.timeout);
        let config = &request.config;

        let allocate = AllocateEipAddressRequest {
            bandwidth: config
                .get_number_opt(&path("bandwidth"))
                .map(|b| (b as u64).to_string()),
            internet_charge_type: config.get_string_opt(&path("internet_charge_type")),
            instance_charge_type: Self::payment_type(config)?,
            isp: config.get_string_opt(&path("isp")),
            name: config.get_string_opt(&path("address_name")),
            description: config.get_string_opt(&path("description")),
            resource_group_id: config.get_string_opt(&path("resource_group_id")),
            client_token: Some(ClientToken::new()),
        };
        let allocated = api.allocate_eip(allocate, deadline.remaining()).await?;
        let allocation_id = allocated.allocation_id;
        state.set_string(&path("id"), allocation_id.as_str())?;

        let eip = data
            .wait_for(&["Available"], deadline.remaining())
            .pending(&["Associating", "Unassociating"])
            .wait_for_state(|| api.eip_refresh(&allocation_id))
            .await?
            .ok_or_else(|| ApiError::not_found("EipAddress", &allocation_id))?;
        Self::apply(state, &eip)
    }

    async fn read_eip(&self, allocation_id: &str) -> HandlerResult<EipAddress> {
        let api = self.data()?.vpc()?;
        Ok(api.describe_eip(allocation_id).await?)
    }

    async fn update_eip(
        &self,
        request: &UpdateResourceRequest,
        state: &mut DynamicValue,
    ) -> HandlerResult<()> {
        let data = self.data()?;
        let api = data.vpc()?;
        let deadline = Deadline::after(request.timeout);
        let prior = &request.prior_state;
        let config = &request.config;
        let allocation_id = prior.get_string(&path("id"))?;
        state.set_string(&path("id"), allocation_id.as_str())?;

        let modify = ModifyEipAddressAttributeRequest {
            allocation_id: allocation_id.clone(),
            bandwidth: changed_number(prior, config, "bandwidth").map(|b| (b as u64).to_string()),
            name: changed_string(prior, config, "address_name"),
            description: changed_string(prior, config, "description"),
        };
        if !modify.is_empty() {
            api.modify_eip(&modify, deadline.remaining()).await?;
        }

        let eip = api.describe_eip(&allocation_id).await?;
        Self::apply(state, &eip)
    }

    async fn release(&self, request: &DeleteResourceRequest) -> HandlerResult<()> {
        let data = self.data()?;
        let api = data.vpc()?;
        let deadline = Deadline::after(request.timeout);
        let allocation_id = request.prior_state.get_string(&path("id"))?;

        api.release_eip(&allocation_id, deadline.remaining()).await?;
        data.wait_for_deletion(deadline.remaining())
            .wait_for_state(|| api.eip_refresh(&allocation_id))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Resource for EipAddressResource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Manages an Elastic IP address")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("address_name", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("bandwidth", AttributeType::Number)
                    .description("Maximum bandwidth in Mbps")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("internet_charge_type", AttributeType::String)
                    .description("PayByBandwidth or PayByTraffic")
                    .optional()
                    .computed()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("payment_type", AttributeType::String)
                    .description("PayAsYouGo or Subscription")
                    .optional()
                    .computed()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("isp", AttributeType::String)
                    .description("Line type, BGP by default")
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
                AttributeBuilder::new("ip_address", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("instance_id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
                    .computed()
                    .build(),
            )
            .timeouts(
                Timeouts::new()
                    .create(Duration::from_secs(5 * 60))
                    .update(Duration::from_secs(5 * 60))
                    .delete(Duration::from_secs(5 * 60)),
            )
            .build()
    }

    async fn validate(&self, request: ValidateResourceConfigRequest) -> Diagnostics {
        let mut diagnostics = self.schema().validate(&request.config);
        let config = &request.config;

        if let Err(e) = Self::payment_type(config) {
            diagnostics.push(e.to_diagnostic("Invalid payment_type"));
        }
        if let Some(charge) = config.get_string_opt(&path("internet_charge_type")) {
            if !INTERNET_CHARGE_TYPES.contains(&charge.as_str()) {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid internet_charge_type",
                        format!("expected one of {:?}, got {}", INTERNET_CHARGE_TYPES, charge),
                    )
                    .with_attribute(path("internet_charge_type")),
                );
            }
        }
        if let Some(bandwidth) = config.get_number_opt(&path("bandwidth")) {
            if bandwidth < 1.0 || bandwidth.fract() != 0.0 {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid bandwidth",
                        format!("bandwidth must be a positive whole number, got {}", bandwidth),
                    )
                    .with_attribute(path("bandwidth")),
                );
            }
        }

        diagnostics
    }

    async fn create(&self, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut new_state = request.planned_state.clone();
        let mut diagnostics = Diagnostics::new();

        if let Err(e) = self.allocate(&request, &mut new_state).await {
            diagnostics.push(e.to_diagnostic("Failed to allocate EIP address"));
        }

        CreateResourceResponse {
            new_state,
            diagnostics,
        }
    }

    async fn read(&self, request: ReadResourceRequest) -> ReadResourceResponse {
        let mut diagnostics = Diagnostics::new();

        let allocation_id = match request.current_state.get_string(&path("id")) {
            Ok(id) => id,
            Err(_) => {
                return ReadResourceResponse {
                    new_state: None,
                    diagnostics,
                }
            }
        };

        match self.read_eip(&allocation_id).await {
            Ok(eip) => {
                let mut new_state = request.current_state.clone();
                if let Err(e) = Self::apply(&mut new_state, &eip) {
                    diagnostics.push(e.to_diagnostic("Failed to read EIP address"));
                }
                ReadResourceResponse {
                    new_state: Some(new_state),
                    diagnostics,
                }
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(allocation_id = %allocation_id, "EIP address not found, removing from state");
                ReadResourceResponse {
                    new_state: None,
                    diagnostics,
                }
            }
            Err(e) => {
                diagnostics.push(e.to_diagnostic("Failed to read EIP address"));
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

        if let Err(e) = self.update_eip(&request, &mut new_state).await {
            diagnostics.push(e.to_diagnostic("Failed to update EIP address"));
        }

        UpdateResourceResponse {
            new_state,
            diagnostics,
        }
    }

    async fn delete(&self, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = Diagnostics::new();

        if let Err(e) = self.release(&request).await {
            diagnostics.push(e.to_diagnostic("Failed to release EIP address"));
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for EipAddressResource {
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
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::sync::Arc;

    async fn resource(server: &Server) -> EipAddressResource {
        let config = Config::new("cn-hangzhou", "ak", "sk").with_endpoint("vpc", &server.url());
        let data = AlicloudProviderData::new(AliyunClient::new(config).unwrap())
            .with_retry_policy(RetryPolicy::incremental(
                Duration::from_millis(1),
                Duration::from_millis(1),
            ))
            .with_polling(Duration::ZERO, Duration::from_millis(10));

        let mut resource = EipAddressResource::new();
        resource
            .configure(ConfigureResourceRequest {
                provider_data: Some(Arc::new(data)),
            })
            .await;
        resource
    }

    fn eip_body(bandwidth: &str) -> String {
        format!(
            r#"{{"RequestId":"R","TotalCount":1,"EipAddresses":{{"EipAddress":[{{"AllocationId":"eip-1","IpAddress":"47.0.0.1","Status":"Available","Name":"edge","Bandwidth":"{bandwidth}","InternetChargeType":"PayByTraffic","ChargeType":"PostPaid","ISP":"BGP"}}]}}}}"#
        )
    }

    #[tokio::test]
    async fn validate_checks_enums_and_bandwidth() {
        let diagnostics = EipAddressResource::new()
            .validate(ValidateResourceConfigRequest {
                type_name: TYPE_NAME.to_string(),
                config: DynamicValue::from_json(json!({
                    "payment_type": "Monthly",
                    "internet_charge_type": "PayByTraffic",
                    "bandwidth": 0.5
                })),
            })
            .await;

        let summaries: Vec<_> = diagnostics.errors().map(|d| d.summary.as_str()).collect();
        assert_eq!(summaries, vec!["Invalid payment_type", "Invalid bandwidth"]);
    }

    #[tokio::test]
    async fn allocate_maps_payment_type_and_reads_back() {
        let mut server = Server::new_async().await;
        let allocate = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("Action".into(), "AllocateEipAddress".into()),
                Matcher::UrlEncoded("InstanceChargeType".into(), "PostPaid".into()),
                Matcher::UrlEncoded("Bandwidth".into(), "10".into()),
                Matcher::Regex("ClientToken=".into()),
            ]))
            .with_body(r#"{"RequestId":"R","AllocationId":"eip-1","EipAddress":"47.0.0.1"}"#)
            .expect(1)
            .create_async()
            .await;
        let describe = server
            .mock("POST", "/")
            .match_body(Matcher::UrlEncoded("Action".into(), "DescribeEipAddresses".into()))
            .with_body(eip_body("10"))
            .expect(1)
            .create_async()
            .await;

        let config = json!({"bandwidth": 10, "payment_type": "PayAsYouGo", "address_name": "edge"});
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
        assert_eq!(state.get_string(&path("id")).unwrap(), "eip-1");
        assert_eq!(state.get_number(&path("bandwidth")).unwrap(), 10.0);
        assert_eq!(state.get_string(&path("payment_type")).unwrap(), "PayAsYouGo");
        assert_eq!(state.get_string(&path("isp")).unwrap(), "BGP");
        assert!(state.get(&path("instance_id")).unwrap().is_null());
        allocate.assert_async().await;
        describe.assert_async().await;
    }

    #[tokio::test]
    async fn update_sends_bandwidth_as_string() {
        let mut server = Server::new_async().await;
        let modify = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("Action".into(), "ModifyEipAddressAttribute".into()),
                Matcher::UrlEncoded("Bandwidth".into(), "20".into()),
            ]))
            .with_body(r#"{"RequestId":"R"}"#)
            .expect(1)
            .create_async()
            .await;
        let _describe = server
            .mock("POST", "/")
            .match_body(Matcher::UrlEncoded("Action".into(), "DescribeEipAddresses".into()))
            .with_body(eip_body("20"))
            .create_async()
            .await;

        let response = resource(&server)
            .await
            .update(UpdateResourceRequest {
                type_name: TYPE_NAME.to_string(),
                prior_state: DynamicValue::from_json(json!({"id": "eip-1", "bandwidth": 10, "address_name": "edge"})),
                planned_state: DynamicValue::from_json(json!({"bandwidth": 20, "address_name": "edge"})),
                config: DynamicValue::from_json(json!({"bandwidth": 20, "address_name": "edge"})),
                timeout: Duration::from_secs(10),
            })
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(response.new_state.get_number(&path("bandwidth")).unwrap(), 20.0);
        modify.assert_async().await;
    }

    #[tokio::test]
    async fn release_retries_incorrect_status_then_waits_gone() {
        let mut server = Server::new_async().await;
        let busy = server
            .mock("POST", "/")
            .match_body(Matcher::UrlEncoded("Action".into(), "ReleaseEipAddress".into()))
            .with_status(400)
            .with_body(r#"{"Code":"IncorrectEipStatus","Message":"still associated","RequestId":"R"}"#)
            .expect(1)
            .create_async()
            .await;
        let released = server
            .mock("POST", "/")
            .match_body(Matcher::UrlEncoded("Action".into(), "ReleaseEipAddress".into()))
            .with_body(r#"{"RequestId":"R"}"#)
            .expect(1)
            .create_async()
            .await;
        let gone = server
            .mock("POST", "/")
            .match_body(Matcher::UrlEncoded("Action".into(), "DescribeEipAddresses".into()))
            .with_body(r#"{"RequestId":"R","TotalCount":0,"EipAddresses":{"EipAddress":[]}}"#)
            .expect(1)
            .create_async()
            .await;

        let response = resource(&server)
            .await
            .delete(DeleteResourceRequest {
                type_name: TYPE_NAME.to_string(),
                prior_state: DynamicValue::from_json(json!({"id": "eip-1"})),
                timeout: Duration::from_secs(10),
            })
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        busy.assert_async().await;
        released.assert_async().await;
        gone.assert_async().await;
    }
}
