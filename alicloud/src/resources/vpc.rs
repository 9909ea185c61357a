//! alicloud_vpc

use async_trait::async_trait;
use std::net::Ipv4Addr;
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

use crate::api::response::tags_to_map;
use crate::api::vpc::{CreateVpcRequest, ModifyVpcAttributeRequest, Vpc};
use crate::api::ClientToken;
use crate::handler::{
    changed_string, extract_provider_data, path, set_optional_string, string_map, Deadline,
    HandlerError, HandlerResult,
};
use crate::AlicloudProviderData;

const TYPE_NAME: &str = "alicloud_vpc";

#[derive(Default)]
pub struct VpcResource {
    provider_data: Option<AlicloudProviderData>,
}

impl VpcResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> HandlerResult<&AlicloudProviderData> {
        self.provider_data.as_ref().ok_or(HandlerError::NotConfigured)
    }

    fn apply(state: &mut DynamicValue, vpc: &Vpc) -> HandlerResult<()> {
        state.set_string(&path("id"), vpc.vpc_id.as_str())?;
        state.set_string(&path("cidr_block"), vpc.cidr_block.as_str())?;
        set_optional_string(state, "vpc_name", &vpc.vpc_name)?;
        set_optional_string(state, "description", &vpc.description)?;
        set_optional_string(state, "resource_group_id", &vpc.resource_group_id)?;
        set_optional_string(state, "ipv6_cidr_block", &vpc.ipv6_cidr_block)?;
        state.set_string(&path("router_id"), vpc.router_id.as_str())?;
        state.set_string(&path("status"), vpc.status.as_str())?;
        state.set_bool(&path("is_default"), vpc.is_default)?;
        state.set_map(&path("tags"), string_map(&tags_to_map(&vpc.tags)))?;
        Ok(())
    }

    async fn create_vpc(
        &self,
        request: &CreateResourceRequest,
        state: &mut DynamicValue,
    ) -> HandlerResult<()> {
        let data = self.data()?;
        let api = data.vpc()?;
        let deadline = Deadline::after(request.timeout);
        let config = &request.config;

        let create = CreateVpcRequest {
            cidr_block: config.get_string_opt(&path("cidr_block")),
            vpc_name: config.get_string_opt(&path("vpc_name")),
            description: config.get_string_opt(&path("description")),
            resource_group_id: config.get_string_opt(&path("resource_group_id")),
            enable_ipv6: config.get_bool_opt(&path("enable_ipv6")),
            client_token: Some(ClientToken::new()),
        };
        let vpc_id = api.create_vpc(create, deadline.remaining()).await?;
        state.set_string(&path("id"), vpc_id.as_str())?;

        let vpc = data
            .wait_for(&["Available"], deadline.remaining())
            .pending(&["Pending"])
            .wait_for_state(|| api.vpc_refresh(&vpc_id))
            .await?
            .ok_or_else(|| crate::api::ApiError::not_found("Vpc", &vpc_id))?;
        Self::apply(state, &vpc)
    }

    async fn read_vpc(&self, vpc_id: &str) -> HandlerResult<Vpc> {
        let api = self.data()?.vpc()?;
        Ok(api.describe_vpc(vpc_id).await?)
    }

    async fn update_vpc(
        &self,
        request: &UpdateResourceRequest,
        state: &mut DynamicValue,
    ) -> HandlerResult<()> {
        let data = self.data()?;
        let api = data.vpc()?;
        let deadline = Deadline::after(request.timeout);
        let prior = &request.prior_state;
        let config = &request.config;
        let vpc_id = prior.get_string(&path("id"))?;
        state.set_string(&path("id"), vpc_id.as_str())?;

        let modify = ModifyVpcAttributeRequest {
            vpc_id: vpc_id.clone(),
            vpc_name: changed_string(prior, config, "vpc_name"),
            description: changed_string(prior, config, "description"),
            cidr_block: changed_string(prior, config, "cidr_block"),
        };
        if modify.is_empty() {
            tracing::debug!(vpc_id = %vpc_id, "no VPC attribute changes");
        } else {
            api.modify_vpc(&modify, deadline.remaining()).await?;
            // A CIDR change puts the VPC back into Pending for a while
            data.wait_for(&["Available"], deadline.remaining())
                .pending(&["Pending"])
                .wait_for_state(|| api.vpc_refresh(&vpc_id))
                .await?;
        }

        let vpc = api.describe_vpc(&vpc_id).await?;
        Self::apply(state, &vpc)
    }

    async fn delete_vpc(&self, request: &DeleteResourceRequest) -> HandlerResult<()> {
        let data = self.data()?;
        let api = data.vpc()?;
        let deadline = Deadline::after(request.timeout);
        let vpc_id = request.prior_state.get_string(&path("id"))?;

        api.delete_vpc(&vpc_id, deadline.remaining()).await?;
        data.wait_for_deletion(deadline.remaining())
            .wait_for_state(|| api.vpc_refresh(&vpc_id))
            .await?;
        Ok(())
    }
}

fn validate_cidr(cidr: &str) -> Result<(), String> {
    let (address, prefix) = cidr
        .split_once('/')
        .ok_or_else(|| format!("{} is not in CIDR notation", cidr))?;
    address
        .parse::<Ipv4Addr>()
        .map_err(|e| format!("{}: {}", address, e))?;
    let prefix: u8 = prefix
        .parse()
        .map_err(|_| format!("{} is not a valid prefix length", prefix))?;
    if !(8..=28).contains(&prefix) {
        return Err(format!("prefix length must be between 8 and 28, got {}", prefix));
    }
    Ok(())
}

#[async_trait]
impl Resource for VpcResource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Manages a Virtual Private Cloud")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("cidr_block", AttributeType::String)
                    .description("IPv4 CIDR block of the VPC")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vpc_name", AttributeType::String)
                    .description("VPC name, 1 to 128 characters")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .optional()
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
                AttributeBuilder::new("enable_ipv6", AttributeType::Bool)
                    .description("Allocate an IPv6 CIDR block on creation")
                    .optional()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("ipv6_cidr_block", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("router_id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("is_default", AttributeType::Bool)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("tags", AttributeType::Map(Box::new(AttributeType::String)))
                    .computed()
                    .build(),
            )
            .timeouts(
                Timeouts::new()
                    .create(Duration::from_secs(10 * 60))
                    .update(Duration::from_secs(10 * 60))
                    .delete(Duration::from_secs(10 * 60)),
            )
            .build()
    }

    async fn validate(&self, request: ValidateResourceConfigRequest) -> Diagnostics {
        let mut diagnostics = self.schema().validate(&request.config);
        let config = &request.config;

        if let Some(cidr) = config.get_string_opt(&path("cidr_block")) {
            if let Err(detail) = validate_cidr(&cidr) {
                diagnostics.push(
                    Diagnostic::error("Invalid cidr_block", detail).with_attribute(path("cidr_block")),
                );
            }
        }
        if let Some(name) = config.get_string_opt(&path("vpc_name")) {
            if !(1..=128).contains(&name.chars().count())
                || name.starts_with("http://")
                || name.starts_with("https://")
            {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid vpc_name",
                        "vpc_name must be 1 to 128 characters and must not start with http:// or https://",
                    )
                    .with_attribute(path("vpc_name")),
                );
            }
        }

        diagnostics
    }

    async fn create(&self, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut new_state = request.planned_state.clone();
        let mut diagnostics = Diagnostics::new();

        if let Err(e) = self.create_vpc(&request, &mut new_state).await {
            diagnostics.push(e.to_diagnostic("Failed to create VPC"));
        }

        CreateResourceResponse {
            new_state,
            diagnostics,
        }
    }

    async fn read(&self, request: ReadResourceRequest) -> ReadResourceResponse {
        let mut diagnostics = Diagnostics::new();

        let vpc_id = match request.current_state.get_string(&path("id")) {
            Ok(id) => id,
            Err(_) => {
                return ReadResourceResponse {
                    new_state: None,
                    diagnostics,
                }
            }
        };

        match self.read_vpc(&vpc_id).await {
            Ok(vpc) => {
                let mut new_state = request.current_state.clone();
                if let Err(e) = Self::apply(&mut new_state, &vpc) {
                    diagnostics.push(e.to_diagnostic("Failed to read VPC"));
                }
                ReadResourceResponse {
                    new_state: Some(new_state),
                    diagnostics,
                }
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(vpc_id = %vpc_id, "VPC not found, removing from state");
                ReadResourceResponse {
                    new_state: None,
                    diagnostics,
                }
            }
            Err(e) => {
                diagnostics.push(e.to_diagnostic("Failed to read VPC"));
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

        if let Err(e) = self.update_vpc(&request, &mut new_state).await {
            diagnostics.push(e.to_diagnostic("Failed to update VPC"));
        }

        UpdateResourceResponse {
            new_state,
            diagnostics,
        }
    }

    async fn delete(&self, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = Diagnostics::new();

        if let Err(e) = self.delete_vpc(&request).await {
            diagnostics.push(e.to_diagnostic("Failed to delete VPC"));
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for VpcResource {
    async fn configure(&mut self, request: ConfigureResourceRequest) -> ConfigureResourceResponse {
        let mut diagnostics = Diagnostics::new();

        match extract_provider_data(request.provider_data) {
            Ok(data) => self.provider_data = Some(data),
            Err(diag) => diagnostics.push(diag),
        }

        ConfigureResourceResponse { diagnostics }
    }
}
