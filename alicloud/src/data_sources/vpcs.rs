//! alicloud_vpcs data source

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceWithConfigure,
    ReadDataSourceRequest, ReadDataSourceResponse, ValidateDataSourceConfigRequest,
};
use tfplug::{AttributeBuilder, AttributeType, Diagnostics, Dynamic, DynamicValue, Schema, SchemaBuilder};

use crate::api::response::tags_to_map;
use crate::api::vpc::{DescribeVpcsRequest, Vpc};
use crate::handler::{
    data_source_id, extract_provider_data, name_regex, path, string_list, string_map,
    HandlerError, HandlerResult,
};
use crate::AlicloudProviderData;

const TYPE_NAME: &str = "alicloud_vpcs";

#[derive(Default)]
pub struct VpcsDataSource {
    provider_data: Option<AlicloudProviderData>,
}

impl VpcsDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn vpc_object(vpc: &Vpc) -> Dynamic {
        let mut object = HashMap::new();
        object.insert("id".to_string(), Dynamic::String(vpc.vpc_id.clone()));
        object.insert("vpc_name".to_string(), Dynamic::String(vpc.vpc_name.clone()));
        object.insert("cidr_block".to_string(), Dynamic::String(vpc.cidr_block.clone()));
        object.insert("description".to_string(), Dynamic::String(vpc.description.clone()));
        object.insert("status".to_string(), Dynamic::String(vpc.status.clone()));
        object.insert("region_id".to_string(), Dynamic::String(vpc.region_id.clone()));
        object.insert("router_id".to_string(), Dynamic::String(vpc.router_id.clone()));
        object.insert("is_default".to_string(), Dynamic::Bool(vpc.is_default));
        object.insert(
            "resource_group_id".to_string(),
            Dynamic::String(vpc.resource_group_id.clone()),
        );
        object.insert("creation_time".to_string(), Dynamic::String(vpc.creation_time.clone()));
        object.insert("tags".to_string(), Dynamic::Map(string_map(&tags_to_map(&vpc.tags))));
        Dynamic::Map(object)
    }

    async fn read_vpcs(&self, config: &DynamicValue) -> HandlerResult<DynamicValue> {
        let data = self.provider_data.as_ref().ok_or(HandlerError::NotConfigured)?;
        let api = data.vpc()?;

        let name_regex = name_regex(config)?;
        let ids: HashSet<String> = config.get_string_list(&path("ids")).into_iter().collect();
        let cidr_block = config.get_string_opt(&path("cidr_block"));
        let status = config.get_string_opt(&path("status"));

        let filter = DescribeVpcsRequest {
            vpc_id: if ids.len() == 1 {
                ids.iter().next().cloned()
            } else {
                None
            },
            is_default: config.get_bool_opt(&path("is_default")),
            resource_group_id: config.get_string_opt(&path("resource_group_id")),
            ..Default::default()
        };

        let vpcs: Vec<Vpc> = api
            .list_vpcs(&filter)
            .await?
            .into_iter()
            .filter(|vpc| ids.is_empty() || ids.contains(&vpc.vpc_id))
            .filter(|vpc| name_regex.as_ref().map_or(true, |re| re.is_match(&vpc.vpc_name)))
            .filter(|vpc| cidr_block.as_ref().map_or(true, |cidr| *cidr == vpc.cidr_block))
            .filter(|vpc| status.as_ref().map_or(true, |s| *s == vpc.status))
            .collect();
        tracing::debug!(count = vpcs.len(), "VPCs matched filters");

        let matched_ids: Vec<String> = vpcs.iter().map(|v| v.vpc_id.clone()).collect();
        let mut state = config.clone();
        state.set_string(&path("id"), data_source_id(&matched_ids))?;
        state.set_list(&path("ids"), string_list(matched_ids))?;
        state.set_list(&path("names"), string_list(vpcs.iter().map(|v| v.vpc_name.clone())))?;
        state.set_list(&path("vpcs"), vpcs.iter().map(Self::vpc_object).collect())?;
        Ok(state)
    }
}

#[async_trait]
impl DataSource for VpcsDataSource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        let vpc_fields: HashMap<String, AttributeType> = [
            ("id", AttributeType::String),
            ("vpc_name", AttributeType::String),
            ("cidr_block", AttributeType::String),
            ("description", AttributeType::String),
            ("status", AttributeType::String),
            ("region_id", AttributeType::String),
            ("router_id", AttributeType::String),
            ("is_default", AttributeType::Bool),
            ("resource_group_id", AttributeType::String),
            ("creation_time", AttributeType::String),
            ("tags", AttributeType::Map(Box::new(AttributeType::String))),
        ]
        .into_iter()
        .map(|(name, ty)| (name.to_string(), ty))
        .collect();

        SchemaBuilder::new()
            .version(0)
            .description("Lists VPCs of the configured region")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("ids", AttributeType::List(Box::new(AttributeType::String)))
                    .description("Restrict the result to these VPC ids")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name_regex", AttributeType::String)
                    .description("Regular expression the VPC name must match")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("cidr_block", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
                    .description("Pending or Available")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("is_default", AttributeType::Bool)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("resource_group_id", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("names", AttributeType::List(Box::new(AttributeType::String)))
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "vpcs",
                    AttributeType::List(Box::new(AttributeType::Object(vpc_fields))),
                )
                .computed()
                .build(),
            )
            .build()
    }

    async fn validate(&self, request: ValidateDataSourceConfigRequest) -> Diagnostics {
        let mut diagnostics = self.schema().validate(&request.config);
        if let Err(e) = name_regex(&request.config) {
            diagnostics.push(e.to_diagnostic("Invalid name_regex"));
        }
        diagnostics
    }

    async fn read(&self, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let mut diagnostics = Diagnostics::new();

        match self.read_vpcs(&request.config).await {
            Ok(state) => ReadDataSourceResponse { state, diagnostics },
            Err(e) => {
                diagnostics.push(e.to_diagnostic("Failed to read VPCs"));
                ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics,
                }
            }
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for VpcsDataSource {
    async fn configure(
        &mut self,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        let mut diagnostics = Diagnostics::new();

        match extract_provider_data(request.provider_data) {
            Ok(data) => self.provider_data = Some(data),
            Err(diag) => diagnostics.push(diag),
        }

        ConfigureDataSourceResponse { diagnostics }
    }
}
