//! Terraform provider for Alibaba Cloud built on tfplug

pub mod api;
pub mod data_sources;
pub mod handler;
pub mod logging;
pub mod provider_data;
pub mod resources;

pub use provider_data::AlicloudProviderData;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, ResourceFactory,
};
use tfplug::{
    AttributeBuilder, AttributeType, Diagnostics, DynamicValue, Provider, Schema, SchemaBuilder,
};

use api::config::{DEFAULT_REGION, ENV_ACCESS_KEY, ENV_REGION, ENV_SECRET_KEY, ENV_SECURITY_TOKEN};
use api::{AliyunClient, Config, Product};

const PRODUCTS: [Product; 4] = [Product::Ecs, Product::Vpc, Product::Cbn, Product::Ram];

#[derive(Default)]
pub struct AlicloudProvider;

impl AlicloudProvider {
    pub fn new() -> Self {
        Self
    }
}

/// Provider block value, falling back to an environment variable. Empty
/// strings count as unset.
fn setting(config: &DynamicValue, name: &str, env: &str) -> Option<String> {
    config
        .get_string_opt(&handler::path(name))
        .or_else(|| std::env::var(env).ok())
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl Provider for AlicloudProvider {
    fn type_name(&self) -> &str {
        "alicloud"
    }

    fn schema(&self) -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Alibaba Cloud provider")
            .attribute(
                AttributeBuilder::new("access_key", AttributeType::String)
                    .description("Access key id. Defaults to ALICLOUD_ACCESS_KEY")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("secret_key", AttributeType::String)
                    .description("Access key secret. Defaults to ALICLOUD_SECRET_KEY")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("security_token", AttributeType::String)
                    .description("STS token. Defaults to ALICLOUD_SECURITY_TOKEN")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("region", AttributeType::String)
                    .description("Region id. Defaults to ALICLOUD_REGION, then cn-beijing")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "endpoints",
                    AttributeType::Map(Box::new(AttributeType::String)),
                )
                .description("Endpoint overrides keyed by product code: ecs, vpc, cbn, ram")
                .optional()
                .build(),
            )
            .attribute(
                AttributeBuilder::new("configuration_source", AttributeType::String)
                    .description("Label appended to the User-Agent of every request")
                    .optional()
                    .build(),
            )
            .build()
    }

    async fn configure(&mut self, request: ConfigureProviderRequest) -> ConfigureProviderResponse {
        let config = &request.config;
        let mut diagnostics = Diagnostics::new();

        let access_key = setting(config, "access_key", ENV_ACCESS_KEY);
        let secret_key = setting(config, "secret_key", ENV_SECRET_KEY);
        let security_token = setting(config, "security_token", ENV_SECURITY_TOKEN);
        let region =
            setting(config, "region", ENV_REGION).unwrap_or_else(|| DEFAULT_REGION.to_string());

        let (access_key, secret_key) = match (access_key, secret_key) {
            (Some(access_key), Some(secret_key)) => (access_key, secret_key),
            (None, _) => {
                diagnostics.add_error(
                    "access_key is required (set in provider config or ALICLOUD_ACCESS_KEY env var)",
                    "",
                );
                return ConfigureProviderResponse {
                    provider_data: None,
                    diagnostics,
                };
            }
            (_, None) => {
                diagnostics.add_error(
                    "secret_key is required (set in provider config or ALICLOUD_SECRET_KEY env var)",
                    "",
                );
                return ConfigureProviderResponse {
                    provider_data: None,
                    diagnostics,
                };
            }
        };

        let mut client_config = Config::new(&region, &access_key, &secret_key)
            .with_security_token(security_token);
        client_config.configuration_source =
            config.get_string_opt(&handler::path("configuration_source"));

        for (product, endpoint) in config.get_string_map(&handler::path("endpoints")) {
            if PRODUCTS.iter().any(|p| p.code() == product.to_lowercase()) {
                client_config = client_config.with_endpoint(&product, &endpoint);
            } else {
                diagnostics.add_warning(
                    format!("Unknown endpoint product {}", product),
                    "Supported products are ecs, vpc, cbn and ram; the override is ignored",
                );
            }
        }

        tracing::info!(
            region = %region,
            configuration = ?client_config,
            "configuring Alibaba Cloud provider"
        );

        match AliyunClient::new(client_config) {
            Ok(client) => ConfigureProviderResponse {
                provider_data: Some(Arc::new(AlicloudProviderData::new(client))),
                diagnostics,
            },
            Err(e) => {
                diagnostics.add_error("Failed to create API client", e.to_string());
                ConfigureProviderResponse {
                    provider_data: None,
                    diagnostics,
                }
            }
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut factories: HashMap<String, ResourceFactory> = HashMap::new();
        factories.insert("alicloud_cen_instance".to_string(), || {
            Box::new(resources::CenInstanceResource::new())
        });
        factories.insert("alicloud_vpc".to_string(), || {
            Box::new(resources::VpcResource::new())
        });
        factories.insert("alicloud_eip_address".to_string(), || {
            Box::new(resources::EipAddressResource::new())
        });
        factories.insert("alicloud_ram_user".to_string(), || {
            Box::new(resources::RamUserResource::new())
        });
        factories.insert("alicloud_security_group".to_string(), || {
            Box::new(resources::SecurityGroupResource::new())
        });
        factories
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        let mut factories: HashMap<String, DataSourceFactory> = HashMap::new();
        factories.insert("alicloud_vpcs".to_string(), || {
            Box::new(data_sources::VpcsDataSource::new())
        });
        factories.insert("alicloud_cen_instances".to_string(), || {
            Box::new(data_sources::CenInstancesDataSource::new())
        });
        factories.insert("alicloud_ram_users".to_string(), || {
            Box::new(data_sources::RamUsersDataSource::new())
        });
        factories
    }
}
