//! alicloud_cen_instances data source

use async_trait::async_trait;
use std::collections::HashMap;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceWithConfigure,
    ReadDataSourceRequest, ReadDataSourceResponse, ValidateDataSourceConfigRequest,
};
use tfplug::{AttributeBuilder, AttributeType, Diagnostics, Dynamic, DynamicValue, Schema, SchemaBuilder};

use crate::api::cbn::Cen;
use crate::api::response::tags_to_map;
use crate::handler::{
    data_source_id, extract_provider_data, name_regex, path, string_list, string_map,
    HandlerError, HandlerResult,
};
use crate::AlicloudProviderData;

const TYPE_NAME: &str = "alicloud_cen_instances";

#[derive(Default)]
pub struct CenInstancesDataSource {
    provider_data: Option<AlicloudProviderData>,
}

impl CenInstancesDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn instance_object(cen: &Cen) -> Dynamic {
        let mut object = HashMap::new();
        object.insert("id".to_string(), Dynamic::String(cen.cen_id.clone()));
        object.insert("name".to_string(), Dynamic::String(cen.name.clone()));
        object.insert("description".to_string(), Dynamic::String(cen.description.clone()));
        object.insert("status".to_string(), Dynamic::String(cen.status.clone()));
        object.insert(
            "protection_level".to_string(),
            Dynamic::String(cen.protection_level.clone()),
        );
        object.insert("tags".to_string(), Dynamic::Map(string_map(&tags_to_map(&cen.tags))));
        Dynamic::Map(object)
    }

    async fn read_instances(&self, config: &DynamicValue) -> HandlerResult<DynamicValue> {
        let data = self.provider_data.as_ref().ok_or(HandlerError::NotConfigured)?;
        let api = data.cbn()?;

        let name_regex = name_regex(config)?;
        let ids = config.get_string_list(&path("ids"));
        let status = config.get_string_opt(&path("status"));

        // The CenId filter narrows the listing server side
        let instances: Vec<Cen> = api
            .list_cens(&ids)
            .await?
            .into_iter()
            .filter(|cen| name_regex.as_ref().map_or(true, |re| re.is_match(&cen.name)))
            .filter(|cen| status.as_ref().map_or(true, |s| *s == cen.status))
            .collect();

        let matched_ids: Vec<String> = instances.iter().map(|c| c.cen_id.clone()).collect();
        let mut state = config.clone();
        state.set_string(&path("id"), data_source_id(&matched_ids))?;
        state.set_list(&path("ids"), string_list(matched_ids))?;
        state.set_list(&path("names"), string_list(instances.iter().map(|c| c.name.clone())))?;
        state.set_list(
            &path("instances"),
            instances.iter().map(Self::instance_object).collect(),
        )?;
        Ok(state)
    }
}

#[async_trait]
impl DataSource for CenInstancesDataSource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        let instance_fields: HashMap<String, AttributeType> = [
            ("id", AttributeType::String),
            ("name", AttributeType::String),
            ("description", AttributeType::String),
            ("status", AttributeType::String),
            ("protection_level", AttributeType::String),
            ("tags", AttributeType::Map(Box::new(AttributeType::String))),
        ]
        .into_iter()
        .map(|(name, ty)| (name.to_string(), ty))
        .collect();

        SchemaBuilder::new()
            .version(0)
            .description("Lists Cloud Enterprise Network instances")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("ids", AttributeType::List(Box::new(AttributeType::String)))
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name_regex", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
                    .description("Creating, Active or Deleting")
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
                    "instances",
                    AttributeType::List(Box::new(AttributeType::Object(instance_fields))),
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

        match self.read_instances(&request.config).await {
            Ok(state) => ReadDataSourceResponse { state, diagnostics },
            Err(e) => {
                diagnostics.push(e.to_diagnostic("Failed to read CEN instances"));
                ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics,
                }
            }
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for CenInstancesDataSource {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{AliyunClient, Config};
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn ids_become_a_cen_id_filter() {
        let mut server = Server::new_async().await;
        let list = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("Action".into(), "DescribeCens".into()),
                Matcher::UrlEncoded("Filter.1.Key".into(), "CenId".into()),
                Matcher::UrlEncoded("Filter.1.Value.1".into(), "cen-1".into()),
                Matcher::UrlEncoded("Filter.1.Value.2".into(), "cen-2".into()),
            ]))
            .with_body(r#"{"RequestId":"R","TotalCount":2,"Cens":{"Cen":[
                {"CenId":"cen-1","Name":"core","Status":"Active","ProtectionLevel":"REDUCED"},
                {"CenId":"cen-2","Name":"lab","Status":"Creating","ProtectionLevel":"REDUCED"}
            ]}}"#)
            .expect(1)
            .create_async()
            .await;

        let config = Config::new("cn-hangzhou", "ak", "sk").with_endpoint("cbn", &server.url());
        let mut data_source = CenInstancesDataSource::new();
        data_source
            .configure(ConfigureDataSourceRequest {
                provider_data: Some(Arc::new(AlicloudProviderData::new(
                    AliyunClient::new(config).unwrap(),
                ))),
            })
            .await;

        let response = data_source
            .read(ReadDataSourceRequest {
                type_name: TYPE_NAME.to_string(),
                config: DynamicValue::from_json(json!({"ids": ["cen-1", "cen-2"], "status": "Active"})),
                timeout: Duration::from_secs(10),
            })
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(response.state.get_string_list(&path("ids")), vec!["cen-1"]);
        assert_eq!(response.state.get_string_list(&path("names")), vec!["core"]);
        assert_eq!(response.state.get_list(&path("instances")).unwrap().len(), 1);
        list.assert_async().await;
    }

    #[tokio::test]
    async fn unconfigured_read_fails() {
        let response = CenInstancesDataSource::new()
            .read(ReadDataSourceRequest {
                type_name: TYPE_NAME.to_string(),
                config: DynamicValue::from_json(json!({})),
                timeout: Duration::from_secs(1),
            })
            .await;

        assert!(response.diagnostics.has_errors());
        assert!(response.state.is_null());
    }
}
