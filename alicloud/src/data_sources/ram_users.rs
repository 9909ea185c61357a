//! alicloud_ram_users data source

use async_trait::async_trait;
use std::collections::HashMap;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceWithConfigure,
    ReadDataSourceRequest, ReadDataSourceResponse, ValidateDataSourceConfigRequest,
};
use tfplug::{AttributeBuilder, AttributeType, Diagnostics, Dynamic, DynamicValue, Schema, SchemaBuilder};

use crate::api::ram::User;
use crate::handler::{
    data_source_id, extract_provider_data, name_regex, path, string_list, HandlerError,
    HandlerResult,
};
use crate::AlicloudProviderData;

const TYPE_NAME: &str = "alicloud_ram_users";

#[derive(Default)]
pub struct RamUsersDataSource {
    provider_data: Option<AlicloudProviderData>,
}

impl RamUsersDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn user_object(user: &User) -> Dynamic {
        let mut object = HashMap::new();
        object.insert("id".to_string(), Dynamic::String(user.user_id.clone()));
        object.insert("name".to_string(), Dynamic::String(user.user_name.clone()));
        object.insert("display_name".to_string(), Dynamic::String(user.display_name.clone()));
        object.insert("create_date".to_string(), Dynamic::String(user.create_date.clone()));
        Dynamic::Map(object)
    }

    async fn read_users(&self, config: &DynamicValue) -> HandlerResult<DynamicValue> {
        let data = self.provider_data.as_ref().ok_or(HandlerError::NotConfigured)?;
        let api = data.ram()?;
        let name_regex = name_regex(config)?;

        let users: Vec<User> = api
            .list_users()
            .await?
            .into_iter()
            .filter(|user| name_regex.as_ref().map_or(true, |re| re.is_match(&user.user_name)))
            .collect();

        let matched_ids: Vec<String> = users.iter().map(|u| u.user_id.clone()).collect();
        let mut state = config.clone();
        state.set_string(&path("id"), data_source_id(&matched_ids))?;
        state.set_list(&path("ids"), string_list(matched_ids))?;
        state.set_list(&path("names"), string_list(users.iter().map(|u| u.user_name.clone())))?;
        state.set_list(&path("users"), users.iter().map(Self::user_object).collect())?;
        Ok(state)
    }
}

#[async_trait]
impl DataSource for RamUsersDataSource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        let user_fields: HashMap<String, AttributeType> = ["id", "name", "display_name", "create_date"]
            .into_iter()
            .map(|name| (name.to_string(), AttributeType::String))
            .collect();

        SchemaBuilder::new()
            .version(0)
            .description("Lists RAM users of the account")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name_regex", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("ids", AttributeType::List(Box::new(AttributeType::String)))
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("names", AttributeType::List(Box::new(AttributeType::String)))
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "users",
                    AttributeType::List(Box::new(AttributeType::Object(user_fields))),
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

        match self.read_users(&request.config).await {
            Ok(state) => ReadDataSourceResponse { state, diagnostics },
            Err(e) => {
                diagnostics.push(e.to_diagnostic("Failed to read RAM users"));
                ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics,
                }
            }
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for RamUsersDataSource {
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
