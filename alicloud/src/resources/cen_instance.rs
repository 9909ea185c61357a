//! alicloud_cen_instance

use async_trait::async_trait;
use std::collections::HashMap;
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

use crate::api::cbn::{Cen, CreateCenRequest, ModifyCenAttributeRequest};
use crate::api::response::tags_to_map;
use crate::api::ClientToken;
use crate::handler::{
    changed_string, extract_provider_data, path, set_optional_string, string_map, Deadline,
    HandlerError, HandlerResult,
};
use crate::AlicloudProviderData;

const TYPE_NAME: &str = "alicloud_cen_instance";

#[derive(Default)]
pub struct CenInstanceResource {
    provider_data: Option<AlicloudProviderData>,
}

impl CenInstanceResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> HandlerResult<&AlicloudProviderData> {
        self.provider_data.as_ref().ok_or(HandlerError::NotConfigured)
    }

    fn apply(state: &mut DynamicValue, cen: &Cen) -> HandlerResult<()> {
        state.set_string(&path("id"), cen.cen_id.as_str())?;
        set_optional_string(state, "name", &cen.name)?;
        set_optional_string(state, "description", &cen.description)?;
        state.set_string(&path("protection_level"), cen.protection_level.as_str())?;
        state.set_string(&path("status"), cen.status.as_str())?;
        state.set_map(&path("tags"), string_map(&tags_to_map(&cen.tags)))?;
        Ok(())
    }

    async fn create_cen(
        &self,
        request: &CreateResourceRequest,
        state: &mut DynamicValue,
    ) -> HandlerResult<()> {
        let data = self.data()?;
        let api = data.cbn()?;
        let deadline = Deadline::after(request.timeout);
        let config = &request.config;

        let create = CreateCenRequest {
            name: config.get_string_opt(&path("name")),
            description: config.get_string_opt(&path("description")),
            protection_level: config.get_string_opt(&path("protection_level")),
            client_token: Some(ClientToken::new()),
        };
        let cen_id = api.create_cen(create, deadline.remaining()).await?;
        state.set_string(&path("id"), cen_id.as_str())?;

        data.wait_for(&["Active"], deadline.remaining())
            .pending(&["Creating"])
            .wait_for_state(|| api.cen_refresh(&cen_id))
            .await?;

        let tags = config.get_string_map(&path("tags"));
        if !tags.is_empty() {
            api.set_tags(&cen_id, &HashMap::new(), &tags, deadline.remaining())
                .await?;
        }

        let cen = api.describe_cen(&cen_id).await?;
        Self::apply(state, &cen)
    }

    async fn read_cen(&self, cen_id: &str) -> HandlerResult<Cen> {
        let api = self.data()?.cbn()?;
        Ok(api.describe_cen(cen_id).await?)
    }

    async fn update_cen(
        &self,
        request: &UpdateResourceRequest,
        state: &mut DynamicValue,
    ) -> HandlerResult<()> {
        let data = self.data()?;
        let api = data.cbn()?;
        let deadline = Deadline::after(request.timeout);
        let prior = &request.prior_state;
        let config = &request.config;
        let cen_id = prior.get_string(&path("id"))?;
        state.set_string(&path("id"), cen_id.as_str())?;

        let modify = ModifyCenAttributeRequest {
            cen_id: cen_id.clone(),
            name: changed_string(prior, config, "name"),
            description: changed_string(prior, config, "description"),
            protection_level: changed_string(prior, config, "protection_level"),
        };
        if !modify.is_empty() {
            api.modify_cen(&modify, deadline.remaining()).await?;
            data.wait_for(&["Active"], deadline.remaining())
                .pending(&["Updating", "Modifying"])
                .wait_for_state(|| api.cen_refresh(&cen_id))
                .await?;
        }

        let old_tags = prior.get_string_map(&path("tags"));
        let new_tags = config.get_string_map(&path("tags"));
        if old_tags != new_tags {
            api.set_tags(&cen_id, &old_tags, &new_tags, deadline.remaining())
                .await?;
        }

        let cen = api.describe_cen(&cen_id).await?;
        Self::apply(state, &cen)
    }

    async fn delete_cen(&self, request: &DeleteResourceRequest) -> HandlerResult<()> {
        let data = self.data()?;
        let api = data.cbn()?;
        let deadline = Deadline::after(request.timeout);
        let cen_id = request.prior_state.get_string(&path("id"))?;

        api.delete_cen(&cen_id, deadline.remaining()).await?;
        data.wait_for_deletion(deadline.remaining())
            .wait_for_state(|| api.cen_refresh(&cen_id))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Resource for CenInstanceResource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Manages a Cloud Enterprise Network instance")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Instance name, 2 to 128 characters")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .description("Instance description, 2 to 256 characters")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("protection_level", AttributeType::String)
                    .description("CIDR overlap protection level; only REDUCED is supported")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("tags", AttributeType::Map(Box::new(AttributeType::String)))
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
                    .computed()
                    .build(),
            )
            .timeouts(
                Timeouts::new()
                    .create(Duration::from_secs(6 * 60))
                    .update(Duration::from_secs(6 * 60))
                    .delete(Duration::from_secs(10 * 60)),
            )
            .build()
    }

    async fn validate(&self, request: ValidateResourceConfigRequest) -> Diagnostics {
        let mut diagnostics = self.schema().validate(&request.config);
        let config = &request.config;

        if let Some(name) = config.get_string_opt(&path("name")) {
            if !(2..=128).contains(&name.chars().count())
                || name.starts_with("http://")
                || name.starts_with("https://")
            {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid name",
                        "name must be 2 to 128 characters and must not start with http:// or https://",
                    )
                    .with_attribute(path("name")),
                );
            }
        }
        if let Some(description) = config.get_string_opt(&path("description")) {
            if !(2..=256).contains(&description.chars().count()) {
                diagnostics.push(
                    Diagnostic::error("Invalid description", "description must be 2 to 256 characters")
                        .with_attribute(path("description")),
                );
            }
        }
        if let Some(level) = config.get_string_opt(&path("protection_level")) {
            if level != "REDUCED" {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid protection_level",
                        format!("protection_level must be REDUCED, got {}", level),
                    )
                    .with_attribute(path("protection_level")),
                );
            }
        }

        diagnostics
    }

    async fn create(&self, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut new_state = request.planned_state.clone();
        let mut diagnostics = Diagnostics::new();

        if let Err(e) = self.create_cen(&request, &mut new_state).await {
            diagnostics.push(e.to_diagnostic("Failed to create CEN instance"));
        }

        CreateResourceResponse {
            new_state,
            diagnostics,
        }
    }

    async fn read(&self, request: ReadResourceRequest) -> ReadResourceResponse {
        let mut diagnostics = Diagnostics::new();

        let cen_id = match request.current_state.get_string(&path("id")) {
            Ok(id) => id,
            Err(_) => {
                return ReadResourceResponse {
                    new_state: None,
                    diagnostics,
                }
            }
        };

        match self.read_cen(&cen_id).await {
            Ok(cen) => {
                let mut new_state = request.current_state.clone();
                if let Err(e) = Self::apply(&mut new_state, &cen) {
                    diagnostics.push(e.to_diagnostic("Failed to read CEN instance"));
                }
                ReadResourceResponse {
                    new_state: Some(new_state),
                    diagnostics,
                }
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(cen_id = %cen_id, "CEN instance not found, removing from state");
                ReadResourceResponse {
                    new_state: None,
                    diagnostics,
                }
            }
            Err(e) => {
                diagnostics.push(e.to_diagnostic("Failed to read CEN instance"));
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

        if let Err(e) = self.update_cen(&request, &mut new_state).await {
            diagnostics.push(e.to_diagnostic("Failed to update CEN instance"));
        }

        UpdateResourceResponse {
            new_state,
            diagnostics,
        }
    }

    async fn delete(&self, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = Diagnostics::new();

        if let Err(e) = self.delete_cen(&request).await {
            diagnostics.push(e.to_diagnostic("Failed to delete CEN instance"));
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for CenInstanceResource {
    async fn configure(&mut self, request: ConfigureResourceRequest) -> ConfigureResourceResponse {
        let mut diagnostics = Diagnostics::new();

        match extract_provider_data(request.provider_data) {
            Ok(data) => self.provider_data = Some(data),
            Err(diag) => diagnostics.push(diag),
        }

        ConfigureResourceResponse { diagnostics }
    }
}
