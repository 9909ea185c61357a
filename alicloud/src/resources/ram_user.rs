//! alicloud_ram_user

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

use crate::api::ram::{CreateUserRequest, UpdateUserRequest, User};
use crate::api::ApiError;
use crate::handler::{
    changed_string, extract_provider_data, path, set_optional_string, Deadline, HandlerError,
    HandlerResult,
};
use crate::AlicloudProviderData;

const TYPE_NAME: &str = "alicloud_ram_user";

#[derive(Default)]
pub struct RamUserResource {
    provider_data: Option<AlicloudProviderData>,
}

impl RamUserResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> HandlerResult<&AlicloudProviderData> {
        self.provider_data.as_ref().ok_or(HandlerError::NotConfigured)
    }

    fn apply(state: &mut DynamicValue, user: &User) -> HandlerResult<()> {
        state.set_string(&path("id"), user.user_id.as_str())?;
        state.set_string(&path("name"), user.user_name.as_str())?;
        set_optional_string(state, "display_name", &user.display_name)?;
        set_optional_string(state, "mobile", &user.mobile_phone)?;
        set_optional_string(state, "email", &user.email)?;
        set_optional_string(state, "comments", &user.comments)?;
        set_optional_string(state, "create_date", &user.create_date)?;
        Ok(())
    }

    async fn create_user(
        &self,
        request: &CreateResourceRequest,
        state: &mut DynamicValue,
    ) -> HandlerResult<()> {
        let api = self.data()?.ram()?;
        let deadline = Deadline::after(request.timeout);
        let config = &request.config;

        let create = CreateUserRequest {
            user_name: config.get_string(&path("name"))?,
            display_name: config.get_string_opt(&path("display_name")),
            mobile_phone: config.get_string_opt(&path("mobile")),
            email: config.get_string_opt(&path("email")),
            comments: config.get_string_opt(&path("comments")),
        };
        let user = api.create_user(&create, deadline.remaining()).await?;
        state.set_string(&path("id"), user.user_id.as_str())?;

        let user = api.get_user(&create.user_name).await?;
        Self::apply(state, &user)
    }

    /// Looks the user up by name, the key every RAM action takes. A user of
    /// that name with another id was recreated outside Terraform.
    async fn read_user(&self, state: &DynamicValue) -> HandlerResult<User> {
        let api = self.data()?.ram()?;
        let user_id = state.get_string(&path("id"))?;
        let name = state.get_string(&path("name"))?;

        let user = api.get_user(&name).await?;
        if user.user_id != user_id {
            return Err(ApiError::not_found("RamUser", &user_id).into());
        }
        Ok(user)
    }

    async fn update_user(
        &self,
        request: &UpdateResourceRequest,
        state: &mut DynamicValue,
    ) -> HandlerResult<()> {
        let api = self.data()?.ram()?;
        let prior = &request.prior_state;
        let config = &request.config;
        let user_name = prior.get_string(&path("name"))?;

        let update = UpdateUserRequest {
            user_name: user_name.clone(),
            new_user_name: changed_string(prior, config, "name"),
            new_display_name: changed_string(prior, config, "display_name"),
            new_mobile_phone: changed_string(prior, config, "mobile"),
            new_email: changed_string(prior, config, "email"),
            new_comments: changed_string(prior, config, "comments"),
        };

        let user = if update.is_empty() {
            api.get_user(&user_name).await?
        } else {
            api.update_user(&update, request.timeout).await?
        };
        Self::apply(state, &user)
    }

    async fn delete_user(&self, request: &DeleteResourceRequest) -> HandlerResult<()> {
        let api = self.data()?.ram()?;
        let user_name = request.prior_state.get_string(&path("name"))?;
        api.delete_user(&user_name, request.timeout).await?;
        Ok(())
    }
}

fn valid_mobile(mobile: &str) -> bool {
    match mobile.split_once('-') {
        Some((country, number)) => {
            !country.is_empty()
                && !number.is_empty()
                && country.chars().all(|c| c.is_ascii_digit())
                && number.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

fn valid_user_name(name: &str) -> bool {
    (1..=64).contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '@'))
}

#[async_trait]
impl Resource for RamUserResource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Manages a RAM user")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Login name, 1 to 64 of letters, digits, '.', '_', '-' and '@'")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("display_name", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("mobile", AttributeType::String)
                    .description("Phone number in <country code>-<number> form")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("email", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("comments", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("create_date", AttributeType::String)
                    .computed()
                    .build(),
            )
            .timeouts(Timeouts::new().create(Duration::from_secs(60)))
            .build()
    }

    async fn validate(&self, request: ValidateResourceConfigRequest) -> Diagnostics {
        let mut diagnostics = self.schema().validate(&request.config);
        let config = &request.config;

        if let Some(name) = config.get_string_opt(&path("name")) {
            if !valid_user_name(&name) {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid name",
                        format!("{} is not a valid RAM user name", name),
                    )
                    .with_attribute(path("name")),
                );
            }
        }
        if let Some(mobile) = config.get_string_opt(&path("mobile")) {
            if !valid_mobile(&mobile) {
                diagnostics.push(
                    Diagnostic::error("Invalid mobile", "mobile must look like 86-18600008888")
                        .with_attribute(path("mobile")),
                );
            }
        }
        if let Some(email) = config.get_string_opt(&path("email")) {
            let well_formed = email
                .split_once('@')
                .map_or(false, |(local, domain)| !local.is_empty() && domain.contains('.'));
            if !well_formed {
                diagnostics.push(
                    Diagnostic::error("Invalid email", format!("{} is not an email address", email))
                        .with_attribute(path("email")),
                );
            }
        }

        diagnostics
    }

    async fn create(&self, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut new_state = request.planned_state.clone();
        let mut diagnostics = Diagnostics::new();

        if let Err(e) = self.create_user(&request, &mut new_state).await {
            diagnostics.push(e.to_diagnostic("Failed to create RAM user"));
        }

        CreateResourceResponse {
            new_state,
            diagnostics,
        }
    }

    async fn read(&self, request: ReadResourceRequest) -> ReadResourceResponse {
        let mut diagnostics = Diagnostics::new();

        match self.read_user(&request.current_state).await {
            Ok(user) => {
                let mut new_state = request.current_state.clone();
                if let Err(e) = Self::apply(&mut new_state, &user) {
                    diagnostics.push(e.to_diagnostic("Failed to read RAM user"));
                }
                ReadResourceResponse {
                    new_state: Some(new_state),
                    diagnostics,
                }
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("RAM user not found, removing from state");
                ReadResourceResponse {
                    new_state: None,
                    diagnostics,
                }
            }
            Err(e) => {
                diagnostics.push(e.to_diagnostic("Failed to read RAM user"));
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

        if let Err(e) = self.update_user(&request, &mut new_state).await {
            diagnostics.push(e.to_diagnostic("Failed to update RAM user"));
        }

        UpdateResourceResponse {
            new_state,
            diagnostics,
        }
    }

    async fn delete(&self, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = Diagnostics::new();

        if let Err(e) = self.delete_user(&request).await {
            diagnostics.push(e.to_diagnostic("Failed to delete RAM user"));
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for RamUserResource {
    async fn configure(&mut self, request: ConfigureResourceRequest) -> ConfigureResourceResponse {
        let mut diagnostics = Diagnostics::new();

        match extract_provider_data(request.provider_data) {
            Ok(data) => self.provider_data = Some(data),
            Err(diag) => diagnostics.push(diag),
        }

        ConfigureResourceResponse { diagnostics }
    }
}
