//! Provider host: configures a provider once and dispatches lifecycle calls
//!
//! The host owns the provider data produced by `configure`, builds a fresh
//! resource or data source instance for every call through the provider's
//! factories, and resolves the timeout each operation runs under.

use crate::data_source::{
    ConfigureDataSourceRequest, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse,
};
use crate::error::{Result, TfplugError};
use crate::provider::{ConfigureProviderRequest, Provider, ProviderData};
use crate::resource::{
    ConfigureResourceRequest, CreateResourceRequest, CreateResourceResponse,
    DeleteResourceRequest, DeleteResourceResponse, ReadResourceRequest, ReadResourceResponse,
    ResourceWithConfigure, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest,
};
use crate::schema::{Operation, Timeouts};
use crate::types::{Diagnostics, DynamicValue};
use std::collections::HashMap;

pub struct ProviderHost<P: Provider> {
    provider: P,
    provider_data: Option<ProviderData>,
    timeout_overrides: HashMap<String, Timeouts>,
}

impl<P: Provider> ProviderHost<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            provider_data: None,
            timeout_overrides: HashMap::new(),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn is_configured(&self) -> bool {
        self.provider_data.is_some()
    }

    /// User supplied `timeouts` block for one resource type
    pub fn set_timeouts(&mut self, type_name: &str, overrides: Timeouts) {
        self.timeout_overrides
            .insert(type_name.to_string(), overrides);
    }

    pub async fn configure(&mut self, config: DynamicValue) -> Diagnostics {
        let mut diags = self.provider.schema().validate(&config);
        if diags.has_errors() {
            return diags;
        }

        let response = self
            .provider
            .configure(ConfigureProviderRequest { config })
            .await;
        diags.extend(response.diagnostics);

        if !diags.has_errors() {
            self.provider_data = response.provider_data;
        }
        diags
    }

    /// Builds and configures a resource instance
    pub async fn resource(&self, type_name: &str) -> Result<Box<dyn ResourceWithConfigure>> {
        let provider_data = self
            .provider_data
            .clone()
            .ok_or(TfplugError::ProviderNotConfigured)?;
        let factory = self
            .provider
            .resources()
            .get(type_name)
            .copied()
            .ok_or_else(|| TfplugError::ResourceNotFound(type_name.to_string()))?;

        let mut resource = factory();
        let response = resource
            .configure(ConfigureResourceRequest {
                provider_data: Some(provider_data),
            })
            .await;
        if response.diagnostics.has_errors() {
            return Err(TfplugError::ConfigurationFailed(summarize(
                &response.diagnostics,
            )));
        }

        tracing::debug!(type_name, "configured resource instance");
        Ok(resource)
    }

    /// Builds and configures a data source instance
    pub async fn data_source(&self, type_name: &str) -> Result<Box<dyn DataSourceWithConfigure>> {
        let provider_data = self
            .provider_data
            .clone()
            .ok_or(TfplugError::ProviderNotConfigured)?;
        let factory = self
            .provider
            .data_sources()
            .get(type_name)
            .copied()
            .ok_or_else(|| TfplugError::DataSourceNotFound(type_name.to_string()))?;

        let mut data_source = factory();
        let response = data_source
            .configure(ConfigureDataSourceRequest {
                provider_data: Some(provider_data),
            })
            .await;
        if response.diagnostics.has_errors() {
            return Err(TfplugError::ConfigurationFailed(summarize(
                &response.diagnostics,
            )));
        }

        Ok(data_source)
    }

    pub async fn validate(&self, type_name: &str, config: DynamicValue) -> Result<Diagnostics> {
        let resource = self.resource(type_name).await?;
        Ok(resource
            .validate(ValidateResourceConfigRequest {
                type_name: type_name.to_string(),
                config,
            })
            .await)
    }

    pub async fn create(
        &self,
        type_name: &str,
        config: DynamicValue,
    ) -> Result<CreateResourceResponse> {
        let resource = self.resource(type_name).await?;
        let timeout = self.timeout(resource.as_ref(), Operation::Create);
        Ok(resource
            .create(CreateResourceRequest {
                type_name: type_name.to_string(),
                planned_state: config.clone(),
                config,
                timeout,
            })
            .await)
    }

    pub async fn read(&self, type_name: &str, state: DynamicValue) -> Result<ReadResourceResponse> {
        let resource = self.resource(type_name).await?;
        let timeout = self.timeout(resource.as_ref(), Operation::Read);
        Ok(resource
            .read(ReadResourceRequest {
                type_name: type_name.to_string(),
                current_state: state,
                timeout,
            })
            .await)
    }

    pub async fn update(
        &self,
        type_name: &str,
        prior_state: DynamicValue,
        config: DynamicValue,
    ) -> Result<UpdateResourceResponse> {
        let resource = self.resource(type_name).await?;
        let timeout = self.timeout(resource.as_ref(), Operation::Update);
        Ok(resource
            .update(UpdateResourceRequest {
                type_name: type_name.to_string(),
                prior_state,
                planned_state: config.clone(),
                config,
                timeout,
            })
            .await)
    }

    pub async fn delete(
        &self,
        type_name: &str,
        prior_state: DynamicValue,
    ) -> Result<DeleteResourceResponse> {
        let resource = self.resource(type_name).await?;
        let timeout = self.timeout(resource.as_ref(), Operation::Delete);
        Ok(resource
            .delete(DeleteResourceRequest {
                type_name: type_name.to_string(),
                prior_state,
                timeout,
            })
            .await)
    }

    /// Force-new attributes whose configured value differs from the prior
    /// state. A non-empty result means the change cannot be applied in place.
    pub fn requires_replacement(
        &self,
        type_name: &str,
        prior_state: &DynamicValue,
        config: &DynamicValue,
    ) -> Result<Vec<String>> {
        let factory = self
            .provider
            .resources()
            .get(type_name)
            .copied()
            .ok_or_else(|| TfplugError::ResourceNotFound(type_name.to_string()))?;
        Ok(factory().schema().replacement_triggers(prior_state, config))
    }

    pub async fn read_data_source(
        &self,
        type_name: &str,
        config: DynamicValue,
    ) -> Result<ReadDataSourceResponse> {
        let data_source = self.data_source(type_name).await?;
        let overrides = self
            .timeout_overrides
            .get(type_name)
            .copied()
            .unwrap_or_default();
        let timeout = data_source
            .schema()
            .timeouts
            .resolve(Operation::Read, &overrides);
        Ok(data_source
            .read(ReadDataSourceRequest {
                type_name: type_name.to_string(),
                config,
                timeout,
            })
            .await)
    }

    fn timeout(
        &self,
        resource: &dyn ResourceWithConfigure,
        operation: Operation,
    ) -> std::time::Duration {
        let overrides = self
            .timeout_overrides
            .get(resource.type_name())
            .copied()
            .unwrap_or_default();
        resource.schema().timeouts.resolve(operation, &overrides)
    }
}

fn summarize(diags: &Diagnostics) -> String {
    diags
        .errors()
        .map(|d| format!("{}: {}", d.summary, d.detail))
        .collect::<Vec<_>>()
        .join("; ")
}
