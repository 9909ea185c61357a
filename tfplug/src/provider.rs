//! Provider trait and factory types

use crate::data_source::DataSourceWithConfigure;
use crate::resource::ResourceWithConfigure;
use crate::schema::Schema;
use crate::types::{Diagnostics, DynamicValue};
use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Opaque data handed from the provider to every resource and data source
pub type ProviderData = Arc<dyn Any + Send + Sync>;

/// Factories build a fresh, unconfigured instance per operation
pub type ResourceFactory = fn() -> Box<dyn ResourceWithConfigure>;
pub type DataSourceFactory = fn() -> Box<dyn DataSourceWithConfigure>;

#[async_trait]
pub trait Provider: Send + Sync {
    /// Prefix shared by all resource type names (e.g., "alicloud")
    fn type_name(&self) -> &str;

    fn schema(&self) -> Schema;

    async fn configure(&mut self, request: ConfigureProviderRequest) -> ConfigureProviderResponse;

    fn resources(&self) -> HashMap<String, ResourceFactory>;

    fn data_sources(&self) -> HashMap<String, DataSourceFactory>;
}

pub struct ConfigureProviderRequest {
    pub config: DynamicValue,
}

pub struct ConfigureProviderResponse {
    /// Passed to resources and data sources through their configure call
    pub provider_data: Option<ProviderData>,
    pub diagnostics: Diagnostics,
}
