//! Resource trait and related types
//!
//! Every request carries the operation timeout resolved by the host, so
//! handlers can bound their retry and polling loops without knowing where
//! the value came from.

use crate::provider::ProviderData;
use crate::schema::Schema;
use crate::types::{Diagnostics, DynamicValue};
use async_trait::async_trait;
use std::time::Duration;

/// Base trait for resources - implement CRUD operations
#[async_trait]
pub trait Resource: Send + Sync {
    /// Type name should be constant (e.g., "alicloud_vpc")
    /// MUST match the key used in Provider::resources()
    fn type_name(&self) -> &str;

    fn schema(&self) -> Schema;

    /// Called during plan to validate configuration. The default checks the
    /// configuration against the schema.
    async fn validate(&self, request: ValidateResourceConfigRequest) -> Diagnostics {
        self.schema().validate(&request.config)
    }

    /// MUST populate all attributes in response.new_state (including computed)
    async fn create(&self, request: CreateResourceRequest) -> CreateResourceResponse;

    /// MUST return None if the remote object no longer exists
    async fn read(&self, request: ReadResourceRequest) -> ReadResourceResponse;

    async fn update(&self, request: UpdateResourceRequest) -> UpdateResourceResponse;

    async fn delete(&self, request: DeleteResourceRequest) -> DeleteResourceResponse;
}

pub struct ValidateResourceConfigRequest {
    pub type_name: String,
    pub config: DynamicValue,
}

pub struct CreateResourceRequest {
    pub type_name: String,
    pub config: DynamicValue,
    pub planned_state: DynamicValue,
    pub timeout: Duration,
}

pub struct CreateResourceResponse {
    pub new_state: DynamicValue,
    pub diagnostics: Diagnostics,
}

pub struct ReadResourceRequest {
    pub type_name: String,
    pub current_state: DynamicValue,
    pub timeout: Duration,
}

pub struct ReadResourceResponse {
    pub new_state: Option<DynamicValue>,
    pub diagnostics: Diagnostics,
}

pub struct UpdateResourceRequest {
    pub type_name: String,
    pub prior_state: DynamicValue,
    pub planned_state: DynamicValue,
    pub config: DynamicValue,
    pub timeout: Duration,
}

pub struct UpdateResourceResponse {
    pub new_state: DynamicValue,
    pub diagnostics: Diagnostics,
}

pub struct DeleteResourceRequest {
    pub type_name: String,
    pub prior_state: DynamicValue,
    pub timeout: Duration,
}

pub struct DeleteResourceResponse {
    pub diagnostics: Diagnostics,
}

/// All resources must implement configure to receive provider data
/// This is called immediately after the factory creates the resource
#[async_trait]
pub trait ResourceWithConfigure: Resource {
    async fn configure(&mut self, request: ConfigureResourceRequest) -> ConfigureResourceResponse;
}

pub struct ConfigureResourceRequest {
    /// Downcast to your provider's specific type
    pub provider_data: Option<ProviderData>,
}

pub struct ConfigureResourceResponse {
    pub diagnostics: Diagnostics,
}
