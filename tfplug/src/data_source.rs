//! DataSource trait and related types

use crate::provider::ProviderData;
use crate::schema::Schema;
use crate::types::{Diagnostics, DynamicValue};
use async_trait::async_trait;
use std::time::Duration;

/// Base trait for data sources - read is the only operation
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Type name should be constant (e.g., "alicloud_vpcs")
    fn type_name(&self) -> &str;

    fn schema(&self) -> Schema;

    async fn validate(&self, request: ValidateDataSourceConfigRequest) -> Diagnostics {
        self.schema().validate(&request.config)
    }

    /// MUST populate all attributes in response.state
    async fn read(&self, request: ReadDataSourceRequest) -> ReadDataSourceResponse;
}

pub struct ValidateDataSourceConfigRequest {
    pub type_name: String,
    pub config: DynamicValue,
}

pub struct ReadDataSourceRequest {
    pub type_name: String,
    pub config: DynamicValue,
    pub timeout: Duration,
}

pub struct ReadDataSourceResponse {
    pub state: DynamicValue,
    pub diagnostics: Diagnostics,
}

#[async_trait]
pub trait DataSourceWithConfigure: DataSource {
    async fn configure(
        &mut self,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse;
}

pub struct ConfigureDataSourceRequest {
    pub provider_data: Option<ProviderData>,
}

pub struct ConfigureDataSourceResponse {
    pub diagnostics: Diagnostics,
}
