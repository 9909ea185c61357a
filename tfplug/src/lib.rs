//! tfplug - resource lifecycle framework for Terraform providers
//!
//! Providers implement [`Provider`], [`Resource`] and [`DataSource`]; the
//! [`ProviderHost`] wires configuration, factories and operation timeouts
//! together. Wire protocol handling lives outside this crate.

// Core modules
pub mod error;
pub mod schema;
pub mod types;

// Provider API modules
pub mod data_source;
pub mod provider;
pub mod resource;

pub mod host;

// Re-exports for convenience
pub use data_source::{DataSource, DataSourceWithConfigure};
pub use error::{Result, TfplugError};
pub use host::ProviderHost;
pub use provider::{Provider, ProviderData};
pub use resource::{Resource, ResourceWithConfigure};
pub use schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder, Timeouts};
pub use types::{AttributePath, Diagnostic, Diagnostics, Dynamic, DynamicValue};
