//! Lifecycle dispatch through ProviderHost with an in-memory provider

#![allow(clippy::disallowed_methods)] // Allow unwrap() in tests for clarity

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSourceWithConfigure,
    ReadDataSourceRequest, ReadDataSourceResponse,
};
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, ResourceFactory,
};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse, ReadResourceRequest,
    ReadResourceResponse, UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::{
    AttributeBuilder, AttributePath, AttributeType, DataSource, Diagnostic, Diagnostics,
    DynamicValue, Provider, ProviderHost, Resource, ResourceWithConfigure, Schema, SchemaBuilder,
    Timeouts, TfplugError,
};

type Store = Arc<Mutex<HashMap<String, String>>>;

struct MemoryProvider;

#[async_trait]
impl Provider for MemoryProvider {
    fn type_name(&self) -> &str {
        "memory"
    }

    fn schema(&self) -> Schema {
        SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("prefix", AttributeType::String)
                    .required()
                    .build(),
            )
            .build()
    }

    async fn configure(&mut self, request: ConfigureProviderRequest) -> ConfigureProviderResponse {
        let mut diagnostics = Diagnostics::new();
        let prefix = request.config.get_string_opt(&AttributePath::new("prefix"));
        if prefix.as_deref() == Some("") {
            diagnostics.add_error("prefix must not be empty", "");
            return ConfigureProviderResponse {
                provider_data: None,
                diagnostics,
            };
        }
        let store: Store = Arc::new(Mutex::new(HashMap::new()));
        ConfigureProviderResponse {
            provider_data: Some(Arc::new(store)),
            diagnostics,
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut map: HashMap<String, ResourceFactory> = HashMap::new();
        map.insert("memory_item".to_string(), || Box::new(ItemResource::default()));
        map
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        let mut map: HashMap<String, DataSourceFactory> = HashMap::new();
        map.insert("memory_items".to_string(), || Box::new(ItemsDataSource::default()));
        map
    }
}

#[derive(Default)]
struct ItemResource {
    store: Option<Store>,
}

#[async_trait]
impl Resource for ItemResource {
    fn type_name(&self) -> &str {
        "memory_item"
    }

    fn schema(&self) -> Schema {
        SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("timeout", AttributeType::Number)
                    .computed()
                    .build(),
            )
            .timeouts(Timeouts::new().create(Duration::from_secs(90)))
            .build()
    }

    async fn create(&self, request: CreateResourceRequest) -> CreateResourceResponse {
        let name = request.config.get_string(&AttributePath::new("name")).unwrap();
        self.store
            .as_ref()
            .unwrap()
            .lock()
            .unwrap()
            .insert(name.clone(), name.clone());
        let mut state = request.planned_state;
        state
            .set_number(&AttributePath::new("timeout"), request.timeout.as_secs_f64())
            .unwrap();
        CreateResourceResponse {
            new_state: state,
            diagnostics: Diagnostics::new(),
        }
    }

    async fn read(&self, request: ReadResourceRequest) -> ReadResourceResponse {
        let name = request
            .current_state
            .get_string(&AttributePath::new("name"))
            .unwrap();
        let exists = self
            .store
            .as_ref()
            .unwrap()
            .lock()
            .unwrap()
            .contains_key(&name);
        ReadResourceResponse {
            new_state: exists.then_some(request.current_state),
            diagnostics: Diagnostics::new(),
        }
    }

    async fn update(&self, request: UpdateResourceRequest) -> UpdateResourceResponse {
        UpdateResourceResponse {
            new_state: request.planned_state,
            diagnostics: Diagnostics::new(),
        }
    }

    async fn delete(&self, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let name = request
            .prior_state
            .get_string(&AttributePath::new("name"))
            .unwrap();
        self.store.as_ref().unwrap().lock().unwrap().remove(&name);
        DeleteResourceResponse {
            diagnostics: Diagnostics::new(),
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for ItemResource {
    async fn configure(&mut self, request: ConfigureResourceRequest) -> ConfigureResourceResponse {
        let mut diagnostics = Diagnostics::new();
        match request
            .provider_data
            .and_then(|data| data.downcast_ref::<Store>().cloned())
        {
            Some(store) => self.store = Some(store),
            None => diagnostics.push(Diagnostic::error("Invalid provider data", "")),
        }
        ConfigureResourceResponse { diagnostics }
    }
}

#[derive(Default)]
struct ItemsDataSource {
    store: Option<Store>,
}

#[async_trait]
impl DataSource for ItemsDataSource {
    fn type_name(&self) -> &str {
        "memory_items"
    }

    fn schema(&self) -> Schema {
        SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new(
                    "names",
                    AttributeType::List(Box::new(AttributeType::String)),
                )
                .computed()
                .build(),
            )
            .build()
    }

    async fn read(&self, _request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let mut names: Vec<String> = self
            .store
            .as_ref()
            .unwrap()
            .lock()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        names.sort();
        let mut state = DynamicValue::object();
        state
            .set_list(
                &AttributePath::new("names"),
                names.into_iter().map(Into::into).collect(),
            )
            .unwrap();
        ReadDataSourceResponse {
            state,
            diagnostics: Diagnostics::new(),
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for ItemsDataSource {
    async fn configure(
        &mut self,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        self.store = request
            .provider_data
            .and_then(|data| data.downcast_ref::<Store>().cloned());
        ConfigureDataSourceResponse {
            diagnostics: Diagnostics::new(),
        }
    }
}

fn config(json: serde_json::Value) -> DynamicValue {
    DynamicValue::from_json(json)
}

#[tokio::test]
async fn host_rejects_calls_before_configuration() {
    let host = ProviderHost::new(MemoryProvider);

    let result = host.resource("memory_item").await;
    assert!(matches!(result, Err(TfplugError::ProviderNotConfigured)));
}

#[tokio::test]
async fn host_validates_provider_config_against_schema() {
    let mut host = ProviderHost::new(MemoryProvider);

    let diags = host.configure(config(serde_json::json!({}))).await;
    assert!(diags.has_errors());
    assert!(!host.is_configured());

    let diags = host.configure(config(serde_json::json!({"prefix": ""}))).await;
    assert!(diags.has_errors());
    assert!(!host.is_configured());
}

#[tokio::test]
async fn host_reports_unknown_types() {
    let mut host = ProviderHost::new(MemoryProvider);
    host.configure(config(serde_json::json!({"prefix": "m"}))).await;

    assert!(matches!(
        host.resource("memory_other").await,
        Err(TfplugError::ResourceNotFound(_))
    ));
    assert!(matches!(
        host.data_source("memory_other").await,
        Err(TfplugError::DataSourceNotFound(_))
    ));
}

#[tokio::test]
async fn host_drives_full_lifecycle_with_shared_provider_data() {
    let mut host = ProviderHost::new(MemoryProvider);
    let diags = host.configure(config(serde_json::json!({"prefix": "m"}))).await;
    assert!(!diags.has_errors());

    let created = host
        .create("memory_item", config(serde_json::json!({"name": "a"})))
        .await
        .unwrap();
    assert!(!created.diagnostics.has_errors());
    assert_eq!(
        created
            .new_state
            .get_number(&AttributePath::new("timeout"))
            .unwrap(),
        90.0
    );

    let listed = host
        .read_data_source("memory_items", DynamicValue::object())
        .await
        .unwrap();
    assert_eq!(listed.state.get_string_list(&AttributePath::new("names")), vec!["a"]);

    let read = host.read("memory_item", created.new_state.clone()).await.unwrap();
    assert!(read.new_state.is_some());

    host.delete("memory_item", created.new_state.clone())
        .await
        .unwrap();
    let read = host.read("memory_item", created.new_state).await.unwrap();
    assert!(read.new_state.is_none());
}

#[tokio::test]
async fn host_applies_user_timeout_overrides() {
    let mut host = ProviderHost::new(MemoryProvider);
    host.configure(config(serde_json::json!({"prefix": "m"}))).await;
    host.set_timeouts("memory_item", Timeouts::new().create(Duration::from_secs(5)));

    let created = host
        .create("memory_item", config(serde_json::json!({"name": "b"})))
        .await
        .unwrap();
    assert_eq!(
        created
            .new_state
            .get_number(&AttributePath::new("timeout"))
            .unwrap(),
        5.0
    );
}

#[tokio::test]
async fn default_validate_uses_schema() {
    let mut host = ProviderHost::new(MemoryProvider);
    host.configure(config(serde_json::json!({"prefix": "m"}))).await;

    let diags = host
        .validate("memory_item", config(serde_json::json!({})))
        .await
        .unwrap();
    assert!(diags.has_errors());
}
