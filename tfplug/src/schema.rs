//! Schema types and builders for tfplug
//!
//! Resources and data sources describe their attributes with [`Schema`].
//! Resources also declare default [`Timeouts`] for each lifecycle operation.

use crate::types::{AttributePath, Diagnostic, Diagnostics, Dynamic, DynamicValue};
use std::collections::HashMap;
use std::time::Duration;

/// Fallback used when neither the user nor the schema sets a timeout
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// AttributeType defines the type system for Terraform attributes
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    Number,
    Bool,
    List(Box<AttributeType>),
    Set(Box<AttributeType>),
    Map(Box<AttributeType>),
    Object(HashMap<String, AttributeType>),
}

impl AttributeType {
    /// Whether a concrete value fits this type; null and unknown always do
    pub fn accepts(&self, value: &Dynamic) -> bool {
        match (self, value) {
            (_, Dynamic::Null) | (_, Dynamic::Unknown) => true,
            (AttributeType::String, Dynamic::String(_)) => true,
            (AttributeType::Number, Dynamic::Number(_)) => true,
            (AttributeType::Bool, Dynamic::Bool(_)) => true,
            (AttributeType::List(inner), Dynamic::List(items))
            | (AttributeType::Set(inner), Dynamic::List(items)) => {
                items.iter().all(|item| inner.accepts(item))
            }
            (AttributeType::Map(inner), Dynamic::Map(entries)) => {
                entries.values().all(|entry| inner.accepts(entry))
            }
            (AttributeType::Object(fields), Dynamic::Map(entries)) => {
                entries.iter().all(|(key, entry)| {
                    fields
                        .get(key)
                        .map(|field| field.accepts(entry))
                        .unwrap_or(false)
                })
            }
            _ => false,
        }
    }
}

/// Operation kinds that carry a timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

/// Default per-operation timeouts declared by a resource
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Timeouts {
    pub create: Option<Duration>,
    pub read: Option<Duration>,
    pub update: Option<Duration>,
    pub delete: Option<Duration>,
}

impl Timeouts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(mut self, timeout: Duration) -> Self {
        self.create = Some(timeout);
        self
    }

    pub fn read(mut self, timeout: Duration) -> Self {
        self.read = Some(timeout);
        self
    }

    pub fn update(mut self, timeout: Duration) -> Self {
        self.update = Some(timeout);
        self
    }

    pub fn delete(mut self, timeout: Duration) -> Self {
        self.delete = Some(timeout);
        self
    }

    pub fn get(&self, operation: Operation) -> Option<Duration> {
        match operation {
            Operation::Create => self.create,
            Operation::Read => self.read,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }

    /// User override first, then the declared default, then the fallback
    pub fn resolve(&self, operation: Operation, overrides: &Timeouts) -> Duration {
        overrides
            .get(operation)
            .or_else(|| self.get(operation))
            .unwrap_or(DEFAULT_OPERATION_TIMEOUT)
    }
}

/// Attribute represents a single configuration attribute
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub r#type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    /// Changing the value forces the resource to be replaced
    pub force_new: bool,
}

/// Schema is returned by providers, resources and data sources
#[derive(Debug, Clone)]
pub struct Schema {
    pub version: i64,
    pub description: String,
    pub attributes: Vec<Attribute>,
    pub timeouts: Timeouts,
}

impl Schema {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Checks required attributes are present and values fit their types
    pub fn validate(&self, config: &DynamicValue) -> Diagnostics {
        let mut diags = Diagnostics::new();

        for attr in &self.attributes {
            let path = AttributePath::new(&attr.name);
            match config.get(&path) {
                Ok(value) if !attr.r#type.accepts(value) => diags.push(
                    Diagnostic::error(
                        "Invalid attribute type",
                        format!(
                            "Attribute '{}' expects {:?}, got {}",
                            attr.name,
                            attr.r#type,
                            value.type_name()
                        ),
                    )
                    .with_attribute(path),
                ),
                Ok(Dynamic::Null) | Err(_) if attr.required => diags.push(
                    Diagnostic::error(
                        "Missing required attribute",
                        format!("The '{}' attribute is required", attr.name),
                    )
                    .with_attribute(path),
                ),
                _ => {}
            }
        }

        diags
    }

    /// Names of force-new attributes whose value differs between two states
    pub fn replacement_triggers(&self, prior: &DynamicValue, planned: &DynamicValue) -> Vec<String> {
        self.attributes
            .iter()
            .filter(|a| a.force_new)
            .filter(|a| {
                let path = AttributePath::new(&a.name);
                let before = prior.get(&path).ok();
                let after = planned.get(&path).ok();
                match (before, after) {
                    (Some(Dynamic::Unknown), _) | (_, Some(Dynamic::Unknown)) => false,
                    // an omitted computed attribute keeps the prior value
                    (_, None | Some(Dynamic::Null)) if a.computed => false,
                    (before, after) => before != after,
                }
            })
            .map(|a| a.name.clone())
            .collect()
    }
}

/// AttributeBuilder provides fluent API for building attributes
pub struct AttributeBuilder {
    attribute: Attribute,
}

impl AttributeBuilder {
    pub fn new(name: &str, type_: AttributeType) -> Self {
        Self {
            attribute: Attribute {
                name: name.to_string(),
                r#type: type_,
                description: String::new(),
                required: false,
                optional: false,
                computed: false,
                sensitive: false,
                force_new: false,
            },
        }
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.attribute.description = desc.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.attribute.required = true;
        self.attribute.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.attribute.optional = true;
        self.attribute.required = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.attribute.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.attribute.sensitive = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.attribute.force_new = true;
        self
    }

    pub fn build(self) -> Attribute {
        self.attribute
    }
}

/// SchemaBuilder provides fluent API for building schemas
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            schema: Schema {
                version: 0,
                description: String::new(),
                attributes: Vec::new(),
                timeouts: Timeouts::default(),
            },
        }
    }

    pub fn version(mut self, version: i64) -> Self {
        self.schema.version = version;
        self
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.schema.description = desc.to_string();
        self
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.schema.attributes.push(attr);
        self
    }

    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.schema.timeouts = timeouts;
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}
