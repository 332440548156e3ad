use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::api::Result;
use crate::model::ReferentialAction;

/// Explicit overrides that win over convention-based inference.
///
/// Keys are logical names: entity names at the top level, property and
/// navigation names inside an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfiguration {
    pub entities: BTreeMap<String, EntityConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EntityConfig {
    pub table: Option<String>,
    pub key: Option<Vec<String>>,
    pub properties: BTreeMap<String, PropertyConfig>,
    /// Keyed by the navigation that defines the relationship on this entity.
    pub relationships: BTreeMap<String, RelationshipConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PropertyConfig {
    pub column: Option<String>,
    pub max_length: Option<u32>,
    pub required: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelationshipConfig {
    /// Navigation on the other side of the relationship.
    pub inverse: Option<String>,
    pub foreign_key: Option<String>,
    pub required: Option<bool>,
    pub on_delete: Option<ReferentialAction>,
}

impl ModelConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn entity(&mut self, name: &str) -> &mut EntityConfig {
        self.entities.entry(name.to_string()).or_default()
    }

    /// Layers `other` on top of `self`; values set in `other` win.
    pub fn merge(&mut self, other: ModelConfiguration) {
        for (name, incoming) in other.entities {
            self.entity(&name).merge(incoming);
        }
    }
}

impl EntityConfig {
    pub fn to_table(&mut self, table: impl Into<String>) -> &mut Self {
        self.table = Some(table.into());
        self
    }

    pub fn has_key(&mut self, properties: &[&str]) -> &mut Self {
        self.key = Some(properties.iter().map(|p| p.to_string()).collect());
        self
    }

    pub fn property(&mut self, name: &str) -> &mut PropertyConfig {
        self.properties.entry(name.to_string()).or_default()
    }

    /// Configures the relationship behind a reference navigation.
    pub fn has_one(&mut self, navigation: &str) -> &mut RelationshipConfig {
        self.relationships.entry(navigation.to_string()).or_default()
    }

    /// Configures the relationship behind a collection navigation.
    pub fn has_many(&mut self, navigation: &str) -> &mut RelationshipConfig {
        self.relationships.entry(navigation.to_string()).or_default()
    }

    fn merge(&mut self, other: EntityConfig) {
        if other.table.is_some() {
            self.table = other.table;
        }
        if other.key.is_some() {
            self.key = other.key;
        }
        for (name, incoming) in other.properties {
            let current = self.property(&name);
            if incoming.column.is_some() {
                current.column = incoming.column;
            }
            if incoming.max_length.is_some() {
                current.max_length = incoming.max_length;
            }
            if incoming.required.is_some() {
                current.required = incoming.required;
            }
        }
        for (name, incoming) in other.relationships {
            let current = self.has_one(&name);
            if incoming.inverse.is_some() {
                current.inverse = incoming.inverse;
            }
            if incoming.foreign_key.is_some() {
                current.foreign_key = incoming.foreign_key;
            }
            if incoming.required.is_some() {
                current.required = incoming.required;
            }
            if incoming.on_delete.is_some() {
                current.on_delete = incoming.on_delete;
            }
        }
    }
}

impl PropertyConfig {
    pub fn has_max_length(&mut self, max_length: u32) -> &mut Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn has_column_name(&mut self, column: impl Into<String>) -> &mut Self {
        self.column = Some(column.into());
        self
    }

    pub fn is_required(&mut self, required: bool) -> &mut Self {
        self.required = Some(required);
        self
    }
}

impl RelationshipConfig {
    pub fn with_many(&mut self, inverse: impl Into<String>) -> &mut Self {
        self.inverse = Some(inverse.into());
        self
    }

    pub fn with_one(&mut self, inverse: impl Into<String>) -> &mut Self {
        self.inverse = Some(inverse.into());
        self
    }

    pub fn has_foreign_key(&mut self, property: impl Into<String>) -> &mut Self {
        self.foreign_key = Some(property.into());
        self
    }

    pub fn is_required(&mut self, required: bool) -> &mut Self {
        self.required = Some(required);
        self
    }

    pub fn on_delete(&mut self, action: ReferentialAction) -> &mut Self {
        self.on_delete = Some(action);
        self
    }
}

/// Source of explicit configuration, applied in registration order.
pub trait ConfigurationProvider: Send + Sync {
    fn configure(&self, config: &mut ModelConfiguration);
}

impl<F> ConfigurationProvider for F
where
    F: Fn(&mut ModelConfiguration) + Send + Sync,
{
    fn configure(&self, config: &mut ModelConfiguration) {
        self(config)
    }
}

impl ConfigurationProvider for ModelConfiguration {
    fn configure(&self, config: &mut ModelConfiguration) {
        config.merge(self.clone());
    }
}
